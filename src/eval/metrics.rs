//! Ranking-quality metrics.
//!
//! NDCG over graded relevances with a logarithmic position discount:
//! `DCG@k = Σ rel[p] / log2(p + 2)` for 0-indexed positions `p < k`, and
//! `NDCG@k = DCG@k / IDCG@k` where IDCG is the DCG of the descending-sorted
//! relevances.

use crate::error::Error;

/// Discounted cumulative gain of `relevances` truncated at `k`.
///
/// Positions are 0-indexed; the `+ 2` in the discount makes the rank-1
/// discount `log2(2) = 1`.
pub fn dcg_at_k(relevances: &[f64], k: usize) -> f64 {
    relevances
        .iter()
        .take(k)
        .enumerate()
        .map(|(pos, rel)| rel / (pos as f64 + 2.0).log2())
        .sum()
}

/// DCG of the ideal (descending) ordering of `relevances`, truncated at `k`.
pub fn idcg_at_k(relevances: &[f64], k: usize) -> f64 {
    let mut optimal = relevances.to_vec();
    optimal.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    dcg_at_k(&optimal, k)
}

/// Normalized DCG at `k`.
///
/// Returns `0.0` when the ideal DCG is not positive (an all-zero relevance
/// sequence), avoiding a division by zero. `k == 0` is an invalid
/// argument.
pub fn ndcg_at_k(relevances: &[f64], k: usize) -> Result<f64, Error> {
    if k == 0 {
        return Err(Error::invalid_argument("k must be > 0"));
    }
    let idcg = idcg_at_k(relevances, k);
    if idcg <= 0.0 {
        return Ok(0.0);
    }
    Ok(dcg_at_k(relevances, k) / idcg)
}

/// Arithmetic mean and standard error of a metric sample.
///
/// The standard error uses the population standard deviation divided by
/// `sqrt(n)`. An empty sample has no metric and yields `None`.
pub fn mean_with_se(metrics: &[f64]) -> Option<(f64, f64)> {
    if metrics.is_empty() {
        return None;
    }
    let n = metrics.len() as f64;
    let mean = metrics.iter().sum::<f64>() / n;
    let variance = metrics.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt() / n.sqrt()))
}
