//! Scoring-and-ranking evaluation over session collections.

use serde::Serialize;
use tracing::info;

use crate::config::EvalConfig;
use crate::data::{
    BatchedSequentialSampler, ItemAttributes, Session, SessionBundle, SessionDataset,
    UserAttributes,
};
use crate::error::Error;
use crate::eval::metrics::{mean_with_se, ndcg_at_k};

/// The scoring request handed to the external pipeline: the session query
/// plus the resolved (or raw-id) user and item attributes.
#[derive(Debug)]
pub struct ScoreRequest<'a> {
    pub query: Option<&'a str>,
    pub user_attributes: Option<&'a UserAttributes>,
    pub item_attributes: &'a ItemAttributes,
}

/// Contract required of an external scoring pipeline.
///
/// Implementations return one score per entry of
/// `request.item_attributes`, in the same order, and must not mutate the
/// request. Errors propagate to the evaluation caller unchanged.
pub trait ScoringPipeline {
    fn score(&self, request: &ScoreRequest<'_>) -> anyhow::Result<Vec<f64>>;
}

impl<F> ScoringPipeline for F
where
    F: Fn(&ScoreRequest<'_>) -> anyhow::Result<Vec<f64>>,
{
    fn score(&self, request: &ScoreRequest<'_>) -> anyhow::Result<Vec<f64>> {
        self(request)
    }
}

/// Aggregated metric over an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalSummary {
    pub mean: f64,
    pub std_error: f64,
    pub sessions: usize,
}

impl EvalSummary {
    /// `None` when no sessions were evaluated: an empty run has no
    /// metric, which is not the same as a metric of zero.
    pub fn from_metrics(metrics: &[f64]) -> Option<Self> {
        mean_with_se(metrics).map(|(mean, std_error)| Self {
            mean,
            std_error,
            sessions: metrics.len(),
        })
    }
}

/// Evaluates NDCG@k for reranking a session's items by an external
/// scoring pipeline.
///
/// For each session the pipeline scores every judged item, the relevance
/// sequence is permuted into descending score order (ties keep the
/// original item order), and NDCG@k of the permuted sequence is computed.
/// Results are aggregated into a mean with its standard error.
pub struct Evaluator<P> {
    pipeline: P,
    config: EvalConfig,
}

impl<P: ScoringPipeline> Evaluator<P> {
    pub fn new(pipeline: P) -> Self {
        Self::with_config(pipeline, EvalConfig::default())
    }

    pub fn with_config(pipeline: P, config: EvalConfig) -> Self {
        Self { pipeline, config }
    }

    /// Evaluate every session in the dataset, pulling batches of keys in
    /// iteration order and resolving attributes through the dataset.
    pub fn evaluate(
        &self,
        dataset: &SessionDataset,
        k: usize,
    ) -> Result<Option<EvalSummary>, Error> {
        check_k(k)?;
        let sampler = BatchedSequentialSampler::new(
            dataset.dataset(),
            self.config.batch_size,
            self.config.drop_last,
        )?;
        let mut metrics = Vec::new();
        for batch in sampler.iter() {
            for session_id in &batch {
                let Some(bundle) = dataset.load_session_bundle(session_id)? else {
                    continue;
                };
                metrics.push(self.session_ndcg(&bundle, k)?);
            }
        }
        let summary = EvalSummary::from_metrics(&metrics);
        if let Some(summary) = &summary {
            info!(
                sessions = summary.sessions,
                mean = summary.mean,
                std_error = summary.std_error,
                "evaluation completed"
            );
        }
        Ok(summary)
    }

    /// Evaluate a directly supplied list of sessions; item and user
    /// attributes pass through as raw ids.
    pub fn evaluate_sessions(
        &self,
        sessions: &[Session],
        k: usize,
    ) -> Result<Option<EvalSummary>, Error> {
        let bundles: Vec<SessionBundle> = sessions
            .iter()
            .map(|session| SessionBundle {
                user_attributes: session.user().cloned().map(UserAttributes::Id),
                item_attributes: ItemAttributes::Ids(session.items().to_vec()),
                session: session.clone(),
            })
            .collect();
        self.evaluate_bundles(&bundles, k)
    }

    /// Evaluate directly supplied session bundles.
    pub fn evaluate_bundles(
        &self,
        bundles: &[SessionBundle],
        k: usize,
    ) -> Result<Option<EvalSummary>, Error> {
        check_k(k)?;
        let mut metrics = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            metrics.push(self.session_ndcg(bundle, k)?);
        }
        Ok(EvalSummary::from_metrics(&metrics))
    }

    /// Raw pipeline scores for one session, in item order.
    pub fn score_session(&self, bundle: &SessionBundle) -> Result<Vec<f64>, Error> {
        let request = ScoreRequest {
            query: bundle.session.query(),
            user_attributes: bundle.user_attributes.as_ref(),
            item_attributes: &bundle.item_attributes,
        };
        let scores = self.pipeline.score(&request).map_err(Error::Pipeline)?;
        if scores.len() != bundle.session.items().len() {
            return Err(Error::ScoreCount {
                expected: bundle.session.items().len(),
                actual: scores.len(),
            });
        }
        Ok(scores)
    }

    fn session_ndcg(&self, bundle: &SessionBundle, k: usize) -> Result<f64, Error> {
        let scores = self.score_session(bundle)?;
        let reranked = rerank(&scores, bundle.session.relevances());
        ndcg_at_k(&reranked, k)
    }
}

fn check_k(k: usize) -> Result<(), Error> {
    if k == 0 {
        return Err(Error::invalid_argument("k must be > 0"));
    }
    Ok(())
}

/// Permute `relevances` into descending `scores` order.
///
/// The sort is stable: items with equal scores keep their original order.
pub fn rerank(scores: &[f64], relevances: &[f64]) -> Vec<f64> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices.into_iter().map(|i| relevances[i]).collect()
}
