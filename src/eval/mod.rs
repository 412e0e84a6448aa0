//! Evaluation — NDCG metrics and the scoring-pipeline evaluator.

pub mod evaluator;
pub mod metrics;

pub use evaluator::{EvalSummary, Evaluator, ScoreRequest, ScoringPipeline, rerank};
pub use metrics::{dcg_at_k, idcg_at_k, mean_with_se, ndcg_at_k};
