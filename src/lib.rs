//! # rankeval — ranking-quality evaluation for retrieval pipelines
//!
//! This crate stores relevance judgments ("sessions"), lazily resolves
//! item and user metadata through a persistent key-value store, and
//! computes NDCG@k with its standard error over a collection of sessions,
//! given an externally supplied scoring function.
//!
//! The moving parts, leaf-first:
//! - [`Session`] — an immutable relevance-judgment record, validated
//!   eagerly at construction.
//! - [`Dataset`](data::Dataset) — a persistent id-to-row mapping with a
//!   lazy decode step and ordered, restartable iteration.
//! - [`SessionDataset`](data::SessionDataset) — a session-typed dataset
//!   that can cross-reference item and user datasets for attribute
//!   lookup.
//! - [`BatchedSequentialSampler`](data::BatchedSequentialSampler) — key
//!   batches over a dataset's key space, in iteration order.
//! - [`Evaluator`](eval::Evaluator) — scores sessions through a
//!   caller-supplied [`ScoringPipeline`](eval::ScoringPipeline), reranks,
//!   and aggregates NDCG@k.
//!
//! Scoring functions themselves (lexical, dense, or otherwise) are
//! external collaborators; the evaluator only requires the
//! [`ScoringPipeline`](eval::ScoringPipeline) contract.

pub mod config;
pub mod data;
pub mod error;
pub mod eval;

pub use config::{DatasetConfig, EvalConfig};
pub use data::{
    BatchedSequentialSampler, DataSource, Dataset, Id, Row, Session, SessionDataset,
};
pub use error::{Error, ValidationError};
pub use eval::{EvalSummary, Evaluator, ScoringPipeline};
