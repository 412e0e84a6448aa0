//! Session storage — identifiers, judgments, persistent datasets, samplers.

pub mod dataset;
pub mod id;
pub mod sampler;
pub mod session;
pub mod session_dataset;
pub mod store;

/// A raw attribute row: an open JSON object.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub use dataset::{DataSource, Dataset, DatasetIter, DecodeFn};
pub use id::Id;
pub use sampler::BatchedSequentialSampler;
pub use session::{Session, SessionBuilder};
pub use session_dataset::{
    AttributeBundle, ItemAttributes, SessionBundle, SessionDataset, UserAttributes,
};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
