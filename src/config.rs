//! Configuration types for the rankeval crate.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Dataset`](crate::data::Dataset).
///
/// `store_location` names the directory holding the backing store. Remote
/// locations use a `scheme:/` prefix (e.g. `dbfs:/...`) and are populated
/// via a local staging store that is copied over wholesale at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory where the backing store lives (or should be created).
    /// When unset and a source is given, a throwaway temporary store is
    /// used instead.
    #[serde(default)]
    pub store_location: Option<String>,
    /// Name of the id column extracted from columnar batch files.
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            store_location: None,
            id_field: default_id_field(),
        }
    }
}

impl DatasetConfig {
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            store_location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }
}

fn default_id_field() -> String {
    "id".to_string()
}

/// Configuration for an [`Evaluator`](crate::eval::Evaluator) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Sessions per batch pulled from the session dataset.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Discard a final batch shorter than `batch_size`.
    #[serde(default)]
    pub drop_last: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            drop_last: false,
        }
    }
}

fn default_batch_size() -> usize {
    10
}

/// Number of leading entries a session dataset decodes eagerly at
/// construction to catch malformed rows before any evaluation begins.
pub(crate) const SESSION_SAMPLE_CHECK: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dataset_config() {
        let config = DatasetConfig::default();
        assert_eq!(config.id_field, "id");
        assert!(config.store_location.is_none());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = DatasetConfig::with_location("/tmp/store").with_id_field("item_id");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DatasetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id_field, "item_id");
        assert_eq!(parsed.store_location.as_deref(), Some("/tmp/store"));
    }

    #[test]
    fn test_eval_config_defaults_from_empty_json() {
        let config: EvalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.batch_size, 10);
        assert!(!config.drop_last);
    }
}
