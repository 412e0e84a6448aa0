//! Persistent, lazily-decoded key-value datasets.

use parquet::file::reader::SerializedFileReader;
use parquet::record::reader::RowIter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

use crate::config::DatasetConfig;
use crate::data::store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::data::{Id, Row};
use crate::error::Error;

/// Where a dataset's rows come from at population time.
pub enum DataSource {
    /// In-memory mapping from id to attribute row.
    Memory(BTreeMap<Id, Row>),
    /// A batch file, or a directory of batch files of exactly one kind:
    /// `.parquet` (columnar) or `.json` (one object mapping id to
    /// attributes per file).
    Files(PathBuf),
}

/// Decode function applied lazily to each stored row on read.
pub type DecodeFn<T> = Arc<dyn Fn(&Id, &Row) -> Result<T, Error> + Send + Sync>;

/// A persistent mapping from id to a decoded value.
///
/// At construction the rows from `source` are written into the backing
/// store and retrieved lazily during training or evaluation. With no
/// source, a previously populated store at `config.store_location` is
/// reopened. Neither a source nor a location is a configuration error.
///
/// Duplicate ids across several source files are unsupported: files are
/// scanned in name order and the last write wins, but callers should not
/// rely on this.
pub struct Dataset<T> {
    store: Box<dyn KeyValueStore>,
    decode: DecodeFn<T>,
    id_field: String,
    // Keeps a throwaway store directory alive for the dataset's lifetime.
    // Declared after `store` so the connection closes before removal.
    _tempdir: Option<TempDir>,
}

impl<T> Dataset<T> {
    /// Build a dataset over the SQLite store described by `config`,
    /// populating it from `source` when one is given.
    pub fn new(
        config: DatasetConfig,
        source: Option<DataSource>,
        decode: DecodeFn<T>,
    ) -> Result<Self, Error> {
        match (source, config.store_location) {
            (None, None) => Err(Error::config(
                "must provide a data source and/or a store location",
            )),
            (None, Some(location)) => {
                let store = SqliteStore::open(Path::new(&location))?;
                info!(
                    entries = store.len()?,
                    location = %location,
                    "opened existing dataset store"
                );
                Ok(Self {
                    store: Box::new(store),
                    decode,
                    id_field: config.id_field,
                    _tempdir: None,
                })
            }
            (Some(source), location) => {
                Self::populate_new(source, location, config.id_field, decode)
            }
        }
    }

    /// Build a dataset over an in-memory store. Nothing persists; handy
    /// for tests and small fixtures.
    pub fn in_memory(map: BTreeMap<Id, Row>, decode: DecodeFn<T>) -> Result<Self, Error> {
        let mut store = MemoryStore::new();
        let mut entries = map.into_iter().map(Ok::<(Id, Row), Error>);
        store.put_all(&mut entries)?;
        Ok(Self {
            store: Box::new(store),
            decode,
            id_field: DatasetConfig::default().id_field,
            _tempdir: None,
        })
    }

    fn populate_new(
        source: DataSource,
        location: Option<String>,
        id_field: String,
        decode: DecodeFn<T>,
    ) -> Result<Self, Error> {
        info!("populating dataset store");
        let (store, tempdir) = match location {
            None => {
                let tempdir = TempDir::new()?;
                let mut store = SqliteStore::open(tempdir.path())?;
                let written = populate(&mut store, source, &id_field)?;
                info!(entries = written, "populated temporary dataset store");
                (store, Some(tempdir))
            }
            Some(location) if is_remote_location(&location) => {
                // Stage locally, then copy the finished store wholesale.
                // A failure during the copy can leave the remote location
                // partially written; this is not recovered automatically.
                let staging = TempDir::new()?;
                let written = {
                    let mut store = SqliteStore::open(staging.path())?;
                    populate(&mut store, source, &id_field)?
                };
                copy_dir(staging.path(), Path::new(&location))?;
                let store = SqliteStore::open(Path::new(&location))?;
                info!(
                    entries = written,
                    location = %location,
                    "populated dataset store via local staging"
                );
                (store, None)
            }
            Some(location) => {
                let mut store = SqliteStore::open(Path::new(&location))?;
                let written = populate(&mut store, source, &id_field)?;
                info!(
                    entries = written,
                    location = %location,
                    "populated dataset store"
                );
                (store, None)
            }
        };
        Ok(Self {
            store: Box::new(store),
            decode,
            id_field,
            _tempdir: tempdir,
        })
    }

    /// Load and decode the value for `id`. An absent id is `Ok(None)`,
    /// never an error.
    pub fn load(&self, id: &Id) -> Result<Option<T>, Error> {
        match self.store.get(id)? {
            Some(row) => Ok(Some((self.decode)(id, &row)?)),
            None => Ok(None),
        }
    }

    /// Load the stored row for `id` verbatim, without decoding.
    pub fn load_raw(&self, id: &Id) -> Result<Option<Row>, Error> {
        self.store.get(id)
    }

    /// Name of the id column used for columnar batch files.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// All keys in store order.
    pub fn keys(&self) -> Result<Vec<Id>, Error> {
        self.store.keys()
    }

    pub fn len(&self) -> Result<usize, Error> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        self.store.is_empty()
    }

    /// Iterate `(id, decoded value)` pairs in store key order.
    ///
    /// The key list is snapshotted when this is called; values decode
    /// on demand. Each call starts a fresh pass from the first key.
    /// Mutating the store mid-iteration has undefined ordering; keys
    /// removed underneath the iterator are skipped.
    pub fn iter(&self) -> Result<DatasetIter<'_, T>, Error> {
        Ok(DatasetIter {
            dataset: self,
            keys: self.store.keys()?.into_iter(),
        })
    }
}

impl Dataset<Row> {
    /// A dataset whose decoded value is the stored row itself.
    pub fn raw(config: DatasetConfig, source: Option<DataSource>) -> Result<Self, Error> {
        Self::new(config, source, identity_decode())
    }

    /// In-memory raw dataset.
    pub fn raw_in_memory(map: BTreeMap<Id, Row>) -> Result<Self, Error> {
        Self::in_memory(map, identity_decode())
    }
}

fn identity_decode() -> DecodeFn<Row> {
    Arc::new(|_, row| Ok(row.clone()))
}

/// Lazy iterator over a dataset, in store key order.
pub struct DatasetIter<'a, T> {
    dataset: &'a Dataset<T>,
    keys: std::vec::IntoIter<Id>,
}

impl<T> Iterator for DatasetIter<'_, T> {
    type Item = Result<(Id, T), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.keys.next()?;
            match self.dataset.load(&id) {
                Ok(Some(value)) => return Some(Ok((id, value))),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum SourceKind {
    Parquet,
    Json,
}

fn populate(
    store: &mut dyn KeyValueStore,
    source: DataSource,
    id_field: &str,
) -> Result<usize, Error> {
    match source {
        DataSource::Memory(map) => {
            let mut entries = map.into_iter().map(Ok::<(Id, Row), Error>);
            store.put_all(&mut entries)
        }
        DataSource::Files(path) => {
            let (kind, files) = scan_source_files(&path)?;
            let mut written = 0;
            for file in files {
                written += match kind {
                    SourceKind::Parquet => {
                        store.put_all(&mut parquet_entries(&file, id_field)?)?
                    }
                    SourceKind::Json => store.put_all(&mut json_entries(&file)?)?,
                };
            }
            Ok(written)
        }
    }
}

/// Resolve a source path to batch files of exactly one kind.
///
/// A direct file path is taken as the single batch file; a directory is
/// scanned (non-recursively) for `.parquet` or `.json` files. Finding both
/// kinds, or neither, is a configuration error.
fn scan_source_files(path: &Path) -> Result<(SourceKind, Vec<PathBuf>), Error> {
    if path.is_file() {
        return match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Ok((SourceKind::Parquet, vec![path.to_path_buf()])),
            Some("json") => Ok((SourceKind::Json, vec![path.to_path_buf()])),
            _ => Err(Error::config(format!(
                "{} is not a .parquet or .json file",
                path.display()
            ))),
        };
    }

    let mut parquet_files = Vec::new();
    let mut json_files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        if !entry_path.is_file() {
            continue;
        }
        match entry_path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => parquet_files.push(entry_path),
            Some("json") => json_files.push(entry_path),
            _ => {}
        }
    }
    parquet_files.sort();
    json_files.sort();

    match (parquet_files.is_empty(), json_files.is_empty()) {
        (false, false) => Err(Error::config(format!(
            "should only have either .parquet or .json files in {}",
            path.display()
        ))),
        (true, true) => Err(Error::config(format!(
            "no .parquet or .json files found in {}",
            path.display()
        ))),
        (false, true) => Ok((SourceKind::Parquet, parquet_files)),
        (true, false) => Ok((SourceKind::Json, json_files)),
    }
}

/// Stream rows of a columnar batch file; the `id_field` column becomes the
/// key, every other column the row.
fn parquet_entries(
    path: &Path,
    id_field: &str,
) -> Result<impl Iterator<Item = Result<(Id, Row), Error>>, Error> {
    let file = std::fs::File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let id_field = id_field.to_string();
    let path = path.to_path_buf();
    Ok(RowIter::from_file_into(Box::new(reader)).map(move |record| {
        match record?.to_json_value() {
            serde_json::Value::Object(object) => object_to_entry(object, &id_field, &path),
            other => Err(Error::config(format!(
                "row in {} decoded to non-object value {other}",
                path.display()
            ))),
        }
    }))
}

fn object_to_entry(mut object: Row, id_field: &str, path: &Path) -> Result<(Id, Row), Error> {
    let id_value = object.remove(id_field).ok_or_else(|| {
        Error::config(format!(
            "id field `{id_field}` not found in row of {}",
            path.display()
        ))
    })?;
    let id = Id::from_json(&id_value).ok_or_else(|| {
        Error::config(format!(
            "id field `{id_field}` in {} must be an integer or string, got {id_value}",
            path.display()
        ))
    })?;
    Ok((id, object))
}

/// Iterate an object file: one JSON object mapping string id to attribute
/// object.
fn json_entries(path: &Path) -> Result<impl Iterator<Item = Result<(Id, Row), Error>>, Error> {
    let file = std::fs::File::open(path)?;
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_reader(std::io::BufReader::new(file))?;
    let path = path.to_path_buf();
    Ok(map.into_iter().map(move |(key, value)| match value {
        serde_json::Value::Object(attrs) => Ok((Id::Text(key), attrs)),
        other => Err(Error::config(format!(
            "value for id `{key}` in {} is not an object, got {other}",
            path.display()
        ))),
    }))
}

/// A store location with a `scheme:/` prefix (e.g. `dbfs:/...`) is remote:
/// population stages locally and copies the finished store over.
fn is_remote_location(location: &str) -> bool {
    location
        .split_once(":/")
        .is_some_and(|(scheme, _)| scheme.len() >= 2 && scheme.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), Error> {
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::config("copy source yielded a path outside its root"))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn default_documents() -> BTreeMap<Id, Row> {
        let docs = serde_json::json!({
            "1": {"title": "mouse", "text": "i am a mouse, i like cheese."},
            "2": {"title": "cat", "text": "i am cat. i like to eat mouse."},
            "3": {"title": "cheese", "text": "i am cheese. cheezy cheese."},
        });
        docs.as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| {
                (
                    Id::Int(k.parse().unwrap()),
                    v.as_object().unwrap().clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_load_raw_returns_original_rows() {
        let docs = default_documents();
        let dataset = Dataset::raw_in_memory(docs.clone()).unwrap();
        for (id, row) in &docs {
            assert_eq!(dataset.load_raw(id).unwrap().as_ref(), Some(row));
            assert_eq!(dataset.load(id).unwrap().as_ref(), Some(row));
        }
        assert_eq!(dataset.load(&Id::Int(99)).unwrap(), None);
        assert_eq!(dataset.load_raw(&Id::Int(99)).unwrap(), None);
    }

    #[test]
    fn test_decode_fn_applied_on_load() {
        let dataset = Dataset::in_memory(
            default_documents(),
            Arc::new(|_, row: &Row| {
                Ok(row
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string())
            }),
        )
        .unwrap();
        assert_eq!(dataset.load(&Id::Int(2)).unwrap().as_deref(), Some("cat"));
    }

    #[test]
    fn test_sqlite_population_from_memory_source() {
        let dataset = Dataset::raw(
            DatasetConfig::default(),
            Some(DataSource::Memory(default_documents())),
        )
        .unwrap();
        assert_eq!(dataset.len().unwrap(), 3);
        assert_eq!(
            dataset
                .load_raw(&Id::Int(3))
                .unwrap()
                .unwrap()
                .get("title")
                .unwrap(),
            "cheese"
        );
    }

    #[test]
    fn test_missing_source_and_location_is_config_error() {
        let result = Dataset::raw(DatasetConfig::default(), None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_reopen_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().to_str().unwrap().to_string();
        {
            Dataset::raw(
                DatasetConfig::with_location(&location),
                Some(DataSource::Memory(default_documents())),
            )
            .unwrap();
        }
        let reopened = Dataset::raw(DatasetConfig::with_location(&location), None).unwrap();
        assert_eq!(reopened.len().unwrap(), 3);
        assert_eq!(
            reopened
                .load_raw(&Id::Int(1))
                .unwrap()
                .unwrap()
                .get("title")
                .unwrap(),
            "mouse"
        );
    }

    #[test]
    fn test_iter_covers_all_entries_in_key_order_and_restarts() {
        let dataset = Dataset::raw_in_memory(default_documents()).unwrap();
        let ids: Vec<Id> = dataset
            .iter()
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(ids, vec![Id::Int(1), Id::Int(2), Id::Int(3)]);
        // A second pass starts fresh.
        let again: Vec<Id> = dataset
            .iter()
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(again, ids);
    }

    #[test]
    fn test_json_directory_population() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("batch0.json"),
            r#"{"doc-a": {"title": "alpha"}, "doc-b": {"title": "beta"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("batch1.json"), r#"{"doc-c": {"title": "gamma"}}"#)
            .unwrap();
        let dataset = Dataset::raw(
            DatasetConfig::default(),
            Some(DataSource::Files(dir.path().to_path_buf())),
        )
        .unwrap();
        assert_eq!(dataset.len().unwrap(), 3);
        assert_eq!(
            dataset
                .load_raw(&Id::Text("doc-c".into()))
                .unwrap()
                .unwrap()
                .get("title")
                .unwrap(),
            "gamma"
        );
    }

    #[test]
    fn test_mixed_source_kinds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.parquet"), "").unwrap();
        let result = Dataset::raw(
            DatasetConfig::default(),
            Some(DataSource::Files(dir.path().to_path_buf())),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_source_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Dataset::raw(
            DatasetConfig::default(),
            Some(DataSource::Files(dir.path().to_path_buf())),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_non_object_json_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), r#"{"a": 1}"#).unwrap();
        let result = Dataset::raw(
            DatasetConfig::default(),
            Some(DataSource::Files(dir.path().to_path_buf())),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_object_to_entry_extracts_id_column() {
        let object: Row = serde_json::from_str(r#"{"doc_id": 7, "title": "x"}"#).unwrap();
        let (id, row) = object_to_entry(object, "doc_id", Path::new("batch.parquet")).unwrap();
        assert_eq!(id, Id::Int(7));
        assert!(!row.contains_key("doc_id"));
        assert_eq!(row.get("title").unwrap(), "x");
    }

    #[test]
    fn test_object_to_entry_missing_id_column() {
        let object: Row = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        let result = object_to_entry(object, "doc_id", Path::new("batch.parquet"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_is_remote_location() {
        assert!(is_remote_location("dbfs:/mnt/store"));
        assert!(is_remote_location("s3:/bucket/store"));
        assert!(!is_remote_location("/var/lib/store"));
        assert!(!is_remote_location("relative/store"));
        assert!(!is_remote_location("C:/store"));
    }
}
