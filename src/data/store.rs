//! Key-value store backends backing a [`Dataset`](crate::data::Dataset).

use rusqlite::OptionalExtension;
use std::collections::BTreeMap;
use std::path::Path;

use crate::data::{Id, Row};
use crate::error::Error;

/// Persistent mapping from an [`Id`] to a raw attribute row.
///
/// A dataset exclusively owns one store for its lifetime. After population
/// the store is only read; reads are pure lookups and safe to share.
/// `keys` returns ascending store order, which is the order of
/// [`Id::store_key`] for every backend.
pub trait KeyValueStore {
    fn put(&mut self, id: &Id, row: &Row) -> Result<(), Error>;

    fn get(&self, id: &Id) -> Result<Option<Row>, Error>;

    /// All keys in ascending store order.
    fn keys(&self) -> Result<Vec<Id>, Error>;

    fn len(&self) -> Result<usize, Error>;

    fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Write a stream of entries; later writes for the same id overwrite
    /// earlier ones. Backends may batch this into one transaction.
    fn put_all(
        &mut self,
        entries: &mut dyn Iterator<Item = Result<(Id, Row), Error>>,
    ) -> Result<usize, Error> {
        let mut written = 0;
        for entry in entries {
            let (id, row) = entry?;
            self.put(&id, &row)?;
            written += 1;
        }
        Ok(written)
    }
}

/// In-memory store, ordered by the same key encoding as the disk backends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Id, Row>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&mut self, id: &Id, row: &Row) -> Result<(), Error> {
        self.entries.insert(id.clone(), row.clone());
        Ok(())
    }

    fn get(&self, id: &Id) -> Result<Option<Row>, Error> {
        Ok(self.entries.get(id).cloned())
    }

    fn keys(&self) -> Result<Vec<Id>, Error> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, Error> {
        Ok(self.entries.len())
    }
}

/// SQLite-backed store: one `kv` table inside a store directory.
///
/// Keys are the order-preserving [`Id::store_key`] encoding, so
/// `ORDER BY key` yields [`Id`] order; values are the row as JSON bytes.
pub struct SqliteStore {
    conn: rusqlite::Connection,
}

const STORE_FILE: &str = "attrs.sqlite3";

impl SqliteStore {
    /// Open (creating if needed) the store inside `dir`.
    pub fn open(dir: &Path) -> Result<Self, Error> {
        std::fs::create_dir_all(dir)?;
        let conn = rusqlite::Connection::open(dir.join(STORE_FILE))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (key BLOB PRIMARY KEY, value BLOB NOT NULL)",
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn put(&mut self, id: &Id, row: &Row) -> Result<(), Error> {
        let value = serde_json::to_vec(row)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            rusqlite::params![id.store_key(), value],
        )?;
        Ok(())
    }

    fn get(&self, id: &Id) -> Result<Option<Row>, Error> {
        let value: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![id.store_key()],
                |r| r.get(0),
            )
            .optional()?;
        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn keys(&self) -> Result<Vec<Id>, Error> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |r| r.get::<_, Vec<u8>>(0))?;
        let mut keys = Vec::new();
        for raw in rows {
            keys.push(Id::from_store_key(&raw?)?);
        }
        Ok(keys)
    }

    fn len(&self) -> Result<usize, Error> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn put_all(
        &mut self,
        entries: &mut dyn Iterator<Item = Result<(Id, Row), Error>>,
    ) -> Result<usize, Error> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
            for entry in entries {
                let (id, row) = entry?;
                stmt.execute(rusqlite::params![id.store_key(), serde_json::to_vec(&row)?])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}
