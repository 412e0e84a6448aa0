//! Tagged identifier type used as the key for every store and session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// An item, user or session identifier: either an integer or a string.
///
/// `Id` has a total order so it can serve uniformly as a store key and in
/// sets and maps: all integer ids sort before all text ids, integers by
/// numeric value, text byte-wise. [`Id::store_key`] produces a byte
/// encoding whose memcmp order equals this order, so every store backend
/// iterates keys in the same order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Text(String),
}

const TAG_INT: u8 = 0x00;
const TAG_TEXT: u8 = 0x01;

impl Id {
    /// Order-preserving byte encoding used as the physical store key.
    ///
    /// Integers are big-endian with the sign bit flipped so that memcmp
    /// order matches numeric order across negative values.
    pub fn store_key(&self) -> Vec<u8> {
        match self {
            Id::Int(v) => {
                let mut bytes = Vec::with_capacity(9);
                bytes.push(TAG_INT);
                bytes.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes());
                bytes
            }
            Id::Text(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len());
                bytes.push(TAG_TEXT);
                bytes.extend_from_slice(s.as_bytes());
                bytes
            }
        }
    }

    /// Decode a physical store key back into an [`Id`].
    pub fn from_store_key(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.split_first() {
            Some((&TAG_INT, rest)) => {
                let fixed: [u8; 8] = rest
                    .try_into()
                    .map_err(|_| Error::config("malformed integer store key"))?;
                Ok(Id::Int((u64::from_be_bytes(fixed) ^ (1 << 63)) as i64))
            }
            Some((&TAG_TEXT, rest)) => {
                let text = std::str::from_utf8(rest)
                    .map_err(|_| Error::config("store key is not valid UTF-8"))?;
                Ok(Id::Text(text.to_string()))
            }
            _ => Err(Error::config("malformed store key")),
        }
    }

    /// Interpret a JSON value as an id: integers and strings only.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Id::Int),
            serde_json::Value::String(s) => Some(Id::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(v) => write!(f, "{v}"),
            Id::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Id {
    fn from(v: i64) -> Self {
        Id::Int(v)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Text(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_order_matches_id_order() {
        let ids = [
            Id::Int(i64::MIN),
            Id::Int(-7),
            Id::Int(0),
            Id::Int(42),
            Id::Int(i64::MAX),
            Id::Text("".into()),
            Id::Text("abc".into()),
            Id::Text("abd".into()),
        ];
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].store_key() < pair[1].store_key());
        }
    }

    #[test]
    fn test_store_key_roundtrip() {
        for id in [Id::Int(-3), Id::Int(0), Id::Int(99), Id::Text("s1".into())] {
            let decoded = Id::from_store_key(&id.store_key()).unwrap();
            assert_eq!(decoded, id);
        }
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Id::from_json(&serde_json::json!(7)), Some(Id::Int(7)));
        assert_eq!(
            Id::from_json(&serde_json::json!("doc-1")),
            Some(Id::Text("doc-1".into()))
        );
        assert_eq!(Id::from_json(&serde_json::json!(1.5)), None);
        assert_eq!(Id::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_serde_untagged() {
        let id: Id = serde_json::from_str("12").unwrap();
        assert_eq!(id, Id::Int(12));
        let id: Id = serde_json::from_str("\"session1\"").unwrap();
        assert_eq!(id, Id::Text("session1".into()));
        assert_eq!(serde_json::to_string(&Id::Int(12)).unwrap(), "12");
    }
}
