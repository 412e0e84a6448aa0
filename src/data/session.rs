//! Session: an immutable relevance-judgment record.

use serde::Deserialize;

use crate::data::{Id, Row};
use crate::error::{Error, ValidationError};

/// A relevance-judgment record for one query/user interaction.
///
/// A session pairs items that received a positive relevance signal with
/// their scores, optionally alongside implicit or explicit negatives. Some
/// ways a session arises in practice:
/// - one user query and the items the user clicked on,
/// - a triplet of (query, positive item, negative item).
///
/// Sessions are validated eagerly at construction (see [`SessionBuilder`])
/// and never mutated afterwards. The derived `items` sequence is
/// `negative_items ++ positive_items` in source order, and `relevances`
/// carries the paired positive relevance for each item, `0.0` for
/// negatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    session_id: Id,
    positive_items: Vec<Id>,
    positive_relevances: Vec<f64>,
    negative_items: Vec<Id>,
    user: Option<Id>,
    query: Option<String>,
    items: Vec<Id>,
    relevances: Vec<f64>,
}

impl Session {
    pub fn builder(session_id: impl Into<Id>) -> SessionBuilder {
        SessionBuilder {
            session_id: session_id.into(),
            positive_items: Vec::new(),
            positive_relevances: Vec::new(),
            negative_items: Vec::new(),
            user: None,
            query: None,
        }
    }

    /// Decode a session from a stored attribute row.
    ///
    /// This is the stock decode function for session datasets populated
    /// from rows shaped `{positive_items, positive_relevances,
    /// negative_items?, query?, user?}`.
    pub fn from_row(session_id: &Id, row: &Row) -> Result<Self, Error> {
        let parsed: SessionRow =
            serde_json::from_value(serde_json::Value::Object(row.clone()))?;
        let positive_items = parsed.positive_items.ok_or(ValidationError::MissingField {
            field: "positive_items",
        })?;
        let positive_relevances =
            parsed
                .positive_relevances
                .ok_or(ValidationError::MissingField {
                    field: "positive_relevances",
                })?;

        let mut builder = Session::builder(session_id.clone())
            .positive_items(positive_items)
            .positive_relevances(positive_relevances)
            .negative_items(parsed.negative_items);
        if let Some(query) = parsed.query {
            builder = builder.query(query);
        }
        if let Some(user) = parsed.user {
            builder = builder.user(user);
        }
        Ok(builder.build()?)
    }

    pub fn session_id(&self) -> &Id {
        &self.session_id
    }

    pub fn positive_items(&self) -> &[Id] {
        &self.positive_items
    }

    pub fn positive_relevances(&self) -> &[f64] {
        &self.positive_relevances
    }

    pub fn negative_items(&self) -> &[Id] {
        &self.negative_items
    }

    pub fn user(&self) -> Option<&Id> {
        self.user.as_ref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// All items judged in this session: negatives first, then positives,
    /// each in source order.
    pub fn items(&self) -> &[Id] {
        &self.items
    }

    /// Relevance for each entry of [`Session::items`]: the paired positive
    /// relevance, or `0.0` for negatives.
    pub fn relevances(&self) -> &[f64] {
        &self.relevances
    }
}

#[derive(Deserialize)]
struct SessionRow {
    #[serde(default)]
    positive_items: Option<Vec<Id>>,
    #[serde(default)]
    positive_relevances: Option<Vec<f64>>,
    #[serde(default)]
    negative_items: Vec<Id>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    user: Option<Id>,
}

/// Builder for [`Session`]; `build` runs the validation rules in order and
/// reports the first violation.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    session_id: Id,
    positive_items: Vec<Id>,
    positive_relevances: Vec<f64>,
    negative_items: Vec<Id>,
    user: Option<Id>,
    query: Option<String>,
}

impl SessionBuilder {
    pub fn positive_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Id>,
    {
        self.positive_items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn positive_relevances<I>(mut self, relevances: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.positive_relevances = relevances.into_iter().collect();
        self
    }

    pub fn negative_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Id>,
    {
        self.negative_items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn user(mut self, user: impl Into<Id>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn build(self) -> Result<Session, ValidationError> {
        if self.positive_items.is_empty() {
            return Err(ValidationError::MissingField {
                field: "positive_items",
            });
        }
        if self.positive_relevances.len() != self.positive_items.len() {
            return Err(ValidationError::LengthMismatch {
                relevances: self.positive_relevances.len(),
                items: self.positive_items.len(),
            });
        }
        for (index, &value) in self.positive_relevances.iter().enumerate() {
            if !(value > 0.0) {
                return Err(ValidationError::NonPositiveRelevance { index, value });
            }
        }
        let positives: std::collections::HashSet<&Id> = self.positive_items.iter().collect();
        for id in &self.negative_items {
            if positives.contains(id) {
                return Err(ValidationError::OverlapViolation { id: id.clone() });
            }
        }

        let mut items =
            Vec::with_capacity(self.negative_items.len() + self.positive_items.len());
        items.extend(self.negative_items.iter().cloned());
        items.extend(self.positive_items.iter().cloned());
        let mut relevances = vec![0.0; self.negative_items.len()];
        relevances.extend_from_slice(&self.positive_relevances);

        Ok(Session {
            session_id: self.session_id,
            positive_items: self.positive_items,
            positive_relevances: self.positive_relevances,
            negative_items: self.negative_items,
            user: self.user,
            query: self.query,
            items,
            relevances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_session_builds() {
        let session = Session::builder("123")
            .positive_items(["a", "b"])
            .positive_relevances([1.0, 2.0])
            .build()
            .unwrap();
        assert_eq!(session.items(), session.positive_items());
        assert_eq!(session.relevances(), &[1.0, 2.0]);
    }

    #[test]
    fn test_items_are_negatives_then_positives() {
        let session = Session::builder(1i64)
            .positive_items([1i64, 2])
            .positive_relevances([2.0, 1.0])
            .negative_items([3i64, 4])
            .query("mouse")
            .build()
            .unwrap();
        let expected: Vec<Id> = [3i64, 4, 1, 2].map(Id::from).to_vec();
        assert_eq!(session.items(), expected.as_slice());
        assert_eq!(session.relevances(), &[0.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = Session::builder("123")
            .positive_items(["a", "b"])
            .positive_relevances([1.0, 2.0, 3.0])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::LengthMismatch {
                relevances: 3,
                items: 2
            }
        );
    }

    #[test]
    fn test_missing_positive_items() {
        let err = Session::builder("123")
            .positive_relevances([1.0, 2.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
    }

    #[test]
    fn test_non_positive_relevance() {
        let err = Session::builder("123")
            .positive_items(["a", "b"])
            .positive_relevances([1.0, 0.0])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonPositiveRelevance {
                index: 1,
                value: 0.0
            }
        );
    }

    #[test]
    fn test_nan_relevance_rejected() {
        let err = Session::builder("123")
            .positive_items(["a"])
            .positive_relevances([f64::NAN])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonPositiveRelevance { index: 0, .. }
        ));
    }

    #[test]
    fn test_overlap_violation() {
        let err = Session::builder("123")
            .positive_items(["a"])
            .positive_relevances([1.0])
            .negative_items(["a", "b"])
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::OverlapViolation { id: "a".into() });
    }

    #[test]
    fn test_from_row() {
        let row: Row = serde_json::from_str(
            r#"{"positive_items": [1, 2], "positive_relevances": [2, 1],
                "negative_items": [3], "query": "mouse"}"#,
        )
        .unwrap();
        let session = Session::from_row(&Id::Text("session1".into()), &row).unwrap();
        assert_eq!(session.session_id(), &Id::Text("session1".into()));
        assert_eq!(session.query(), Some("mouse"));
        assert_eq!(session.relevances(), &[0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_from_row_missing_field() {
        let row: Row = serde_json::from_str(r#"{"positive_items": [1]}"#).unwrap();
        let err = Session::from_row(&Id::Int(1), &row).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingField {
                field: "positive_relevances"
            })
        ));
    }
}
