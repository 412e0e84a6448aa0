//! Session-typed datasets with optional item/user attribute resolution.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::SESSION_SAMPLE_CHECK;
use crate::data::dataset::{Dataset, DatasetIter};
use crate::data::{Id, Row, Session};
use crate::error::Error;

/// Resolved metadata for one item or user: the identifier plus whatever
/// attributes the attached dataset holds for it. Attributes only ever
/// augment the identifier; an id with no stored attributes resolves to an
/// empty bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeBundle {
    pub id: Id,
    pub attrs: Row,
}

/// Item attributes handed to the scoring pipeline: raw ids when no item
/// dataset is attached, resolved bundles otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ItemAttributes {
    Ids(Vec<Id>),
    Resolved(Vec<AttributeBundle>),
}

impl ItemAttributes {
    pub fn len(&self) -> usize {
        match self {
            ItemAttributes::Ids(ids) => ids.len(),
            ItemAttributes::Resolved(bundles) => bundles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// User attributes handed to the scoring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UserAttributes {
    Id(Id),
    Resolved(AttributeBundle),
}

/// A session joined with its resolved item and user attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBundle {
    pub session: Session,
    pub user_attributes: Option<UserAttributes>,
    pub item_attributes: ItemAttributes,
}

/// A [`Dataset`] whose decoded values are [`Session`]s.
///
/// Optionally references an item dataset and a user dataset, used purely
/// to look up attribute bundles for the ids a session names; the session
/// dataset never manages their lifetime beyond holding a shared handle.
///
/// Construction eagerly decodes the first `min(50, len)` entries so that a
/// malformed store fails immediately instead of mid-run.
pub struct SessionDataset {
    sessions: Dataset<Session>,
    item_dataset: Option<Arc<Dataset<Row>>>,
    user_dataset: Option<Arc<Dataset<Row>>>,
}

impl std::fmt::Debug for SessionDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDataset")
            .field("has_item_dataset", &self.item_dataset.is_some())
            .field("has_user_dataset", &self.user_dataset.is_some())
            .finish()
    }
}

impl SessionDataset {
    pub fn new(sessions: Dataset<Session>) -> Result<Self, Error> {
        Self::with_attributes(sessions, None, None)
    }

    pub fn with_attributes(
        sessions: Dataset<Session>,
        item_dataset: Option<Arc<Dataset<Row>>>,
        user_dataset: Option<Arc<Dataset<Row>>>,
    ) -> Result<Self, Error> {
        let dataset = Self {
            sessions,
            item_dataset,
            user_dataset,
        };
        dataset.check_sample()?;
        Ok(dataset)
    }

    /// Decode the leading entries, failing fast on a store that does not
    /// hold sessions.
    fn check_sample(&self) -> Result<(), Error> {
        let keys = self.sessions.keys()?;
        let checked = keys.len().min(SESSION_SAMPLE_CHECK);
        for id in keys.iter().take(checked) {
            self.sessions.load(id).map_err(|err| {
                Error::config(format!("entry `{id}` does not decode to a session: {err}"))
            })?;
        }
        debug!(checked, "validated leading session entries");
        Ok(())
    }

    pub fn dataset(&self) -> &Dataset<Session> {
        &self.sessions
    }

    pub fn load(&self, id: &Id) -> Result<Option<Session>, Error> {
        self.sessions.load(id)
    }

    pub fn keys(&self) -> Result<Vec<Id>, Error> {
        self.sessions.keys()
    }

    pub fn len(&self) -> Result<usize, Error> {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> Result<DatasetIter<'_, Session>, Error> {
        self.sessions.iter()
    }

    /// Resolve one item id to its attribute bundle; an unattached item
    /// dataset or an absent id yields the minimal `{id}` bundle.
    pub fn load_item(&self, item_id: &Id) -> Result<AttributeBundle, Error> {
        let attrs = match &self.item_dataset {
            Some(dataset) => dataset.load(item_id)?.unwrap_or_default(),
            None => Row::default(),
        };
        Ok(AttributeBundle {
            id: item_id.clone(),
            attrs,
        })
    }

    pub fn load_items(&self, item_ids: &[Id]) -> Result<Vec<AttributeBundle>, Error> {
        item_ids.iter().map(|id| self.load_item(id)).collect()
    }

    /// Resolve one user id; symmetric with [`SessionDataset::load_item`].
    pub fn load_user(&self, user_id: &Id) -> Result<AttributeBundle, Error> {
        let attrs = match &self.user_dataset {
            Some(dataset) => dataset.load(user_id)?.unwrap_or_default(),
            None => Row::default(),
        };
        Ok(AttributeBundle {
            id: user_id.clone(),
            attrs,
        })
    }

    pub fn load_users(&self, user_ids: &[Id]) -> Result<Vec<AttributeBundle>, Error> {
        user_ids.iter().map(|id| self.load_user(id)).collect()
    }

    /// Load a session joined with its resolved attributes.
    pub fn load_session_bundle(&self, session_id: &Id) -> Result<Option<SessionBundle>, Error> {
        match self.sessions.load(session_id)? {
            Some(session) => Ok(Some(self.resolve(session)?)),
            None => Ok(None),
        }
    }

    /// Join a session with attribute bundles from the attached datasets,
    /// or pass raw ids through when none are attached.
    pub fn resolve(&self, session: Session) -> Result<SessionBundle, Error> {
        let item_attributes = match &self.item_dataset {
            Some(_) => ItemAttributes::Resolved(self.load_items(session.items())?),
            None => ItemAttributes::Ids(session.items().to_vec()),
        };
        let user_attributes = match (session.user(), &self.user_dataset) {
            (None, _) => None,
            (Some(user), None) => Some(UserAttributes::Id(user.clone())),
            (Some(user), Some(_)) => Some(UserAttributes::Resolved(self.load_user(user)?)),
        };
        Ok(SessionBundle {
            session,
            user_attributes,
            item_attributes,
        })
    }
}
