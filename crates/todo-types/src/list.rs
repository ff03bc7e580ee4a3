use serde::{Deserialize, Serialize};

use crate::id::{ListId, UserId};
use crate::temporal::Timestamp;

/// A named list owned by one user.
///
/// `item_count` is derived when the list is read and is never persisted as
/// authoritative state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: ListId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub item_count: u64,
}

/// Payload for creating a list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewList {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update of a list. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ListPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
        }
    }

    pub fn describe(description: impl Into<String>) -> Self {
        Self {
            name: None,
            description: Some(description.into()),
        }
    }

    /// Returns `true` if applying this patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}
