use std::fmt;

use thiserror::Error;

/// Which kind of entity a [`StoreError::NotFound`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    List,
    Item,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Item => write!(f, "item"),
        }
    }
}

/// Errors returned by every [`TodoStore`](crate::TodoStore) backend.
///
/// A missing entity and an entity owned by someone else are both reported as
/// [`StoreError::NotFound`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The list or item does not exist, was deleted, or belongs to another caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The caller already has a live list with this name.
    #[error("a list named {name:?} already exists")]
    NameConflict { name: String },

    /// Sort key outside `created_at`, `due_date`, `priority`.
    #[error("invalid sort key: {0:?}")]
    InvalidSortKey(String),

    /// Sort direction outside `asc`, `desc`.
    #[error("invalid sort direction: {0:?}")]
    InvalidSortDirection(String),

    /// Unexpected backend failure. The message never carries driver detail.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn list_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: Entity::List,
            id: id.to_string(),
        }
    }

    pub fn item_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: Entity::Item,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::NameConflict { .. })
    }

    /// Caller supplied a query value outside the fixed vocabulary.
    pub fn is_invalid_query(&self) -> bool {
        matches!(self, Self::InvalidSortKey(_) | Self::InvalidSortDirection(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity() {
        let err = StoreError::list_not_found("abc");
        assert_eq!(err.to_string(), "list not found: abc");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn classification_helpers() {
        assert!(StoreError::NameConflict { name: "x".into() }.is_conflict());
        assert!(StoreError::InvalidSortKey("name".into()).is_invalid_query());
        assert!(StoreError::InvalidSortDirection("up".into()).is_invalid_query());
        assert!(!StoreError::Internal("boom".into()).is_invalid_query());
    }
}
