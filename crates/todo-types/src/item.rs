use serde::{Deserialize, Serialize};

use crate::id::{ItemId, ListId};
use crate::priority::Priority;
use crate::temporal::Timestamp;

/// An entry in a [`TodoList`](crate::TodoList).
///
/// Items carry no owner of their own; ownership is inherited from the parent
/// list. `completed_at` is `Some` exactly when `completed` is `true`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: ItemId,
    pub list_id: ListId,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<Timestamp>,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Payload for creating an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
}

impl NewItem {
    pub fn new(description: impl Into<String>, priority: Priority) -> Self {
        Self {
            description: description.into(),
            priority,
            due_date: None,
        }
    }

    pub fn due(mut self, at: Timestamp) -> Self {
        self.due_date = Some(at);
        self
    }
}

/// Partial update of an item.
///
/// `due_date` is doubly optional: `None` leaves the due date alone,
/// `Some(None)` clears it and `Some(Some(t))` sets it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<Timestamp>>,
    pub completed: Option<bool>,
}

impl ItemPatch {
    pub fn completed(done: bool) -> Self {
        Self {
            completed: Some(done),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }
}

/// Completion timestamp after requesting `requested` on an item whose state
/// is `(completed, completed_at)`.
///
/// false→true stamps `now`, true→false clears, and re-requesting the current
/// state keeps the existing timestamp.
pub fn completion_after(
    completed: bool,
    completed_at: Option<Timestamp>,
    requested: bool,
    now: Timestamp,
) -> Option<Timestamp> {
    match (completed, requested) {
        (false, true) => Some(now),
        (true, false) => None,
        (true, true) => completed_at.or(Some(now)),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::{Clock, ManualClock};
    use chrono::Duration;

    #[test]
    fn completing_stamps_now() {
        let clock = ManualClock::at_origin();
        let now = clock.now();
        assert_eq!(completion_after(false, None, true, now), Some(now));
    }

    #[test]
    fn reopening_clears_timestamp() {
        let clock = ManualClock::at_origin();
        let then = clock.now();
        clock.advance(Duration::minutes(1));
        assert_eq!(completion_after(true, Some(then), false, clock.now()), None);
    }

    #[test]
    fn recompleting_keeps_original_timestamp() {
        let clock = ManualClock::at_origin();
        let then = clock.now();
        clock.advance(Duration::hours(3));
        assert_eq!(
            completion_after(true, Some(then), true, clock.now()),
            Some(then)
        );
    }

    #[test]
    fn reopening_open_item_stays_open() {
        let clock = ManualClock::at_origin();
        assert_eq!(completion_after(false, None, false, clock.now()), None);
    }

    #[test]
    fn patch_emptiness() {
        assert!(ItemPatch::default().is_empty());
        assert!(!ItemPatch::completed(true).is_empty());
        let clear_due = ItemPatch {
            due_date: Some(None),
            ..Default::default()
        };
        assert!(!clear_due.is_empty());
    }

    #[test]
    fn new_item_defaults_to_medium_priority() {
        let draft: NewItem = serde_json::from_str(r#"{"description":"milk"}"#).unwrap();
        assert_eq!(draft.priority, Priority::Medium);
        assert!(draft.due_date.is_none());
    }
}
