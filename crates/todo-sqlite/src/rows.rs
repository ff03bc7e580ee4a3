//! Column lists and row decoding.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

use todo_store::{ItemOrder, SortDirection, SortKey};
use todo_types::{Priority, Timestamp, TodoItem, TodoList};

/// List columns with `item_count` derived by an aggregate at read time.
pub(crate) const LIST_SELECT: &str = "SELECT l.id, l.owner_id, l.name, l.description, \
     l.created_at, l.updated_at, \
     (SELECT COUNT(*) FROM items i WHERE i.list_id = l.id AND i.deleted_at IS NULL) \
     FROM lists l";

pub(crate) const ITEM_SELECT: &str = "SELECT id, list_id, description, priority, due_date, \
     completed, completed_at, created_at, updated_at FROM items";

pub(crate) fn micros(ts: Timestamp) -> i64 {
    ts.timestamp_micros()
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_micros(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            "timestamp out of range".into(),
        )
    })
}

fn opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    match row.get::<_, Option<i64>>(idx)? {
        None => Ok(None),
        Some(_) => timestamp(row, idx).map(Some),
    }
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a row produced by [`LIST_SELECT`].
pub(crate) fn list_from_row(row: &Row<'_>) -> rusqlite::Result<TodoList> {
    Ok(TodoList {
        id: parsed(row, 0)?,
        owner_id: parsed(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
        item_count: row.get::<_, i64>(6)?.max(0) as u64,
    })
}

/// Decode a row produced by [`ITEM_SELECT`].
pub(crate) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<TodoItem> {
    let rank: u8 = row.get(3)?;
    let priority = Priority::from_rank(rank).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, "unknown priority rank".into())
    })?;
    Ok(TodoItem {
        id: parsed(row, 0)?,
        list_id: parsed(row, 1)?,
        description: row.get(2)?,
        priority,
        due_date: opt_timestamp(row, 4)?,
        completed: row.get(5)?,
        completed_at: opt_timestamp(row, 6)?,
        created_at: timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

/// `ORDER BY` body matching [`ItemOrder::compare`].
///
/// Undated rows stay last in both due-date directions and keep creation
/// order among themselves; the `CASE` terms only rank undated rows.
pub(crate) fn order_by(order: ItemOrder) -> &'static str {
    use SortDirection::{Ascending, Descending};
    match (order.key, order.direction) {
        (SortKey::CreatedAt, Ascending) => "created_at ASC, seq ASC",
        (SortKey::CreatedAt, Descending) => "created_at DESC, seq DESC",
        (SortKey::Priority, Ascending) => "priority DESC, created_at ASC, seq ASC",
        (SortKey::Priority, Descending) => "priority ASC, created_at DESC, seq DESC",
        (SortKey::DueDate, Ascending) => {
            "due_date IS NULL, due_date ASC, created_at ASC, seq ASC"
        }
        (SortKey::DueDate, Descending) => {
            "due_date IS NULL, due_date DESC, \
             CASE WHEN due_date IS NULL THEN created_at END ASC, \
             CASE WHEN due_date IS NULL THEN seq END ASC, \
             created_at DESC, seq DESC"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn micros_roundtrip() {
        let ts = todo_types::normalize(Utc::now());
        assert_eq!(DateTime::<Utc>::from_timestamp_micros(micros(ts)), Some(ts));
    }

    #[test]
    fn pre_epoch_instants_survive() {
        let ts = DateTime::<Utc>::UNIX_EPOCH - Duration::days(3);
        assert_eq!(DateTime::<Utc>::from_timestamp_micros(micros(ts)), Some(ts));
    }

    #[test]
    fn every_order_has_a_clause() {
        for key in [SortKey::CreatedAt, SortKey::DueDate, SortKey::Priority] {
            for dir in [SortDirection::Ascending, SortDirection::Descending] {
                let clause = order_by(ItemOrder::new(key, dir));
                assert!(clause.ends_with("seq ASC") || clause.ends_with("seq DESC"));
            }
        }
    }
}
