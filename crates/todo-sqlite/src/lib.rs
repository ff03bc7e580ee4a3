//! Durable SQLite backend for the task-list store.
//!
//! [`SqliteTodoStore`] implements [`TodoStore`](todo_store::TodoStore) with
//! the same observable behavior as the in-memory store:
//!
//! - lists and items are soft-deleted through a `deleted_at` column, and every
//!   query filters on it;
//! - `(owner_id, name)` is guarded by a partial unique index over live rows;
//! - `item_count` comes from an aggregate sub-query at read time;
//! - item ordering is done in SQL with the same tie-breaks as
//!   [`ItemOrder::compare`](todo_store::ItemOrder::compare).
//!
//! Driver failures are logged and surface as an opaque
//! [`StoreError::Internal`](todo_store::StoreError::Internal).

pub mod config;
mod error;
mod rows;
pub mod schema;
pub mod store;

pub use config::{JournalMode, SqliteConfig};
pub use schema::SCHEMA_VERSION;
pub use store::SqliteTodoStore;
