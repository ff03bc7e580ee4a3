//! Entity model for the task-list store.
//!
//! This crate holds the plain data contract shared by every storage backend:
//! identifiers, the two stored records, their creation and patch payloads,
//! and the clock abstraction used to stamp them. It carries no storage
//! behavior of its own.
//!
//! # Key Types
//!
//! - [`UserId`], [`ListId`], [`ItemId`]: UUID v7 identifiers
//! - [`TodoList`]: a named, owner-scoped list with a derived item count
//! - [`TodoItem`]: a prioritized entry with optional due date and completion state
//! - [`Priority`]: the three-rank priority scale
//! - [`Clock`]: injected time source ([`SystemClock`], [`ManualClock`])

pub mod error;
pub mod id;
pub mod item;
pub mod list;
pub mod priority;
pub mod temporal;

pub use error::TypeError;
pub use id::{ItemId, ListId, UserId};
pub use item::{completion_after, ItemPatch, NewItem, TodoItem};
pub use list::{ListPatch, NewList, TodoList};
pub use priority::Priority;
pub use temporal::{normalize, Clock, ManualClock, SystemClock, Timestamp};
