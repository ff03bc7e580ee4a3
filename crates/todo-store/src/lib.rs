//! Storage contract and in-memory backend for the task-list store.
//!
//! Lists belong to a caller identity; items belong to lists. Every backend
//! implements [`TodoStore`] and must be indistinguishable through it: same
//! failures, same orderings, same derived counts.
//!
//! # Storage Backends
//!
//! - [`InMemoryTodoStore`] -- `HashMap`s behind one `RwLock`, for tests and
//!   lightweight deployments
//! - `todo-sqlite` -- durable SQLite backend, in its own crate
//!
//! # Rules
//!
//! 1. A caller sees only its own lists. Foreign and missing lists are both
//!    `NotFound`.
//! 2. `(owner, name)` is unique among live lists.
//! 3. Deleting a list deletes its items in the same atomic step.
//! 4. Item listings order exactly as [`ItemOrder::compare`] says.
//! 5. `item_count` is computed on read.

#[cfg(any(test, feature = "conformance"))]
pub mod conformance;
pub mod error;
pub mod memory;
pub mod query;
pub mod traits;

pub use error::{Entity, StoreError, StoreResult};
pub use memory::InMemoryTodoStore;
pub use query::{ItemOrder, ItemQuery, Page, PageRequest, Pagination, SortDirection, SortKey};
pub use traits::TodoStore;
