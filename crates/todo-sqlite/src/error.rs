//! Translation of driver failures into [`StoreError`].
//!
//! Driver messages are logged and never copied into the returned error.

use rusqlite::ErrorCode;
use tracing::{error, warn};

use todo_store::StoreError;

/// Map any driver error to an opaque `Internal`, logging the detail.
pub(crate) fn internal(operation: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |err| {
        error!(operation, error = %err, "sqlite operation failed");
        StoreError::Internal(format!("{operation} failed"))
    }
}

/// Returns `true` if `err` is a violation of a UNIQUE constraint.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Map a list write failure: a unique violation means another writer took
/// the name first.
pub(crate) fn list_write<'a>(
    operation: &'static str,
    name: &'a str,
) -> impl Fn(rusqlite::Error) -> StoreError + 'a {
    move |err| {
        if is_unique_violation(&err) {
            warn!(name, "list name already in use");
            StoreError::NameConflict {
                name: name.to_string(),
            }
        } else {
            internal(operation)(err)
        }
    }
}
