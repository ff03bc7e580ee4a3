//! Table layout and bootstrap.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error};

use todo_store::{StoreError, StoreResult};

use crate::error::internal;

/// Schema version written to `store_meta`.
pub const SCHEMA_VERSION: i64 = 1;

/// Timestamps are INTEGER microseconds since the UNIX epoch. Every row
/// carries a nullable `deleted_at` tombstone; `seq` records insertion order.
const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS lists (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        deleted_at INTEGER
    );

    CREATE UNIQUE INDEX IF NOT EXISTS lists_owner_name_live
        ON lists (owner_id, name) WHERE deleted_at IS NULL;

    CREATE INDEX IF NOT EXISTS lists_owner_created
        ON lists (owner_id, created_at) WHERE deleted_at IS NULL;

    CREATE TABLE IF NOT EXISTS items (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
        description TEXT NOT NULL,
        priority INTEGER NOT NULL CHECK (priority BETWEEN 0 AND 2),
        due_date INTEGER,
        completed INTEGER NOT NULL DEFAULT 0,
        completed_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        deleted_at INTEGER,
        CHECK ((completed = 0) = (completed_at IS NULL))
    );

    CREATE INDEX IF NOT EXISTS items_list_live
        ON items (list_id) WHERE deleted_at IS NULL;
";

/// Create the tables on a fresh database, or check the version of an
/// existing one.
pub fn initialize(conn: &mut Connection) -> StoreResult<()> {
    let tx = conn.transaction().map_err(internal("begin schema setup"))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(internal("create store_meta"))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(internal("read schema version"))?;

    match version {
        None => {
            tx.execute(
                "INSERT INTO store_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal("record schema version"))?;
            debug!(version = SCHEMA_VERSION, "initialized store schema");
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            error!(found = other, expected = SCHEMA_VERSION, "unsupported schema version");
            return Err(StoreError::Internal(format!(
                "unsupported schema version {other}"
            )));
        }
    }
    tx.execute_batch(TABLES).map_err(internal("create tables"))?;
    tx.commit().map_err(internal("commit schema setup"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        initialize(&mut conn).unwrap();
        conn
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut conn = fresh();
        initialize(&mut conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM store_meta", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut conn = fresh();
        conn.execute("UPDATE store_meta SET version = 99", []).unwrap();
        let err = initialize(&mut conn).unwrap_err();
        assert_eq!(err, StoreError::Internal("unsupported schema version 99".into()));
    }

    #[test]
    fn live_name_index_ignores_tombstones() {
        let conn = fresh();
        conn.execute("INSERT INTO users (id, created_at) VALUES ('u', 0)", [])
            .unwrap();
        let insert = "INSERT INTO lists (id, owner_id, name, created_at, updated_at, deleted_at) \
                      VALUES (?1, 'u', 'same', 0, 0, ?2)";
        conn.execute(insert, params!["a", Some(1i64)]).unwrap();
        conn.execute(insert, params!["b", None::<i64>]).unwrap();
        assert!(conn.execute(insert, params!["c", None::<i64>]).is_err());
    }

    #[test]
    fn completion_check_constraint() {
        let conn = fresh();
        conn.execute("INSERT INTO users (id, created_at) VALUES ('u', 0)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO lists (id, owner_id, name, created_at, updated_at) \
             VALUES ('l', 'u', 'n', 0, 0)",
            [],
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO items (id, list_id, description, priority, completed, \
             created_at, updated_at) \
             VALUES ('i', 'l', 'd', 1, 1, 0, 0)",
            [],
        );
        assert!(bad.is_err());
    }
}
