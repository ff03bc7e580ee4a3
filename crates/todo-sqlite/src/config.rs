use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// SQLite journal mode. Values map 1:1 to the `journal_mode` pragma.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log (recommended for concurrent readers).
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Connection settings for [`SqliteTodoStore`](crate::SqliteTodoStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl SqliteConfig {
    /// Configuration for a database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            journal_mode: JournalMode::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = SqliteConfig::default();
        assert!(c.path.is_none());
        assert_eq!(c.journal_mode, JournalMode::Wal);
        assert_eq!(c.busy_timeout_ms, 5_000);
    }

    #[test]
    fn file_config() {
        let c = SqliteConfig::file("todo.db");
        assert_eq!(c.path, Some(PathBuf::from("todo.db")));
    }

    #[test]
    fn parses_from_toml_with_defaults() {
        let c: SqliteConfig = toml::from_str(
            r#"
            path = "/var/lib/todo/todo.db"
            journal_mode = "delete"
            "#,
        )
        .unwrap();
        assert_eq!(c.path, Some(PathBuf::from("/var/lib/todo/todo.db")));
        assert_eq!(c.journal_mode, JournalMode::Delete);
        assert_eq!(c.busy_timeout_ms, 5_000);
    }

    #[test]
    fn pragma_values() {
        assert_eq!(JournalMode::Wal.pragma_value(), "wal");
        assert_eq!(JournalMode::Delete.pragma_value(), "delete");
    }
}
