use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use todo_sqlite::SqliteConfig;

/// Which store the CLI talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub backend: Backend,
    pub sqlite: SqliteConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            sqlite: SqliteConfig::file("todo.db"),
        }
    }
}

impl CliConfig {
    /// Read a TOML file, or fall back to the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, db: Option<PathBuf>, memory: bool) -> Self {
        if memory {
            self.backend = Backend::Memory;
        } else if let Some(path) = db {
            self.backend = Backend::Sqlite;
            self.sqlite.path = Some(path);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = CliConfig::default();
        assert_eq!(c.backend, Backend::Sqlite);
        assert_eq!(c.sqlite.path, Some(PathBuf::from("todo.db")));
    }

    #[test]
    fn load_without_path_uses_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.toml");
        std::fs::write(
            &path,
            r#"
            backend = "sqlite"

            [sqlite]
            path = "/tmp/tasks.db"
            busy_timeout_ms = 250
            "#,
        )
        .unwrap();
        let c = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(c.sqlite.path, Some(PathBuf::from("/tmp/tasks.db")));
        assert_eq!(c.sqlite.busy_timeout_ms, 250);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn overrides() {
        let memory = CliConfig::default().with_overrides(Some("x.db".into()), true);
        assert_eq!(memory.backend, Backend::Memory);

        let file = CliConfig {
            backend: Backend::Memory,
            ..Default::default()
        }
        .with_overrides(Some("x.db".into()), false);
        assert_eq!(file.backend, Backend::Sqlite);
        assert_eq!(file.sqlite.path, Some(PathBuf::from("x.db")));
    }
}
