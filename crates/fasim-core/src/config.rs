//! Layered configuration.
//!
//! Lowest to highest precedence: built-in defaults, user config
//! (`<config_dir>/fasim/config.toml`), project config (`./fasim.toml`),
//! the `FASIM_DB` environment variable, then the `--db` flag.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the project-level config, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = "fasim.toml";

/// Environment variable overriding `[store] database_path`.
pub const DATABASE_ENV: &str = "FASIM_DB";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FasimConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub request: RequestConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn in_path(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Per-command deadline. `None` means no deadline.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Read `fasim.toml` from `project_root`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<Option<toml::Table>> {
    load_table(&project_root.join(PROJECT_CONFIG_FILE))
}

/// Read the per-user config file, if the platform has a config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<Option<toml::Table>> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(None);
    };
    load_table(&config_dir.join("fasim/config.toml"))
}

/// Resolve the effective configuration for a command run in `project_root`.
///
/// # Errors
///
/// Returns an error if a config file is malformed.
pub fn resolve_config(project_root: &Path, cli_db: Option<&Path>) -> Result<FasimConfig> {
    let user = load_user_config()?;
    let project = load_project_config(project_root)?;
    let env_db = std::env::var_os(DATABASE_ENV).map(PathBuf::from);

    let mut config = merge_layers([user, project].into_iter().flatten())?;

    if let Some(path) = env_db {
        config.store.database_path = path;
    }
    if let Some(path) = cli_db {
        config.store.database_path = path.to_path_buf();
    }

    Ok(config)
}

fn load_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<toml::Table>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Overlay tables in order, later keys winning, then apply defaults.
fn merge_layers(layers: impl IntoIterator<Item = toml::Table>) -> Result<FasimConfig> {
    let mut merged = toml::Table::new();
    for layer in layers {
        overlay(&mut merged, layer);
    }

    toml::Value::Table(merged)
        .try_into::<FasimConfig>()
        .context("Failed to interpret merged configuration")
}

fn overlay(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                overlay(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("fasim.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(raw: &str) -> toml::Table {
        toml::from_str(raw).expect("test toml must parse")
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(load_project_config(dir.path()).expect("load").is_none());

        let cfg = merge_layers([]).expect("defaults");
        assert_eq!(cfg.store.database_path, PathBuf::from("fasim.db"));
        assert_eq!(cfg.store.busy_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.request.timeout_ms, None);
    }

    #[test]
    fn project_layer_overrides_user_layer_per_key() {
        let user = table(
            r#"
[store]
database_path = "/var/lib/fasim/user.db"
busy_timeout_ms = 250

[request]
timeout_ms = 1000
"#,
        );
        let project = table(
            r#"
[store]
database_path = "plant.db"
"#,
        );

        let cfg = merge_layers([user, project]).expect("merge");
        assert_eq!(cfg.store.database_path, PathBuf::from("plant.db"));
        assert_eq!(cfg.store.busy_timeout_ms, 250);
        assert_eq!(cfg.request.timeout_ms, Some(1000));
    }

    #[test]
    fn project_file_is_read_from_root() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[store]\ndatabase_path = \"line.db\"\n",
        )
        .expect("write config");

        let loaded = load_project_config(dir.path())
            .expect("load")
            .expect("file present");
        let cfg = merge_layers([loaded]).expect("merge");
        assert_eq!(cfg.store.database_path, PathBuf::from("line.db"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[store\n").expect("write");

        let err = load_project_config(dir.path()).expect_err("malformed toml");
        assert!(format!("{err:#}").contains(PROJECT_CONFIG_FILE));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let bad = table("[store]\nbusy_timeout_ms = \"soon\"\n");
        assert!(merge_layers([bad]).is_err());
    }
}
