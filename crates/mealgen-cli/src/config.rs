//! Configuration file management for mealgen.
//!
//! Provides a TOML-based config file at `~/.config/mealgen/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mealgen_core::config::{
    FAST_MODEL_ENV, ModelConfig, PLANNING_MODEL_ENV, UTILITY_MODEL_ENV,
};
use mealgen_core::oracle::OracleConfig;
use mealgen_core::oracle::http::{API_KEY_ENV, BASE_URL_ENV, TIMEOUT_ENV};
use mealgen_core::orchestrator::{TEST_MODE_ENV, TestMode};
use mealgen_db::config::{DbConfig, parse_max_connections};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub models: ModelsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the mealgen config directory: `$XDG_CONFIG_HOME/mealgen` or
/// `~/.config/mealgen`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("mealgen");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mealgen")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse a config file. Returns an error if it does not exist.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write a config file, creating parent dirs as needed.
/// The file may hold an API key, so it is made owner-only (0600) on Unix.
pub fn save_config(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Show the first and last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct MealgenConfig {
    pub db_config: DbConfig,
    pub oracle_config: OracleConfig,
    pub models: ModelConfig,
    pub test_mode: TestMode,
}

impl MealgenConfig {
    /// Resolve from the process environment and the default config file.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config(&config_path()).ok();
        Self::resolve_with(cli_db_url, |key| std::env::var(key).ok(), file.as_ref())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `MEALGEN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Pool size: `MEALGEN_DB_MAX_CONNECTIONS` > `database.max_connections` > default
    /// - Oracle: `MEALGEN_ORACLE_*` > `[oracle]` > defaults (no API key)
    /// - Models: `MEALGEN_*_MODEL` > `[models]` > defaults
    /// - Test mode: `MEALGEN_TEST_MODE` only
    pub fn resolve_with(
        cli_db_url: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Result<Self> {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_url = cli_db_url
            .map(str::to_owned)
            .or_else(|| env(DbConfig::ENV_VAR))
            .or_else(|| file.map(|f| f.database.url.clone()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());
        let max_connections = match env(DbConfig::MAX_CONNECTIONS_ENV) {
            Some(raw) => Some(parse_max_connections(&raw).with_context(|| {
                format!(
                    "{} must be a positive number: {raw:?}",
                    DbConfig::MAX_CONNECTIONS_ENV
                )
            })?),
            None => file.and_then(|f| f.database.max_connections),
        };
        let db_config = DbConfig::new(db_url).with_max_connections(
            max_connections.unwrap_or(DbConfig::DEFAULT_MAX_CONNECTIONS),
        );

        let oracle_file = file.map(|f| f.oracle.clone()).unwrap_or_default();
        let defaults = OracleConfig::default();
        let timeout_secs = match env(TIMEOUT_ENV) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{TIMEOUT_ENV} is not a number of seconds: {raw:?}"))?,
            ),
            None => oracle_file.timeout_secs,
        };
        let oracle_config = OracleConfig {
            base_url: env(BASE_URL_ENV)
                .or(oracle_file.base_url)
                .unwrap_or(defaults.base_url),
            api_key: env(API_KEY_ENV).or(oracle_file.api_key),
            timeout: timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
        };

        let models_file = file.map(|f| f.models.clone()).unwrap_or_default();
        let models = ModelConfig::from_lookup(|key| {
            env(key).or_else(|| match key {
                PLANNING_MODEL_ENV => models_file.planning.clone(),
                UTILITY_MODEL_ENV => models_file.utility.clone(),
                FAST_MODEL_ENV => models_file.fast.clone(),
                _ => None,
            })
        });

        let test_mode = match env(TEST_MODE_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<TestMode>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid {TEST_MODE_ENV}"))?,
            None => TestMode::Production,
        };

        Ok(Self {
            db_config,
            oracle_config,
            models,
            test_mode,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn file() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/filedb".to_owned(),
                max_connections: Some(4),
            },
            oracle: OracleSection {
                base_url: Some("https://oracle.internal".to_owned()),
                api_key: Some("file-key-123456".to_owned()),
                timeout_secs: Some(60),
            },
            models: ModelsSection {
                planning: Some("file-planner".to_owned()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mealgen").join("config.toml");

        save_config(&path, &file()).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded, file());
    }

    #[test]
    fn minimal_file_parses() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[database]\nurl = \"postgresql://h:5432/db\"\n").unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.database.url, "postgresql://h:5432/db");
        assert_eq!(loaded.oracle, OracleSection::default());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config(&path, &file()).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn cli_flag_overrides_all() {
        let env = lookup(&[(DbConfig::ENV_VAR, "postgresql://env:5432/envdb")]);
        let config =
            MealgenConfig::resolve_with(Some("postgresql://cli:5432/clidb"), env, Some(&file()))
                .unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
    }

    #[test]
    fn env_overrides_config_file() {
        let env = lookup(&[
            (DbConfig::ENV_VAR, "postgresql://env:5432/envdb"),
            (API_KEY_ENV, "env-key"),
            (UTILITY_MODEL_ENV, "env-utility"),
        ]);
        let config = MealgenConfig::resolve_with(None, env, Some(&file())).unwrap();

        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.oracle_config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.oracle_config.base_url, "https://oracle.internal");
        assert_eq!(config.oracle_config.timeout, Duration::from_secs(60));
        assert_eq!(config.models.planning, "file-planner");
        assert_eq!(config.models.utility, "env-utility");
    }

    #[test]
    fn pool_size_follows_the_chain() {
        let from_file = MealgenConfig::resolve_with(None, lookup(&[]), Some(&file())).unwrap();
        assert_eq!(from_file.db_config.max_connections, 4);

        let env = lookup(&[(DbConfig::MAX_CONNECTIONS_ENV, "16")]);
        let from_env = MealgenConfig::resolve_with(None, env, Some(&file())).unwrap();
        assert_eq!(from_env.db_config.max_connections, 16);

        let env = lookup(&[(DbConfig::MAX_CONNECTIONS_ENV, "lots")]);
        let err = MealgenConfig::resolve_with(None, env, None).unwrap_err();
        assert!(format!("{err:#}").contains(DbConfig::MAX_CONNECTIONS_ENV));
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = MealgenConfig::resolve_with(None, lookup(&[]), None).unwrap();

        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.db_config.max_connections, DbConfig::DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.oracle_config, OracleConfig::default());
        assert_eq!(config.models, ModelConfig::default());
        assert_eq!(config.test_mode, TestMode::Production);
    }

    #[test]
    fn test_mode_is_read_and_validated() {
        let config =
            MealgenConfig::resolve_with(None, lookup(&[(TEST_MODE_ENV, "fixture")]), None).unwrap();
        assert_eq!(config.test_mode, TestMode::Fixture);

        let err = MealgenConfig::resolve_with(None, lookup(&[(TEST_MODE_ENV, "turbo")]), None)
            .unwrap_err();
        assert!(format!("{err:#}").contains(TEST_MODE_ENV));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let err = MealgenConfig::resolve_with(None, lookup(&[(TIMEOUT_ENV, "soon")]), None)
            .unwrap_err();
        assert!(err.to_string().contains(TIMEOUT_ENV));
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-a...ijkl");
        assert_eq!(mask_secret("short"), "*****");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("mealgen/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
