//! CLI configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults ([`AppConfig::default`]);
//! 2. a TOML file, `config/keyward.toml` unless `--config` names another;
//! 3. environment variables (a `.env` file is loaded first):
//!    `KEYWARD_BACKEND`, `KEYWARD_DB_PATH`, `KEYWARD_LOG_LEVEL`.
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [backend]
//! kind = "sqlite"
//! path = "data/credentials.db"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use keyward_vault::BackendConfig;
use serde::Deserialize;

/// Config file used when `--config` is not given. A missing default file is
/// not an error.
pub const DEFAULT_CONFIG_PATH: &str = "config/keyward.toml";

/// Directory for local data when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Resolved CLI configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub backend: BackendConfig,
}

/// The `[log]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            backend: BackendConfig::platform_default(Path::new(DEFAULT_DATA_DIR)),
        }
    }
}

impl AppConfig {
    /// Load the file layer and apply process environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file; absent sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `KEYWARD_*` overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = var("KEYWARD_LOG_LEVEL") {
            self.log.level = level;
        }

        if let Some(kind) = var("KEYWARD_BACKEND") {
            self.backend = match kind.trim().to_ascii_lowercase().as_str() {
                "memory" => BackendConfig::Memory,
                "native" | "keychain" => BackendConfig::Native,
                "sqlite" => match &self.backend {
                    BackendConfig::Sqlite { path } => BackendConfig::Sqlite { path: path.clone() },
                    _ => BackendConfig::Sqlite {
                        path: default_db_path(),
                    },
                },
                other => bail!("unknown KEYWARD_BACKEND value: {other}"),
            };
        }

        if let Some(path) = var("KEYWARD_DB_PATH") {
            match &mut self.backend {
                BackendConfig::Sqlite { path: current } => *current = PathBuf::from(path),
                _ => tracing::debug!("KEYWARD_DB_PATH ignored: backend is not sqlite"),
            }
        }

        Ok(())
    }
}

fn default_db_path() -> PathBuf {
    Path::new(DEFAULT_DATA_DIR).join(BackendConfig::DEFAULT_DB_FILE)
}
