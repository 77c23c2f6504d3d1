//! Backend selection.
//!
//! [`BackendConfig`] names which [`SecureBackend`] to open. It deserialises
//! from a table tagged by `kind`:
//!
//! ```toml
//! [backend]
//! kind = "sqlite"
//! path = "data/credentials.db"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, MemoryBackend, SecureBackend, SqliteBackend};

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local store; everything is lost on exit.
    Memory,
    /// Single-file SQLite store at `path`.
    Sqlite { path: PathBuf },
    /// The platform keychain (macOS Keychain Services).
    Native,
}

impl BackendConfig {
    /// Default file name of the SQLite store inside a data directory.
    pub const DEFAULT_DB_FILE: &'static str = "credentials.db";

    /// The best backend for this platform.
    ///
    /// - **macOS**: [`BackendConfig::Native`]
    /// - **Other platforms**: [`BackendConfig::Sqlite`] at
    ///   `<data_dir>/credentials.db`
    pub fn platform_default(data_dir: &Path) -> Self {
        if cfg!(target_os = "macos") {
            Self::Native
        } else {
            Self::Sqlite {
                path: data_dir.join(Self::DEFAULT_DB_FILE),
            }
        }
    }

    /// Short name matching [`SecureBackend::name`] of the opened backend.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
            Self::Native => "keychain",
        }
    }

    /// Open the configured backend.
    ///
    /// # Errors
    ///
    /// Returns a backend status if the SQLite file cannot be opened, or
    /// `-25291` (not available) when `native` is requested on a platform
    /// without a supported keychain.
    pub fn open(&self) -> Result<Arc<dyn SecureBackend>, BackendError> {
        let backend: Arc<dyn SecureBackend> = match self {
            Self::Memory => Arc::new(MemoryBackend::new()),
            Self::Sqlite { path } => Arc::new(SqliteBackend::open(path)?),
            Self::Native => native_backend()?,
        };

        tracing::info!(backend = backend.name(), "credential backend ready");
        Ok(backend)
    }
}

#[cfg(target_os = "macos")]
fn native_backend() -> Result<Arc<dyn SecureBackend>, BackendError> {
    Ok(Arc::new(crate::backend::KeychainServicesBackend::new()))
}

#[cfg(not(target_os = "macos"))]
fn native_backend() -> Result<Arc<dyn SecureBackend>, BackendError> {
    Err(BackendError::not_available(
        "no native keychain backend on this platform; use the sqlite backend",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        backend: BackendConfig,
    }

    #[test]
    fn deserializes_tagged_tables() {
        let w: Wrapper = from_json(r#"{"backend": {"kind": "sqlite", "path": "x/y.db"}}"#);
        assert_eq!(
            w.backend,
            BackendConfig::Sqlite {
                path: PathBuf::from("x/y.db")
            }
        );

        let w: Wrapper = from_json(r#"{"backend": {"kind": "memory"}}"#);
        assert_eq!(w.backend, BackendConfig::Memory);
    }

    fn from_json(json: &str) -> Wrapper {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn platform_default_matches_host() {
        let cfg = BackendConfig::platform_default(Path::new("data"));
        if cfg!(target_os = "macos") {
            assert_eq!(cfg, BackendConfig::Native);
        } else {
            assert_eq!(
                cfg,
                BackendConfig::Sqlite {
                    path: PathBuf::from("data/credentials.db")
                }
            );
        }
    }

    #[test]
    fn opens_memory_and_sqlite() {
        assert_eq!(BackendConfig::Memory.open().unwrap().name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let cfg = BackendConfig::Sqlite {
            path: dir.path().join("store.db"),
        };
        let backend = cfg.open().unwrap();
        assert_eq!(backend.name(), cfg.kind());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn native_is_unavailable_off_macos() {
        let err = BackendConfig::Native.open().err().unwrap();
        assert_eq!(err.code(), crate::backend::ERR_SEC_NOT_AVAILABLE);
    }
}
