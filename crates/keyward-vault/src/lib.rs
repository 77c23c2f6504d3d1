//! Typed credential store over a platform secure-storage backend.
//!
//! This crate translates two credential shapes, internet passwords (keyed by
//! account, server, port and label) and generic passwords (keyed by account
//! and label), into exact-match backend filters and sparse patches, and maps
//! the backend's status codes onto a small error taxonomy.
//!
//! The secure storage itself (encryption, access control, process isolation)
//! belongs to the backend. Three backends ship with the crate:
//!
//! - [`backend::MemoryBackend`]: in-process store, mainly for tests.
//! - [`backend::SqliteBackend`]: single-file store for development hosts.
//! - `backend::KeychainServicesBackend`: macOS Keychain Services.
//!
//! # Modules
//!
//! - [`credential`]: credential value types and change sets.
//! - [`query`]: the backend filter vocabulary.
//! - [`backend`]: the [`SecureBackend`] trait and its implementations.
//! - [`store`]: the [`CredentialStore`] façade.
//! - [`config`]: backend selection.
//! - [`error`]: the [`StoreError`] taxonomy.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keyward_vault::backend::MemoryBackend;
//! use keyward_vault::{CredentialStore, InternetCredential, StoreError};
//!
//! # fn example() -> keyward_vault::Result<()> {
//! let store = CredentialStore::new(Arc::new(MemoryBackend::new()));
//!
//! let credential = InternetCredential::new("t", "Aa123456", "http://google.com");
//! store.add_internet(&credential)?;
//!
//! let fetched = store.fetch_internet("t", "http://google.com", None, None)?;
//! assert_eq!(fetched, credential);
//!
//! store.delete_internet(&credential)?;
//! let gone = store.fetch_internet("t", "http://google.com", None, None);
//! assert!(matches!(gone, Err(StoreError::NotFound)));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod query;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use backend::{BackendError, SecureBackend};
pub use config::BackendConfig;
pub use credential::{GenericChanges, GenericCredential, InternetChanges, InternetCredential};
pub use error::{Result, StoreError};
pub use store::CredentialStore;
