//! Secure-storage backends.
//!
//! The store never touches secret material at rest itself. It talks to a
//! [`SecureBackend`] through four primitives (`store`, `find`, `update`,
//! `erase`) addressed by a [`Query`] filter. Implementations:
//!
//! - [`MemoryBackend`]: in-process, insertion ordered; used by tests.
//! - [`SqliteBackend`]: single-file store via `rusqlite`.
//! - `KeychainServicesBackend`: macOS Keychain Services (macOS only).
//!
//! All implementations share the same observable semantics so that the
//! façade behaves identically on top of any of them:
//!
//! - an internet item stored without a port records port `0`;
//! - generic items reject the `server` and `port` attributes;
//! - a second item with an identical identity is a [`BackendError::DuplicateItem`];
//! - `find`, `update` and `erase` touch at most [`MatchLimit::cap`] items and
//!   report [`BackendError::ItemNotFound`] when nothing matches.
//!
//! Status codes follow the platform keychain's numbering.

mod memory;
mod sqlite;

#[cfg(target_os = "macos")]
mod macos;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

#[cfg(target_os = "macos")]
pub use macos::KeychainServicesBackend;

use crate::query::{Attributes, Changes, Item, ItemClass, Query};

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// I/O failure inside the backend.
pub const ERR_SEC_IO: i32 = -36;
/// One or more parameters were not valid.
pub const ERR_SEC_PARAM: i32 = -50;
/// The backend is not available on this host.
pub const ERR_SEC_NOT_AVAILABLE: i32 = -25291;
/// An item with the same identity already exists.
pub const ERR_SEC_DUPLICATE_ITEM: i32 = -25299;
/// No item matched the filter.
pub const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;
/// The attribute does not exist for this item class.
pub const ERR_SEC_NO_SUCH_ATTR: i32 = -25303;
/// Internal backend failure.
pub const ERR_SEC_INTERNAL: i32 = -26276;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Raw outcome of a failed backend primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("the specified item could not be found")]
    ItemNotFound,

    #[error("the specified item already exists")]
    DuplicateItem,

    /// Any other non-success status.
    #[error("{message}")]
    Status { code: i32, message: String },
}

impl BackendError {
    /// Classify a raw status code.
    pub fn from_status(code: i32, message: impl Into<String>) -> Self {
        match code {
            ERR_SEC_ITEM_NOT_FOUND => Self::ItemNotFound,
            ERR_SEC_DUPLICATE_ITEM => Self::DuplicateItem,
            _ => Self::Status {
                code,
                message: message.into(),
            },
        }
    }

    /// The numeric status this outcome corresponds to.
    pub fn code(&self) -> i32 {
        match self {
            Self::ItemNotFound => ERR_SEC_ITEM_NOT_FOUND,
            Self::DuplicateItem => ERR_SEC_DUPLICATE_ITEM,
            Self::Status { code, .. } => *code,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::from_status(ERR_SEC_INTERNAL, message)
    }

    pub(crate) fn not_available(message: impl Into<String>) -> Self {
        Self::from_status(ERR_SEC_NOT_AVAILABLE, message)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The four primitives a secure store must provide.
///
/// Implementations must be `Send + Sync`; the façade adds no locking of its
/// own, so each primitive must be atomic on its own.
pub trait SecureBackend: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Insert one item built from the query's class and attributes.
    ///
    /// Fails with [`BackendError::DuplicateItem`] if an item with the same
    /// identity is already live.
    fn store(&self, query: &Query, payload: &[u8]) -> Result<(), BackendError>;

    /// Return the items matching `query`, capped by its match limit, in
    /// insertion order and projected through its return flags.
    ///
    /// Never returns an empty vector; no match is [`BackendError::ItemNotFound`].
    fn find(&self, query: &Query) -> Result<Vec<Item>, BackendError>;

    /// Apply `changes` to the items matching `query`.
    fn update(&self, query: &Query, changes: &Changes) -> Result<(), BackendError>;

    /// Remove the items matching `query`, capped by its match limit, and
    /// report how many were removed.
    fn erase(&self, query: &Query) -> Result<usize, BackendError>;
}

// ---------------------------------------------------------------------------
// Shared semantics
// ---------------------------------------------------------------------------

/// Reject attributes that do not exist on `class`.
pub(crate) fn check_attributes(class: ItemClass, attrs: &Attributes) -> Result<(), BackendError> {
    if class == ItemClass::GenericPassword && attrs.has_network_fields() {
        return Err(BackendError::from_status(
            ERR_SEC_NO_SUCH_ATTR,
            "server and port are not attributes of generic passwords",
        ));
    }
    Ok(())
}

/// The attributes an item is actually stored with.
pub(crate) fn stored_attributes(query: &Query) -> Attributes {
    let mut attrs = query.attributes.clone();
    if query.class == ItemClass::InternetPassword && attrs.port.is_none() {
        attrs.port = Some(0);
    }
    attrs
}

/// Compute the patched attributes for every target and refuse the update if
/// any result would collide with another live identity.
///
/// `live` holds every item of the class, keyed by whatever handle the
/// backend uses; `targets` is the subset matched by the update filter.
pub(crate) fn plan_update<K: Copy + PartialEq>(
    live: &[(K, Attributes)],
    targets: &[K],
    patch: &Attributes,
) -> Result<Vec<(K, Attributes)>, BackendError> {
    let mut planned: Vec<(K, Attributes)> = Vec::with_capacity(targets.len());

    for key in targets {
        let Some((_, current)) = live.iter().find(|(k, _)| k == key) else {
            return Err(BackendError::internal("update target vanished"));
        };
        let mut next = current.clone();
        next.apply(patch);

        let clashes_with_untouched = live
            .iter()
            .any(|(k, attrs)| !targets.contains(k) && *attrs == next);
        let clashes_with_planned = planned.iter().any(|(_, attrs)| *attrs == next);
        if clashes_with_untouched || clashes_with_planned {
            return Err(BackendError::DuplicateItem);
        }

        planned.push((*key, next));
    }

    Ok(planned)
}
