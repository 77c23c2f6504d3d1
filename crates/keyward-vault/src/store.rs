//! The credential store façade.
//!
//! [`CredentialStore`] turns credential values into backend filters, runs a
//! single backend primitive (two for updates), and turns the raw outcome back
//! into a typed value or a [`StoreError`]. It holds no state besides the
//! backend handle: no cache, no transaction, no retry.
//!
//! # Normalisation at the boundary
//!
//! - Writes store an absent label as `""`; reads report `""` as `None`.
//! - The backend records a missing internet port as `0`; reads report `0`
//!   as `None`.
//! - In fetch, update and delete filters an omitted port or label is no
//!   constraint at all, never "equals the default".
//!
//! # Update is find-then-patch
//!
//! [`update_internet`](CredentialStore::update_internet) and
//! [`update_generic`](CredentialStore::update_generic) first confirm the old
//! identity exists, then apply the patch with the same filter. The two calls
//! are not atomic: a delete racing in between surfaces as
//! [`StoreError::Backend`] with the not-found status. Backends without
//! conditional writes cannot close that window, so none is attempted here.
//!
//! # Not-found reporting
//!
//! Fetch and update report a missing record as [`StoreError::NotFound`].
//! Delete folds it into [`StoreError::Backend`] like any other status.

use std::sync::Arc;

use crate::backend::{BackendError, SecureBackend};
use crate::credential::{GenericChanges, GenericCredential, InternetChanges, InternetCredential};
use crate::error::{Result, StoreError};
use crate::query::{Attributes, Changes, Item, ItemClass, MatchLimit, Query};

/// Typed create/fetch/update/delete over a [`SecureBackend`].
///
/// Cheap to clone; clones share the backend. Safe to use from several
/// threads as long as the backend is.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecureBackend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn SecureBackend>) -> Self {
        Self { backend }
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // -- Internet credentials -----------------------------------------------

    /// Insert a new internet credential.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Encoding`] if the account is empty.
    /// - [`StoreError::Backend`] on any backend failure, including a
    ///   conflict with an existing identical identity.
    pub fn add_internet(&self, credential: &InternetCredential) -> Result<()> {
        let account = encode_account(&credential.account)?;
        let payload = encode_secret(&credential.secret);

        let query = Query::new(ItemClass::InternetPassword)
            .account(account)
            .server(credential.server.as_str())
            .port(credential.port)
            .label(Some(storage_label(&credential.additional_info)));

        self.backend
            .store(&query, &payload)
            .map_err(|e| self.backend_failure("add", query.class, e))?;

        tracing::info!(
            backend = self.backend.name(),
            account = %credential.account,
            server = %credential.server,
            port = ?credential.port,
            "added internet credential"
        );
        Ok(())
    }

    /// Fetch the internet credential matching the supplied fields.
    ///
    /// `port` and `additional_info` narrow the search only when supplied.
    /// When several records satisfy the filter the backend picks one; which
    /// one is not defined here.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if nothing matches.
    /// - [`StoreError::Decoding`] if the record lacks its secret, account or
    ///   server, or the secret is not UTF-8.
    /// - [`StoreError::Backend`] on any other backend failure.
    pub fn fetch_internet(
        &self,
        account: &str,
        server: &str,
        port: Option<u16>,
        additional_info: Option<&str>,
    ) -> Result<InternetCredential> {
        let query = Query::new(ItemClass::InternetPassword)
            .account(account)
            .server(server)
            .port(port)
            .label(additional_info)
            .returning_all();

        let item = self.find_one(&query)?;
        decode_internet(item)
    }

    /// Apply a sparse patch to the internet credential identified by `old`.
    ///
    /// Only the fields set on `changes` are written. After renaming an
    /// identity field, later calls must use the new identity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if `old` matches nothing.
    /// - [`StoreError::Encoding`] if the patch sets an empty account.
    /// - [`StoreError::Backend`] on any other failure, including a rename
    ///   that collides with another record.
    pub fn update_internet(
        &self,
        old: &InternetCredential,
        changes: &InternetChanges,
    ) -> Result<()> {
        let filter = internet_identity(old);
        self.ensure_exists(&filter)?;
        if changes.is_empty() {
            tracing::debug!(account = %old.account, "empty change set, nothing to update");
            return Ok(());
        }

        let patch = Changes {
            attributes: Attributes {
                account: changes
                    .account
                    .as_deref()
                    .map(encode_account)
                    .transpose()?
                    .map(str::to_owned),
                server: changes.server.clone(),
                port: changes.port,
                label: changes.additional_info.clone(),
            },
            data: changes.secret.as_deref().map(encode_secret),
        };

        self.apply_patch(&filter, &patch)?;
        tracing::info!(
            backend = self.backend.name(),
            account = %old.account,
            server = %old.server,
            changes = ?changes,
            "updated internet credential"
        );
        Ok(())
    }

    /// Delete the internet credential matching the identity fields of
    /// `credential` (at most one record).
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on every failure, a missing record included.
    pub fn delete_internet(&self, credential: &InternetCredential) -> Result<()> {
        let filter = internet_identity(credential);
        self.backend
            .erase(&filter)
            .map_err(|e| self.backend_failure("delete", filter.class, e))?;

        tracing::info!(
            backend = self.backend.name(),
            account = %credential.account,
            server = %credential.server,
            "deleted internet credential"
        );
        Ok(())
    }

    // -- Generic credentials ------------------------------------------------

    /// Insert a new generic credential.
    ///
    /// # Errors
    ///
    /// Same as [`add_internet`](Self::add_internet).
    pub fn add_generic(&self, credential: &GenericCredential) -> Result<()> {
        let account = encode_account(&credential.account)?;
        let payload = encode_secret(&credential.secret);

        let query = Query::new(ItemClass::GenericPassword)
            .account(account)
            .label(Some(storage_label(&credential.additional_info)));

        self.backend
            .store(&query, &payload)
            .map_err(|e| self.backend_failure("add", query.class, e))?;

        tracing::info!(
            backend = self.backend.name(),
            account = %credential.account,
            "added generic credential"
        );
        Ok(())
    }

    /// Fetch the generic credential matching `account` and, when supplied,
    /// `additional_info`.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_internet`](Self::fetch_internet), without the server
    /// requirement.
    pub fn fetch_generic(
        &self,
        account: &str,
        additional_info: Option<&str>,
    ) -> Result<GenericCredential> {
        let query = Query::new(ItemClass::GenericPassword)
            .account(account)
            .label(additional_info)
            .returning_all();

        let item = self.find_one(&query)?;
        decode_generic(item)
    }

    /// Apply a sparse patch to the generic credential identified by `old`.
    ///
    /// # Errors
    ///
    /// Same as [`update_internet`](Self::update_internet).
    pub fn update_generic(&self, old: &GenericCredential, changes: &GenericChanges) -> Result<()> {
        let filter = generic_identity(old);
        self.ensure_exists(&filter)?;
        if changes.is_empty() {
            tracing::debug!(account = %old.account, "empty change set, nothing to update");
            return Ok(());
        }

        let patch = Changes {
            attributes: Attributes {
                account: changes
                    .account
                    .as_deref()
                    .map(encode_account)
                    .transpose()?
                    .map(str::to_owned),
                label: changes.additional_info.clone(),
                ..Default::default()
            },
            data: changes.secret.as_deref().map(encode_secret),
        };

        self.apply_patch(&filter, &patch)?;
        tracing::info!(
            backend = self.backend.name(),
            account = %old.account,
            changes = ?changes,
            "updated generic credential"
        );
        Ok(())
    }

    /// Delete the generic credential matching the identity fields of
    /// `credential` (at most one record).
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on every failure, a missing record included.
    pub fn delete_generic(&self, credential: &GenericCredential) -> Result<()> {
        let filter = generic_identity(credential);
        self.backend
            .erase(&filter)
            .map_err(|e| self.backend_failure("delete", filter.class, e))?;

        tracing::info!(
            backend = self.backend.name(),
            account = %credential.account,
            "deleted generic credential"
        );
        Ok(())
    }

    // -- Maintenance --------------------------------------------------------

    /// Remove every internet and generic credential stored for `account`.
    ///
    /// A class with nothing to remove is not an error. Returns how many
    /// records were removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on any backend failure other than not-found.
    pub fn purge_account(&self, account: &str) -> Result<usize> {
        let mut purged = 0;

        for class in [ItemClass::InternetPassword, ItemClass::GenericPassword] {
            let query = Query::new(class).account(account).limit(MatchLimit::All);
            match self.backend.erase(&query) {
                Ok(removed) => purged += removed,
                Err(BackendError::ItemNotFound) => {}
                Err(e) => return Err(self.backend_failure("purge", class, e)),
            }
        }

        tracing::info!(
            backend = self.backend.name(),
            account = account,
            removed = purged,
            "purged account"
        );
        Ok(purged)
    }

    // -- Internal helpers ---------------------------------------------------

    /// Run `query` and return the first item, distinguishing not-found.
    fn find_one(&self, query: &Query) -> Result<Item> {
        match self.backend.find(query) {
            Ok(items) => items.into_iter().next().ok_or(StoreError::NotFound),
            Err(BackendError::ItemNotFound) => {
                tracing::debug!(
                    backend = self.backend.name(),
                    class = %query.class,
                    account = ?query.attributes.account,
                    "no credential matched"
                );
                Err(StoreError::NotFound)
            }
            Err(e) => Err(self.backend_failure("fetch", query.class, e)),
        }
    }

    /// First half of an update: the old identity must resolve to a record.
    fn ensure_exists(&self, filter: &Query) -> Result<()> {
        self.find_one(filter).map(|_| ())
    }

    /// Second half of an update. Every failure is a backend error, not-found
    /// included, since existence was already confirmed.
    fn apply_patch(&self, filter: &Query, patch: &Changes) -> Result<()> {
        self.backend
            .update(filter, patch)
            .map_err(|e| self.backend_failure("update", filter.class, e))
    }

    fn backend_failure(&self, op: &'static str, class: ItemClass, err: BackendError) -> StoreError {
        tracing::warn!(
            backend = self.backend.name(),
            op = op,
            class = %class,
            status = err.code(),
            error = %err,
            "backend call failed"
        );
        StoreError::from(err)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// The account is the anchor of every identity and cannot be empty.
fn encode_account(account: &str) -> Result<&str> {
    if account.is_empty() {
        return Err(StoreError::Encoding {
            field: "account",
            reason: "account must not be empty".into(),
        });
    }
    Ok(account)
}

/// Secrets are stored as their UTF-8 bytes.
fn encode_secret(secret: &str) -> Vec<u8> {
    secret.as_bytes().to_vec()
}

/// The label written to storage: the backend has no "no label" state.
fn storage_label(additional_info: &Option<String>) -> &str {
    additional_info.as_deref().unwrap_or("")
}

/// Narrowed filter for the identity fields present on `credential`.
fn internet_identity(credential: &InternetCredential) -> Query {
    Query::new(ItemClass::InternetPassword)
        .account(credential.account.as_str())
        .server(credential.server.as_str())
        .port(credential.port)
        .label(credential.additional_info.as_deref())
}

fn generic_identity(credential: &GenericCredential) -> Query {
    Query::new(ItemClass::GenericPassword)
        .account(credential.account.as_str())
        .label(credential.additional_info.as_deref())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode_secret(data: Option<Vec<u8>>) -> Result<String> {
    let bytes = data.ok_or_else(|| StoreError::Decoding {
        reason: "record has no secret payload".into(),
    })?;
    String::from_utf8(bytes).map_err(|e| StoreError::Decoding {
        reason: format!("secret is not valid UTF-8: {e}"),
    })
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| StoreError::Decoding {
        reason: format!("record has no {field}"),
    })
}

/// `""` is how storage spells "no label".
fn normalize_label(label: Option<String>) -> Option<String> {
    label.filter(|l| !l.is_empty())
}

fn decode_internet(item: Item) -> Result<InternetCredential> {
    let Item {
        attributes, data, ..
    } = item;

    Ok(InternetCredential {
        secret: decode_secret(data)?,
        account: required(attributes.account, "account")?,
        server: required(attributes.server, "server")?,
        // 0 is the backend's "no port" sentinel.
        port: attributes.port.filter(|p| *p != 0),
        additional_info: normalize_label(attributes.label),
    })
}

fn decode_generic(item: Item) -> Result<GenericCredential> {
    let Item {
        attributes, data, ..
    } = item;

    Ok(GenericCredential {
        secret: decode_secret(data)?,
        account: required(attributes.account, "account")?,
        additional_info: normalize_label(attributes.label),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
