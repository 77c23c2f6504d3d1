//! Credential value types.
//!
//! These are plain snapshots: a value is built by the caller, handed to the
//! store, and from then on the backend is the source of truth. Equality is
//! field-wise with the secret included, so callers can compare a fetched
//! record against what they submitted.
//!
//! `additional_info == None` and `additional_info == Some("")` are distinct
//! here, but the backend only knows the empty label. A credential added with
//! `Some("")` comes back as `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A network-scoped password, identified by account, server, port and label.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetCredential {
    pub account: String,
    pub secret: String,
    pub server: String,
    /// `None` means "no port"; stored as the backend's `0` sentinel.
    pub port: Option<u16>,
    pub additional_info: Option<String>,
}

impl InternetCredential {
    /// Create a credential with no port and no label.
    pub fn new(
        account: impl Into<String>,
        secret: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
            server: server.into(),
            port: None,
            additional_info: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }
}

impl fmt::Debug for InternetCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternetCredential")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("additional_info", &self.additional_info)
            .finish()
    }
}

/// An account-scoped password, identified by account and label.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericCredential {
    pub account: String,
    pub secret: String,
    pub additional_info: Option<String>,
}

impl GenericCredential {
    /// Create a credential with no label.
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
            additional_info: None,
        }
    }

    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }
}

impl fmt::Debug for GenericCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericCredential")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .field("additional_info", &self.additional_info)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// Sparse patch for an internet credential. Only `Some` fields are written;
/// everything else keeps its stored value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InternetChanges {
    pub account: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub additional_info: Option<String>,
    pub secret: Option<String>,
}

impl InternetChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// True when no field is named.
    pub fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.server.is_none()
            && self.port.is_none()
            && self.additional_info.is_none()
            && self.secret.is_none()
    }
}

impl fmt::Debug for InternetChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternetChanges")
            .field("account", &self.account)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("additional_info", &self.additional_info)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Sparse patch for a generic credential.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GenericChanges {
    pub account: Option<String>,
    pub additional_info: Option<String>,
    pub secret: Option<String>,
}

impl GenericChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.account.is_none() && self.additional_info.is_none() && self.secret.is_none()
    }
}

impl fmt::Debug for GenericChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericChanges")
            .field("account", &self.account)
            .field("additional_info", &self.additional_info)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
