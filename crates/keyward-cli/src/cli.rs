//! CLI argument definitions for keyward.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keyward_vault::{GenericCredential, InternetCredential};

/// keyward -- typed access to the platform credential store.
#[derive(Parser)]
#[command(
    name = "keyward",
    version,
    about = "keyward -- store and fetch internet and generic passwords",
    long_about = "Adds, fetches, updates and deletes credentials in the platform keychain \
                  (or a local SQLite store), addressed by account, server, port and label."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage network-scoped credentials (account + server + port + label).
    Internet {
        #[command(subcommand)]
        action: InternetAction,
    },

    /// Manage account-scoped credentials (account + label).
    Generic {
        #[command(subcommand)]
        action: GenericAction,
    },

    /// Remove every credential stored for an account.
    Purge {
        /// The account to purge.
        #[arg(long, short)]
        account: String,
    },

    /// Show the resolved configuration.
    Status,
}

// ---------------------------------------------------------------------------
// Internet
// ---------------------------------------------------------------------------

/// Identity fields of an internet credential.
#[derive(Args, Debug, Clone)]
pub struct InternetIdentity {
    #[arg(long, short)]
    pub account: String,

    #[arg(long, short)]
    pub server: String,

    /// Omit to match any port.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Omit to match any label.
    #[arg(long, short)]
    pub label: Option<String>,
}

impl InternetIdentity {
    /// A credential value carrying only the identity; the secret is unused
    /// by update and delete filters.
    pub fn to_credential(&self, secret: String) -> InternetCredential {
        InternetCredential {
            account: self.account.clone(),
            secret,
            server: self.server.clone(),
            port: self.port,
            additional_info: self.label.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum InternetAction {
    /// Add a credential. The secret is read from stdin unless --secret is given.
    Add {
        #[command(flatten)]
        identity: InternetIdentity,

        #[arg(long)]
        secret: Option<String>,
    },

    /// Fetch a credential and print it as JSON.
    Get {
        #[command(flatten)]
        identity: InternetIdentity,

        /// Print the secret instead of a mask.
        #[arg(long)]
        reveal: bool,
    },

    /// Change the named fields of an existing credential.
    Update {
        #[command(flatten)]
        identity: InternetIdentity,

        #[arg(long)]
        new_account: Option<String>,

        #[arg(long)]
        new_server: Option<String>,

        #[arg(long)]
        new_port: Option<u16>,

        #[arg(long)]
        new_label: Option<String>,

        #[arg(long)]
        new_secret: Option<String>,
    },

    /// Delete a credential.
    Delete {
        #[command(flatten)]
        identity: InternetIdentity,
    },
}

// ---------------------------------------------------------------------------
// Generic
// ---------------------------------------------------------------------------

/// Identity fields of a generic credential.
#[derive(Args, Debug, Clone)]
pub struct GenericIdentity {
    #[arg(long, short)]
    pub account: String,

    /// Omit to match any label.
    #[arg(long, short)]
    pub label: Option<String>,
}

impl GenericIdentity {
    pub fn to_credential(&self, secret: String) -> GenericCredential {
        GenericCredential {
            account: self.account.clone(),
            secret,
            additional_info: self.label.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum GenericAction {
    /// Add a credential. The secret is read from stdin unless --secret is given.
    Add {
        #[command(flatten)]
        identity: GenericIdentity,

        #[arg(long)]
        secret: Option<String>,
    },

    /// Fetch a credential and print it as JSON.
    Get {
        #[command(flatten)]
        identity: GenericIdentity,

        /// Print the secret instead of a mask.
        #[arg(long)]
        reveal: bool,
    },

    /// Change the named fields of an existing credential.
    Update {
        #[command(flatten)]
        identity: GenericIdentity,

        #[arg(long)]
        new_account: Option<String>,

        #[arg(long)]
        new_label: Option<String>,

        #[arg(long)]
        new_secret: Option<String>,
    },

    /// Delete a credential.
    Delete {
        #[command(flatten)]
        identity: GenericIdentity,
    },
}
