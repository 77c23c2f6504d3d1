//! CLI entry point for keyward.
//!
//! This binary provides the `keyward` command for adding, fetching,
//! updating and deleting credentials in the configured secure store.

mod cli;
mod config;
mod helpers;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use keyward_vault::{CredentialStore, GenericChanges, InternetChanges, StoreError};
use tracing::info;

use crate::cli::{Cli, Commands, GenericAction, InternetAction};
use crate::config::AppConfig;
use crate::helpers::{init_tracing, read_secret, render};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log.level);

    match cli.command {
        Commands::Internet { action } => cmd_internet(&open_store(&config)?, action),
        Commands::Generic { action } => cmd_generic(&open_store(&config)?, action),
        Commands::Purge { account } => cmd_purge(&open_store(&config)?, &account),
        Commands::Status => cmd_status(&config),
    }
}

fn open_store(config: &AppConfig) -> Result<CredentialStore> {
    let backend = config
        .backend
        .open()
        .with_context(|| format!("failed to open {} backend", config.backend.kind()))?;
    Ok(CredentialStore::new(backend))
}

/// `None` when no record matched; every other error propagates.
fn found<T>(result: keyward_vault::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn not_found() -> ExitCode {
    eprintln!("no matching credential");
    ExitCode::from(1)
}

// ---------------------------------------------------------------------------
// Subcommand: internet
// ---------------------------------------------------------------------------

fn cmd_internet(store: &CredentialStore, action: InternetAction) -> Result<ExitCode> {
    match action {
        InternetAction::Add { identity, secret } => {
            let secret = read_secret(secret, io::stdin().lock())?;
            store.add_internet(&identity.to_credential(secret))?;
            info!(account = %identity.account, server = %identity.server, "internet credential added");
            Ok(ExitCode::SUCCESS)
        }
        InternetAction::Get { identity, reveal } => {
            let Some(cred) = found(store.fetch_internet(
                &identity.account,
                &identity.server,
                identity.port,
                identity.label.as_deref(),
            ))?
            else {
                return Ok(not_found());
            };
            println!("{}", render(&cred, reveal)?);
            Ok(ExitCode::SUCCESS)
        }
        InternetAction::Update {
            identity,
            new_account,
            new_server,
            new_port,
            new_label,
            new_secret,
        } => {
            let changes = InternetChanges {
                account: new_account,
                server: new_server,
                port: new_port,
                additional_info: new_label,
                secret: new_secret,
            };
            let old = identity.to_credential(String::new());
            Ok(match found(store.update_internet(&old, &changes))? {
                Some(()) => ExitCode::SUCCESS,
                None => not_found(),
            })
        }
        InternetAction::Delete { identity } => {
            store.delete_internet(&identity.to_credential(String::new()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: generic
// ---------------------------------------------------------------------------

fn cmd_generic(store: &CredentialStore, action: GenericAction) -> Result<ExitCode> {
    match action {
        GenericAction::Add { identity, secret } => {
            let secret = read_secret(secret, io::stdin().lock())?;
            store.add_generic(&identity.to_credential(secret))?;
            info!(account = %identity.account, "generic credential added");
            Ok(ExitCode::SUCCESS)
        }
        GenericAction::Get { identity, reveal } => {
            let Some(cred) =
                found(store.fetch_generic(&identity.account, identity.label.as_deref()))?
            else {
                return Ok(not_found());
            };
            println!("{}", render(&cred, reveal)?);
            Ok(ExitCode::SUCCESS)
        }
        GenericAction::Update {
            identity,
            new_account,
            new_label,
            new_secret,
        } => {
            let changes = GenericChanges {
                account: new_account,
                additional_info: new_label,
                secret: new_secret,
            };
            let old = identity.to_credential(String::new());
            Ok(match found(store.update_generic(&old, &changes))? {
                Some(()) => ExitCode::SUCCESS,
                None => not_found(),
            })
        }
        GenericAction::Delete { identity } => {
            store.delete_generic(&identity.to_credential(String::new()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: purge
// ---------------------------------------------------------------------------

fn cmd_purge(store: &CredentialStore, account: &str) -> Result<ExitCode> {
    let removed = store
        .purge_account(account)
        .with_context(|| format!("failed to purge account {account}"))?;
    println!("removed {removed} credential(s) for {account}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

fn cmd_status(config: &AppConfig) -> Result<ExitCode> {
    println!("keyward v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  backend:   {}", config.backend.kind());
    if let keyward_vault::BackendConfig::Sqlite { path } = &config.backend {
        println!("  database:  {}", path.display());
    }
    println!("  log level: {}", config.log.level);
    Ok(ExitCode::SUCCESS)
}
