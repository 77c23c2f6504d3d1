//! Small utilities shared by the subcommand handlers.

use std::io::BufRead;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Placeholder printed instead of a secret unless `--reveal` is passed.
pub const SECRET_MASK: &str = "********";

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber. `RUST_LOG` wins over `default_level`.
/// Logs go to stderr so stdout carries only command output.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Use `flag` if given, otherwise the first line of `input`.
pub fn read_secret(flag: Option<String>, input: impl BufRead) -> Result<String> {
    if let Some(secret) = flag {
        return Ok(secret);
    }

    let mut lines = input.lines();
    match lines.next() {
        Some(line) => {
            let line = line.context("failed to read secret from stdin")?;
            Ok(line.trim_end_matches('\r').to_owned())
        }
        None => bail!("no secret given: pass --secret or pipe it on stdin"),
    }
}

/// Serialize a credential as pretty JSON, masking `secret` unless `reveal`.
pub fn render<T: Serialize>(credential: &T, reveal: bool) -> Result<String> {
    let mut value = serde_json::to_value(credential).context("failed to serialize credential")?;
    if !reveal {
        if let Some(secret) = value.get_mut("secret") {
            *secret = serde_json::Value::String(SECRET_MASK.into());
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}
