//! # Till Configuration Crate
//!
//! Reads the settings the data-access layer needs from the process environment.
//! Two deployment styles are supported for the database: a single `DB_URL`, or the
//! discrete `DB_HOST` / `DB_PORT` / `DB_USER` / `DB_PASS` / `DB_NAME` fields.
//! A local `.env` file is honoured when present.

use crate::error::ConfigError;
use std::collections::HashMap;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{DatabaseSettings, PollSettings};

/// Loads the database settings from the process environment.
///
/// A missing `.env` file is not an error; the variables may already be exported.
pub fn load_database_settings() -> Result<DatabaseSettings, ConfigError> {
    DatabaseSettings::from_vars(&process_vars())
}

/// Loads the liveness-poller settings from the process environment.
pub fn load_poll_settings() -> Result<PollSettings, ConfigError> {
    PollSettings::from_vars(&process_vars())
}

fn process_vars() -> HashMap<String, String> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "No .env file loaded.");
    }
    std::env::vars().collect()
}
