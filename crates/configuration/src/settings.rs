use crate::error::ConfigError;
use config::Environment;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Environment flag that switches the pool into keep-alive mode.
pub const KEEP_ALIVE_VAR: &str = "KEEP_ALIVE";

/// Default time between two liveness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default table the liveness probe selects from.
pub const DEFAULT_POLL_TABLE: &str = "users";

/// Connection settings for the PostgreSQL database.
///
/// When `url` is set it takes precedence over the discrete fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// A full connection URL (`DB_URL`).
    pub url: Option<String>,
    /// `DB_HOST`
    pub host: String,
    /// `DB_PORT`, kept as text until the connection options are built.
    pub port: String,
    /// `DB_USER`
    pub user: String,
    /// `DB_PASS`
    #[serde(rename = "pass")]
    pub password: String,
    /// `DB_NAME`
    pub name: String,
    /// Set when `KEEP_ALIVE=1`.
    #[serde(skip)]
    pub keep_alive: bool,
}

impl DatabaseSettings {
    /// Builds the settings from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(Environment::with_prefix("DB").source(Some(vars.clone())))
            .build()?;

        let mut settings = builder.try_deserialize::<DatabaseSettings>()?;

        // An exported-but-empty DB_URL means "use the discrete fields".
        settings.url = settings.url.filter(|url| !url.trim().is_empty());
        settings.keep_alive = vars.get(KEEP_ALIVE_VAR).is_some_and(|v| v == "1");

        Ok(settings)
    }
}

/// Settings for the background liveness poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub table: String,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            table: DEFAULT_POLL_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPollSettings {
    interval_secs: Option<String>,
    table: Option<String>,
}

impl PollSettings {
    /// Builds the settings from `POLL_INTERVAL_SECS` and `POLL_TABLE` in `vars`.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(Environment::with_prefix("POLL").source(Some(vars.clone())))
            .build()?
            .try_deserialize::<RawPollSettings>()?;

        let mut settings = PollSettings::default();

        if let Some(secs) = raw.interval_secs {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "POLL_INTERVAL_SECS must be a whole number of seconds, got '{}'",
                    secs
                ))
            })?;
            if secs == 0 {
                return Err(ConfigError::ValidationError(
                    "POLL_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            settings.interval = Duration::from_secs(secs);
        }

        if let Some(table) = raw.table {
            // The table name is spliced into the probe statement, so only plain identifiers pass.
            let valid = !table.is_empty()
                && table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "POLL_TABLE must be a plain table identifier, got '{}'",
                    table
                )));
            }
            settings.table = table;
        }

        Ok(settings)
    }
}
