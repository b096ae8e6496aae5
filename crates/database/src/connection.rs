use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

/// The connection-string key that selects the TLS mode.
pub const SSL_MODE_KEY: &str = "sslmode";
/// The directive appended when no TLS mode was given.
pub const DISABLE_TLS: &str = "sslmode=disable";

/// Renders the connection string for `settings`.
///
/// A full URL is returned unchanged when it already names a TLS mode; otherwise TLS is
/// disabled. Without a URL, a key/value string is built from the discrete fields with
/// TLS always disabled.
pub fn connection_string(settings: &DatabaseSettings) -> String {
    if let Some(url) = &settings.url {
        if url.contains(SSL_MODE_KEY) {
            return url.clone();
        }
        let joiner = if url.contains('?') { '&' } else { '?' };
        return format!("{}{}{}", url, joiner, DISABLE_TLS);
    }

    format!(
        "host={} port={} user={} password={} dbname={} {}",
        settings.host, settings.port, settings.user, settings.password, settings.name, DISABLE_TLS
    )
}

/// Converts `settings` into driver options.
pub fn connect_options(settings: &DatabaseSettings) -> Result<PgConnectOptions, DbError> {
    if settings.url.is_some() {
        let url = connection_string(settings);
        return PgConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionConfigError(format!("invalid DB_URL: {}", e)));
    }

    // The key/value form is not a URL, so the fields are applied one by one.
    let mut options = PgConnectOptions::new().ssl_mode(PgSslMode::Disable);
    if !settings.host.is_empty() {
        options = options.host(&settings.host);
    }
    if !settings.port.is_empty() {
        let port = settings.port.trim().parse::<u16>().map_err(|_| {
            DbError::ConnectionConfigError(format!("DB_PORT is not a valid port: '{}'", settings.port))
        })?;
        options = options.port(port);
    }
    if !settings.user.is_empty() {
        options = options.username(&settings.user);
    }
    if !settings.password.is_empty() {
        options = options.password(&settings.password);
    }
    if !settings.name.is_empty() {
        options = options.database(&settings.name);
    }

    Ok(options)
}

/// How long extra idle connections survive in keep-alive mode.
pub const KEEP_ALIVE_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// A printable description of the target database that never includes credentials.
pub fn redacted_target(settings: &DatabaseSettings) -> String {
    match connect_options(settings) {
        Ok(options) => format!(
            "{}:{}/{}",
            options.get_host(),
            options.get_port(),
            options.get_database().unwrap_or_default()
        ),
        Err(_) => "<invalid database configuration>".to_string(),
    }
}

/// Pool settings for `settings`.
///
/// Keep-alive mode pins one connection open for the lifetime of the pool
/// (`min_connections(1)`, no max lifetime) and reaps every other idle connection after
/// [`KEEP_ALIVE_IDLE_TIMEOUT`], so the idle count settles at exactly one.
pub fn pool_options(settings: &DatabaseSettings) -> PgPoolOptions {
    let pool_options = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5));

    if !settings.keep_alive {
        return pool_options;
    }

    pool_options
        .min_connections(1)
        .max_lifetime(None)
        .idle_timeout(KEEP_ALIVE_IDLE_TIMEOUT)
}

/// Opens the connection pool and verifies the database answers.
pub async fn open_database(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let options = connect_options(settings)?;

    if settings.keep_alive {
        tracing::info!("Keep-alive mode enabled; retaining one idle connection.");
    }

    let pool = pool_options(settings).connect_with(options).await?;

    // Liveness probe
    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!(target_db = %redacted_target(settings), "Database connection pool opened.");
    Ok(pool)
}
