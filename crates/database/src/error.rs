use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection configuration: {0}")]
    ConnectionConfigError(String),

    #[error("Database operation failed: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Failed to bind a query parameter: {0}")]
    BindError(String),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("This operation requires a transaction, but a plain connection was supplied.")]
    TransactionRequired,
}
