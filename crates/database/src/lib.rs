//! # Till Database Crate
//!
//! A thin data-access layer over PostgreSQL.
//!
//! ## Architectural Principles
//!
//! - **No process exits:** opening the pool returns a `Result`; the binary decides
//!   whether a failure is fatal.
//! - **Bind, don't splice:** literals always travel as `$n` parameters. Only the closed
//!   set of [`DatabaseVariable`]s is written into statement text.
//! - **One code path for connections and transactions:** everything that runs SQL takes
//!   a [`Queryable`]; transaction control lives on [`Transactional`].
//!
//! ## Public API
//!
//! - `open_database` / `connection_string`: the connection provider.
//! - `LivenessPoller`: the background health check.
//! - `build_where_body`, `FilterCondition`, `DatabaseVariable`: the clause builder.
//! - `DataSource`, `Handle`, `Queryable`, `Transactional`: capability handles.
//! - `SelectQuery`, `InsertQuery`, `UpdateQuery`, `DeleteQuery`: reusable query tasks.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod clause;
pub mod connection;
pub mod error;
pub mod handle;
pub mod poller;
pub mod tables;
pub mod tasks;
#[cfg(test)]
mod testing;
pub mod values;
pub mod variables;

// Re-export the key components to create a clean, public-facing API.
pub use clause::{Connector, FilterCondition, build_where_body};
pub use connection::{
    connect_options, connection_string, open_database, pool_options, redacted_target,
};
pub use error::DbError;
pub use handle::{ConnectionHandle, DataSource, Handle, Queryable, TransactionHandle, Transactional};
pub use poller::{LivenessPoller, LivenessProbe, PollOutcome, TableProbe};
pub use tasks::{
    BuiltQuery, DeleteQuery, ExecTask, InsertQuery, QueryRowTask, QueryTask, SelectQuery,
    UpdateQuery, execute_task, fetch_row, fetch_rows,
};
pub use values::{FilterValue, SqlValue, into_arguments, is_database_variable};
pub use variables::DatabaseVariable;
