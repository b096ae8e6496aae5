//! Capability handles: one code path for plain connections and open transactions.
//!
//! [`Queryable`] is the query capability shared by both variants, [`Transactional`]
//! adds `commit` and `rollback`. Both traits are sealed; the only implementors are
//! [`ConnectionHandle`], [`TransactionHandle`] and the [`Handle`] enum over them, so
//! `is_transaction` and `as_transaction` can never miss a variant.

use crate::error::DbError;
use crate::values::{SqlValue, into_arguments};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgQueryResult, PgRow, PgStatement};
use sqlx::{Executor, PgConnection, PgPool, Postgres, Transaction};
use std::fmt;
use std::future::Future;

mod sealed {
    pub trait Sealed {}
}

/// Prepare, fetch one row, fetch many rows, or execute.
pub trait Queryable: sealed::Sealed + Send {
    #[doc(hidden)]
    fn connection(&mut self) -> &mut PgConnection;

    /// Whether this handle participates in a transaction.
    fn is_transaction(&self) -> bool;

    /// Prepares `sql` on the underlying connection.
    fn prepare<'a>(
        &'a mut self,
        sql: &'a str,
    ) -> impl Future<Output = Result<PgStatement<'static>, DbError>> + Send + 'a {
        async move {
            tracing::debug!(sql, "Preparing statement.");
            let statement = self.connection().prepare(sql).await?;
            Ok(sqlx::Statement::to_owned(&statement))
        }
    }

    /// Fetches the first row, or `DbError::NotFound` when there is none.
    fn query_row<'a>(
        &'a mut self,
        sql: &'a str,
        args: Vec<SqlValue>,
    ) -> impl Future<Output = Result<PgRow, DbError>> + Send + 'a {
        async move {
            tracing::debug!(sql, params = args.len(), "Querying one row.");
            let arguments = into_arguments(args)?;
            sqlx::query_with::<Postgres, _>(sql, arguments)
                .fetch_optional(self.connection())
                .await?
                .ok_or(DbError::NotFound)
        }
    }

    fn query<'a>(
        &'a mut self,
        sql: &'a str,
        args: Vec<SqlValue>,
    ) -> impl Future<Output = Result<Vec<PgRow>, DbError>> + Send + 'a {
        async move {
            tracing::debug!(sql, params = args.len(), "Querying rows.");
            let arguments = into_arguments(args)?;
            let rows = sqlx::query_with::<Postgres, _>(sql, arguments)
                .fetch_all(self.connection())
                .await?;
            Ok(rows)
        }
    }

    /// Runs a statement and returns the number of affected rows.
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        args: Vec<SqlValue>,
    ) -> impl Future<Output = Result<u64, DbError>> + Send + 'a {
        async move {
            tracing::debug!(sql, params = args.len(), "Executing statement.");
            let arguments = into_arguments(args)?;
            let result: PgQueryResult = sqlx::query_with::<Postgres, _>(sql, arguments)
                .execute(self.connection())
                .await?;
            Ok(result.rows_affected())
        }
    }
}

/// A [`Queryable`] that must be finished with exactly one of `commit` or `rollback`.
pub trait Transactional: Queryable + Sized {
    fn commit(self) -> impl Future<Output = Result<(), DbError>> + Send;
    fn rollback(self) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// A connection checked out of the pool.
#[derive(Debug)]
pub struct ConnectionHandle {
    conn: PoolConnection<Postgres>,
}

impl ConnectionHandle {
    pub fn new(conn: PoolConnection<Postgres>) -> Self {
        Self { conn }
    }
}

impl sealed::Sealed for ConnectionHandle {}

impl Queryable for ConnectionHandle {
    fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    fn is_transaction(&self) -> bool {
        false
    }
}

/// An open transaction.
///
/// Dropping it without `commit` or `rollback` rolls it back and logs a warning.
pub struct TransactionHandle {
    tx: Transaction<'static, Postgres>,
    guard: FinishGuard,
}

#[derive(Debug)]
struct FinishGuard {
    finished: bool,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Transaction dropped without commit or rollback; it will be rolled back.");
        }
    }
}

impl TransactionHandle {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx,
            guard: FinishGuard { finished: false },
        }
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("finished", &self.guard.finished)
            .finish_non_exhaustive()
    }
}

impl sealed::Sealed for TransactionHandle {}

impl Queryable for TransactionHandle {
    fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    fn is_transaction(&self) -> bool {
        true
    }
}

impl Transactional for TransactionHandle {
    async fn commit(self) -> Result<(), DbError> {
        let Self { tx, mut guard } = self;
        guard.finished = true;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbError> {
        let Self { tx, mut guard } = self;
        guard.finished = true;
        tx.rollback().await?;
        Ok(())
    }
}

/// Either variant, for code that decides at runtime whether to open a transaction.
#[derive(Debug)]
pub enum Handle {
    Connection(ConnectionHandle),
    Transaction(TransactionHandle),
}

impl Handle {
    pub fn as_transaction(&mut self) -> Option<&mut TransactionHandle> {
        match self {
            Handle::Transaction(tx) => Some(tx),
            Handle::Connection(_) => None,
        }
    }

    pub fn into_transaction(self) -> Option<TransactionHandle> {
        match self {
            Handle::Transaction(tx) => Some(tx),
            Handle::Connection(_) => None,
        }
    }

    /// Like [`Handle::as_transaction`], for callers that cannot proceed without one.
    pub fn require_transaction(&mut self) -> Result<&mut TransactionHandle, DbError> {
        self.as_transaction().ok_or(DbError::TransactionRequired)
    }

    /// Ends the unit of work.
    ///
    /// A transaction is committed when `result` is `Ok` and rolled back otherwise; a
    /// plain connection is simply released. The original error wins over a failed
    /// rollback.
    pub async fn finish<T>(self, result: Result<T, DbError>) -> Result<T, DbError> {
        let tx = match self {
            Handle::Connection(_) => return result,
            Handle::Transaction(tx) => tx,
        };

        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = ?rollback_err, "Rollback failed.");
                }
                Err(e)
            }
        }
    }
}

impl sealed::Sealed for Handle {}

impl Queryable for Handle {
    fn connection(&mut self) -> &mut PgConnection {
        match self {
            Handle::Connection(conn) => conn.connection(),
            Handle::Transaction(tx) => tx.connection(),
        }
    }

    fn is_transaction(&self) -> bool {
        matches!(self, Handle::Transaction(_))
    }
}

impl From<ConnectionHandle> for Handle {
    fn from(conn: ConnectionHandle) -> Self {
        Handle::Connection(conn)
    }
}

impl From<TransactionHandle> for Handle {
    fn from(tx: TransactionHandle) -> Self {
        Handle::Transaction(tx)
    }
}

/// The pool, as the source of new handles.
#[derive(Debug, Clone)]
pub struct DataSource {
    pool: PgPool,
}

impl DataSource {
    /// Creates a new `DataSource` over a shared connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<ConnectionHandle, DbError> {
        Ok(ConnectionHandle::new(self.pool.acquire().await?))
    }

    pub async fn begin(&self) -> Result<TransactionHandle, DbError> {
        Ok(TransactionHandle::new(self.pool.begin().await?))
    }

    /// A transaction when `transactional` is set, a plain connection otherwise.
    pub async fn handle(&self, transactional: bool) -> Result<Handle, DbError> {
        if transactional {
            Ok(self.begin().await?.into())
        } else {
            Ok(self.acquire().await?.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScratchTable, live_source};
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use std::time::Duration;

    fn unreachable_source() -> DataSource {
        // Port 1 on loopback refuses connections immediately.
        let options = PgConnectOptions::new().host("127.0.0.1").port(1);
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(2))
            .connect_lazy_with(options);
        DataSource::new(pool)
    }

    #[tokio::test]
    async fn acquire_reports_driver_errors() {
        let source = unreachable_source();
        assert!(matches!(
            source.acquire().await,
            Err(DbError::ConnectionError(_))
        ));
    }

    #[tokio::test]
    async fn begin_reports_driver_errors() {
        let source = unreachable_source();
        assert!(matches!(
            source.handle(true).await,
            Err(DbError::ConnectionError(_))
        ));
    }

    // Live tests. Run with: DB_URL=postgres://... cargo test -p database -- --ignored

    async fn insert_note<Q: Queryable>(handle: &mut Q, table: &ScratchTable, note: &str) -> u64 {
        handle
            .execute(
                &format!("INSERT INTO {} (note) VALUES ($1)", table.name),
                vec![note.into()],
            )
            .await
            .expect("insert failed")
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn plain_connection_is_not_a_transaction() {
        let source = live_source().await;
        let mut handle = source.handle(false).await.expect("acquire failed");

        assert!(!handle.is_transaction());
        assert!(handle.as_transaction().is_none());
        assert!(matches!(
            handle.require_transaction(),
            Err(DbError::TransactionRequired)
        ));
        assert!(handle.into_transaction().is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn begun_handle_is_a_transaction() {
        let source = live_source().await;
        let mut handle = source.handle(true).await.expect("begin failed");

        assert!(handle.is_transaction());
        assert!(handle.as_transaction().is_some());
        assert!(handle.require_transaction().is_ok());

        let tx = handle.into_transaction().expect("transaction variant");
        assert!(tx.is_transaction());
        tx.rollback().await.expect("rollback failed");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn finish_commits_on_ok() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut handle = source.handle(true).await.expect("begin failed");
        let inserted = insert_note(&mut handle, &table, "kept").await;
        let result = handle.finish(Ok(inserted)).await;

        assert_eq!(result.expect("commit failed"), 1);
        assert_eq!(table.count(&source).await, 1);
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn finish_rolls_back_on_err() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut handle = source.handle(true).await.expect("begin failed");
        insert_note(&mut handle, &table, "discarded").await;
        let result: Result<(), DbError> = handle.finish(Err(DbError::NotFound)).await;

        assert!(matches!(result, Err(DbError::NotFound)));
        assert_eq!(table.count(&source).await, 0);
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn finish_on_plain_connection_passes_result_through() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut handle = source.handle(false).await.expect("acquire failed");
        insert_note(&mut handle, &table, "autocommitted").await;
        let result: Result<(), DbError> = handle.finish(Err(DbError::NotFound)).await;

        // Without a transaction the insert already stands.
        assert!(matches!(result, Err(DbError::NotFound)));
        assert_eq!(table.count(&source).await, 1);
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn explicit_commit_and_rollback() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut tx = source.begin().await.expect("begin failed");
        insert_note(&mut tx, &table, "committed").await;
        tx.commit().await.expect("commit failed");

        let mut tx = source.begin().await.expect("begin failed");
        insert_note(&mut tx, &table, "rolled back").await;
        tx.rollback().await.expect("rollback failed");

        assert_eq!(table.count(&source).await, 1);
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn dropped_transaction_is_rolled_back() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut tx = source.begin().await.expect("begin failed");
        insert_note(&mut tx, &table, "abandoned").await;
        drop(tx);

        assert_eq!(table.count(&source).await, 0);
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn query_row_without_match_is_not_found() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut conn = source.acquire().await.expect("acquire failed");
        let result = conn
            .query_row(
                &format!("SELECT id FROM {} WHERE note = $1", table.name),
                vec!["missing".into()],
            )
            .await;

        assert!(matches!(result, Err(DbError::NotFound)));
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn query_returns_every_row() {
        let source = live_source().await;
        let table = ScratchTable::create(&source).await;

        let mut conn = source.acquire().await.expect("acquire failed");
        insert_note(&mut conn, &table, "a").await;
        insert_note(&mut conn, &table, "a").await;
        insert_note(&mut conn, &table, "b").await;

        let rows = conn
            .query(
                &format!("SELECT id FROM {} WHERE note = $1", table.name),
                vec!["a".into()],
            )
            .await
            .expect("query failed");

        assert_eq!(rows.len(), 2);
        table.remove(&source).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn prepare_on_both_variants() {
        use sqlx::Statement as _;

        let source = live_source().await;
        let sql = "SELECT $1::int + 1 AS next";

        let mut conn = source.acquire().await.expect("acquire failed");
        let statement = conn.prepare(sql).await.expect("prepare failed");
        assert_eq!(statement.sql(), sql);
        assert_eq!(statement.columns().len(), 1);

        let mut tx = source.begin().await.expect("begin failed");
        let statement = tx.prepare(sql).await.expect("prepare failed");
        assert_eq!(statement.sql(), sql);
        tx.rollback().await.expect("rollback failed");
    }
}
