//! Background liveness polling.
//!
//! A single tokio task probes the database at a fixed interval until it is told to
//! stop or a probe fails. A failed probe ends the loop for good; there is no retry.

use crate::error::DbError;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

/// A minimal query used only to confirm the database still answers.
pub trait LivenessProbe: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Probes with `SELECT 1 FROM <table> LIMIT 1`.
#[derive(Debug, Clone)]
pub struct TableProbe {
    pool: PgPool,
    statement: String,
}

impl TableProbe {
    /// `table` is written into the statement; it must be a plain identifier.
    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            statement: format!("SELECT 1 FROM {} LIMIT 1", table),
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

impl LivenessProbe for TableProbe {
    async fn probe(&self) -> Result<(), DbError> {
        sqlx::query(&self.statement).fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// How the polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A stop was requested, or the poller was dropped.
    Stopped,
    /// A probe failed; carries the error text.
    ProbeFailed(String),
    /// The task panicked or was cancelled by the runtime.
    Aborted,
}

/// Handle to the running polling task.
///
/// Dropping the handle stops the loop at its next wait point.
#[derive(Debug)]
pub struct LivenessPoller {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<PollOutcome>>,
    outcome: Option<PollOutcome>,
}

impl LivenessPoller {
    /// Spawns the polling loop. The first probe runs immediately.
    pub fn start<P: LivenessProbe>(probe: P, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(probe, interval, stop_rx));
        Self {
            stop_tx: Some(stop_tx),
            task: Some(task),
            outcome: None,
        }
    }

    /// Asks the loop to stop. Calling it again has no effect.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The loop may already be gone after a failed probe.
            let _ = stop_tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Waits for the loop to end and returns why it ended.
    ///
    /// Without a prior [`stop`](Self::stop) this only returns once a probe fails.
    /// Cancel-safe, so it can sit in a `tokio::select!` next to a shutdown signal.
    pub async fn stopped(&mut self) -> PollOutcome {
        if let Some(task) = self.task.as_mut() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = ?e, "DB polling task did not complete.");
                    PollOutcome::Aborted
                }
            };
            self.task = None;
            self.outcome = Some(outcome);
        }
        self.outcome.clone().unwrap_or(PollOutcome::Aborted)
    }
}

async fn poll_loop<P: LivenessProbe>(
    probe: P,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) -> PollOutcome {
    loop {
        // A stop that arrived while the previous probe ran is honoured before the next one.
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Closed) => {
                tracing::info!("Stopping DB polling.");
                return PollOutcome::Stopped;
            }
            Err(TryRecvError::Empty) => {}
        }

        if let Err(e) = probe.probe().await {
            tracing::error!(error = %e, "DB connection failed. Polling stopped.");
            return PollOutcome::ProbeFailed(e.to_string());
        }
        tracing::debug!("DB ping");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut stop_rx => {
                tracing::info!("Stopping DB polling.");
                return PollOutcome::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(10);

    #[derive(Clone, Default)]
    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        fail_on: Option<usize>,
    }

    impl CountingProbe {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LivenessProbe for CountingProbe {
        async fn probe(&self) -> Result<(), DbError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(call) {
                return Err(DbError::ConnectionError(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probes_once_per_interval() {
        let probe = CountingProbe::default();
        let mut poller = LivenessPoller::start(probe.clone(), INTERVAL);

        // Probes at t=0, 10 and 20.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(probe.calls(), 3);

        poller.stop();
        assert_eq!(poller.stopped().await, PollOutcome::Stopped);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_ends_without_another_probe() {
        let probe = CountingProbe::default();
        let mut poller = LivenessPoller::start(probe.clone(), INTERVAL);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(probe.calls(), 1);

        let requested = Instant::now();
        poller.stop();
        assert_eq!(poller.stopped().await, PollOutcome::Stopped);

        assert!(requested.elapsed() < INTERVAL);
        assert_eq!(probe.calls(), 1);
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_ends_the_loop() {
        let probe = CountingProbe::failing_on(2);
        let mut poller = LivenessPoller::start(probe.clone(), INTERVAL);

        let outcome = poller.stopped().await;
        assert!(matches!(outcome, PollOutcome::ProbeFailed(_)));
        assert_eq!(probe.calls(), 2);

        // No retry afterwards.
        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(probe.calls(), 2);

        // Stopping a finished poller is harmless and the outcome is remembered.
        poller.stop();
        assert_eq!(poller.stopped().await, outcome);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_stops_the_loop() {
        let probe = CountingProbe::default();
        let poller = LivenessPoller::start(probe.clone(), INTERVAL);

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(poller);

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_is_cancel_safe() {
        let probe = CountingProbe::default();
        let mut poller = LivenessPoller::start(probe.clone(), INTERVAL);

        let waited = tokio::time::timeout(Duration::from_secs(15), poller.stopped()).await;
        assert!(waited.is_err());
        assert!(!poller.is_finished());

        poller.stop();
        assert_eq!(poller.stopped().await, PollOutcome::Stopped);
    }

    #[tokio::test]
    async fn table_probe_statement() {
        let options = sqlx::postgres::PgConnectOptions::new().host("127.0.0.1").port(1);
        let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy_with(options);

        let probe = TableProbe::new(pool, "users");
        assert_eq!(probe.statement(), "SELECT 1 FROM users LIMIT 1");
    }
}
