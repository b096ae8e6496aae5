use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use configuration::{load_database_settings, load_poll_settings};
use database::{LivenessPoller, PollOutcome, TableProbe, open_database, redacted_target};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the Till data-access tooling.
#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Check => handle_check().await?,
        Commands::Poll => handle_poll().await?,
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Database connectivity tooling for the vending back office.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the database once and report whether it answers.
    Check,
    /// Keep probing the database until Ctrl-C or until a probe fails.
    Poll,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Opening the pool is fatal on failure; there is nothing useful to do without it.
async fn handle_check() -> Result<()> {
    let settings = load_database_settings().context("Failed to load database settings")?;
    let pool = open_database(&settings)
        .await
        .with_context(|| format!("Failed to open database at {}", redacted_target(&settings)))?;

    println!("Database at {} is reachable.", redacted_target(&settings));
    pool.close().await;
    Ok(())
}

async fn handle_poll() -> Result<()> {
    let settings = load_database_settings().context("Failed to load database settings")?;
    let poll = load_poll_settings().context("Failed to load polling settings")?;
    let pool = open_database(&settings)
        .await
        .with_context(|| format!("Failed to open database at {}", redacted_target(&settings)))?;

    tracing::info!(
        table = %poll.table,
        interval_secs = poll.interval.as_secs(),
        "Starting DB polling."
    );
    let mut poller = LivenessPoller::start(TableProbe::new(pool.clone(), &poll.table), poll.interval);

    let outcome = tokio::select! {
        outcome = poller.stopped() => outcome,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            poller.stop();
            poller.stopped().await
        }
    };

    pool.close().await;

    match outcome {
        PollOutcome::Stopped => Ok(()),
        PollOutcome::ProbeFailed(reason) => anyhow::bail!("Database liveness probe failed: {}", reason),
        PollOutcome::Aborted => anyhow::bail!("Database polling task aborted"),
    }
}
