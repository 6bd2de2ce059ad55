//! Operator command-line interface.
//!
//! Housekeeping commands against the governance database: expiry sweeps,
//! session garbage collection, and a status summary. The voting and signing
//! flows run through the dashboard shells, not here.

pub mod config;

use bbsns_governance::governance::engine::sweep_expired;
use bbsns_governance::governance::types::ProposalStatus;
use bbsns_governance::remote::broker::SESSION_RETENTION_SECS;
use bbsns_governance::store::{ProposalStore, SessionStore, SqliteStore};
use bbsns_governance::time::{Clock, SystemClock};
use clap::{Parser, Subcommand};
use config::GovernanceConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BBSNS governance operator tool.
#[derive(Parser)]
#[command(name = "bbsns-governance", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "governance.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default configuration file and create the database.
    Init,
    /// Print proposal and session counts.
    Status,
    /// Reject active proposals whose voting window has closed.
    Sweep,
    /// Delete signing sessions past retention.
    PurgeSessions,
}

/// CLI errors.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Store(#[from] bbsns_governance::store::StoreError),

    #[error(transparent)]
    Engine(#[from] bbsns_governance::governance::engine::EngineError),
}

pub async fn execute(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Init => {
            let config = GovernanceConfig::write_default(&cli.config)?;
            init_logging(&config.logging.level);
            SqliteStore::open(&config.database.path).await?;
            println!(
                "initialized: config at {}, database at {}",
                cli.config.display(),
                config.database.path.display()
            );
            Ok(())
        }
        Command::Status => {
            let config = GovernanceConfig::load_or_default(&cli.config)?;
            init_logging(&config.logging.level);
            let store = SqliteStore::open(&config.database.path).await?;

            let proposals = store.proposals().await?;
            let count = |status: ProposalStatus| {
                proposals.iter().filter(|p| p.status == status).count()
            };
            println!(
                "proposals: {} total ({} active, {} passed, {} rejected, {} executed)",
                proposals.len(),
                count(ProposalStatus::Active),
                count(ProposalStatus::Passed),
                count(ProposalStatus::Rejected),
                count(ProposalStatus::Executed),
            );
            Ok(())
        }
        Command::Sweep => {
            let config = GovernanceConfig::load_or_default(&cli.config)?;
            init_logging(&config.logging.level);
            let store = SqliteStore::open(&config.database.path).await?;

            let rejected = sweep_expired(&store, SystemClock.now_unix()).await?;
            println!("rejected {} expired proposal(s)", rejected);
            Ok(())
        }
        Command::PurgeSessions => {
            let config = GovernanceConfig::load_or_default(&cli.config)?;
            init_logging(&config.logging.level);
            let store = SqliteStore::open(&config.database.path).await?;

            let cutoff = SystemClock.now_unix().saturating_sub(SESSION_RETENTION_SECS);
            let removed = store.purge_sessions(cutoff).await?;
            println!("purged {} signing session(s)", removed);
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    // Ignore the error if a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
