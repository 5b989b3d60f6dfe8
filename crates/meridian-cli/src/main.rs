//! Unified Meridian CLI: `run worker`, `run scheduler`,
//! `run discord-bridge`, `run api`, and `run doctor`.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use clap::{Parser, Subcommand};

mod commands;
mod exit;

use commands::{api, discord_bridge, doctor, scheduler, worker};
use exit::ExitCode;

/// Meridian CLI - ingestion, scheduling, retrieval and mission orchestration
#[derive(Parser)]
#[command(name = "meridian")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tenant-scoped media ingestion, memory and mission orchestration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline worker: dequeue leased jobs and process them
    Worker(worker::WorkerArgs),

    /// Run the scheduler tick loop: poll watchlists, discover, bulk enqueue
    Scheduler(scheduler::SchedulerArgs),

    /// Run the Discord bridge readiness check (command parsing itself is
    /// an external collaborator, out of scope here; )
    DiscordBridge(discord_bridge::DiscordBridgeArgs),

    /// Run the API server (health, metrics, evidence retrieval, mission outbox)
    Api(api::ApiArgs),

    /// Validate env, connectivity and schema
    Doctor(doctor::DoctorArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Worker(args) => worker::run(args).await,
        Commands::Scheduler(args) => scheduler::run(args).await,
        Commands::DiscordBridge(args) => discord_bridge::run(args).await,
        Commands::Api(args) => api::run(args).await,
        Commands::Doctor(args) => doctor::run(args).await,
    };

    std::process::exit(code.code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_known_subcommands() {
        let cli = Cli::try_parse_from(["meridian", "doctor"]).expect("parse doctor");
        assert!(matches!(cli.command, Commands::Doctor(_)));

        let cli = Cli::try_parse_from(["meridian", "worker", "--db", "x.sqlite3"]).expect("parse worker");
        assert!(matches!(cli.command, Commands::Worker(_)));
    }

    #[test]
    fn clap_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["meridian", "not-a-command"]).is_err());
    }
}
