//! `run setup/doctor`: validates env, connectivity and schema
//! before a deployment runs `worker`/`scheduler`/`api` for real.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use meridian_scheduler::{PriorityQueue, WatchlistStore};
use meridian_tenant::Config;

use crate::exit::ExitCode;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Layered config file to validate 
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite database path to validate connectivity/schema against
    #[arg(long, default_value = "meridian.sqlite3")]
    pub db: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl CheckStatus {
    fn icon(self) -> String {
        match self {
            CheckStatus::Ok => "✓".bright_green().bold().to_string(),
            CheckStatus::Warn => "⚠".bright_yellow().bold().to_string(),
            CheckStatus::Fail => "✗".bright_red().bold().to_string(),
        }
    }
}

struct Check {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

fn print_checks(checks: &[Check]) {
    for check in checks {
        println!("  {} {:<28} {}", check.status.icon(), check.name, check.detail.dimmed());
    }
}

pub async fn run(args: DoctorArgs) -> ExitCode {
    let mut checks = Vec::new();
    let mut worst = CheckStatus::Ok;

    let mut note = |status: CheckStatus, name: &'static str, detail: String| {
        if matches!(status, CheckStatus::Fail) || (matches!(status, CheckStatus::Warn) && worst == CheckStatus::Ok) {
            worst = status;
        }
        checks.push(Check { name, status, detail });
    };

    match Config::load(args.config.as_deref()) {
        Ok(config) => note(
            CheckStatus::Ok,
            "config",
            format!("retry_max_attempts={}, hard_cap_usd={}", config.retry_max_attempts, config.hard_cap_usd),
        ),
        Err(err) => note(CheckStatus::Fail, "config", err.to_string()),
    }

    match PriorityQueue::open(&args.db) {
        Ok(pq) => {
            if pq.health().await {
                note(CheckStatus::Ok, "priority queue db", format!("{}", args.db.display()));
            } else {
                note(CheckStatus::Fail, "priority queue db", "health check failed".to_string());
            }

            match WatchlistStore::open(pq.pool()) {
                Ok(_) => note(CheckStatus::Ok, "watchlist schema", "table present".to_string()),
                Err(err) => note(CheckStatus::Fail, "watchlist schema", err.to_string()),
            }
        }
        Err(err) => note(CheckStatus::Fail, "priority queue db", err.to_string()),
    }

    println!("\n{}", "Meridian doctor".bold());
    print_checks(&checks);
    println!();

    match worst {
        CheckStatus::Ok => {
            println!("{}", "all checks passed".bright_green());
            ExitCode::Ok
        }
        CheckStatus::Warn => {
            println!("{}", "passed with warnings".bright_yellow());
            ExitCode::Ok
        }
        CheckStatus::Fail => {
            println!("{}", "one or more checks failed".bright_red());
            if checks.iter().any(|c| c.name == "config" && c.status == CheckStatus::Fail) {
                ExitCode::ConfigInvalid
            } else {
                ExitCode::DependencyUnavailable
            }
        }
    }
}
