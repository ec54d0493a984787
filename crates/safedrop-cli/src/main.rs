//! safedrop: operator CLI for download tokens, the scanning daemon and rate limits.
//!
//! Reads the same environment as the API server (TOKEN_SECRET, CLAMAV_*,
//! RATE_LIMIT_*, ...). Output is JSON on stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use safedrop_cli::{
    init_tracing, issue_token, rate_limiter, rate_status, scan_client, scan_path, system_clock,
    token_issuer, verify_token,
};
use safedrop_core::Config;
use serde::Serialize;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "safedrop", about = "Safedrop operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a download token for a subject's document
    IssueToken {
        /// Subject id (positive integer)
        #[arg(long)]
        subject: u64,
        /// Lifetime in seconds, defaults to TOKEN_LIFETIME_SECS
        #[arg(long)]
        lifetime: Option<u64>,
    },
    /// Check a download token and print the subject it names
    VerifyToken {
        token: String,
    },
    /// Check that the scanning daemon answers PING
    Ping,
    /// Scan a local file with the scanning daemon
    Scan {
        path: std::path::PathBuf,
    },
    /// Show the download rate limit window for a client identifier
    RateStatus {
        /// Client address as seen by the server
        identifier: String,
    },
    /// Clear the download rate limit window for a client identifier
    RateReset {
        identifier: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context(
        "Failed to load configuration. Set STORAGE_ROOT, DOCUMENTS_DIR and TOKEN_SECRET",
    )?;

    let ok = match cli.command {
        Commands::IssueToken { subject, lifetime } => {
            let issuer = token_issuer(&config, system_clock())?;
            print_json(&issue_token(&issuer, subject, lifetime)?)?;
            true
        }
        Commands::VerifyToken { token } => {
            let issuer = token_issuer(&config, system_clock())?;
            let check = verify_token(&issuer, &token);
            print_json(&check)?;
            check.valid
        }
        Commands::Ping => {
            let client = scan_client(&config);
            let reachable = client.ping_async().await;
            print_json(&safedrop_cli::PingReport {
                address: client.address(),
                reachable,
            })?;
            reachable
        }
        Commands::Scan { path } => {
            let client = scan_client(&config);
            let report = tokio::task::spawn_blocking(move || scan_path(&client, &path))
                .await
                .context("Scan task failed")??;
            print_json(&report)?;
            report.is_clean()
        }
        Commands::RateStatus { identifier } => {
            let limiter = rate_limiter(&config, system_clock())?;
            print_json(&rate_status(&limiter, &identifier))?;
            true
        }
        Commands::RateReset { identifier } => {
            let limiter = rate_limiter(&config, system_clock())?;
            limiter.reset(&identifier);
            tracing::info!("Rate limit window cleared");
            print_json(&serde_json::json!({ "identifier": identifier, "reset": true }))?;
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
