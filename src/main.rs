// src/main.rs

//! UNREELED: daily media release aggregation CLI.
//!
//! Fetches releases for a target date from the configured providers,
//! normalizes them into a single dataset and writes
//! `releases_<date>.json` for the static site renderer.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use unreeled::error::{AppError, Result};
use unreeled::models::{Config, Credentials};
use unreeled::pipeline::{run_ingest, run_show, run_validate};
use unreeled::storage::LocalStorage;

#[derive(Parser, Debug)]
#[command(
    name = "unreeled",
    version = "0.1.0",
    about = "Daily media release aggregator"
)]

/// CLI Arguments
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and write releases for a target date
    Ingest {
        /// Target date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Days back from today (ignored when --date is given)
        #[arg(long, default_value_t = 0)]
        days_back: u64,
        /// Override the configured output directory
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate configuration without touching the network
    Validate,
    /// Summarize a previously written batch
    Show {
        /// Target date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
    },
}

fn resolve_date(date: Option<&str>, days_back: u64) -> Result<NaiveDate> {
    match date {
        Some(s) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AppError::Date(s.to_string()))
        }
        None => Ok(Utc::now().date_naive() - Duration::days(days_back as i64)),
    }
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "error" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Ingest {
            date,
            days_back,
            output,
        } => {
            let mut config = Config::load_or_default(&cli.config);
            if let Some(dir) = output {
                config.ingest.output_dir = dir;
            }
            // Configuration errors are fatal before any network call.
            config.validate()?;

            let date = resolve_date(date.as_deref(), days_back)?;
            let credentials = Credentials::from_env();
            let storage = LocalStorage::new(PathBuf::from(&config.ingest.output_dir));
            run_ingest(&config, &credentials, date, &storage).await?;
        }
        Command::Validate => run_validate(std::path::Path::new(&cli.config))?,
        Command::Show { date } => {
            let config = Config::load_or_default(&cli.config);
            let date = resolve_date(date.as_deref(), 0)?;
            let storage = LocalStorage::new(PathBuf::from(&config.ingest.output_dir));
            run_show(&storage, date).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_explicit_date() {
        let date = resolve_date(Some("2026-02-20"), 3).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
    }

    #[test]
    fn resolve_days_back() {
        let date = resolve_date(None, 2).unwrap();
        assert_eq!(date, Utc::now().date_naive() - Duration::days(2));
    }

    #[test]
    fn rejects_bad_date() {
        assert!(resolve_date(Some("02/20/2026"), 0).is_err());
    }

    #[test]
    fn rejects_negative_days_back() {
        assert!(Cli::try_parse_from(["unreeled", "ingest", "--days-back", "-1"]).is_err());
        assert!(Cli::try_parse_from(["unreeled", "ingest", "--days-back", "3"]).is_ok());
    }
}
