#![allow(clippy::uninlined_format_args)]

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use find_info::config::Config;
use find_info::errors::exit_code_for;
use find_info::jobs::{run_jobs, select_jobs};
use find_info::report::{parse_email_arg, read_email_list};
use find_info::webdriver::BrowserType;

// Exit codes
const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "find-info")]
#[command(about = "Export per-user device inventory from the device management portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./find-info.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect devices for the email list and write the report
    Run {
        /// Run configured jobs whose name contains this text
        #[arg(short, long, default_value = "mem")]
        filter: String,

        /// Comma separated emails, instead of the email list workbook
        #[arg(long, conflicts_with = "email_list")]
        emails: Option<String>,

        /// Email list workbook (defaults to the configured one)
        #[arg(long)]
        email_list: Option<PathBuf>,

        /// Browser to use instead of a random pick from browser_list
        #[arg(short, long)]
        browser: Option<BrowserType>,
    },

    /// List configured jobs
    Jobs {
        /// Mark jobs whose name contains this text
        #[arg(short, long, default_value = "")]
        filter: String,
    },

    /// Validate and print the effective locator catalog
    Locators,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let exit_code = exit_code_for(&err);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log_file_path())?;

    match cli.command {
        Commands::Run {
            filter,
            emails,
            email_list,
            browser,
        } => {
            // Emails are read before any browser is started
            let emails = match emails {
                Some(list) => parse_email_arg(&list),
                None => {
                    let path = email_list.unwrap_or_else(|| config.email_list_path());
                    read_email_list(&path)
                        .with_context(|| format!("Failed to read email list {}", path.display()))?
                }
            };
            info!("Collecting devices for {} email(s)", emails.len());

            let outcomes = run_jobs(Arc::new(config), &filter, emails, browser).await?;
            for outcome in outcomes {
                let output = json!({
                    "job": outcome.job,
                    "records": outcome.records,
                    "report": outcome.report,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        Commands::Jobs { filter } => {
            let selected: Vec<&str> = select_jobs(&config.job_list, &filter)
                .into_iter()
                .map(|job| job.name.as_str())
                .collect();
            for job in &config.job_list {
                let marker = if selected.contains(&job.name.as_str()) { "*" } else { " " };
                println!("{} {:<40} {}", marker, job.name, job.url);
            }
        }

        Commands::Locators => {
            let catalog = config.catalog()?;
            for (view, role, locator) in catalog.iter() {
                println!(
                    "{:<32} {:<6} {:<10} {}",
                    format!("{}.{}", view, role),
                    format!("{:?}", locator.strategy).to_lowercase(),
                    locator.scope.to_string(),
                    locator.selector
                );
            }
        }
    }

    Ok(())
}

/// Log to stderr and append plain text to the configured log file
fn init_logging(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "find_info=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr) // Output logs to stderr
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}
