use std::path::PathBuf;

use anyhow::{Context as _, Result};
use apis::azure::{self, ArmClient, Credentials};
use clap::Parser;
use config::Config;
use report::RunOptions;
use time_window::ScanType;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod apis;
mod archive;
mod config;
mod discovery;
mod report;
mod source;
mod time_window;
mod workbook;

/// Collects hourly usage metrics for Azure AI resources and writes them as
/// per-subscription reports.
#[derive(Parser, Debug)]
struct CliArgs {
    /// Identifies this run; used to name the working directory.
    job_id: u64,

    /// "Monthly", "Weekly", or anything else for a daily scan.
    scan_type: String,

    /// Base path of the output. The report is written to RESULT_FILE.zip and
    /// RESULT_FILE.xlsx.
    result_file: PathBuf,

    /// A TOML file listing subscriptions, resource types, and metric names.
    /// If omitted, the built-in lists are used.
    #[arg(long, env = "AIMETRIC_CONFIG")]
    config: Option<PathBuf>,

    /// The file holding the service principal credentials.
    #[arg(long, env = "AIMETRIC_CREDENTIALS", default_value = azure::DEFAULT_CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// The directory to create the temporary working directory in.
    #[arg(long, default_value = None)]
    work_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let CliArgs { job_id, scan_type, result_file, config, credentials, work_dir } =
        CliArgs::parse();

    let config = Config::load(config.as_deref())?;
    let credentials = Credentials::load(&credentials)?;
    let token =
        azure::get_token(&config.login_endpoint, &config.management_endpoint, &credentials)?;
    let client = ArmClient::new(&config.management_endpoint, token)
        .context("invalid management endpoint")?;

    let options = RunOptions {
        job_id,
        scan_type: ScanType::parse(&scan_type),
        result_file,
        work_dir,
        now: chrono::Utc::now().naive_utc(),
    };
    let summary = report::run(&client, &config, &options)?;

    info!(
        "wrote {} rows for {} resources across {} subscriptions covering {}",
        summary.rows,
        summary.resources,
        summary.reports.len(),
        summary.window.timespan()
    );
    if summary.partial_listings > 0 {
        info!(
            "{} resource listings used derived kinds or skipped unreadable items",
            summary.partial_listings
        );
    }
    for outcome in &summary.malformed_listings {
        warn!(
            "the {} listing for {} could not be read; its resources are missing from the report",
            outcome.resource_type, outcome.subscription
        );
    }
    info!("archive: {}", summary.archive.display());
    if let Some(workbook) = &summary.workbook {
        info!("workbook: {}", workbook.display());
    }

    Ok(())
}
