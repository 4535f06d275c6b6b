//! `datadiff` binary.
//!
//! Finds the record identifiers present in only one of two data stores and prints them
//! to stdout as `<id>,<code>` lines, `-1` marking identifiers missing from the secondary
//! store and `1` identifiers missing from the primary one. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use clap::{Args as ClapArgs, Parser};
use datadiff_config::shared::DiffConfig;
use datadiff_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_diff_config;
use crate::core::start_diff_with_config;
use crate::error::CliResult;

mod config;
mod core;
mod error;

/// Reconciles the record identifiers of two data stores.
///
/// Without driver flags, the configuration is read from the `configuration` directory
/// (`base.yaml` and `{APP_ENVIRONMENT}.yaml`) and `APP_`-prefixed environment variables.
#[derive(Parser, Debug)]
#[command(name = "datadiff", version)]
pub(crate) struct Args {
    #[command(flatten)]
    primary: PrimaryArgs,

    #[command(flatten)]
    secondary: SecondaryArgs,

    /// Initial bin width: 10, 100, 1000 or 10000
    #[arg(long)]
    interval: Option<i64>,

    /// Maximum number of ranges scanned concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Also print every unresolved range at each histogram level
    #[arg(long)]
    report_unresolved: bool,

    /// Deadline of a single fetch, in milliseconds
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    /// Attempts per fetch for connection failures and timeouts
    #[arg(long)]
    retry_attempts: Option<u32>,

    /// Directory holding the configuration files
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

/// Flags describing one data source.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceArgs {
    pub(crate) driver: Option<String>,
    pub(crate) conn: String,
    pub(crate) conf: String,
    pub(crate) conf_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct PrimaryArgs {
    /// Driver of the primary source: memory, mysql, elasticsearch, elasticsearch7 or elasticsearch8
    #[arg(long = "primary-driver", alias = "mdriver", requires = "secondary_driver")]
    primary_driver: Option<String>,

    /// Connection string of the primary source
    #[arg(long = "primary-conn", alias = "mconn", default_value = "")]
    primary_conn: String,

    /// Driver options of the primary source, as a JSON object
    #[arg(long = "primary-conf", alias = "mconf", default_value = "{}")]
    primary_conf: String,

    /// File holding the driver options of the primary source
    #[arg(long = "primary-conf-file", alias = "mconffile", conflicts_with = "primary_conf")]
    primary_conf_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct SecondaryArgs {
    /// Driver of the secondary source
    #[arg(long = "secondary-driver", alias = "sdriver", requires = "primary_driver")]
    secondary_driver: Option<String>,

    /// Connection string of the secondary source
    #[arg(long = "secondary-conn", alias = "sconn", default_value = "")]
    secondary_conn: String,

    /// Driver options of the secondary source, as a JSON object
    #[arg(long = "secondary-conf", alias = "sconf", default_value = "{}")]
    secondary_conf: String,

    /// File holding the driver options of the secondary source
    #[arg(
        long = "secondary-conf-file",
        alias = "sconffile",
        conflicts_with = "secondary_conf"
    )]
    secondary_conf_file: Option<PathBuf>,
}

impl From<&PrimaryArgs> for SourceArgs {
    fn from(args: &PrimaryArgs) -> Self {
        Self {
            driver: args.primary_driver.clone(),
            conn: args.primary_conn.clone(),
            conf: args.primary_conf.clone(),
            conf_file: args.primary_conf_file.clone(),
        }
    }
}

impl From<&SecondaryArgs> for SourceArgs {
    fn from(args: &SecondaryArgs) -> Self {
        Self {
            driver: args.secondary_driver.clone(),
            conn: args.secondary_conn.clone(),
            conf: args.secondary_conf.clone(),
            conf_file: args.secondary_conf_file.clone(),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs that cannot be set up are not worth failing the run for.
    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME")) {
        Ok(flusher) => Some(flusher),
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            None
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(args: &Args) -> CliResult<()> {
    let config = load_diff_config(args)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))
}

async fn async_main(config: DiffConfig) -> CliResult<()> {
    let summary = start_diff_with_config(config).await?;

    info!(
        mismatches = summary.mismatches(),
        only_primary = summary.only_primary,
        only_secondary = summary.only_secondary,
        "datadiff finished"
    );

    Ok(())
}
