use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigError, RunConfig};
use crate::runner::{open_catalog, run_catalog, summarize_report, RunError};

#[derive(Debug, Parser)]
#[command(
    name = "cci-verify",
    version,
    about = "Verify that every dataset of a climate data catalog opens, subsets, caches and maps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe every dataset of a catalog and write the day's raw report
    Run(RunArgs),
    /// Build the sorted, failed, summary and flags artifacts from a raw report
    Summarize(SummarizeArgs),
    /// Print the support decision for one dataset id as JSON
    Classify(ClassifyArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Catalog name [default: cci-store]
    pub catalog: Option<String>,
    /// Output subdirectory, e.g. `smoke`
    pub mode: Option<String>,
    /// YAML run configuration (also read from CCI_VERIFY_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Root directory for report artifacts
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl TargetArgs {
    fn resolve(&self) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::resolve(self.config.as_deref())?;
        if let Some(catalog) = &self.catalog {
            config.catalog = catalog.clone();
        }
        if let Some(mode) = &self.mode {
            config.mode = Some(mode.clone());
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Catalog YAML file [default: data/catalogs/<catalog>.yaml]
    #[arg(long)]
    pub catalog_file: Option<PathBuf>,
    /// Per-probe timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Worker threads [default: cores - 1]
    #[arg(long, conflicts_with = "sequential")]
    pub workers: Option<usize>,
    /// Probe one dataset at a time
    #[arg(long)]
    pub sequential: bool,
    /// Base seed for region, time and variable sampling
    #[arg(long)]
    pub seed: Option<u64>,
    /// Run the summary phase after probing
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Day of the run to summarize [default: today]
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    pub data_id: String,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Log to stderr, filtered by `RUST_LOG` (default `cci_verify=info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cci_verify=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };
    let result = match cli.command {
        Command::Run(args) => handle_run(&args),
        Command::Summarize(args) => handle_summarize(&args),
        Command::Classify(args) => handle_classify(&args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn handle_run(args: &RunArgs) -> Result<i32, RunError> {
    let mut config = args.target.resolve()?;
    if let Some(file) = &args.catalog_file {
        config.catalog_file = Some(file.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if args.sequential {
        config.sequential = true;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let catalog = open_catalog(&config)?;
    let date = today();
    let stats = run_catalog(&config, &catalog, date)?;
    println!(
        "Probed {} datasets ({} unsupported, {} failed); report: {}",
        stats.datasets,
        stats.unsupported,
        stats.failed,
        stats.report.display()
    );
    if args.summarize {
        summarize_report(&config, date)?;
    }
    Ok(0)
}

fn handle_summarize(args: &SummarizeArgs) -> Result<i32, RunError> {
    let config = args.target.resolve()?;
    let date = args.date.unwrap_or_else(today);
    let stats = summarize_report(&config, date)?;
    println!(
        "Summarized {} rows in {} categories ({} failed, {} expired artifacts removed)",
        stats.rows, stats.categories, stats.failed, stats.removed
    );
    Ok(0)
}

fn handle_classify(args: &ClassifyArgs) -> Result<i32, RunError> {
    let config = RunConfig::resolve(args.config.as_deref())?;
    let decision = config.policy().classify(&args.data_id);
    let payload = serde_json::json!({
        "data_id": args.data_id,
        "supported": decision.supported,
        "reason": decision.reason,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
    );
    Ok(if decision.supported { 0 } else { 1 })
}
