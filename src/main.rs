use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use attendance_tools::config::Config;
use attendance_tools::cycle::Engine;
use attendance_tools::io::directory::DirectoryFile;
use attendance_tools::io::workbook::WorkbookStore;
use attendance_tools::{Result, ToolError};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&cli.log_level) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|err| ToolError::Logging(err.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
        Command::Plan(args) => execute_plan(args),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let engine = Engine::new(config.engine.clone());
    let mut store = WorkbookStore::new(&config.store.workbook);
    let mut directory = DirectoryFile::new(&config.membership.directory);
    let interval = Duration::from_secs(config.engine.interval_secs);

    let limit = if args.once { Some(1) } else { args.max_cycles };
    info!(
        workbook = %store.path().display(),
        directory = %directory.path().display(),
        interval_secs = config.engine.interval_secs,
        "starting attendance reconciliation"
    );

    let mut completed = 0u64;
    loop {
        let now = Local::now().naive_local();
        match engine.run_cycle(&mut store, &mut directory, now) {
            Ok(report) => info!(
                rows = report.rows_read,
                records = report.records,
                rejected = report.rejected,
                writes = report.writes,
                "cycle complete"
            ),
            Err(err) => error!(error = %err, "cycle failed; retrying next interval"),
        }

        completed += 1;
        if limit.is_some_and(|limit| completed >= limit) {
            return Ok(());
        }
        thread::sleep(interval);
    }
}

fn execute_plan(args: PlanArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let engine = Engine::new(config.engine.clone());
    let store = WorkbookStore::new(&config.store.workbook);

    let preview = engine.preview(&store, Local::now().naive_local())?;
    println!("{}", serde_json::to_string_pretty(&preview)?);

    if args.grants {
        let directory = DirectoryFile::new(&config.membership.directory);
        match engine.pending_grants(&store, &directory) {
            Ok(members) => println!("{}", serde_json::to_string_pretty(&members)?),
            Err(err) => warn!(error = %err, "unable to compute pending grants"),
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile spreadsheet attendance with membership roles."
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run reconciliation cycles on the configured interval.
    Run(RunArgs),
    /// Print the corrections the next cycle would write, without writing.
    Plan(PlanArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Configuration file path.
    #[arg(long)]
    config: PathBuf,

    /// Run a single cycle and exit.
    #[arg(long, conflicts_with = "max_cycles")]
    once: bool,

    /// Stop after this many cycles.
    #[arg(long)]
    max_cycles: Option<u64>,
}

#[derive(clap::Args)]
struct PlanArgs {
    /// Configuration file path.
    #[arg(long)]
    config: PathBuf,

    /// Also list members that would receive the role.
    #[arg(long)]
    grants: bool,
}
