//! procsnap - point-in-time process resource snapshot.
//!
//! Collects CPU, memory, thread and run-time figures for every process in
//! `/proc`, writes them to a flat file and validates the result.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use procsnap::collector::{Collector, CollectorConfig};
use procsnap::storage::export::format_line;
use procsnap::storage::model::{ProcessId, ProcessMetrics};
use procsnap::storage::{SnapshotLoader, Validator};

/// Process resource snapshot tool.
#[derive(Parser)]
#[command(name = "procsnap", about = "Process resource snapshot tool", version)]
struct Args {
    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = CollectorConfig::DEFAULT_PROC_PATH, global = true)]
    proc_path: String,

    /// Snapshot file written by `collect`.
    #[arg(short, long, default_value = "ProcessesStatus.txt", global = true)]
    output: PathBuf,

    /// Worker threads computing per-process metrics.
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,

    /// Bound on every /proc read, in milliseconds.
    #[arg(long, value_name = "MS")]
    read_timeout_ms: Option<u64>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Collect a snapshot, export it and validate the export (default).
    Collect,
    /// Validate an exported snapshot. Exits with 1 on failure.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Page through an exported snapshot.
    Show {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entries per page.
        #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        step: u32,

        /// Print pages as JSON arrays.
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            proc_path: self.proc_path.clone(),
            workers: usize::from(self.workers),
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Serialize)]
struct PageEntry {
    pid: ProcessId,
    #[serde(flatten)]
    metrics: ProcessMetrics,
    time: String,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("procsnap={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_collect(args: &Args) -> ExitCode {
    let config = args.collector_config();
    info!(
        "procsnap {}: proc={}, output={}, workers={}, read_timeout={:?}",
        env!("CARGO_PKG_VERSION"),
        config.proc_path,
        args.output.display(),
        config.workers,
        config.read_timeout
    );

    let mut collector = Collector::with_config(config.real_fs(), &config);
    if let Err(e) = collector.collect_and_export(&args.output) {
        error!("no snapshot written: {}", e);
        return ExitCode::FAILURE;
    }

    // A corrupt export is reported, not fatal for the producer.
    let report = Validator::new().validate_file(&args.output);
    if report.passed {
        info!("{} passed validation", args.output.display());
    } else {
        warn!(
            "{} failed validation with {} diagnostics",
            args.output.display(),
            report.diagnostics.len()
        );
    }
    ExitCode::SUCCESS
}

fn run_validate(file: &Path) -> ExitCode {
    let report = Validator::new().validate_file(file);
    for diagnostic in &report.diagnostics {
        println!("{}", diagnostic);
    }
    if report.passed {
        info!("{} passed validation", file.display());
        ExitCode::SUCCESS
    } else {
        error!(
            "{} failed validation with {} diagnostics",
            file.display(),
            report.diagnostics.len()
        );
        ExitCode::FAILURE
    }
}

fn run_show(file: &Path, step: usize, json: bool) -> ExitCode {
    let report = Validator::new().validate_file(file);
    if !report.passed {
        error!("refusing to display {}: validation failed", file.display());
        return ExitCode::FAILURE;
    }

    let mut loader = match SnapshotLoader::from_path(file) {
        Ok(loader) => loader,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    loader.log_entries();

    let mut page_no = 0;
    while !loader.is_exhausted() {
        page_no += 1;
        let page = loader.next_page(step);
        if json {
            let entries: Vec<PageEntry> = page
                .into_iter()
                .map(|(pid, metrics)| PageEntry {
                    pid,
                    metrics,
                    time: metrics.uptime.to_string(),
                })
                .collect();
            match serde_json::to_string(&entries) {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    error!("cannot encode page {}: {}", page_no, e);
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("-- page {} --", page_no);
            for (pid, metrics) in &page {
                println!("{}", format_line(*pid, metrics));
            }
        }
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match &args.command {
        None | Some(Command::Collect) => run_collect(&args),
        Some(Command::Validate { file }) => run_validate(file),
        Some(Command::Show { file, step, json }) => run_show(file, *step as usize, *json),
    }
}
