//! ptest: storage performance checks built on fio.
//!
//! Single binary:
//!   ptest list | show | add | del          → manage stored fio jobs
//!   ptest run <job> --dev <path>           → run a stored job against a device
//!   ptest custom <job> --params <json>     → run an ad-hoc job
//!   ptest suite --dev <path>               → run the benchmark scenario suite

mod baseline;
mod error;
mod logging;
mod metrics;
mod runner;
mod scenario;
mod store;
mod suite;
mod trend;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::baseline::{BaselineTable, DEFAULT_TOLERANCE_PERCENT};
use crate::runner::{FioRunner, JobRunner, RemoteExecutor};
use crate::scenario::Scenario;
use crate::store::ConfigStore;
use crate::suite::Suite;
use crate::trend::{CsvTrendLog, TrendSink};

// ─── Help text ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = "\
ENVIRONMENT:
    PTEST_CONFIG_DIR        Directory holding stored <name>.fio jobs
    PTEST_FIO_BIN           fio executable to invoke
    PTEST_SCRATCH_DIR       Directory for temporary job files
    PTEST_NO_FAIL           Set to 1/true to keep running the suite after a
                            failed scenario

EXAMPLES:
    ptest add seq1 --params '{\"rw\":\"read\",\"bs\":\"4k\",\"size\":\"1G\"}'
    ptest run seq1 --dev /dev/nvme0n1 --output seq1.json
    ptest suite --dev /dev/nvme0n1 --csv trend.csv
    ptest suite --dev /dev/nvme0n1 --baseline trend.csv --tolerance 15";

const SUITE_AFTER_HELP: &str = "\
SCENARIOS:
    rand_read, seq_read, rand_write, seq_write, rand_R70_W30, seq_R70_W30,
    thread_rand_read_scaling3, thread_rand_read_scaling30,
    thread_rand_write_scaling3, thread_rand_write_scaling30,
    thread_rand_R70_W30_scaling3, thread_rand_R70_W30_scaling30

    Use --only <name> (repeatable) to run a subset.

BASELINE:
    A CSV file in the --csv trend layout. Each value may differ from the new
    result by --tolerance percent. Scenarios without a row use the fixed
    thresholds.";

const REMOTE_HELP: &str = "\
Run fio through this command prefix instead of locally; the remote command \
line is appended as one argument (e.g. \"ssh root@10.0.0.2\")";

// ─── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ptest",
    about = "ptest: storage performance checks built on fio",
    after_help = AFTER_HELP,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Directory holding stored fio jobs
    #[arg(long, global = true, env = "PTEST_CONFIG_DIR", default_value = "fio")]
    config_dir: PathBuf,
    /// fio executable
    #[arg(long, global = true, env = "PTEST_FIO_BIN", default_value = "fio")]
    fio_bin: String,
    /// Directory for temporary job files (default: <tmp>/ptest)
    #[arg(long, global = true, env = "PTEST_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[arg(long, global = true, help = REMOTE_HELP)]
    remote_exec: Option<String>,
    /// Copy command for remote runs, with {src} and {dst} placeholders
    /// (e.g. "scp {src} root@10.0.0.2:{dst}")
    #[arg(long, global = true, requires = "remote_exec")]
    remote_copy: Option<String>,
    /// Remote directory receiving job files
    #[arg(long, global = true, default_value = "/root")]
    remote_dir: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored fio jobs
    List,

    /// Print a stored fio job
    Show {
        /// Job name
        name: String,
    },

    /// Store a fio job built from JSON options
    Add {
        /// Job name
        name: String,
        /// fio options as a JSON object (e.g. '{"rw":"read","bs":"4k"}')
        #[arg(long)]
        params: String,
    },

    /// Delete a stored fio job
    Del {
        /// Job name
        name: String,
    },

    /// Run a stored fio job against a device
    Run {
        /// Job name
        name: String,
        /// Device or file fio should test
        #[arg(long, short = 'd')]
        dev: String,
        /// Save fio's raw JSON output to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Run fio with ad-hoc options without storing them
    Custom {
        /// Job name
        name: String,
        /// fio options as a JSON object
        #[arg(long)]
        params: String,
        /// Device or file fio should test (overrides "filename" in --params)
        #[arg(long, short = 'd')]
        dev: Option<String>,
        /// Save fio's raw JSON output to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Run the benchmark scenario suite
    #[command(after_help = SUITE_AFTER_HELP)]
    Suite {
        /// Device or file fio should test
        #[arg(long, short = 'd')]
        dev: String,
        /// Keep running after a failed scenario
        #[arg(long, short = 'n')]
        no_fail: bool,
        /// Baseline CSV to compare against instead of fixed thresholds
        #[arg(long, short = 'c')]
        baseline: Option<PathBuf>,
        /// Allowed divergence from the baseline, in percent
        #[arg(
            long,
            short = 'w',
            default_value_t = DEFAULT_TOLERANCE_PERCENT,
            value_parser = clap::value_parser!(u8).range(0..=100)
        )]
        tolerance: u8,
        /// Append one CSV row per scenario to this file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Run only these scenarios, in suite order (repeatable)
        #[arg(long = "only", value_name = "SCENARIO")]
        only: Vec<String>,
    },
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    let global = &cli.global;

    if let Err(err) = logging::init_tracing(
        &global.log_level,
        &global.log_format,
        global.log_file.as_deref(),
    ) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Commands::List => run_list(global),
        Commands::Show { name } => run_show(global, name),
        Commands::Add { name, params } => run_add(global, name, params),
        Commands::Del { name } => run_del(global, name),
        Commands::Run { name, dev, output } => run_stored(global, name, dev, output.as_deref()),
        Commands::Custom {
            name,
            params,
            dev,
            output,
        } => run_custom(global, name, params, dev.as_deref(), output.as_deref()),
        Commands::Suite {
            dev,
            no_fail,
            baseline,
            tolerance,
            csv,
            only,
        } => run_suite(
            global,
            &SuiteOptions {
                dev,
                no_fail: resolve_no_fail(*no_fail),
                baseline: baseline.as_deref(),
                tolerance: *tolerance,
                csv: csv.as_deref(),
                only,
            },
        ),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// ─── Settings ─────────────────────────────────────────────────────────────────

fn env_flag_enabled(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

fn resolve_no_fail(flag: bool) -> bool {
    flag || env_flag_enabled("PTEST_NO_FAIL")
}

fn resolve_scratch_dir(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::temp_dir().join("ptest"))
}

fn build_runner(global: &GlobalArgs) -> Result<FioRunner> {
    let scratch_dir = resolve_scratch_dir(global.scratch_dir.as_deref());
    match (&global.remote_exec, &global.remote_copy) {
        (None, _) => Ok(FioRunner::local(&global.fio_bin, scratch_dir)),
        (Some(_), None) => bail!("--remote-exec needs --remote-copy to transfer job files"),
        (Some(exec), Some(copy)) => {
            let remote = RemoteExecutor::new(copy, exec, &global.remote_dir)?;
            Ok(FioRunner::new(&global.fio_bin, scratch_dir, Box::new(remote)))
        }
    }
}

// ─── Stored jobs ──────────────────────────────────────────────────────────────

fn run_list(global: &GlobalArgs) -> Result<ExitCode> {
    let store = ConfigStore::new(&global.config_dir);
    let names = store.list()?;
    if names.is_empty() {
        tracing::info!(dir = %store.dir().display(), "no stored fio jobs");
    }
    for name in names {
        println!("{name}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_show(global: &GlobalArgs, name: &str) -> Result<ExitCode> {
    let store = ConfigStore::new(&global.config_dir);
    print!("{}", store.get(name)?);
    Ok(ExitCode::SUCCESS)
}

fn run_add(global: &GlobalArgs, name: &str, params_json: &str) -> Result<ExitCode> {
    let params = store::params_from_json(params_json)?;
    let store = ConfigStore::new(&global.config_dir);
    store.add(name, &params)?;
    println!("Test {name} added");
    Ok(ExitCode::SUCCESS)
}

fn run_del(global: &GlobalArgs, name: &str) -> Result<ExitCode> {
    ConfigStore::new(&global.config_dir).delete(name)?;
    println!("Test {name} deleted");
    Ok(ExitCode::SUCCESS)
}

// ─── Single runs ──────────────────────────────────────────────────────────────

fn run_stored(
    global: &GlobalArgs,
    name: &str,
    dev: &str,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let store = ConfigStore::new(&global.config_dir);
    let job = store.prepare(name, dev)?;
    let runner = build_runner(global)?;

    tracing::info!(job = name, dev, "start performance testing");
    let raw = runner.run(&job)?;
    if let Some(path) = output {
        save_output(path, &raw)?;
    }

    let record = metrics::extract(&raw)?;
    for line in record.summary_lines() {
        println!("{line}");
    }
    tracing::info!(job = name, "end performance testing");
    Ok(ExitCode::SUCCESS)
}

fn save_output(path: &Path, raw: &str) -> Result<()> {
    std::fs::write(path, raw)
        .with_context(|| format!("cannot write fio output to {}", path.display()))
}

fn run_custom(
    global: &GlobalArgs,
    name: &str,
    params_json: &str,
    dev: Option<&str>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let mut params = store::params_from_json(params_json)?;
    if let Some(dev) = dev {
        params.insert("filename".to_string(), dev.to_string());
    }
    let runner = build_runner(global)?;

    tracing::info!(job = name, "start performance testing");
    let record = runner.run_params(name, &params)?;
    if let Some(path) = output {
        save_output(path, &record.raw)?;
    }
    for line in record.summary_lines() {
        println!("{line}");
    }
    tracing::info!(job = name, "end performance testing");
    Ok(ExitCode::SUCCESS)
}

// ─── Suite ────────────────────────────────────────────────────────────────────

struct SuiteOptions<'a> {
    dev: &'a str,
    no_fail: bool,
    baseline: Option<&'a Path>,
    tolerance: u8,
    csv: Option<&'a Path>,
    only: &'a [String],
}

fn select_scenarios(only: &[String]) -> Result<Vec<Scenario>> {
    if only.is_empty() {
        return Ok(scenario::SCENARIOS.to_vec());
    }
    for name in only {
        if scenario::find(name).is_none() {
            bail!("unknown scenario '{name}'");
        }
    }
    Ok(scenario::SCENARIOS
        .iter()
        .filter(|s| only.iter().any(|name| name == s.name))
        .copied()
        .collect())
}

fn run_suite(global: &GlobalArgs, opts: &SuiteOptions<'_>) -> Result<ExitCode> {
    let scenarios = select_scenarios(opts.only)?;

    let baseline = match opts.baseline {
        Some(path) => {
            let table = BaselineTable::load(path, opts.tolerance)?;
            if table.is_empty() {
                tracing::warn!(path = %path.display(), "baseline has no rows, using fixed thresholds");
            }
            tracing::info!(
                path = %path.display(),
                rows = table.len(),
                tolerance = opts.tolerance,
                "comparing against baseline"
            );
            Some(table)
        }
        None => None,
    };

    let trend = match opts.csv {
        Some(path) => {
            let log = CsvTrendLog::create(path)?;
            tracing::info!(path = %log.path().display(), "recording results");
            TrendSink::csv(log)
        }
        None => TrendSink::disabled(),
    };
    let runner = build_runner(global)?;

    let suite = Suite {
        scenarios: &scenarios,
        runner: &runner,
        baseline: baseline.as_ref(),
        trend: &trend,
        no_fail: opts.no_fail,
    };
    let summary = suite
        .run(&scenario::common_params(opts.dev))
        .context("testing failed")?;

    println!("{} passed, {} failed", summary.passed(), summary.failed());
    for outcome in &summary.outcomes {
        if let Err(err) = &outcome.result {
            println!("  {}: {err}", outcome.name);
        }
    }

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
