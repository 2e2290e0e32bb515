//! GateSplit CLI Entry Point
//!
//! Provides command-line interface for splitting a simulation into jobs.
//!
//! # Usage
//!
//! ```bash
//! # Split mac/main.mac into 10 jobs and submit them
//! gatesplit
//!
//! # 50 jobs sharing 10^8 primaries
//! gatesplit --mac mac/main.mac -j 50 --primaries 100000000
//!
//! # Slice the simulated time window, print commands only
//! gatesplit -j 20 --splittime --dry
//!
//! # Read options from a YAML file, overriding the job count
//! gatesplit --config run.yaml -j 4
//! ```

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::info;

use gatesplit::run::{Orchestrator, RunConfig};
use gatesplit::{APP_NAME, VERSION};

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Error => {
                    let line = format!("[{}] {}", record.level(), record.args());
                    writeln!(buf, "{}", line.red())
                }
                log::Level::Warn => {
                    let line = format!("[{}] {}", record.level(), record.args());
                    writeln!(buf, "{}", line.yellow())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    let defaults = RunConfig::default();
    println!("Usage: gatesplit [OPTIONS]");
    println!();
    println!("Split a GATE simulation into jobs and submit them.");
    println!();
    println!("Options:");
    println!("  --mac PATH          Input macro file (default: {})", defaults.mac.display());
    println!("  -j, --jobs N        Number of jobs (default: {})", defaults.jobs);
    println!("  --primaries N       Total number of primaries for all jobs");
    println!("  --releasedir DIR    GATE release directory (default: Gate in PATH)");
    println!("  --params STRING     Extra parameters for GATE");
    println!("  --timestart T       Time start for the first job");
    println!("  --timeslice T       Time duration for one job");
    println!("  --timestop T        Time stop for the last job");
    println!("  --splittime         Divide the time window into one slice per job");
    println!("  --output DIR        Output folder (default: run.XXXX)");
    println!("  --copydata          Copy data into the output folder instead of linking it");
    println!("  --dry               Stage files and print the commands without running them");
    println!("  --domain NAME       Cluster DNS domain (default: from the host name)");
    println!("  --templates DIR     Directory holding the job script templates");
    println!("  --config FILE       Read options from a YAML file; flags override it");
    println!("  -v, --verbose       Enable debug logging");
    println!("  -h, --help          Show this help message");
    println!("  -V, --version       Show version information");
}

/// Command-line options beyond the run configuration itself.
#[derive(Debug)]
struct Cli {
    config: RunConfig,
    verbose: bool,
}

/// Returns the value following flag `args[*i]`, advancing `i`.
fn flag_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", flag, value))
}

/// Parses command-line arguments into a Cli struct.
///
/// A `--config` file, wherever it appears, is loaded first so that every
/// other flag overrides it.
fn parse_arguments(args: &[String]) -> Result<Cli, Box<dyn Error>> {
    let mut config = match args.iter().position(|arg| arg == "--config") {
        Some(index) => {
            let path = args
                .get(index + 1)
                .ok_or("--config requires a value")?;
            RunConfig::load(&PathBuf::from(path))?
        }
        None => RunConfig::default(),
    };
    let mut verbose = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = args[i].as_str();

        match arg {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => verbose = true,
            "--splittime" => config.split_time = true,
            "--copydata" => config.copy_data = true,
            "--dry" | "--dry-run" => config.dry_run = true,
            "--config" => {
                flag_value(args, &mut i)?;
            }
            "--mac" => config.mac = PathBuf::from(flag_value(args, &mut i)?),
            "-j" | "--j" | "--jobs" => {
                config.jobs = parse_number(arg, flag_value(args, &mut i)?)?;
            }
            "--primaries" | "--numberprimaries" => {
                config.primaries = parse_number(arg, flag_value(args, &mut i)?)?;
            }
            "--releasedir" => config.release_dir = flag_value(args, &mut i)?.to_string(),
            "--params" | "--paramtogate" => config.params = flag_value(args, &mut i)?.to_string(),
            "--timestart" => config.time_start = parse_number(arg, flag_value(args, &mut i)?)?,
            "--timeslice" => config.time_slice = parse_number(arg, flag_value(args, &mut i)?)?,
            "--timestop" => config.time_stop = parse_number(arg, flag_value(args, &mut i)?)?,
            "--output" => {
                let dir = flag_value(args, &mut i)?;
                config.output = (!dir.is_empty()).then(|| PathBuf::from(dir));
            }
            "--domain" => config.cluster_domain = Some(flag_value(args, &mut i)?.to_string()),
            "--templates" => {
                config.job_template_dir = Some(PathBuf::from(flag_value(args, &mut i)?));
            }
            other => return Err(format!("Unexpected argument: {}", other).into()),
        }
        i += 1;
    }

    Ok(Cli { config, verbose })
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    let cli = parse_arguments(&args).map_err(|e| {
        eprintln!("{} {}", "Error:".red(), e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(cli.verbose);
    info!("{} v{}", APP_NAME, VERSION);

    if cli.config.dry_run {
        info!("Mode: DRY RUN (commands will be printed, not executed)");
    }

    let outcome = Orchestrator::new(cli.config).run()?;

    println!();
    println!("Output folder: {}", outcome.output_dir.display());
    println!("{}", outcome.report.summary());

    if outcome.report.has_failures() {
        return Err(format!(
            "{} job(s) could not be submitted",
            outcome.report.failed_jobs().len()
        )
        .into());
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{}", format!("Error: {}", e).red());
            ExitCode::FAILURE
        }
    }
}
