//! Run Orchestration
//!
//! Drives a complete split run:
//! 1. Validates the option combination
//! 2. Locates the job template, simulation release and macro layout
//! 3. Loads, indexes and rewrites the macro tree
//! 4. Creates and stages the output directory
//! 5. Builds one submission command per job
//! 6. Runs the commands one after another, or prints them in dry-run mode

use std::path::PathBuf;

use log::{debug, error, info, warn};

use super::config::RunConfig;
use super::environment::{dns_domain, find_executable, locate_job_template, resolve_release_dir};
use super::staging::{
    create_output_dir, run_id, stage_data, write_manifest, MacroLayout, RunRecord,
};
use crate::error::{Result, SplitError};
use crate::jobs::{
    slice_starts, slice_stops, split_primaries, split_time, JobContext, JobOutcome, QueueBackend,
    SubmissionCommand, SubmissionCommandBuilder, SubmissionReport,
};
use crate::macros::{load_macro_graph, write_macro_files, Attribute, AttributeRewriter, JobValues};

/// Queue-related facts about the host, resolved once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostEnvironment {
    /// Path of `qsub`, if installed
    pub qsub: Option<PathBuf>,
    /// DNS domain of the host
    pub domain: Option<String>,
}

impl HostEnvironment {
    /// Probes PATH and the host name; a configured domain wins over the probe.
    pub fn detect(config: &RunConfig) -> Self {
        let qsub = find_executable("qsub");
        let domain = config.cluster_domain.clone().or_else(dns_domain);
        debug!("Host environment: qsub={:?}, domain={:?}", qsub, domain);
        Self { qsub, domain }
    }

    pub fn backend(&self) -> QueueBackend {
        QueueBackend::select(self.qsub.is_some(), self.domain.as_deref())
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub backend: QueueBackend,
    pub commands: Vec<SubmissionCommand>,
    pub report: SubmissionReport,
}

/// Rewrites primaries and time commands for the run's jobs.
///
/// Placeholders are generated in this order: primaries, explicit time
/// constants, then the per-job start and stop of a time split. In a time
/// split the window bounds come from the options when non-zero, otherwise
/// from the macro files.
pub fn apply_job_parameters(rewriter: &mut AttributeRewriter, config: &RunConfig) -> Result<()> {
    let jobs = rewriter.jobs();

    if config.primaries != 0 {
        let shares = split_primaries(config.primaries, jobs);
        info!(
            "Splitting {} primaries over {} jobs ({}..{} per job)",
            config.primaries,
            jobs,
            shares.iter().min().copied().unwrap_or(0),
            shares.iter().max().copied().unwrap_or(0)
        );
        rewriter.substitute(Attribute::TotalPrimaries, JobValues::scalar(&shares))?;
    }

    if config.time_slice != 0.0 {
        rewriter.substitute(Attribute::TimeSlice, JobValues::scalar(&vec![config.time_slice; jobs]))?;
    }

    if !config.split_time {
        for (attribute, value) in [
            (Attribute::TimeStart, config.time_start),
            (Attribute::TimeStop, config.time_stop),
        ] {
            if value != 0.0 {
                rewriter.substitute(attribute, JobValues::scalar(&vec![value; jobs]))?;
            }
        }
        return Ok(());
    }

    let start = if config.time_start != 0.0 {
        config.time_start
    } else {
        rewriter.resolve_f64(Attribute::TimeStart)?
    };
    let stop = if config.time_stop != 0.0 {
        config.time_stop
    } else {
        rewriter.resolve_f64(Attribute::TimeStop)?
    };
    if stop <= start {
        return Err(SplitError::InvalidOptions(format!(
            "cannot split time: stop ({}) is not after start ({})",
            stop, start
        )));
    }

    let slices = split_time(start, stop, jobs);
    info!(
        "Splitting time [{}, {}) into {} slices of {}",
        start,
        stop,
        jobs,
        (stop - start) / jobs as f64
    );
    rewriter.substitute(Attribute::TimeStart, JobValues::scalar(&slice_starts(&slices)))?;
    rewriter.substitute(Attribute::TimeStop, JobValues::scalar(&slice_stops(&slices)))?;
    Ok(())
}

/// Top-level driver of a split run.
///
/// # Example
///
/// ```rust,no_run
/// use gatesplit::run::{Orchestrator, RunConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RunConfig {
///         jobs: 20,
///         split_time: true,
///         dry_run: true,
///         ..RunConfig::default()
///     };
///     let outcome = Orchestrator::new(config).run()?;
///     println!("{}", outcome.report.summary());
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    config: RunConfig,
    working_dir: Option<PathBuf>,
    host: Option<HostEnvironment>,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            working_dir: None,
            host: None,
        }
    }

    /// Directory relative paths are resolved against (default: current directory).
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    /// Uses the given host facts instead of probing the machine.
    pub fn set_host(&mut self, host: HostEnvironment) {
        self.host = Some(host);
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes the run.
    ///
    /// Every error before the submission loop aborts the run. Inside the loop
    /// a failing job is recorded in the report and the next job is submitted.
    pub fn run(&self) -> Result<RunOutcome> {
        let config = &self.config;
        config.validate()?;

        let working_dir = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(SplitError::io("."))?,
        };
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| HostEnvironment::detect(config));

        let job_template =
            locate_job_template(config.job_template_dir.as_deref(), host.domain.as_deref())?;
        let release_dir = resolve_release_dir(&config.release_dir)?;
        let layout = MacroLayout::from_macro_path(&config.mac, &working_dir)?;

        let files = load_macro_graph(&layout.root_dir, &layout.root_file)?;
        let mut rewriter = AttributeRewriter::new(files, config.jobs);
        apply_job_parameters(&mut rewriter, config)?;
        info!("Generated {} placeholder(s)", rewriter.alias_table().len());

        let output_dir = create_output_dir(
            config.output_dir().map(|dir| working_dir.join(dir)).as_deref(),
            &layout.root_dir,
        )?;
        let run_id = run_id(&output_dir);
        info!("Run Id is: {}", run_id);

        let backend = host.backend();
        if backend == QueueBackend::Local {
            warn!("qsub is not found. Jobs will run one after another on this machine.");
        } else {
            info!("Submitting with {}", backend);
        }

        write_manifest(&output_dir, config.jobs, &config.mac, &config.params)?;
        stage_data(&layout.data_dir(), &output_dir, config.copy_data)?;
        write_macro_files(rewriter.files(), &output_dir)?;

        let macro_file = output_dir.join(&layout.root_file);
        let builder = SubmissionCommandBuilder::new(
            backend,
            JobContext {
                jobs: config.jobs,
                run_id: run_id.clone(),
                output_dir: output_dir.clone(),
                release_dir,
                macro_file: macro_file.clone(),
                params: config.params.clone(),
                job_template,
                qsub: host.qsub.clone().unwrap_or_else(|| PathBuf::from("qsub")),
            },
        );

        let table = rewriter.alias_table();
        let commands: Vec<SubmissionCommand> = (0..config.jobs)
            .map(|job| builder.build(job, &table.for_job(job)))
            .collect();

        RunRecord {
            run_id: &run_id,
            created: chrono::Local::now(),
            backend,
            jobs: config.jobs,
            output_dir: &output_dir,
            macro_file: &macro_file,
            aliases: table,
            commands: commands.iter().map(ToString::to_string).collect(),
        }
        .save(&output_dir)?;

        let report = submit_all(&commands, config.dry_run);

        Ok(RunOutcome {
            run_id,
            output_dir,
            backend,
            commands,
            report,
        })
    }
}

/// Runs (or prints) every command in order.
fn submit_all(commands: &[SubmissionCommand], dry_run: bool) -> SubmissionReport {
    let mut report = SubmissionReport::new();

    for (job, command) in commands.iter().enumerate() {
        if dry_run {
            println!("{}", command);
            report.record(job, JobOutcome::Printed);
            continue;
        }

        debug!("Job {}: {}", job, command);
        let outcome = match command.to_command().status() {
            Ok(status) if status.success() => JobOutcome::Submitted,
            Ok(status) => {
                error!("Job {} submission exited with {}", job, status);
                JobOutcome::Failed(status.to_string())
            }
            Err(e) => {
                error!("Job {} could not be started: {}", job, e);
                JobOutcome::Failed(e.to_string())
            }
        };
        report.record(job, outcome);
    }

    report
}
