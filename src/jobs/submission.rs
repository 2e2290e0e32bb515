//! Submission Command Generation
//!
//! Builds, for every job, the external command that runs it: a local
//! `bash` invocation of the job script when no batch queue is available, or
//! a `qsub` call in one of two flag dialects.
//!
//! Commands are kept as program, arguments and environment so they can be
//! spawned without a shell; [`SubmissionCommand`]'s `Display` renders the
//! equivalent shell line for dry runs and the run record.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

/// DNS domain of the computing centre using the facility dialect.
pub const FACILITY_DOMAIN: &str = "in2p3.fr";

/// Job script used on the facility.
pub const FACILITY_JOB_TEMPLATE: &str = "gate_job_ccin2p3.job";

/// Job script used everywhere else, including local runs.
pub const CLUSTER_JOB_TEMPLATE: &str = "gate_job_cluster.job";

/// Flag introducing the simulation's alias list.
const ALIAS_FLAG: &str = "-a";

/// Batch system used to run the jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// No queue manager: jobs run one after another on this machine
    Local,
    /// PBS-style `qsub` at the facility identified by [`FACILITY_DOMAIN`]
    Facility,
    /// PBS-style `qsub` on any other cluster
    Generic,
}

impl QueueBackend {
    /// Chooses the backend once per run.
    pub fn select(qsub_available: bool, domain: Option<&str>) -> Self {
        match (qsub_available, domain) {
            (false, _) => Self::Local,
            (true, Some(FACILITY_DOMAIN)) => Self::Facility,
            (true, _) => Self::Generic,
        }
    }
}

impl fmt::Display for QueueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Facility => write!(f, "qsub ({})", FACILITY_DOMAIN),
            Self::Generic => write!(f, "qsub"),
        }
    }
}

/// Name of the job script template for a cluster domain.
pub fn job_template_name(domain: Option<&str>) -> &'static str {
    if domain == Some(FACILITY_DOMAIN) {
        FACILITY_JOB_TEMPLATE
    } else {
        CLUSTER_JOB_TEMPLATE
    }
}

/// Adds generated `[name,value]` aliases to a simulation parameter string.
///
/// If `params` already holds an `-a` flag, either standalone (`-a [a,1]`) or
/// attached to its list (`-a[a,1]`), the pairs are inserted right after it,
/// in front of the existing pairs; otherwise a new `-a` flag is appended.
pub fn merge_alias_flag(params: &str, aliases: &[(&str, &str)]) -> String {
    if aliases.is_empty() {
        return params.to_string();
    }
    let pairs: String = aliases
        .iter()
        .map(|(name, value)| format!("[{},{}]", name, value))
        .collect();

    match find_alias_flag(params) {
        Some(AliasFlag::Attached(flag_end)) => {
            format!("{}{}{}", &params[..flag_end], pairs, &params[flag_end..])
        }
        Some(AliasFlag::Standalone(flag_end)) => {
            let rest = params[flag_end..].trim_start();
            let separator = if rest.is_empty() || rest.starts_with('[') { "" } else { " " };
            format!("{} {}{}{}", &params[..flag_end], pairs, separator, rest)
        }
        None if params.trim().is_empty() => format!("{} {}", ALIAS_FLAG, pairs),
        None => format!("{} {} {}", params.trim_end(), ALIAS_FLAG, pairs),
    }
}

/// Position just past an `-a` flag found in a parameter string.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AliasFlag {
    /// `-a` followed by whitespace or the end of the string
    Standalone(usize),
    /// `-a` immediately followed by its `[` list
    Attached(usize),
}

fn find_alias_flag(params: &str) -> Option<AliasFlag> {
    params.match_indices(ALIAS_FLAG).find_map(|(start, _)| {
        let end = start + ALIAS_FLAG.len();
        let starts_word = params[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if !starts_word {
            return None;
        }
        match params[end..].chars().next() {
            None => Some(AliasFlag::Standalone(end)),
            Some(c) if c.is_whitespace() => Some(AliasFlag::Standalone(end)),
            Some('[') => Some(AliasFlag::Attached(end)),
            Some(_) => None,
        }
    })
}

/// Quotes a word for POSIX shells when it holds special characters.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Settings shared by every job of a run.
#[derive(Debug, Clone, Serialize)]
pub struct JobContext {
    /// Number of jobs
    pub jobs: usize,
    /// Run identifier used in queue job names
    pub run_id: String,
    /// Staged output directory, also the macro directory of every job
    pub output_dir: PathBuf,
    /// Simulation release directory, or `NONE` to use the one on PATH
    pub release_dir: String,
    /// Root macro file inside the output directory
    pub macro_file: PathBuf,
    /// Caller-supplied simulation parameters
    pub params: String,
    /// Job script passed to bash or qsub
    pub job_template: PathBuf,
    /// qsub executable
    pub qsub: PathBuf,
}

/// One fully-formed external command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl SubmissionCommand {
    /// Builds a process for this command, inheriting stdio.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(key, value)| (key, value)));
        cmd
    }
}

impl fmt::Display for SubmissionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self
            .env
            .iter()
            .map(|(key, value)| format!("{}={}", key, shell_quote(value)))
            .chain(std::iter::once(shell_quote(&self.program)))
            .chain(self.args.iter().map(|arg| shell_quote(arg)));

        for (position, word) in words.enumerate() {
            if position > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&word)?;
        }
        Ok(())
    }
}

/// Produces the submission command of each job.
#[derive(Debug, Clone)]
pub struct SubmissionCommandBuilder {
    backend: QueueBackend,
    context: JobContext,
}

impl SubmissionCommandBuilder {
    pub fn new(backend: QueueBackend, context: JobContext) -> Self {
        Self { backend, context }
    }

    pub fn backend(&self) -> QueueBackend {
        self.backend
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    /// Command for job `job`, given that job's generated aliases.
    pub fn build(&self, job: usize, aliases: &[(&str, &str)]) -> SubmissionCommand {
        let params = merge_alias_flag(&self.context.params, aliases);
        let variables = self.job_variables(job, params);
        let template = path_string(&self.context.job_template);

        match self.backend {
            QueueBackend::Local => {
                let mut env = variables;
                env.push(("PBS_JOBID".to_string(), format!("local_{}", job)));
                SubmissionCommand {
                    program: "bash".to_string(),
                    args: vec![template],
                    env,
                }
            }
            QueueBackend::Facility => {
                let output = path_string(&self.context.output_dir);
                SubmissionCommand {
                    program: path_string(&self.context.qsub),
                    args: vec![
                        "-o".to_string(),
                        output.clone(),
                        "-e".to_string(),
                        output,
                        "-l".to_string(),
                        "sps=1".to_string(),
                        "-N".to_string(),
                        format!("gate.{}", self.context.run_id),
                        "-v".to_string(),
                        qsub_variables(&variables),
                        template,
                    ],
                    env: Vec::new(),
                }
            }
            QueueBackend::Generic => SubmissionCommand {
                program: path_string(&self.context.qsub),
                args: vec![
                    "-N".to_string(),
                    format!("gatejob.{}", self.context.run_id),
                    "-o".to_string(),
                    path_string(&self.context.output_dir),
                    "-v".to_string(),
                    qsub_variables(&variables),
                    template,
                ],
                env: Vec::new(),
            },
        }
    }

    fn job_variables(&self, job: usize, params: String) -> Vec<(String, String)> {
        let output = path_string(&self.context.output_dir);
        vec![
            ("PARAM".to_string(), params),
            ("INDEX".to_string(), job.to_string()),
            ("INDEXMAX".to_string(), self.context.jobs.to_string()),
            ("OUTPUTDIR".to_string(), output.clone()),
            ("RELEASEDIR".to_string(), self.context.release_dir.clone()),
            ("MACROFILE".to_string(), path_string(&self.context.macro_file)),
            ("MACRODIR".to_string(), output),
        ]
    }
}

/// Joins variables for `qsub -v`; `PARAM` is double-quoted since it may hold commas.
fn qsub_variables(variables: &[(String, String)]) -> String {
    variables
        .iter()
        .map(|(key, value)| {
            if key == "PARAM" {
                format!("{}=\"{}\"", key, value)
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}
