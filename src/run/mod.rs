//! Run Orchestration Module
//!
//! Configuration, host discovery, output staging and the top-level driver.
//!
//! # Architecture
//!
//! - [`config`]: Run options and their validation
//! - [`environment`]: Simulation binary, qsub, DNS domain, job templates
//! - [`staging`]: Output directory, data staging, manifest and run record
//! - [`orchestrator`]: The end-to-end run

pub mod config;
pub mod environment;
pub mod orchestrator;
pub mod staging;

pub use config::RunConfig;
pub use orchestrator::{apply_job_parameters, HostEnvironment, Orchestrator, RunOutcome};
