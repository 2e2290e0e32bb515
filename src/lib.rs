//! GateSplit - Cluster Job Splitter for GATE Simulations
//!
//! Partitions one simulation, described by a tree of macro files, into
//! independent jobs for a batch queue (or sequential local execution). Shared
//! parameters are rewritten into per-job placeholders and every job receives
//! its own values on the command line.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`macros`]: Macro tree loading, attribute indexing and rewriting
//! - [`jobs`]: Per-job partitioning and submission command generation
//! - [`run`]: Configuration, output staging and orchestration
//!
//! # Example
//!
//! ```rust,no_run
//! use gatesplit::run::{Orchestrator, RunConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig {
//!         jobs: 8,
//!         primaries: 1_000_000,
//!         ..RunConfig::default()
//!     };
//!
//!     let outcome = Orchestrator::new(config).run()?;
//!     println!("{}", outcome.report.summary());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod jobs;
pub mod macros;
pub mod run;

// Re-export commonly used types
pub use error::{Result, SplitError};
pub use macros::{load_macro_graph, Attribute, AttributeRewriter};
pub use run::{Orchestrator, RunConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "GateSplit";
