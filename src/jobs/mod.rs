//! Job Module
//!
//! Turns one rewritten macro tree into independent jobs.
//!
//! # Architecture
//!
//! - [`partition`]: Per-job primaries and time slices
//! - [`submission`]: Local and queue submission commands
//! - [`report`]: Outcome of each submission

pub mod partition;
pub mod report;
pub mod submission;

pub use partition::{slice_starts, slice_stops, split_primaries, split_time, TimeSlice};
pub use report::{JobOutcome, SubmissionReport};
pub use submission::{
    job_template_name, merge_alias_flag, JobContext, QueueBackend, SubmissionCommand,
    SubmissionCommandBuilder,
};
