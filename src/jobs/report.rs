//! Submission Report
//!
//! Records what happened to each job's command so the run can end with a
//! short summary and a meaningful exit status.

use std::time::{Duration, Instant};

/// Outcome of handing one job to its backend.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Dry run: the command was only printed
    Printed,
    /// The command ran and exited successfully
    Submitted,
    /// The command could not be spawned or exited with an error
    Failed(String),
}

/// A single entry of the report.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job: usize,
    pub outcome: JobOutcome,
    pub timestamp: Instant,
}

/// Per-job outcomes of one run, in submission order.
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    events: Vec<JobEvent>,
    start_time: Instant,
}

impl SubmissionReport {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record(&mut self, job: usize, outcome: JobOutcome) {
        self.events.push(JobEvent {
            job,
            outcome,
            timestamp: Instant::now(),
        });
    }

    pub fn events(&self) -> &[JobEvent] {
        &self.events
    }

    fn count(&self, predicate: impl Fn(&JobOutcome) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(&event.outcome)).count()
    }

    pub fn printed(&self) -> usize {
        self.count(|outcome| *outcome == JobOutcome::Printed)
    }

    pub fn submitted(&self) -> usize {
        self.count(|outcome| *outcome == JobOutcome::Submitted)
    }

    /// Jobs whose submission failed.
    pub fn failed_jobs(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter(|event| matches!(event.outcome, JobOutcome::Failed(_)))
            .map(|event| event.job)
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_jobs().is_empty()
    }

    /// Time between the report's creation and its last event.
    pub fn elapsed(&self) -> Duration {
        self.events
            .last()
            .map(|event| event.timestamp.duration_since(self.start_time))
            .unwrap_or_default()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let failed = self.failed_jobs();
        let mut summary = format!(
            "Jobs: {} total, {} submitted, {} printed, {} failed ({:.2?})",
            self.events.len(),
            self.submitted(),
            self.printed(),
            failed.len(),
            self.elapsed()
        );
        if !failed.is_empty() {
            let list: Vec<String> = failed.iter().map(ToString::to_string).collect();
            summary.push_str(&format!("\nFailed job indices: {}", list.join(", ")));
        }
        summary
    }
}

impl Default for SubmissionReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let report = SubmissionReport::new();
        assert!(report.events().is_empty());
        assert!(!report.has_failures());
        assert_eq!(report.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_counts() {
        let mut report = SubmissionReport::new();
        report.record(0, JobOutcome::Submitted);
        report.record(1, JobOutcome::Failed("exit status 1".to_string()));
        report.record(2, JobOutcome::Submitted);

        assert_eq!(report.submitted(), 2);
        assert_eq!(report.printed(), 0);
        assert_eq!(report.failed_jobs(), vec![1]);
        assert!(report.has_failures());
    }

    #[test]
    fn test_summary_lists_failures() {
        let mut report = SubmissionReport::new();
        report.record(0, JobOutcome::Printed);
        report.record(3, JobOutcome::Failed("spawn".to_string()));

        let summary = report.summary();
        assert!(summary.contains("2 total"));
        assert!(summary.contains("1 printed"));
        assert!(summary.contains("Failed job indices: 3"));
    }
}
