//! Job Partitioning
//!
//! Derives per-job values for the two splitting policies: an even share of
//! the primary particles, or an equal slice of the simulated time window.

use serde::Serialize;

/// Splits `total` primaries over `jobs` jobs.
///
/// Each job receives `total / jobs`; the remainder goes one by one to the
/// first jobs, so the shares always add up to `total`.
///
/// # Example
///
/// ```
/// use gatesplit::jobs::split_primaries;
///
/// assert_eq!(split_primaries(10, 3), vec![4, 3, 3]);
/// ```
pub fn split_primaries(total: u64, jobs: usize) -> Vec<u64> {
    if jobs == 0 {
        return Vec::new();
    }
    let jobs_u64 = jobs as u64;
    let base = total / jobs_u64;
    let remainder = total % jobs_u64;

    (0..jobs_u64)
        .map(|job| if job < remainder { base + 1 } else { base })
        .collect()
}

/// Half-open time interval `[start, stop)` assigned to one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSlice {
    pub start: f64,
    pub stop: f64,
}

impl TimeSlice {
    pub fn width(&self) -> f64 {
        self.stop - self.start
    }
}

/// Cuts `[start, stop)` into `jobs` contiguous slices of equal width.
///
/// Consecutive slices share their boundary value and the last slice ends
/// exactly at `stop`.
pub fn split_time(start: f64, stop: f64, jobs: usize) -> Vec<TimeSlice> {
    if jobs == 0 {
        return Vec::new();
    }
    let width = (stop - start) / jobs as f64;
    let boundary = |job: usize| {
        if job == jobs {
            stop
        } else {
            start + job as f64 * width
        }
    };

    (0..jobs)
        .map(|job| TimeSlice {
            start: boundary(job),
            stop: boundary(job + 1),
        })
        .collect()
}

/// Start values of each slice.
pub fn slice_starts(slices: &[TimeSlice]) -> Vec<f64> {
    slices.iter().map(|slice| slice.start).collect()
}

/// Stop values of each slice.
pub fn slice_stops(slices: &[TimeSlice]) -> Vec<f64> {
    slices.iter().map(|slice| slice.stop).collect()
}
