//! Run Configuration
//!
//! Options of a split run. They normally come from the command line but can
//! also be read from a YAML file.
//!
//! # Example YAML Format
//!
//! ```yaml
//! mac: mac/main.mac
//! jobs: 20
//! split_time: true
//! params: "--qt"
//! copy_data: false
//! dry_run: true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SplitError};

/// Default root macro file.
pub const DEFAULT_MACRO: &str = "mac/main.mac";

/// Default number of jobs.
pub const DEFAULT_JOBS: usize = 10;

/// Every option of a split run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Root macro file, relative to the current directory
    pub mac: PathBuf,

    /// Number of jobs
    pub jobs: usize,

    /// Total number of primaries for all jobs (0 = keep the macro's value)
    pub primaries: u64,

    /// Simulation release directory (empty = use the binary found on PATH)
    pub release_dir: String,

    /// Extra parameters passed to the simulation
    pub params: String,

    /// Start time for the first job (0 = keep the macro's value)
    pub time_start: f64,

    /// Duration of one time slice (0 = keep the macro's value)
    pub time_slice: f64,

    /// Stop time for the last job (0 = keep the macro's value)
    pub time_stop: f64,

    /// Divide the simulated time window into one slice per job
    pub split_time: bool,

    /// Output directory (empty = temporary `run.XXXX` next to `mac/`)
    #[serde(deserialize_with = "empty_path_as_none")]
    pub output: Option<PathBuf>,

    /// Copy `data/` into the output directory instead of linking it
    pub copy_data: bool,

    /// Stage everything and print the commands without running them
    pub dry_run: bool,

    /// Cluster DNS domain, overriding the host lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_domain: Option<String>,

    /// Directory holding the job script templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_template_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mac: PathBuf::from(DEFAULT_MACRO),
            jobs: DEFAULT_JOBS,
            primaries: 0,
            release_dir: String::new(),
            params: String::new(),
            time_start: 0.0,
            time_slice: 0.0,
            time_stop: 0.0,
            split_time: false,
            output: None,
            copy_data: false,
            dry_run: false,
            cluster_domain: None,
            job_template_dir: None,
        }
    }
}

impl RunConfig {
    /// Reads a configuration from a YAML file; missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(SplitError::io(path))?;
        debug!("Run configuration loaded ({} bytes)", content.len());
        serde_yaml::from_str(&content).map_err(|source| SplitError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Explicit output directory, if one was given and is not empty.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// True when any explicit time option is set.
    pub fn has_time_options(&self) -> bool {
        self.time_start != 0.0 || self.time_slice != 0.0 || self.time_stop != 0.0
    }

    /// Checks option combinations. Touches no file.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(SplitError::InvalidOptions(
                "the number of jobs must be at least 1".to_string(),
            ));
        }

        if self.primaries != 0 && (self.has_time_options() || self.split_time) {
            return Err(SplitError::InvalidOptions(
                "cannot use time options (timestart, timeslice, timestop or splittime) with numberprimaries"
                    .to_string(),
            ));
        }

        for (name, value) in [
            ("timestart", self.time_start),
            ("timeslice", self.time_slice),
            ("timestop", self.time_stop),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SplitError::InvalidOptions(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.split_time && self.time_stop != 0.0 && self.time_stop <= self.time_start {
            return Err(SplitError::InvalidOptions(format!(
                "timestop ({}) must be greater than timestart ({})",
                self.time_stop, self.time_start
            )));
        }

        Ok(())
    }
}

fn empty_path_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.filter(|dir| !dir.as_os_str().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.mac, PathBuf::from("mac/main.mac"));
        assert_eq!(config.jobs, 10);
        assert!(!config.has_time_options());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_primaries_with_time_option_rejected() {
        let config = RunConfig {
            primaries: 1000,
            time_start: 1.0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(SplitError::InvalidOptions(_))));
    }

    #[test]
    fn test_primaries_with_split_time_rejected() {
        let config = RunConfig {
            primaries: 1000,
            split_time: true,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(SplitError::InvalidOptions(_))));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let config = RunConfig {
            jobs: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_time_rejected() {
        let config = RunConfig {
            time_slice: -1.0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_time_inverted_window_rejected() {
        let config = RunConfig {
            split_time: true,
            time_start: 5.0,
            time_stop: 2.0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_options_alone_accepted() {
        let config = RunConfig {
            time_start: 0.5,
            time_stop: 10.0,
            split_time: true,
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("run.yaml");
        fs::write(&path, "mac: sim/mac/main.mac\njobs: 4\nsplit_time: true\n").unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.mac, PathBuf::from("sim/mac/main.mac"));
        assert_eq!(config.jobs, 4);
        assert!(config.split_time);
        assert_eq!(config.primaries, 0);
    }

    #[test]
    fn test_load_yaml_empty_output() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("run.yaml");
        fs::write(&path, "output: \"\"\n").unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.output, None);
        assert_eq!(config.output_dir(), None);
    }

    #[test]
    fn test_output_dir_ignores_empty_path() {
        let config = RunConfig {
            output: Some(PathBuf::new()),
            ..RunConfig::default()
        };
        assert_eq!(config.output_dir(), None);

        let config = RunConfig {
            output: Some(PathBuf::from("results")),
            ..RunConfig::default()
        };
        assert_eq!(config.output_dir(), Some(Path::new("results")));
    }

    #[test]
    fn test_load_yaml_unknown_key() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("run.yaml");
        fs::write(&path, "jobz: 4\n").unwrap();

        assert!(matches!(RunConfig::load(&path), Err(SplitError::Config { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RunConfig::load(Path::new("/nonexistent/run.yaml")),
            Err(SplitError::Io { .. })
        ));
    }
}
