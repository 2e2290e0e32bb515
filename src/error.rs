//! Error Types
//!
//! Every failure the splitter can detect is fatal for the run. Library code
//! returns these variants and the binary decides how to report them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::macros::Attribute;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Errors raised while preparing or submitting a split run.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Two or more options were supplied that cannot be combined.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A file or directory the run depends on does not exist.
    #[error("The {what} does not exist: {}", .path.display())]
    MissingResource { what: String, path: PathBuf },

    /// An attribute value refers to an alias that no macro file defines.
    #[error("Attribute \"{attribute}\" uses alias {{{alias}}}, which is not defined in the macro files")]
    UnresolvedAlias { attribute: String, alias: String },

    /// An attribute operation was requested for a command never seen while indexing.
    #[error("Command {} was not found in the macro files", .0.command())]
    MissingCommand(Attribute),

    /// A token that must be numeric could not be parsed.
    #[error("Attribute \"{attribute}\" has a non-numeric value: '{value}'")]
    InvalidValue { attribute: String, value: String },

    /// A per-job value list does not hold one value per job.
    #[error("Expected {expected} values for \"{attribute}\", got {actual}")]
    JobCountMismatch {
        attribute: String,
        expected: usize,
        actual: usize,
    },

    /// The YAML run configuration could not be parsed.
    #[error("Failed to parse run configuration '{}': {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Filesystem error on a specific path.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SplitError {
    /// Builds a [`SplitError::MissingResource`].
    pub fn missing(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingResource {
            what: what.into(),
            path: path.into(),
        }
    }

    /// Returns a closure wrapping an `io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resource_message() {
        let err = SplitError::missing("data folder", "/tmp/run/data");
        assert_eq!(
            err.to_string(),
            "The data folder does not exist: /tmp/run/data"
        );
    }

    #[test]
    fn test_unresolved_alias_message() {
        let err = SplitError::UnresolvedAlias {
            attribute: "setTimeStart".to_string(),
            alias: "start".to_string(),
        };
        assert!(err.to_string().contains("{start}"));
    }

    #[test]
    fn test_missing_command_names_command() {
        let err = SplitError::MissingCommand(Attribute::TimeStop);
        assert!(err
            .to_string()
            .contains("/gate/application/setTimeStop"));
    }
}
