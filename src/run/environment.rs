//! Host Environment Discovery
//!
//! Finds the external pieces a run relies on: the simulation binary, the
//! `qsub` command, the cluster's DNS domain and the job script templates.
//!
//! # Template Resolution Priority
//!
//! Job script templates are looked up in the following order:
//! 1. Directory given in the run configuration
//! 2. Production path: `job_templates/` next to the gatesplit executable
//! 3. Development path: `{project_root}/job_templates`

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use once_cell::sync::Lazy;

use crate::error::{Result, SplitError};
use crate::jobs::job_template_name;

/// Name of the simulation executable.
pub const SIMULATION_BINARY: &str = "Gate";

/// Value of `RELEASEDIR` when the binary on PATH is used.
pub const RELEASE_FROM_PATH: &str = "NONE";

/// Lazily-resolved default directory of the job script templates.
pub static JOB_TEMPLATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let prod_path = exe_dir.join("job_templates");
            if prod_path.is_dir() {
                info!("Using production job templates: {}", prod_path.display());
                return prod_path;
            }
        }
    }

    let dev_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("job_templates");
    debug!("Using development job templates: {}", dev_path.display());
    dev_path
});

/// Looks an executable up on PATH with `which`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path_str.is_empty() {
        None
    } else {
        debug!("Found {} at {}", name, path_str);
        Some(PathBuf::from(path_str))
    }
}

/// Domain part of a fully-qualified host name (`node1.in2p3.fr` → `in2p3.fr`).
pub fn domain_of(fqdn: &str) -> Option<&str> {
    fqdn.trim()
        .split_once('.')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// DNS domain of this host, from `hostname -f`.
pub fn dns_domain() -> Option<String> {
    let output = Command::new("hostname").arg("-f").output().ok()?;
    if !output.status.success() {
        warn!("Could not determine the host name; assuming a generic cluster");
        return None;
    }
    let fqdn = String::from_utf8_lossy(&output.stdout).to_string();
    domain_of(&fqdn).map(str::to_string)
}

/// Checks the release directory and returns the `RELEASEDIR` value for jobs.
///
/// An empty `release_dir` means the simulation binary on PATH is used, which
/// must exist; jobs then receive [`RELEASE_FROM_PATH`].
pub fn resolve_release_dir(release_dir: &str) -> Result<String> {
    if release_dir.is_empty() {
        let binary = find_executable(SIMULATION_BINARY).ok_or_else(|| {
            SplitError::missing(format!("{} executable in PATH", SIMULATION_BINARY), "PATH")
        })?;
        let folder = binary.parent().unwrap_or_else(|| Path::new("."));
        info!("Found {} in folder: {}", SIMULATION_BINARY, folder.display());
        return Ok(RELEASE_FROM_PATH.to_string());
    }

    let dir = Path::new(release_dir);
    if !dir.is_dir() {
        return Err(SplitError::missing("release folder", dir));
    }
    let binary = dir.join(SIMULATION_BINARY);
    if !binary.is_file() {
        return Err(SplitError::missing(
            format!("{} release in that folder", SIMULATION_BINARY),
            binary,
        ));
    }
    Ok(release_dir.to_string())
}

/// Path of the job script for `domain`, which must exist.
pub fn locate_job_template(template_dir: Option<&Path>, domain: Option<&str>) -> Result<PathBuf> {
    let dir = template_dir.unwrap_or(JOB_TEMPLATE_DIR.as_path());
    let template = dir.join(job_template_name(domain));
    if !template.is_file() {
        return Err(SplitError::missing("job file", template));
    }
    Ok(template)
}
