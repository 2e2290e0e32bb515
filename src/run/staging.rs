//! Output Directory Staging
//!
//! Prepares the directory every job reads from: checks the macro layout,
//! creates the output directory, links or copies `data/`, and writes the
//! parameter manifest and the JSON run record.
//!
//! A simulation directory is expected to look like:
//!
//! ```text
//! sim/
//!   mac/main.mac
//!   data/...
//! ```

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::Serialize;

use crate::error::{Result, SplitError};
use crate::jobs::QueueBackend;
use crate::macros::AliasValueTable;

/// Name of the parameter manifest written into the output directory.
pub const MANIFEST_FILE: &str = "params.txt";

/// Name of the run record written into the output directory.
pub const RUN_RECORD_FILE: &str = "jobs.json";

/// Prefix of generated output directory names.
const RUN_PREFIX: &str = "run.";

/// Folders of the macro root that hold the user's inputs.
const INPUT_FOLDERS: [&str; 2] = ["mac", "data"];

/// Where the macro tree lives and which file is its root.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroLayout {
    /// Directory holding `mac/` and `data/`
    pub root_dir: PathBuf,
    /// Root macro file relative to `root_dir`
    pub root_file: String,
}

impl MacroLayout {
    /// Derives the layout from the macro path given by the user.
    ///
    /// The macro root is the parent of the macro file's directory, so
    /// `sim/mac/main.mac` gives root `sim` and root file `mac/main.mac`.
    pub fn from_macro_path(mac: &Path, working_dir: &Path) -> Result<Self> {
        let relative_root = mac
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        let root_file = mac
            .strip_prefix(relative_root)
            .unwrap_or(mac)
            .to_string_lossy()
            .to_string();
        let root_dir = working_dir.join(relative_root);

        let mac_dir = root_dir.join("mac");
        if !mac_dir.is_dir() {
            return Err(SplitError::missing("mac folder", mac_dir));
        }
        let data_dir = root_dir.join("data");
        if !data_dir.is_dir() {
            return Err(SplitError::missing("data folder", data_dir));
        }
        let mac_path = working_dir.join(mac);
        if !mac_path.is_file() {
            return Err(SplitError::missing("mac file", mac_path));
        }

        debug!("Macro root: {}, root file: {}", root_dir.display(), root_file);
        Ok(Self {
            root_dir,
            root_file,
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root_dir.join("data")
    }
}

/// Creates the output directory and returns its absolute path.
///
/// Without an explicit directory, a fresh `run.XXXX` directory is created
/// inside the macro root. An explicit directory may not be the macro root
/// itself nor lie inside its `mac/` or `data/` folders, since staging writes
/// macros and data into it.
pub fn create_output_dir(output: Option<&Path>, root_dir: &Path) -> Result<PathBuf> {
    let dir = match output {
        Some(dir) => {
            check_output_location(&resolve_location(dir)?, root_dir)?;
            if !dir.is_dir() {
                fs::create_dir_all(dir).map_err(SplitError::io(dir))?;
            }
            dir.to_path_buf()
        }
        None => tempfile::Builder::new()
            .prefix(RUN_PREFIX)
            .tempdir_in(root_dir)
            .map_err(SplitError::io(root_dir))?
            .keep(),
    };
    fs::canonicalize(&dir).map_err(SplitError::io(&dir))
}

fn check_output_location(output: &Path, root_dir: &Path) -> Result<()> {
    let root = fs::canonicalize(root_dir).map_err(SplitError::io(root_dir))?;
    let overlaps = output == root
        || INPUT_FOLDERS
            .iter()
            .any(|folder| output.starts_with(root.join(folder)));
    if overlaps {
        return Err(SplitError::InvalidOptions(format!(
            "output folder {} would overwrite the simulation inputs in {}",
            output.display(),
            root.display()
        )));
    }
    Ok(())
}

/// Absolute form of a path that may not exist yet: its deepest existing
/// ancestor is canonicalized and the remaining components are appended.
fn resolve_location(dir: &Path) -> Result<PathBuf> {
    let mut lexical = PathBuf::new();
    for component in dir.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    for base in lexical.ancestors() {
        if base.as_os_str().is_empty() {
            break;
        }
        if base.exists() {
            let rest = lexical.strip_prefix(base).unwrap_or_else(|_| Path::new(""));
            let base = fs::canonicalize(base).map_err(SplitError::io(base))?;
            return Ok(base.join(rest));
        }
    }
    Ok(lexical)
}

/// Run identifier: the output directory name after `run.`, else the whole name.
pub fn run_id(output_dir: &Path) -> String {
    let name = output_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.find(RUN_PREFIX) {
        Some(index) => name[index + RUN_PREFIX.len()..].to_string(),
        None => name,
    }
}

/// Makes `data/` available in the output directory, by copy or symlink.
pub fn stage_data(data_dir: &Path, output_dir: &Path, copy: bool) -> Result<()> {
    let target = output_dir.join("data");
    if copy {
        copy_dir_recursive(data_dir, &target)?;
        info!("Copied data into {}", target.display());
    } else {
        symlink_dir(data_dir, &target).map_err(SplitError::io(&target))?;
        info!("Linked data into {}", target.display());
    }
    Ok(())
}

fn copy_dir_recursive(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target).map_err(SplitError::io(target))?;
    let entries = fs::read_dir(source).map_err(SplitError::io(source))?;
    for entry in entries {
        let entry = entry.map_err(SplitError::io(source))?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(SplitError::io(&from))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, link)
}

/// Writes the human-readable parameter manifest.
pub fn write_manifest(output_dir: &Path, jobs: usize, mac: &Path, params: &str) -> Result<PathBuf> {
    let path = output_dir.join(MANIFEST_FILE);
    let mut file = fs::File::create(&path).map_err(SplitError::io(&path))?;

    let mut content = format!(
        "# generated {}\nnjobs = {}\nmacro = {}\n",
        Local::now().to_rfc3339(),
        jobs,
        mac.display()
    );
    if !params.is_empty() {
        content.push_str(&format!("param = {}\n", params));
    }
    file.write_all(content.as_bytes())
        .map_err(SplitError::io(&path))?;

    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Machine-readable summary of a staged run.
#[derive(Debug, Serialize)]
pub struct RunRecord<'a> {
    pub run_id: &'a str,
    pub created: DateTime<Local>,
    pub backend: QueueBackend,
    pub jobs: usize,
    pub output_dir: &'a Path,
    pub macro_file: &'a Path,
    pub aliases: &'a AliasValueTable,
    pub commands: Vec<String>,
}

impl RunRecord<'_> {
    /// Writes the record as pretty JSON into `output_dir`.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(RUN_RECORD_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| SplitError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        fs::write(&path, json).map_err(SplitError::io(&path))?;
        info!("Saved run record to {}", path.display());
        Ok(path)
    }
}
