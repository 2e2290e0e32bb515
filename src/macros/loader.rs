//! Macro Graph Loader
//!
//! Reads a root macro file and every file it transitively includes through
//! `/control/execute`, and writes a (possibly rewritten) file set back out.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::{MacroFile, MacroFileSet};
use crate::error::{Result, SplitError};

/// Loads the macro graph rooted at `root_file`.
///
/// Paths named by include directives are resolved relative to `macro_dir`,
/// exactly like the simulation resolves them at run time. The traversal is
/// breadth-first and each file is read once, so include cycles terminate.
///
/// # Errors
///
/// A file that cannot be read (typically a missing include) aborts loading
/// with [`SplitError::Io`].
pub fn load_macro_graph(macro_dir: &Path, root_file: &str) -> Result<MacroFileSet> {
    info!("Parsing macro files from: {}", macro_dir.join(root_file).display());

    let mut files = MacroFileSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    visited.insert(root_file.to_string());
    queue.push_back(root_file.to_string());

    while let Some(relative) = queue.pop_front() {
        let full_path = macro_dir.join(&relative);
        let content = fs::read_to_string(&full_path).map_err(SplitError::io(&full_path))?;
        let file = MacroFile::parse(relative.as_str(), &content);

        for reference in file.references() {
            if visited.insert(reference.clone()) {
                debug!("{} includes {}", relative, reference);
                queue.push_back(reference);
            }
        }

        files.insert(file);
    }

    info!("Loaded {} macro files", files.len());
    Ok(files)
}

/// Writes every file of the set under `output_dir` at its relative path.
pub fn write_macro_files(files: &MacroFileSet, output_dir: &Path) -> Result<()> {
    for (_, file) in files.iter() {
        let target = output_dir.join(&file.path);
        if let Some(parent) = target.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(SplitError::io(parent))?;
                debug!("Created directory: {}", parent.display());
            }
        }
        fs::write(&target, file.render()).map_err(SplitError::io(&target))?;
        debug!("Wrote {}", target.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_single_file() {
        let temp_dir = tempdir().unwrap();
        write(temp_dir.path(), "mac/main.mac", "/gate/run/initialize\n");

        let files = load_macro_graph(temp_dir.path(), "mac/main.mac").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains("mac/main.mac"));
    }

    #[test]
    fn test_load_transitive_includes() {
        let temp_dir = tempdir().unwrap();
        write(
            temp_dir.path(),
            "mac/main.mac",
            "/control/execute mac/geometry.mac\n/control/execute mac/physics.mac\n",
        );
        write(temp_dir.path(), "mac/geometry.mac", "/control/execute mac/world.mac\n");
        write(temp_dir.path(), "mac/physics.mac", "# physics\n");
        write(temp_dir.path(), "mac/world.mac", "/gate/world/setXLength 1 m\n");

        let files = load_macro_graph(temp_dir.path(), "mac/main.mac").unwrap();
        assert_eq!(files.len(), 4);
        for path in ["mac/main.mac", "mac/geometry.mac", "mac/physics.mac", "mac/world.mac"] {
            assert!(files.contains(path), "missing {}", path);
        }
    }

    #[test]
    fn test_load_visits_each_file_once() {
        let temp_dir = tempdir().unwrap();
        write(
            temp_dir.path(),
            "mac/main.mac",
            "/control/execute mac/a.mac\n/control/execute mac/b.mac\n",
        );
        write(temp_dir.path(), "mac/a.mac", "/control/execute mac/b.mac\n");
        write(temp_dir.path(), "mac/b.mac", "/control/execute mac/main.mac\n");

        let files = load_macro_graph(temp_dir.path(), "mac/main.mac").unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_load_missing_include_fails() {
        let temp_dir = tempdir().unwrap();
        write(temp_dir.path(), "mac/main.mac", "/control/execute mac/missing.mac\n");

        let result = load_macro_graph(temp_dir.path(), "mac/main.mac");
        assert!(matches!(result, Err(SplitError::Io { .. })));
    }

    #[test]
    fn test_load_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        write(temp_dir.path(), "mac/main.mac", "/control/execute mac/a.mac\n# c\n\n");
        write(temp_dir.path(), "mac/a.mac", "/gate/application/setTotalNumberOfPrimaries 100\n");

        let first = load_macro_graph(temp_dir.path(), "mac/main.mac").unwrap();
        let second = load_macro_graph(temp_dir.path(), "mac/main.mac").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_preserves_bytes() {
        let source = tempdir().unwrap();
        let output = tempdir().unwrap();
        let main = "# header  \n\n/control/execute mac/sub/a.mac\n   /gate/run   1\r\n";
        let sub = "/gate/application/setTimeStop 1 s";
        write(source.path(), "mac/main.mac", main);
        write(source.path(), "mac/sub/a.mac", sub);

        let files = load_macro_graph(source.path(), "mac/main.mac").unwrap();
        write_macro_files(&files, output.path()).unwrap();

        assert_eq!(fs::read_to_string(output.path().join("mac/main.mac")).unwrap(), main);
        assert_eq!(fs::read_to_string(output.path().join("mac/sub/a.mac")).unwrap(), sub);
    }
}
