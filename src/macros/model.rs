//! Macro File Model
//!
//! In-memory representation of a GATE macro tree. Files live in an arena
//! ([`MacroFileSet`]) and are addressed by [`FileId`]; individual lines are
//! addressed by [`LineRef`], so indices built once stay valid while lines
//! are rewritten in place.
//!
//! # Example Macro
//!
//! ```text
//! # main.mac
//! /control/execute mac/geometry.mac
//! /control/alias start 0
//! /gate/application/setTimeStart {start} s
//! /gate/application/setTimeStop 10 s
//! /gate/application/start
//! ```

use std::collections::HashMap;

/// Directive that includes another macro file.
pub const EXECUTE_COMMAND: &str = "/control/execute";

/// Directive that defines an alias.
pub const ALIAS_COMMAND: &str = "/control/alias";

/// Index of a file inside a [`MacroFileSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

/// Structural reference to one line of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRef {
    pub file: FileId,
    pub line: usize,
}

/// A single line of a macro file.
///
/// Every variant keeps the exact source text, including its line ending,
/// so untouched lines are written back byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroLine {
    /// Empty or whitespace-only line
    Blank(String),
    /// Line whose first non-blank character is `#`
    Comment(String),
    /// Command line with its whitespace-separated tokens
    Command { raw: String, tokens: Vec<String> },
}

impl MacroLine {
    /// Classifies a raw line (which may still carry its line ending).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Blank(raw.to_string())
        } else if trimmed.starts_with('#') {
            Self::Comment(raw.to_string())
        } else {
            Self::Command {
                raw: raw.to_string(),
                tokens: trimmed.split_whitespace().map(str::to_string).collect(),
            }
        }
    }

    /// Original (or rewritten) text of the line.
    pub fn raw(&self) -> &str {
        match self {
            Self::Blank(raw) | Self::Comment(raw) => raw,
            Self::Command { raw, .. } => raw,
        }
    }

    /// Tokens of a command line, `None` for blanks and comments.
    pub fn tokens(&self) -> Option<&[String]> {
        match self {
            Self::Command { tokens, .. } => Some(tokens.as_slice()),
            _ => None,
        }
    }

    /// Command name (first token) of a command line.
    pub fn command(&self) -> Option<&str> {
        self.tokens()
            .and_then(|tokens| tokens.first())
            .map(String::as_str)
    }

    /// Replaces the tokens of a command line.
    ///
    /// Leading indentation and the line ending of the original text are kept;
    /// tokens are joined with single spaces. Blank and comment lines are left
    /// untouched.
    pub fn set_tokens(&mut self, new_tokens: Vec<String>) {
        if let Self::Command { raw, tokens } = self {
            let indent_len = raw.len() - raw.trim_start().len();
            let body_end = raw.trim_end_matches(&['\n', '\r'][..]).len();
            let rewritten = format!(
                "{}{}{}",
                &raw[..indent_len],
                new_tokens.join(" "),
                &raw[body_end..]
            );
            *raw = rewritten;
            *tokens = new_tokens;
        }
    }
}

/// One macro file, identified by its path relative to the macro root.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroFile {
    pub path: String,
    pub lines: Vec<MacroLine>,
}

impl MacroFile {
    /// Splits `content` into typed lines, keeping every line terminator.
    pub fn parse(path: impl Into<String>, content: &str) -> Self {
        Self {
            path: path.into(),
            lines: content.split_inclusive('\n').map(MacroLine::parse).collect(),
        }
    }

    /// Arguments of every include directive in this file, in order.
    pub fn references(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(MacroLine::tokens)
            .filter(|tokens| tokens.first().map(String::as_str) == Some(EXECUTE_COMMAND))
            .filter_map(|tokens| tokens.get(1).cloned())
            .collect()
    }

    /// Reassembles the file content.
    pub fn render(&self) -> String {
        self.lines.iter().map(MacroLine::raw).collect()
    }
}

/// Arena of all macro files reachable from a root file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroFileSet {
    files: Vec<MacroFile>,
    by_path: HashMap<String, FileId>,
}

impl MacroFileSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, returning its id. A path already present keeps its id.
    pub fn insert(&mut self, file: MacroFile) -> FileId {
        if let Some(&id) = self.by_path.get(&file.path) {
            self.files[id.0] = file;
            return id;
        }
        let id = FileId(self.files.len());
        self.by_path.insert(file.path.clone(), id);
        self.files.push(file);
        id
    }

    /// Looks up a file id by relative path.
    pub fn id_of(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Returns true if the path has been loaded.
    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn file(&self, id: FileId) -> &MacroFile {
        &self.files[id.0]
    }

    /// Iterates files in load order.
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &MacroFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| (FileId(index), file))
    }

    pub fn line(&self, at: LineRef) -> &MacroLine {
        &self.files[at.file.0].lines[at.line]
    }

    pub fn line_mut(&mut self, at: LineRef) -> &mut MacroLine {
        &mut self.files[at.file.0].lines[at.line]
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
