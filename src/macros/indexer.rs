//! Attribute Indexer
//!
//! Locates, in one pass over a [`MacroFileSet`], the four application
//! commands the splitter may parameterize and every alias definition.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use super::model::{LineRef, MacroFileSet, ALIAS_COMMAND};

/// Application commands that can be set per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    TimeStart,
    TimeSlice,
    TimeStop,
    TotalPrimaries,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::TimeStart,
        Attribute::TimeSlice,
        Attribute::TimeStop,
        Attribute::TotalPrimaries,
    ];

    /// Short name, also used as the stem of generated placeholders.
    pub fn name(self) -> &'static str {
        match self {
            Self::TimeStart => "setTimeStart",
            Self::TimeSlice => "setTimeSlice",
            Self::TimeStop => "setTimeStop",
            Self::TotalPrimaries => "setTotalNumberOfPrimaries",
        }
    }

    /// Full macro command.
    pub fn command(self) -> &'static str {
        match self {
            Self::TimeStart => "/gate/application/setTimeStart",
            Self::TimeSlice => "/gate/application/setTimeSlice",
            Self::TimeStop => "/gate/application/setTimeStop",
            Self::TotalPrimaries => "/gate/application/setTotalNumberOfPrimaries",
        }
    }

    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attribute| attribute.command() == command)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Locations of attribute commands and alias definitions.
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    attributes: HashMap<Attribute, LineRef>,
    aliases: HashMap<String, LineRef>,
}

impl AttributeIndex {
    /// Scans every command line of every file.
    ///
    /// When an attribute command occurs more than once, the last occurrence in
    /// scan order wins and a warning is emitted, since only one of them will be
    /// rewritten. Alias redefinitions also keep the last definition.
    pub fn build(files: &MacroFileSet) -> Self {
        let mut index = Self::default();

        for (file_id, file) in files.iter() {
            for (line_no, line) in file.lines.iter().enumerate() {
                let Some(tokens) = line.tokens() else {
                    continue;
                };
                let at = LineRef {
                    file: file_id,
                    line: line_no,
                };

                if let Some(attribute) = Attribute::from_command(&tokens[0]) {
                    if let Some(previous) = index.attributes.insert(attribute, at) {
                        let earlier = files.file(previous.file);
                        warn!(
                            "{} appears more than once; using {}:{} and ignoring {}:{}",
                            attribute.command(),
                            file.path,
                            line_no + 1,
                            earlier.path,
                            previous.line + 1
                        );
                    }
                    debug!("Found {} in {}:{}", attribute, file.path, line_no + 1);
                } else if tokens[0] == ALIAS_COMMAND {
                    if let Some(name) = tokens.get(1) {
                        index.aliases.insert(name.clone(), at);
                    }
                }
            }
        }

        index
    }

    /// Location of an attribute command, if it was found.
    pub fn attribute(&self, attribute: Attribute) -> Option<LineRef> {
        self.attributes.get(&attribute).copied()
    }

    /// Location of an alias definition, if it was found.
    pub fn alias(&self, name: &str) -> Option<LineRef> {
        self.aliases.get(name).copied()
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}
