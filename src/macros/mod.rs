//! Macro Parsing Module
//!
//! Loads a tree of GATE macro files, indexes the commands the splitter
//! cares about, and rewrites them with per-job placeholders.
//!
//! # Structure
//!
//! - [`model`]: Typed lines and the file arena
//! - [`loader`]: Include-graph traversal and write-back
//! - [`indexer`]: Attribute and alias locations
//! - [`rewriter`]: Placeholder substitution and value resolution

pub mod indexer;
pub mod loader;
pub mod model;
pub mod rewriter;

pub use indexer::{Attribute, AttributeIndex};
pub use loader::{load_macro_graph, write_macro_files};
pub use model::{FileId, LineRef, MacroFile, MacroFileSet, MacroLine};
pub use rewriter::{AliasValueTable, AliasValues, AttributeRewriter, JobValues};
