//! Error types for hilite

use thiserror::Error;

/// Result type alias for highlighting operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighting error types
///
/// Only reading input (pattern-set text, configuration, files) can fail
/// outright. Problems inside a pattern set are reported as values of this
/// type but never stop highlighting: the offending pattern is disabled and
/// the rest of the set keeps working.
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("error in expression of pattern \"{name}\": {message}")]
    PatternCompile { name: String, message: String },

    #[error("pattern \"{name}\" failed at offset {pos}: {message}")]
    MatchRuntime {
        name: String,
        pos: usize,
        message: String,
    },

    #[error("style \"{style}\" named in pattern \"{pattern}\" does not exist")]
    MissingStyleName { pattern: String, style: String },

    #[error("parent \"{parent}\" of pattern \"{name}\" does not match any pattern in this set")]
    UnknownParent { name: String, parent: String },

    #[error("pattern \"{name}\": {message}")]
    InvalidPattern { name: String, message: String },

    #[error("pattern set line {line}: {message}")]
    PatternSyntax { line: usize, message: String },

    #[error("no syntax highlighting patterns for language mode {0}")]
    NoPatternSet(String),

    #[error("no such document: {0}")]
    UnknownDocument(usize),
}

impl HighlightError {
    /// Whether this diagnostic leaves the pattern usable
    pub fn is_warning(&self) -> bool {
        matches!(self, HighlightError::MissingStyleName { .. })
    }
}
