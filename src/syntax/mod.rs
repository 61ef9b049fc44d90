//! Syntax highlighting
//!
//! Pattern-based, incremental highlighting. A language mode's pattern set
//! is compiled into a [`PatternTable`]; a [`Highlighter`] keeps one style
//! code per byte of a document up to date as the text is edited, reparsing
//! only as far as styles actually change and splitting long work into idle
//! chunks. Patterns flagged as deferred are applied only when their text is
//! about to be shown.

mod builtin;
mod context;
mod deferred;
mod language;
mod matcher;
mod pattern;
mod pattern_set;
mod queue;
mod scheduler;
mod style;
mod style_buffer;
mod table;

pub use context::ReparseContext;
pub use language::{LanguageMode, LanguageModeRegistry};
pub use matcher::{match_span, MatchFailure, MatchOutcome, MatchRequest};
pub use pattern::{CompiledPattern, Pass, PatternId, PatternKind};
pub use pattern_set::{PatternFlags, PatternSet, PatternSpec};
pub use queue::{ContinuationToken, HighlighterId, IdleQueue};
pub use scheduler::{HighlightSettings, HighlightState, Highlighter, ReparseStats, StyleEvent};
pub use style::{Color, Style, StyleTable, PLAIN_STYLE};
pub use style_buffer::{StyleBuffer, StyleCode};
pub use table::PatternTable;
