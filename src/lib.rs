//! hilite - incremental, pattern-based syntax highlighting
//!
//! Language modes describe their highlighting as a hierarchy of regular
//! expression patterns. A [`syntax::Highlighter`] keeps one style code per
//! byte of a document, reparsing only what an edit affects and doing long
//! work in chunks from an idle queue.

pub mod buffer;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod syntax;
pub mod terminal;
