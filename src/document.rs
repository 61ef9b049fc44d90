//! Documents
//!
//! A document is a text buffer plus, while highlighting is on, the
//! highlighter subscribed to it. The subscription lives exactly as long as
//! highlighting does.

use std::cell::RefCell;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::buffer::{ListenerId, TextBuffer};
use crate::syntax::{ContinuationToken, Highlighter, StyleCode, StyleEvent};

struct Highlighting {
    highlighter: Rc<RefCell<Highlighter>>,
    listener: ListenerId,
}

/// A text buffer with optional highlighting
pub struct Document {
    /// Document name (e.g., "main.c", "*scratch*")
    name: String,
    /// Associated file path
    path: Option<PathBuf>,
    buffer: TextBuffer,
    language_mode: Option<String>,
    highlighting: Option<Highlighting>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("buffer", &self.buffer)
            .field("language_mode", &self.language_mode)
            .field("highlighted", &self.is_highlighted())
            .finish()
    }
}

impl Document {
    /// Create a document holding `text`
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            buffer: TextBuffer::from_text(text),
            language_mode: None,
            highlighting: None,
        }
    }

    /// Create a document from file contents
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let mut doc = Self::new(name, TextBuffer::from_file(path)?.text());
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn language_mode(&self) -> Option<&str> {
        self.language_mode.as_deref()
    }

    pub fn set_language_mode(&mut self, mode: Option<String>) {
        self.language_mode = mode;
    }

    pub fn insert(&mut self, pos: usize, text: &str) {
        self.buffer.insert(pos, text);
    }

    pub fn delete(&mut self, pos: usize, len: usize) {
        self.buffer.delete(pos, len);
    }

    pub fn replace(&mut self, pos: usize, deleted: usize, text: &str) {
        self.buffer.replace(pos, deleted, text);
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighting.is_some()
    }

    /// Shared handle to the highlighter, if highlighting is on
    pub fn highlighter(&self) -> Option<Rc<RefCell<Highlighter>>> {
        self.highlighting.as_ref().map(|h| h.highlighter.clone())
    }

    /// Subscribe `highlighter` to this document's edits
    ///
    /// Any previous highlighter is detached first.
    pub fn attach_highlighter(&mut self, highlighter: Highlighter) {
        self.detach_highlighter();
        let highlighter = Rc::new(RefCell::new(highlighter));
        let listener = self.buffer.subscribe(highlighter.clone());
        self.highlighting = Some(Highlighting {
            highlighter,
            listener,
        });
    }

    /// Unsubscribe and return the highlighter
    pub fn detach_highlighter(&mut self) -> Option<Rc<RefCell<Highlighter>>> {
        let highlighting = self.highlighting.take()?;
        self.buffer.unsubscribe(highlighting.listener);
        Some(highlighting.highlighter)
    }

    /// Final style code at `pos`; `None` without highlighting
    pub fn style_at(&self, pos: usize) -> Option<StyleCode> {
        let highlighting = self.highlighting.as_ref()?;
        highlighting
            .highlighter
            .borrow_mut()
            .style_at(self.text().as_bytes(), pos)
    }

    /// Name of the final style at `pos`
    pub fn style_name_at(&self, pos: usize) -> Option<String> {
        let highlighting = self.highlighting.as_ref()?;
        let mut highlighter = highlighting.highlighter.borrow_mut();
        highlighter
            .style_name_at(self.text().as_bytes(), pos)
            .map(str::to_string)
    }

    /// Make the styles of `range` final
    pub fn ensure_styles(&self, range: Range<usize>) {
        if let Some(highlighting) = &self.highlighting {
            highlighting
                .highlighter
                .borrow_mut()
                .ensure_styles(self.text().as_bytes(), range);
        }
    }

    /// Drain the highlighter's display notifications
    pub fn take_events(&self) -> Vec<StyleEvent> {
        self.highlighting
            .as_ref()
            .map(|h| h.highlighter.borrow_mut().take_events())
            .unwrap_or_default()
    }

    /// Hand a continuation to the highlighter if it owns the token
    pub fn run_continuation(&self, token: ContinuationToken) -> bool {
        let Some(highlighting) = &self.highlighting else {
            return false;
        };
        let mut highlighter = highlighting.highlighter.borrow_mut();
        if highlighter.id() != token.highlighter {
            return false;
        }
        highlighter.run_continuation(self.text().as_bytes(), token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{HighlightSettings, IdleQueue, PatternSet, PatternTable, StyleTable};

    fn highlighter(queue: &IdleQueue) -> Highlighter {
        let set = PatternSet::parse("Test", "comment::\"/\\*\":\"\\*/\":Comment:\n").unwrap();
        let (table, _) = PatternTable::compile(&set, &StyleTable::new());
        Highlighter::new(table, HighlightSettings::default(), queue.clone())
    }

    #[test]
    fn test_edits_reach_highlighter() {
        let queue = IdleQueue::new();
        let mut doc = Document::new("scratch", "a b c");
        let mut h = highlighter(&queue);
        h.start(doc.text().as_bytes(), false);
        doc.attach_highlighter(h);
        assert_eq!(doc.style_name_at(2).as_deref(), Some("Plain"));

        doc.insert(0, "/*");
        assert_eq!(doc.text(), "/*a b c");
        assert_eq!(doc.style_name_at(4).as_deref(), Some("Comment"));
        doc.delete(0, 2);
        assert_eq!(doc.style_name_at(2).as_deref(), Some("Plain"));
        assert!(!doc.take_events().is_empty());
    }

    #[test]
    fn test_detach_stops_notifications() {
        let queue = IdleQueue::new();
        let mut doc = Document::new("scratch", "text");
        doc.attach_highlighter(highlighter(&queue));
        assert_eq!(doc.buffer().listener_count(), 1);

        let detached = doc.detach_highlighter().unwrap();
        assert_eq!(doc.buffer().listener_count(), 0);
        assert!(doc.style_at(0).is_none());

        doc.insert(0, "more ");
        assert_eq!(detached.borrow().generation(), 0);
    }

    #[test]
    fn test_foreign_tokens_are_refused() {
        let queue = IdleQueue::new();
        let doc = Document::new("scratch", "text");
        let other = queue.register();
        let token = ContinuationToken {
            highlighter: other,
            generation: 0,
        };
        assert!(!doc.run_continuation(token));
    }
}
