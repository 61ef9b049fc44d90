//! Text buffer with modification notifications
//!
//! Every edit is reported to subscribed listeners after the text has been
//! changed, as a single [`Modification`]: `deleted` bytes at `pos` replaced
//! by `inserted` bytes.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// One edit, described in byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub pos: usize,
    pub inserted: usize,
    pub deleted: usize,
    /// The text that was removed
    pub deleted_text: String,
}

/// Receiver of modification notifications
pub trait ModifyListener {
    /// Called after the edit; `text` is the new buffer content
    fn on_modify(&mut self, text: &str, modification: &Modification);
}

/// Handle returned by [`TextBuffer::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// A buffer containing text and its listeners
#[derive(Default)]
pub struct TextBuffer {
    text: String,
    listeners: Vec<(ListenerId, Rc<RefCell<dyn ModifyListener>>)>,
    next_listener: usize,
    /// Whether buffer has unsaved changes
    modified: bool,
}

impl std::fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBuffer")
            .field("len", &self.text.len())
            .field("listeners", &self.listeners.len())
            .field("modified", &self.modified)
            .finish()
    }
}

impl TextBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding `text`
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Create a buffer from file contents
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_text(content))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Check if buffer is modified
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Register a listener for future edits
    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn ModifyListener>>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Insert text at a byte offset (clamped to the end)
    pub fn insert(&mut self, pos: usize, text: &str) {
        self.replace(pos, 0, text);
    }

    /// Delete `len` bytes at `pos`
    pub fn delete(&mut self, pos: usize, len: usize) {
        self.replace(pos, len, "");
    }

    /// Replace `deleted` bytes at `pos` with `text`
    ///
    /// The range is clamped to the buffer and widened to character
    /// boundaries.
    pub fn replace(&mut self, pos: usize, deleted: usize, text: &str) {
        let start = floor_boundary(&self.text, pos.min(self.text.len()));
        let end = ceil_boundary(&self.text, pos.saturating_add(deleted).min(self.text.len()));
        if start == end && text.is_empty() {
            return;
        }

        let deleted_text = self.text[start..end].to_string();
        self.text.replace_range(start..end, text);
        self.modified = true;

        let modification = Modification {
            pos: start,
            inserted: text.len(),
            deleted: end - start,
            deleted_text,
        };
        for (_, listener) in &self.listeners {
            listener.borrow_mut().on_modify(&self.text, &modification);
        }
    }
}

fn floor_boundary(text: &str, mut pos: usize) -> usize {
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn ceil_boundary(text: &str, mut pos: usize) -> usize {
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(String, Modification)>,
    }

    impl ModifyListener for Recorder {
        fn on_modify(&mut self, text: &str, modification: &Modification) {
            self.seen.push((text.to_string(), modification.clone()));
        }
    }

    #[test]
    fn test_edits_notify_listeners() {
        let mut buffer = TextBuffer::from_text("hello world");
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        buffer.subscribe(recorder.clone());

        buffer.replace(6, 5, "there");
        buffer.insert(0, ">> ");
        buffer.delete(0, 3);

        let seen = &recorder.borrow().seen;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, "hello there");
        assert_eq!(
            seen[0].1,
            Modification {
                pos: 6,
                inserted: 5,
                deleted: 5,
                deleted_text: "world".to_string(),
            }
        );
        assert_eq!(seen[1].1.inserted, 3);
        assert_eq!(seen[2].1.deleted_text, ">> ");
        assert_eq!(buffer.text(), "hello there");
        assert!(buffer.is_modified());
    }

    #[test]
    fn test_unsubscribe() {
        let mut buffer = TextBuffer::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let id = buffer.subscribe(recorder.clone());
        assert!(buffer.unsubscribe(id));
        assert!(!buffer.unsubscribe(id));

        buffer.insert(0, "x");
        assert!(recorder.borrow().seen.is_empty());
        assert_eq!(buffer.listener_count(), 0);
    }

    #[test]
    fn test_ranges_are_clamped() {
        let mut buffer = TextBuffer::from_text("héllo");
        buffer.delete(2, 1);
        assert_eq!(buffer.text(), "hllo");
        buffer.insert(100, "!");
        assert_eq!(buffer.text(), "hllo!");
        buffer.delete(10, 3);
        assert_eq!(buffer.text(), "hllo!");
        assert_eq!(buffer.len(), 5);
    }
}
