//! Editor state
//!
//! The application context: configuration, the language-mode registry,
//! the style table, the idle queue shared by all highlighters, and the open
//! documents.

use std::path::Path;

use tracing::{debug, info};

use crate::config::Config;
use crate::document::Document;
use crate::error::{HighlightError, Result};
use crate::syntax::{
    Highlighter, IdleQueue, LanguageModeRegistry, PatternTable, StyleTable,
};

/// Index of an open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub usize);

/// Main editor state
pub struct Editor {
    config: Config,
    registry: LanguageModeRegistry,
    styles: StyleTable,
    queue: IdleQueue,
    /// Open documents; closed slots are `None`
    documents: Vec<Option<Document>>,
}

impl Editor {
    /// Create an editor from configuration
    ///
    /// Extra language modes named in the configuration are loaded here.
    pub fn new(config: Config) -> Result<Self> {
        let mut registry = LanguageModeRegistry::new();
        registry.load_config_modes(&config.modes)?;
        let mut styles = StyleTable::new();
        config.apply_styles(&mut styles);
        Ok(Self {
            config,
            registry,
            styles,
            queue: IdleQueue::new(),
            documents: Vec::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &LanguageModeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut LanguageModeRegistry {
        &mut self.registry
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn queue(&self) -> &IdleQueue {
        &self.queue
    }

    /// Open a document; its mode is detected from the name
    pub fn open_document(&mut self, name: &str, text: &str) -> DocumentId {
        let mut doc = Document::new(name, text);
        doc.set_language_mode(self.registry.detect_mode(Path::new(name)).map(str::to_string));
        self.add_document(doc)
    }

    /// Open a file in a new document
    pub fn open_file(&mut self, path: &Path) -> Result<DocumentId> {
        let mut doc = Document::from_file(path)?;
        doc.set_language_mode(self.registry.detect_mode(path).map(str::to_string));
        Ok(self.add_document(doc))
    }

    fn add_document(&mut self, doc: Document) -> DocumentId {
        debug!(name = doc.name(), mode = ?doc.language_mode(), "opened document");
        self.documents.push(Some(doc));
        DocumentId(self.documents.len() - 1)
    }

    pub fn document(&self, id: DocumentId) -> Result<&Document> {
        self.documents
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(HighlightError::UnknownDocument(id.0))
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Result<&mut Document> {
        self.documents
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(HighlightError::UnknownDocument(id.0))
    }

    /// Close a document, stopping its highlighting
    pub fn close_document(&mut self, id: DocumentId) -> Result<()> {
        self.stop_highlighting(id)?;
        self.documents[id.0] = None;
        Ok(())
    }

    /// Begin highlighting a document in its language mode
    ///
    /// With `deferred` the initial parse runs from the idle queue. Problems
    /// inside the pattern set are logged and the usable patterns are kept;
    /// a mode without patterns is an error.
    pub fn start_highlighting(&mut self, id: DocumentId, deferred: bool) -> Result<()> {
        let mode = self
            .document(id)?
            .language_mode()
            .ok_or_else(|| HighlightError::NoPatternSet("Plain".to_string()))?
            .to_string();
        let set = self.registry.pattern_set(&mode)?;
        let (table, diagnostics) = PatternTable::compile(&set, &self.styles);
        info!(mode = %mode, problems = diagnostics.len(), "compiled pattern set");

        let settings = self.config.highlight.settings();
        let mut highlighter = Highlighter::new(table, settings, self.queue.clone());
        self.stop_highlighting(id)?;
        let doc = self.document_mut(id)?;
        highlighter.start(doc.text().as_bytes(), deferred);
        doc.attach_highlighter(highlighter);
        Ok(())
    }

    /// Stop highlighting a document and drop its pending work
    pub fn stop_highlighting(&mut self, id: DocumentId) -> Result<()> {
        let doc = self.document_mut(id)?;
        if let Some(highlighter) = doc.detach_highlighter() {
            self.queue.cancel(highlighter.borrow().id());
        }
        Ok(())
    }

    /// Open a copy of a document, highlighted like the original
    pub fn duplicate_document(&mut self, id: DocumentId) -> Result<DocumentId> {
        let source = self.document(id)?;
        let mut copy = Document::new(source.name(), source.text());
        copy.set_language_mode(source.language_mode().map(str::to_string));
        if let Some(highlighter) = source.highlighter() {
            copy.attach_highlighter(highlighter.borrow().duplicate());
        }
        Ok(self.add_document(copy))
    }

    /// Run up to `max` pending continuations; returns how many ran
    pub fn run_idle(&mut self, max: usize) -> usize {
        let mut ran = 0;
        while ran < max {
            let Some(token) = self.queue.next() else {
                break;
            };
            let owner = self
                .documents
                .iter()
                .flatten()
                .find(|doc| doc.run_continuation(token));
            if owner.is_some() {
                ran += 1;
            }
        }
        ran
    }

    /// Drain the idle queue completely
    pub fn run_until_idle(&mut self) {
        while !self.queue.is_empty() {
            self.run_idle(usize::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::HighlightState;

    fn editor() -> Editor {
        Editor::new(Config::default()).unwrap()
    }

    #[test]
    fn test_open_detects_mode() {
        let mut editor = editor();
        let id = editor.open_document("main.c", "int x;");
        assert_eq!(editor.document(id).unwrap().language_mode(), Some("C"));
        let plain = editor.open_document("notes", "text");
        assert_eq!(editor.document(plain).unwrap().language_mode(), None);
    }

    #[test]
    fn test_start_and_stop_highlighting() {
        let mut editor = editor();
        let id = editor.open_document("main.c", "/* note */ int x;\n");
        editor.start_highlighting(id, false).unwrap();

        let doc = editor.document(id).unwrap();
        assert_eq!(doc.style_name_at(0).as_deref(), Some("Comment"));
        assert_eq!(doc.style_name_at(11).as_deref(), Some("Storage Type"));

        editor.stop_highlighting(id).unwrap();
        assert!(editor.document(id).unwrap().style_at(0).is_none());
    }

    #[test]
    fn test_deferred_start_runs_from_idle_queue() {
        let mut editor = editor();
        let text = "x = 1 /* y */\n".repeat(200);
        let id = editor.open_document("big.c", &text);
        editor.start_highlighting(id, true).unwrap();

        let highlighter = editor.document(id).unwrap().highlighter().unwrap();
        assert_eq!(highlighter.borrow().state(), HighlightState::ParsingChunk);
        assert!(!editor.queue().is_empty());

        editor.run_until_idle();
        assert_eq!(highlighter.borrow().frontier(), text.len());
        assert_eq!(highlighter.borrow().state(), HighlightState::DeferredPending);
    }

    #[test]
    fn test_stop_cancels_pending_work() {
        let mut editor = editor();
        let text = "a\n".repeat(2000);
        let id = editor.open_document("big.py", &text);
        editor.start_highlighting(id, true).unwrap();
        editor.stop_highlighting(id).unwrap();
        assert!(editor.queue().is_empty());
        assert_eq!(editor.run_idle(10), 0);
    }

    #[test]
    fn test_duplicate_document() {
        let mut editor = editor();
        let id = editor.open_document("lib.rs", "// hi\nfn main() {}\n");
        editor.start_highlighting(id, false).unwrap();
        let copy = editor.duplicate_document(id).unwrap();
        assert_ne!(copy, id);

        editor.document_mut(copy).unwrap().insert(0, "/* ");
        let copy_doc = editor.document(copy).unwrap();
        assert_eq!(copy_doc.style_name_at(10).as_deref(), Some("Comment"));
        let original = editor.document(id).unwrap();
        assert_eq!(original.text(), "// hi\nfn main() {}\n");
        assert_eq!(original.style_name_at(6).as_deref(), Some("Keyword"));
    }

    #[test]
    fn test_unknown_document_and_mode() {
        let mut editor = editor();
        assert!(matches!(
            editor.start_highlighting(DocumentId(7), false),
            Err(HighlightError::UnknownDocument(7))
        ));
        let id = editor.open_document("notes", "text");
        assert!(matches!(
            editor.start_highlighting(id, false),
            Err(HighlightError::NoPatternSet(_))
        ));
        editor.close_document(id).unwrap();
        assert!(editor.document(id).is_err());
    }
}
