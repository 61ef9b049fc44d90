//! Language modes
//!
//! A language mode pairs a name and a list of file extensions with the text
//! of its pattern set. The [`LanguageModeRegistry`] holds the built-in
//! modes plus any loaded from configuration and maps file names to modes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::builtin;
use super::pattern_set::PatternSet;
use crate::config::ModeConfig;
use crate::error::{HighlightError, Result};

/// One language mode
#[derive(Debug, Clone)]
pub struct LanguageMode {
    /// Mode name (e.g., "C", "Python")
    pub name: String,
    /// File extensions without the dot
    pub extensions: Vec<String>,
    /// Pattern-set text
    pub patterns: String,
}

impl LanguageMode {
    pub fn new(name: &str, patterns: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: Vec::new(),
            patterns: patterns.to_string(),
        }
    }

    /// Add a file extension
    pub fn add_extension(&mut self, ext: &str) {
        self.extensions.push(ext.to_string());
    }
}

/// Registry of language modes
#[derive(Debug, Clone)]
pub struct LanguageModeRegistry {
    modes: HashMap<String, LanguageMode>,
    /// Extension to mode name mapping
    extension_map: HashMap<String, String>,
}

impl Default for LanguageModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageModeRegistry {
    /// Create a registry with the built-in modes
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for mode in builtin::all_modes() {
            registry.add_mode(mode);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            modes: HashMap::new(),
            extension_map: HashMap::new(),
        }
    }

    /// Add a mode, replacing any mode of the same name
    pub fn add_mode(&mut self, mode: LanguageMode) {
        if let Some(old) = self.modes.remove(&mode.name) {
            self.extension_map.retain(|_, name| *name != old.name);
        }
        for ext in &mode.extensions {
            self.extension_map
                .insert(ext.trim_start_matches('.').to_lowercase(), mode.name.clone());
        }
        self.modes.insert(mode.name.clone(), mode);
    }

    /// Add the modes named in the configuration
    ///
    /// Each pattern-set file is read and checked before its mode is added.
    pub fn load_config_modes(&mut self, modes: &[ModeConfig]) -> Result<()> {
        for entry in modes {
            let text = fs::read_to_string(&entry.patterns)?;
            PatternSet::parse(&entry.name, &text)?;
            let mut mode = LanguageMode::new(&entry.name, &text);
            for ext in &entry.extensions {
                mode.add_extension(ext);
            }
            debug!(mode = %entry.name, path = %entry.patterns.display(), "loaded language mode");
            self.add_mode(mode);
        }
        Ok(())
    }

    /// Detect the mode from a file name
    pub fn detect_mode(&self, filename: &Path) -> Option<&str> {
        let ext = filename.extension()?.to_str()?.to_lowercase();
        self.extension_map.get(&ext).map(|s| s.as_str())
    }

    pub fn mode(&self, name: &str) -> Option<&LanguageMode> {
        self.modes.get(name)
    }

    /// Read the pattern set of a mode
    pub fn pattern_set(&self, name: &str) -> Result<PatternSet> {
        let mode = self
            .modes
            .get(name)
            .ok_or_else(|| HighlightError::NoPatternSet(name.to_string()))?;
        PatternSet::parse(&mode.name, &mode.patterns)
    }

    /// List available modes
    pub fn list_modes(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.modes.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_mode() {
        let registry = LanguageModeRegistry::new();

        assert_eq!(registry.detect_mode(Path::new("main.rs")), Some("Rust"));
        assert_eq!(registry.detect_mode(Path::new("test.py")), Some("Python"));
        assert_eq!(registry.detect_mode(Path::new("main.C")), Some("C"));
        assert_eq!(registry.detect_mode(Path::new("no_extension")), None);
        assert_eq!(registry.list_modes(), ["C", "Python", "Rust"]);
    }

    #[test]
    fn test_unknown_mode() {
        let registry = LanguageModeRegistry::new();
        let err = registry.pattern_set("Fortran").unwrap_err();
        assert!(matches!(err, HighlightError::NoPatternSet(name) if name == "Fortran"));
    }

    #[test]
    fn test_replace_mode() {
        let mut registry = LanguageModeRegistry::empty();
        let mut first = LanguageMode::new("Conf", "comment::\"#\"::Comment:\n");
        first.add_extension("conf");
        registry.add_mode(first);

        let mut second = LanguageMode::new("Conf", "comment::\";\"::Comment:\n");
        second.add_extension(".ini");
        registry.add_mode(second);

        assert_eq!(registry.detect_mode(Path::new("a.conf")), None);
        assert_eq!(registry.detect_mode(Path::new("a.ini")), Some("Conf"));
        let set = registry.pattern_set("Conf").unwrap();
        assert_eq!(set.patterns[0].start.as_deref(), Some(";"));
    }

    #[test]
    fn test_missing_pattern_file() {
        let mut registry = LanguageModeRegistry::empty();
        let modes = [ModeConfig {
            name: "Ghost".to_string(),
            extensions: vec!["ghost".to_string()],
            patterns: PathBuf::from("/nonexistent/hilite/ghost.patterns"),
        }];
        let err = registry.load_config_modes(&modes).unwrap_err();
        assert!(matches!(err, HighlightError::Io(_)));
        assert!(registry.list_modes().is_empty());
    }
}
