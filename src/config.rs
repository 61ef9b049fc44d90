//! Configuration file support
//!
//! Loads settings from ~/.hilite.toml (or %USERPROFILE%\.hilite.toml on Windows)
//!
//! Example:
//! ```text
//! [highlight]
//! chunk-size = 1000
//! reparse-step = 80
//! failure-limit = 2
//! defer-initial-parse = true
//!
//! [[mode]]
//! name = "Shell"
//! extensions = ["sh", "bash"]
//! patterns = "shell.patterns"
//!
//! [[style]]
//! name = "Comment"
//! fg = "bright-black"
//! italic = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::syntax::{Color, HighlightSettings, Style, StyleTable};

/// Configuration settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler tunables
    pub highlight: HighlightConfig,
    /// Extra language modes
    #[serde(rename = "mode")]
    pub modes: Vec<ModeConfig>,
    /// Style overrides
    #[serde(rename = "style")]
    pub styles: Vec<StyleConfig>,
}

/// The `[highlight]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HighlightConfig {
    pub chunk_size: usize,
    pub reparse_step: usize,
    pub failure_limit: usize,
    pub defer_initial_parse: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        let defaults = HighlightSettings::default();
        Self {
            chunk_size: defaults.chunk_size,
            reparse_step: defaults.reparse_step,
            failure_limit: defaults.failure_limit,
            defer_initial_parse: defaults.defer_initial_parse,
        }
    }
}

impl HighlightConfig {
    /// Scheduler settings, with out-of-range values clamped
    pub fn settings(&self) -> HighlightSettings {
        HighlightSettings {
            chunk_size: self.chunk_size.max(64),
            reparse_step: self.reparse_step.max(1),
            failure_limit: self.failure_limit.max(1),
            defer_initial_parse: self.defer_initial_parse,
        }
    }
}

/// A `[[mode]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ModeConfig {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Pattern-set file, relative to the configuration file
    pub patterns: PathBuf,
}

/// A `[[style]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct StyleConfig {
    pub name: String,
    pub fg: Option<String>,
    pub bg: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl StyleConfig {
    pub fn style(&self) -> Style {
        Style {
            fg: color(&self.name, self.fg.as_deref()),
            bg: color(&self.name, self.bg.as_deref()),
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
        }
    }
}

fn color(style: &str, name: Option<&str>) -> Color {
    let Some(name) = name else {
        return Color::Default;
    };
    Color::from_name(name).unwrap_or_else(|| {
        warn!(style, color = name, "unknown color");
        Color::Default
    })
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".hilite.toml"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".hilite.toml"))
        }
    }

    /// Load configuration from the default location
    ///
    /// A missing file yields the defaults; an unreadable one is an error.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from a file
    ///
    /// Relative pattern-set paths are resolved against the file's directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        if let Some(dir) = path.parent() {
            for mode in &mut config.modes {
                if mode.patterns.is_relative() {
                    mode.patterns = dir.join(&mode.patterns);
                }
            }
        }
        Ok(config)
    }

    /// Parse config file contents
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply style overrides to a style table
    pub fn apply_styles(&self, table: &mut StyleTable) {
        for entry in &self.styles {
            table.insert(&entry.name, entry.style());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HighlightError;

    #[test]
    fn test_parse_config() {
        let contents = r#"
# Comment
[highlight]
chunk-size = 500
defer-initial-parse = false

[[mode]]
name = "Shell"
extensions = ["sh"]
patterns = "/etc/hilite/shell.patterns"

[[style]]
name = "Comment"
fg = "cyan"
bold = true
        "#;

        let config = Config::parse(contents).unwrap();
        assert_eq!(config.highlight.chunk_size, 500);
        assert_eq!(config.highlight.reparse_step, 80);
        assert!(!config.highlight.defer_initial_parse);
        assert_eq!(config.modes.len(), 1);
        assert_eq!(config.modes[0].extensions, ["sh"]);
        assert_eq!(config.styles[0].style(), Style::fg(Color::Cyan).with_bold());
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.highlight.settings(), HighlightSettings::default());
        assert!(config.modes.is_empty());
    }

    #[test]
    fn test_settings_are_clamped() {
        let config = Config::parse("[highlight]\nchunk-size = 0\nfailure-limit = 0\n").unwrap();
        let settings = config.highlight.settings();
        assert_eq!(settings.chunk_size, 64);
        assert_eq!(settings.failure_limit, 1);
    }

    #[test]
    fn test_malformed_config() {
        let err = Config::parse("[highlight]\nchunk-size = \"big\"\n").unwrap_err();
        assert!(matches!(err, HighlightError::Config(_)));
    }

    #[test]
    fn test_apply_styles() {
        let config = Config::parse("[[style]]\nname = \"Keyword\"\nfg = \"mauve\"\nunderline = true\n").unwrap();
        let mut table = StyleTable::new();
        config.apply_styles(&mut table);
        let style = table.get("Keyword");
        assert_eq!(style.fg, Color::Default);
        assert!(style.underline);
        assert!(!style.bold);
    }
}
