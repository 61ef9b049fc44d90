//! Style types for text rendering
//!
//! Highlight patterns name their style; the [`StyleTable`] resolves those
//! names to visual attributes. Unknown names fall back to `Plain`.

use std::collections::HashMap;

/// Terminal colors (ANSI 16-color palette for compatibility)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl Color {
    /// Look up a color by name, e.g. `"red"` or `"bright-blue"`
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let color = match normalized.as_str() {
            "default" => Color::Default,
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "white" => Color::White,
            "gray" | "grey" | "bright-black" => Color::BrightBlack,
            "bright-red" => Color::BrightRed,
            "bright-green" => Color::BrightGreen,
            "bright-yellow" => Color::BrightYellow,
            "bright-blue" => Color::BrightBlue,
            "bright-magenta" => Color::BrightMagenta,
            "bright-cyan" => Color::BrightCyan,
            "bright-white" => Color::BrightWhite,
            _ => return None,
        };
        Some(color)
    }
}

/// Text style attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Bold text
    pub bold: bool,
    /// Italic text
    pub italic: bool,
    /// Underlined text
    pub underline: bool,
}

impl Style {
    /// Create a style with just foreground color
    pub fn fg(color: Color) -> Self {
        Self {
            fg: color,
            ..Default::default()
        }
    }

    /// Builder: set background color
    pub fn with_bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    /// Builder: set bold
    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Builder: set italic
    pub fn with_italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Check if this is the default (no styling)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Name of the style for unclaimed text
pub const PLAIN_STYLE: &str = "Plain";

/// Named styles available to highlight patterns
#[derive(Debug, Clone)]
pub struct StyleTable {
    styles: HashMap<String, Style>,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTable {
    /// Create a table holding the standard style names
    pub fn new() -> Self {
        let mut table = Self::empty();
        let plain = Style::default();
        let entries = [
            (PLAIN_STYLE, plain),
            ("Comment", Style::fg(Color::BrightBlack).with_italic()),
            ("Keyword", Style::fg(Color::Blue).with_bold()),
            ("Operator", Style::fg(Color::Blue).with_bold()),
            ("Bracket", Style::fg(Color::Blue).with_bold()),
            ("Storage Type", Style::fg(Color::Yellow).with_bold()),
            ("Storage Type1", Style::fg(Color::Yellow)),
            ("String", Style::fg(Color::Green)),
            ("String1", Style::fg(Color::BrightGreen)),
            ("String2", Style::fg(Color::Green).with_bold()),
            ("Preprocessor", Style::fg(Color::Magenta)),
            ("Preprocessor1", Style::fg(Color::BrightMagenta)),
            ("Character Const", Style::fg(Color::Green)),
            ("Numeric Const", Style::fg(Color::Cyan)),
            ("Identifier", Style::fg(Color::Yellow)),
            ("Identifier1", Style::fg(Color::BrightBlue)),
            ("Identifier2", Style::fg(Color::Cyan)),
            ("Subroutine", Style::fg(Color::BrightYellow)),
            ("Subroutine1", Style::fg(Color::Yellow)),
            ("Label", Style::fg(Color::Red).with_italic()),
            ("Flag", Style::fg(Color::Red).with_bold()),
            ("Pointer", Style::fg(Color::Red).with_bold()),
            ("Regex", Style::fg(Color::BrightCyan).with_bold()),
            ("Warning", Style::fg(Color::BrightRed).with_italic()),
        ];
        for (name, style) in entries {
            table.insert(name, style);
        }
        table
    }

    /// Create a table without any styles, not even `Plain`
    pub fn empty() -> Self {
        Self {
            styles: HashMap::new(),
        }
    }

    /// Add or replace a named style
    pub fn insert(&mut self, name: &str, style: Style) {
        self.styles.insert(name.to_string(), style);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    /// Attributes for a style name; unknown names render as plain text
    pub fn get(&self, name: &str) -> Style {
        self.styles
            .get(name)
            .or_else(|| self.styles.get(PLAIN_STYLE))
            .copied()
            .unwrap_or_default()
    }

    /// Style names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.styles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
