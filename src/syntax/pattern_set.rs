//! Pattern-set text reader
//!
//! A pattern set is the declarative description of one language mode's
//! highlighting: one record per line,
//!
//! ```text
//! name:parentName:startExpr:endExpr:styleName:flags[:errorExpr]
//! ```
//!
//! Any field may be wrapped in double quotes to contain colons; inside
//! quotes `""` stands for one quote character. Empty fields are absent.
//! Lines starting with `#` are comments, and a `@context <lines> <chars>`
//! line overrides the derived reparse context.

use super::context::ReparseContext;
use crate::error::{HighlightError, Result};

/// Pattern flags as written in the pattern-set text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternFlags {
    /// `R`: scan children from the start of the start match
    pub parse_from_start: bool,
    /// `D`: evaluate lazily, when the text is about to be displayed
    pub deferred: bool,
    /// `C`: only recolor sub-expressions of the parent's matches
    pub color_only: bool,
}

impl PatternFlags {
    fn parse(field: &str) -> std::result::Result<Self, String> {
        let mut flags = PatternFlags::default();
        for c in field.chars() {
            match c {
                'R' => flags.parse_from_start = true,
                'D' => flags.deferred = true,
                'C' => flags.color_only = true,
                ' ' | '\t' => {}
                other => return Err(format!("unreadable flag '{other}'")),
            }
        }
        Ok(flags)
    }
}

/// Source form of one highlight pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub name: String,
    pub parent: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub error: Option<String>,
    pub style: String,
    pub flags: PatternFlags,
}

impl PatternSpec {
    /// A top-level pattern matching `start` with `style`
    pub fn new(name: &str, start: &str, style: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            start: Some(start.to_string()),
            end: None,
            error: None,
            style: style.to_string(),
            flags: PatternFlags::default(),
        }
    }

    /// Builder: set the end expression
    pub fn with_end(mut self, end: &str) -> Self {
        self.end = Some(end.to_string());
        self
    }

    /// Builder: set the error expression
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Builder: attach under another pattern
    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// Builder: set flags
    pub fn with_flags(mut self, flags: PatternFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder: mark as deferred
    pub fn deferred(mut self) -> Self {
        self.flags.deferred = true;
        self
    }

    /// All expressions of this pattern
    pub fn exprs(&self) -> impl Iterator<Item = &str> {
        [&self.start, &self.end, &self.error]
            .into_iter()
            .filter_map(|e| e.as_deref())
    }
}

/// Pattern set of one language mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    pub language_mode: String,
    /// Explicit context from a `@context` line
    pub context: Option<ReparseContext>,
    pub patterns: Vec<PatternSpec>,
}

impl PatternSet {
    /// Create a pattern set from already-built specs
    pub fn new(language_mode: &str, patterns: Vec<PatternSpec>) -> Self {
        Self {
            language_mode: language_mode.to_string(),
            context: None,
            patterns,
        }
    }

    /// Read a pattern set from its text form
    pub fn parse(language_mode: &str, text: &str) -> Result<Self> {
        let mut set = PatternSet::new(language_mode, Vec::new());

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let syntax = |message: String| HighlightError::PatternSyntax {
                line: line_no,
                message,
            };

            if let Some(rest) = line.strip_prefix("@context") {
                set.context = Some(parse_context(rest).map_err(syntax)?);
                continue;
            }

            let fields = split_fields(line).map_err(syntax)?;
            set.patterns.push(spec_from_fields(fields).map_err(syntax)?);
        }

        Ok(set)
    }

    /// The reparse context: explicit if given, derived otherwise
    pub fn reparse_context(&self) -> ReparseContext {
        self.context.unwrap_or_else(|| {
            ReparseContext::derive(self.patterns.iter().flat_map(|p| p.exprs()))
        })
    }
}

fn parse_context(rest: &str) -> std::result::Result<ReparseContext, String> {
    let mut nums = rest.split_whitespace().map(str::parse::<usize>);
    match (nums.next(), nums.next(), nums.next()) {
        (Some(Ok(lines)), Some(Ok(chars)), None) => Ok(ReparseContext::new(lines, chars)),
        _ => Err("@context expects two numbers: lines and characters".to_string()),
    }
}

fn spec_from_fields(fields: Vec<String>) -> std::result::Result<PatternSpec, String> {
    if fields.len() != 6 && fields.len() != 7 {
        return Err(format!("expected 6 or 7 fields, found {}", fields.len()));
    }
    let mut fields = fields.into_iter();
    let mut next = || fields.next().filter(|f| !f.is_empty());

    let name = next().ok_or("pattern name is required")?;
    let parent = next();
    let start = next();
    let end = next();
    let style = next().ok_or("style field required in pattern")?;
    let flags = PatternFlags::parse(next().as_deref().unwrap_or(""))?;
    let error = next();

    Ok(PatternSpec {
        name,
        parent,
        start,
        end,
        error,
        style,
        flags,
    })
}

/// Split a record at unquoted colons
fn split_fields(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("unterminated quoted field".to_string()),
                }
            }
            match chars.next() {
                Some(':') => {
                    fields.push(field);
                    continue;
                }
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(c) => return Err(format!("expected ':' after quoted field, found '{c}'")),
            }
        }

        loop {
            match chars.next() {
                Some(':') => break,
                Some(c) => field.push(c),
                None => {
                    fields.push(field.trim_end().to_string());
                    return Ok(fields);
                }
            }
        }
        fields.push(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_record() {
        let set = PatternSet::parse("Test", "keyword::\\bif\\b::Keyword:D\n").unwrap();
        assert_eq!(set.patterns.len(), 1);
        let p = &set.patterns[0];
        assert_eq!(p.name, "keyword");
        assert_eq!(p.parent, None);
        assert_eq!(p.start.as_deref(), Some("\\bif\\b"));
        assert_eq!(p.end, None);
        assert_eq!(p.style, "Keyword");
        assert!(p.flags.deferred);
        assert!(!p.flags.color_only);
    }

    #[test]
    fn test_quoted_fields_may_contain_colons() {
        let text = r#"
# block comments
comment::"/\*":"\*/":Comment:
string::"(?:L)?""":"""":String::"\n"
"#;
        let set = PatternSet::parse("Test", text).unwrap();
        assert_eq!(set.patterns.len(), 2);
        assert_eq!(set.patterns[0].end.as_deref(), Some("\\*/"));
        let string = &set.patterns[1];
        assert_eq!(string.start.as_deref(), Some("(?:L)?\""));
        assert_eq!(string.end.as_deref(), Some("\""));
        assert_eq!(string.error.as_deref(), Some("\\n"));
    }

    #[test]
    fn test_child_and_flags() {
        let set = PatternSet::parse("Test", "escape:string:\\\\.::String1:RC\n").unwrap();
        let p = &set.patterns[0];
        assert_eq!(p.parent.as_deref(), Some("string"));
        assert!(p.flags.parse_from_start);
        assert!(p.flags.color_only);
    }

    #[test]
    fn test_context_directive() {
        let set = PatternSet::parse("Test", "@context 2 10\nx::x::Plain:\n").unwrap();
        assert_eq!(set.reparse_context(), ReparseContext::new(2, 10));

        let derived = PatternSet::parse("Test", "x::a\\nb::Plain:\n").unwrap();
        assert_eq!(derived.reparse_context(), ReparseContext::new(2, 0));
    }

    #[test]
    fn test_syntax_errors_report_line() {
        let err = PatternSet::parse("Test", "ok::a::Plain:\nbroken:a\n").unwrap_err();
        assert!(matches!(err, HighlightError::PatternSyntax { line: 2, .. }));

        let err = PatternSet::parse("Test", "x::a::Plain:Q\n").unwrap_err();
        assert!(matches!(err, HighlightError::PatternSyntax { line: 1, .. }));

        let err = PatternSet::parse("Test", "x::\"open::Plain:\n").unwrap_err();
        assert!(matches!(err, HighlightError::PatternSyntax { .. }));

        let err = PatternSet::parse("Test", "@context one\n").unwrap_err();
        assert!(matches!(err, HighlightError::PatternSyntax { .. }));
    }

    #[test]
    fn test_missing_name_or_style() {
        assert!(PatternSet::parse("Test", ":::a::Plain:").is_err());
        assert!(PatternSet::parse("Test", "x::a:::").is_err());
    }
}
