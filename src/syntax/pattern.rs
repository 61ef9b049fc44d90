//! Compiled highlight patterns
//!
//! This module defines the matchable form of a pattern set: compiled
//! expressions, the tagged pattern kinds, and the sub-matcher that finds the
//! next interesting position inside a pattern (its end, its error, or the
//! start of one of its children).

use regex::bytes::{Regex, RegexBuilder};

use super::style_buffer::StyleCode;

/// Compiled size limit for a single expression
const EXPR_SIZE_LIMIT: usize = 1 << 22;

/// A compiled regular expression together with its source
///
/// Expressions are compiled in multi-line mode so `^` and `$` match at line
/// boundaries anywhere in the buffer.
#[derive(Debug, Clone)]
pub struct Expr {
    source: String,
    regex: Regex,
}

impl Expr {
    /// Compile an expression
    pub fn compile(source: &str) -> Result<Self, String> {
        build_regex(source).map(|regex| Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of capture slots, including the implicit whole-match group
    pub fn captures_len(&self) -> usize {
        self.regex.captures_len()
    }

    /// Find the leftmost match starting at or after `start`
    ///
    /// Text before `start` is still visible to assertions such as `\b`.
    pub fn find_at(&self, hay: &[u8], start: usize) -> Option<(usize, usize)> {
        if start > hay.len() {
            return None;
        }
        self.regex.find_at(hay, start).map(|m| (m.start(), m.end()))
    }

    /// Match beginning exactly at `start`, returning all group spans
    pub fn match_here(&self, hay: &[u8], start: usize) -> Option<Vec<Option<(usize, usize)>>> {
        if start > hay.len() {
            return None;
        }
        let caps = self.regex.captures_at(hay, start)?;
        let whole = caps.get(0)?;
        if whole.start() != start {
            return None;
        }
        Some(
            (0..caps.len())
                .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
                .collect(),
        )
    }
}

fn build_regex(source: &str) -> Result<Regex, String> {
    RegexBuilder::new(source)
        .multi_line(true)
        .size_limit(EXPR_SIZE_LIMIT)
        .build()
        .map_err(|e| e.to_string())
}

/// Index of a pattern within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub(crate) usize);

/// Which parsing pass evaluates a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Parsed as soon as text changes
    Immediate,
    /// Parsed when the text is about to be displayed
    Deferred,
}

/// What a pattern matches and how its children are scanned
#[derive(Debug, Clone)]
pub enum PatternKind {
    /// Synthetic root of a pass; its children are the top-level patterns
    Root,
    /// A single match; children are scanned within it
    Simple { start: Expr },
    /// A delimited construct that may span lines and may stay open
    NestedBlock {
        start: Expr,
        end: Expr,
        /// Terminates the construct before the offending text
        error: Option<Expr>,
        /// Scan children from the start of the start match
        from_start: bool,
    },
    /// Recolors sub-expressions of the parent's start and end matches
    ColorOnly {
        start_groups: Vec<usize>,
        end_groups: Vec<usize>,
    },
}

/// Parse a color-only reference list: `&` is the whole match, `\N` group N
pub fn parse_group_refs(field: Option<&str>) -> Result<Vec<usize>, String> {
    let mut groups = Vec::new();
    let Some(field) = field else {
        return Ok(groups);
    };
    let mut rest = field;
    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix('&') {
            groups.push(0);
            rest = r;
        } else if let Some(r) = rest.strip_prefix('\\') {
            let digits = r.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return Err(format!("bad sub-expression reference in \"{field}\""));
            }
            groups.push(r[..digits].parse().map_err(|_| format!("bad reference in \"{field}\""))?);
            rest = &r[digits..];
        } else {
            return Err(format!("bad sub-expression reference in \"{field}\""));
        }
    }
    Ok(groups)
}

/// A pattern in compiled form
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub(crate) name: String,
    pub(crate) style: String,
    pub(crate) code: StyleCode,
    pub(crate) pass: Pass,
    pub(crate) parent: Option<PatternId>,
    pub(crate) children: Vec<PatternId>,
    pub(crate) kind: PatternKind,
    pub(crate) sub: Option<SubMatcher>,
    pub(crate) enabled: bool,
}

impl CompiledPattern {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved style name
    pub fn style_name(&self) -> &str {
        &self.style
    }

    pub fn code(&self) -> StyleCode {
        self.code
    }

    pub fn pass(&self) -> Pass {
        self.pass
    }

    pub fn parent(&self) -> Option<PatternId> {
        self.parent
    }

    pub fn children(&self) -> &[PatternId] {
        &self.children
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_color_only(&self) -> bool {
        matches!(self.kind, PatternKind::ColorOnly { .. })
    }

    /// Parsing can begin inside this pattern's text
    pub fn is_resumable(&self) -> bool {
        matches!(self.kind, PatternKind::Root | PatternKind::NestedBlock { .. })
    }

    /// Start expression, if the pattern is matched on its own
    pub fn start_expr(&self) -> Option<&Expr> {
        match &self.kind {
            PatternKind::Simple { start } | PatternKind::NestedBlock { start, .. } => Some(start),
            PatternKind::Root | PatternKind::ColorOnly { .. } => None,
        }
    }

    pub fn end_expr(&self) -> Option<&Expr> {
        match &self.kind {
            PatternKind::NestedBlock { end, .. } => Some(end),
            _ => None,
        }
    }
}

/// What a sub-matcher branch stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    End,
    Error,
    Child(PatternId),
}

/// A sub-matcher hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMatch {
    pub branch: Branch,
    pub start: usize,
    pub end: usize,
}

/// Finds the next end, error or child start inside a pattern
///
/// The leftmost match wins; among matches starting at the same position
/// the earliest branch wins, so definition order decides priority.
#[derive(Debug, Clone)]
pub struct SubMatcher {
    branches: Vec<(Branch, Expr)>,
    combined: Option<Combined>,
}

#[derive(Debug, Clone)]
struct Combined {
    regex: Regex,
    /// Capture group wrapping each branch
    groups: Vec<usize>,
}

impl SubMatcher {
    /// Build from ordered branches; `None` when there is nothing to match
    pub fn build(branches: Vec<(Branch, Expr)>) -> Option<Self> {
        if branches.is_empty() {
            return None;
        }

        let mut groups = Vec::with_capacity(branches.len());
        let mut next_group = 1;
        let mut source = String::new();
        for (i, (_, expr)) in branches.iter().enumerate() {
            if i > 0 {
                source.push('|');
            }
            source.push('(');
            source.push_str(expr.source());
            source.push(')');
            groups.push(next_group);
            next_group += expr.captures_len();
        }

        // Falls back to scanning branches one by one, e.g. when two
        // branches reuse a group name
        let combined = build_regex(&source).ok().map(|regex| Combined { regex, groups });

        Some(Self { branches, combined })
    }

    pub fn branches(&self) -> impl Iterator<Item = Branch> + '_ {
        self.branches.iter().map(|(b, _)| *b)
    }

    /// Whether the branches were merged into one expression
    pub fn is_combined(&self) -> bool {
        self.combined.is_some()
    }

    /// Find the next branch match starting at or after `start`
    pub fn find_at(&self, hay: &[u8], start: usize) -> Result<Option<SubMatch>, String> {
        if start > hay.len() {
            return Ok(None);
        }
        match &self.combined {
            Some(combined) => {
                let Some(caps) = combined.regex.captures_at(hay, start) else {
                    return Ok(None);
                };
                let whole = caps.get(0).ok_or("combined expression lost its match")?;
                let idx = combined
                    .groups
                    .iter()
                    .position(|&g| caps.get(g).is_some())
                    .ok_or("failed to identify the matching branch")?;
                Ok(Some(SubMatch {
                    branch: self.branches[idx].0,
                    start: whole.start(),
                    end: whole.end(),
                }))
            }
            None => {
                let mut best: Option<SubMatch> = None;
                for (branch, expr) in &self.branches {
                    if let Some((s, e)) = expr.find_at(hay, start) {
                        if best.map_or(true, |b| s < b.start) {
                            best = Some(SubMatch {
                                branch: *branch,
                                start: s,
                                end: e,
                            });
                        }
                    }
                }
                Ok(best)
            }
        }
    }
}
