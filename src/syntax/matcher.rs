//! Recursive-descent pattern matcher
//!
//! Given a pattern whose children form the pattern list, the matcher walks
//! a span of text and produces one style code per byte. At each position
//! the pattern's sub-matcher looks for the nearest of: its end expression,
//! its error expression, or the start of any child. Priority among matches
//! at the same position is definition order, not match length.
//!
//! Text before the parse start stays visible to zero-width assertions such
//! as `^` and `\b`, so a parse that begins mid-line behaves the same as one
//! that began earlier.

use super::context::{char_floor, next_char};
use super::pattern::{Branch, PatternId, PatternKind, SubMatch, SubMatcher};
use super::style_buffer::StyleCode;
use super::table::PatternTable;
use crate::error::HighlightError;

/// A span to parse
#[derive(Debug, Clone, Copy)]
pub struct MatchRequest<'t> {
    /// The whole text
    pub text: &'t [u8],
    /// First position to style
    pub start: usize,
    /// Position through which styles are required
    pub end: usize,
    /// Accept only a match beginning exactly at `start`
    pub anchored: bool,
    /// Earliest position assertions may look back to
    pub look_behind: usize,
    /// Matches may not extend past this position
    pub match_till: usize,
}

impl<'t> MatchRequest<'t> {
    pub fn new(text: &'t [u8], start: usize, end: usize) -> Self {
        Self {
            text,
            start,
            end,
            anchored: false,
            look_behind: 0,
            match_till: text.len(),
        }
    }

    /// Builder: make the request anchored
    pub fn anchored(mut self) -> Self {
        self.anchored = true;
        self
    }

    /// Builder: set the look-behind boundary
    pub fn with_look_behind(mut self, look_behind: usize) -> Self {
        self.look_behind = look_behind;
        self
    }

    /// Builder: set the match boundary
    pub fn with_match_till(mut self, match_till: usize) -> Self {
        self.match_till = match_till;
        self
    }
}

/// A runtime failure attributed to a pattern
#[derive(Debug)]
pub struct MatchFailure {
    pub pattern: PatternId,
    pub error: HighlightError,
}

/// Result of parsing a span
#[derive(Debug)]
pub struct MatchOutcome {
    /// Codes for `[start, end)` of the request
    pub styles: Vec<StyleCode>,
    /// Where parsing stopped
    pub end: usize,
    /// Patterns still open at `end`, innermost first
    pub open: Vec<PatternId>,
    pub failures: Vec<MatchFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// End expression matched, or the pattern has none
    Ended,
    /// Error expression matched
    Errored,
    /// Stopped at the required end without seeing the end expression
    Open,
}

/// Parse a span with a single pattern
pub fn match_span(table: &PatternTable, pattern: PatternId, request: &MatchRequest) -> MatchOutcome {
    let mut state = ParseState::new(table, request);
    let (end, status) = state.parse_string(
        pattern,
        request.start,
        request.end,
        state.till,
        request.anchored,
        false,
    );
    state.finish(end, |open| {
        if status == Status::Open {
            open.push(pattern);
        }
    })
}

/// Parse a span starting inside the patterns of `stack` (innermost first)
///
/// When the innermost pattern ends, parsing continues in the next one out,
/// and finally in `root`.
pub fn resume(
    table: &PatternTable,
    stack: &[PatternId],
    root: PatternId,
    request: &MatchRequest,
) -> MatchOutcome {
    let mut state = ParseState::new(table, request);
    let mut levels: Vec<PatternId> = stack.iter().copied().filter(|&id| id != root).collect();
    levels.push(root);

    let mut pos = request.start;
    let mut still_open = Vec::new();
    for (i, &id) in levels.iter().enumerate() {
        let (stop, status) = state.parse_string(id, pos, request.end, state.till, false, false);
        pos = stop;
        let outer = &levels[i..levels.len() - 1];
        if status == Status::Open {
            still_open.extend_from_slice(outer);
            break;
        }
        if pos >= request.end {
            still_open.extend_from_slice(&outer[outer.len().min(1)..]);
            break;
        }
    }
    state.finish(pos, |open| open.extend(still_open))
}

/// Run the deferred pass over already-parsed styles
///
/// `styles` covers the text from `base`. Each run of plain, unfinished or
/// deferred codes is reparsed with the deferred patterns; runs starting at
/// or after `length_end` are left alone. Matches may look at text up to
/// `till`, past the end of `styles`, but only codes inside a run are
/// written.
pub fn pass_two(
    table: &PatternTable,
    text: &[u8],
    styles: &mut [StyleCode],
    base: usize,
    length_end: usize,
    till: usize,
) -> Vec<MatchFailure> {
    let mut failures = Vec::new();
    let Some(root) = table.deferred_root() else {
        return failures;
    };
    let end = base + styles.len();
    let mut p = base;
    while p < end && p < length_end {
        if !table.is_pass_two_target(styles[p - base]) {
            p += 1;
            continue;
        }
        let run_start = p;
        while p < end && table.is_pass_two_target(styles[p - base]) {
            p += 1;
        }
        let request = MatchRequest::new(text, run_start, p.min(length_end))
            .with_look_behind(base)
            .with_match_till(till.max(p));
        let outcome = match_span(table, root, &request);
        let n = outcome.styles.len().min(p - run_start);
        styles[run_start - base..run_start - base + n].copy_from_slice(&outcome.styles[..n]);
        failures.extend(outcome.failures);
    }
    failures
}

struct ParseState<'a> {
    table: &'a PatternTable,
    text: &'a [u8],
    look_behind: usize,
    till: usize,
    /// Position of `styles[0]`
    origin: usize,
    styles: Vec<StyleCode>,
    open: Vec<PatternId>,
    failures: Vec<MatchFailure>,
}

impl<'a> ParseState<'a> {
    fn new(table: &'a PatternTable, request: &MatchRequest<'a>) -> Self {
        let text = request.text;
        let till = request.match_till.min(text.len());
        let start = request.start.min(till);
        let required = request.end.clamp(start, till);
        // The character before the start is always visible
        let look_behind = request
            .look_behind
            .min(char_floor(text, start.saturating_sub(1)));
        Self {
            table,
            text,
            look_behind,
            till,
            origin: start,
            styles: vec![StyleCode::UNFINISHED; required - start],
            open: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn finish(mut self, end: usize, outer: impl FnOnce(&mut Vec<PatternId>)) -> MatchOutcome {
        let end = end.clamp(self.origin, self.till);
        self.styles.resize(end - self.origin, StyleCode::UNFINISHED);
        outer(&mut self.open);
        MatchOutcome {
            styles: self.styles,
            end,
            open: self.open,
            failures: self.failures,
        }
    }

    fn fill(&mut self, from: usize, to: usize, code: StyleCode) {
        let from = from.max(self.origin);
        let to = to.min(self.till);
        if from < to {
            // Matches may run past the required end
            if self.styles.len() < to - self.origin {
                self.styles.resize(to - self.origin, StyleCode::UNFINISHED);
            }
            self.styles[from - self.origin..to - self.origin].fill(code);
        }
    }

    fn fail(&mut self, pattern: PatternId, pos: usize, message: &str) {
        self.failures.push(MatchFailure {
            pattern,
            error: HighlightError::MatchRuntime {
                name: self.table.pattern(pattern).name().to_string(),
                pos,
                message: message.to_string(),
            },
        });
    }

    fn search(&self, sub: &SubMatcher, pos: usize, till: usize) -> Result<Option<SubMatch>, String> {
        let text = self.text;
        let hay = &text[self.look_behind..till];
        let found = sub.find_at(hay, pos - self.look_behind)?;
        Ok(found.map(|m| SubMatch {
            branch: m.branch,
            start: m.start + self.look_behind,
            end: m.end + self.look_behind,
        }))
    }

    /// Parse inside `id` from `start` until its end or error expression
    /// matches, or `required_end` is reached
    ///
    /// Matches must begin before `required_end` but may extend to `till`.
    /// `bounded` is set inside a simple pattern's match, where reaching the
    /// end does not leave anything open.
    fn parse_string(
        &mut self,
        id: PatternId,
        start: usize,
        required_end: usize,
        till: usize,
        anchored: bool,
        bounded: bool,
    ) -> (usize, Status) {
        let table = self.table;
        let pattern = table.pattern(id);
        let code = pattern.code();
        let unclosed = if pattern.end_expr().is_some() {
            Status::Open
        } else {
            Status::Ended
        };

        if start >= required_end {
            return (start, unclosed);
        }
        let Some(sub) = pattern.sub.as_ref() else {
            if anchored {
                return (start, unclosed);
            }
            self.fill(start, required_end, code);
            return (required_end, unclosed);
        };

        let mut pos = start;
        while pos < required_end {
            let found = match self.search(sub, pos, till) {
                Ok(found) => found,
                Err(message) => {
                    self.fail(id, pos, &message);
                    None
                }
            };
            let Some(m) = found.filter(|m| m.start < required_end) else {
                break;
            };
            if anchored && m.start != start {
                break;
            }

            let before = pos;
            self.fill(pos, m.start, code);
            pos = m.start;

            match m.branch {
                Branch::End => {
                    self.fill(m.start, m.end, code);
                    self.recolor(id, m.start, till, false);
                    return (m.end, Status::Ended);
                }
                Branch::Error => return (m.start, Status::Errored),
                Branch::Child(child) => {
                    pos = self.enter_child(child, m, required_end, till, bounded);
                }
            }

            if pos == before {
                if let Branch::Child(child) = m.branch {
                    if !matches!(table.pattern(child).kind(), PatternKind::NestedBlock { .. }) {
                        self.fail(child, pos, "matched empty text");
                    }
                }
                if pos >= till {
                    break;
                }
                let next = next_char(self.text, pos).min(till);
                self.fill(pos, next, code);
                pos = next;
            }
            if anchored {
                return (pos, unclosed);
            }
        }

        if anchored {
            return (pos, unclosed);
        }
        if pos < required_end {
            self.fill(pos, required_end, code);
            pos = required_end;
        }
        (pos, unclosed)
    }

    /// Style a child match and everything its own children match
    fn enter_child(
        &mut self,
        child: PatternId,
        m: SubMatch,
        required_end: usize,
        till: usize,
        bounded: bool,
    ) -> usize {
        let table = self.table;
        let pattern = table.pattern(child);
        let code = pattern.code();
        let stop = match pattern.kind() {
            PatternKind::NestedBlock { from_start, .. } => {
                let from = if *from_start {
                    m.start
                } else {
                    self.fill(m.start, m.end, code);
                    m.end
                };
                let (stop, status) = self.parse_string(child, from, required_end, till, false, bounded);
                if status == Status::Open && !bounded {
                    self.open.push(child);
                }
                stop
            }
            PatternKind::Simple { .. } if pattern.sub.is_some() => {
                // Children stay within the simple match
                self.parse_string(child, m.start, m.end, m.end, false, true);
                m.end
            }
            _ => {
                self.fill(m.start, m.end, code);
                m.end
            }
        };
        self.recolor(child, m.start, till, true);
        stop
    }

    /// Apply color-only children of `id` to its start or end match at `at`
    fn recolor(&mut self, id: PatternId, at: usize, till: usize, start: bool) {
        let table = self.table;
        let pattern = table.pattern(id);
        let expr = if start {
            pattern.start_expr()
        } else {
            pattern.end_expr()
        };
        let Some(expr) = expr else {
            return;
        };

        let mut groups = None;
        for &child_id in pattern.children() {
            let child = table.pattern(child_id);
            if !child.is_enabled() {
                continue;
            }
            let refs = match child.kind() {
                PatternKind::ColorOnly { start_groups, .. } if start => start_groups,
                PatternKind::ColorOnly { end_groups, .. } if !start => end_groups,
                _ => continue,
            };
            if refs.is_empty() {
                continue;
            }
            if groups.is_none() {
                let text = self.text;
                let hay = &text[self.look_behind..till];
                groups = expr.match_here(hay, at - self.look_behind);
                if groups.is_none() {
                    self.fail(child_id, at, "failed to recover the parent's match");
                    return;
                }
            }
            let Some(spans) = groups.as_ref() else {
                return;
            };
            let spans: Vec<(usize, usize)> = refs
                .iter()
                .filter_map(|&g| spans.get(g).copied().flatten())
                .collect();
            for (s, e) in spans {
                self.fill(s + self.look_behind, e + self.look_behind, child.code());
            }
        }
    }
}
