//! Reparse context
//!
//! How much surrounding text a pattern set needs to see to style a position
//! correctly. Expressed as a number of lines and a number of characters; the
//! larger of the two distances applies.

/// Context requirements of a pattern set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparseContext {
    /// Lines of context (the line containing the position counts as one)
    pub lines: usize,
    /// Bytes of context
    pub chars: usize,
}

impl Default for ReparseContext {
    fn default() -> Self {
        Self { lines: 1, chars: 0 }
    }
}

impl ReparseContext {
    pub fn new(lines: usize, chars: usize) -> Self {
        Self { lines, chars }
    }

    /// Derive the context from the expressions of a pattern set
    ///
    /// Each explicit newline an expression can consume extends the reach of
    /// a match by one line.
    pub fn derive<'a>(exprs: impl IntoIterator<Item = &'a str>) -> Self {
        let reach = exprs.into_iter().map(newline_reach).max().unwrap_or(0);
        Self {
            lines: 1 + reach,
            chars: 0,
        }
    }

    /// Patterns confined to one line need no context beyond it
    pub fn can_cross_lines(&self) -> bool {
        self.lines != 1 || self.chars != 0
    }

    /// Position far enough back from `from` to give patterns their context
    ///
    /// When lines dominate, the result is the newline before the first
    /// line of context rather than that line's first character.
    pub fn lookback_from(&self, text: &[u8], from: usize) -> usize {
        let by_chars = || char_floor(text, from.saturating_sub(self.chars));
        let by_lines = || line_start_back(text, from, self.lines.saturating_sub(1)).saturating_sub(1);
        if self.lines == 0 {
            by_chars()
        } else if self.chars == 0 {
            by_lines()
        } else {
            by_lines().min(by_chars())
        }
    }

    /// Position far enough forward from `from` to give patterns their context
    pub fn lookahead_from(&self, text: &[u8], from: usize) -> usize {
        let len = text.len();
        let by_chars = || char_ceil(text, (from + self.chars).min(len));
        let by_lines = || line_start_forward(text, from, self.lines);
        if self.lines == 0 {
            by_chars()
        } else if self.chars == 0 {
            by_lines()
        } else {
            by_lines().max(by_chars())
        }
    }

    /// [`ReparseContext::lookback_from`] reaching at most `limit` bytes back
    pub fn lookback_within(&self, text: &[u8], from: usize, limit: usize) -> usize {
        let from = from.min(text.len());
        let floor = char_floor(text, from.saturating_sub(limit));
        floor + self.lookback_from(&text[floor..from], from - floor)
    }

    /// [`ReparseContext::lookahead_from`] reaching at most `limit` bytes ahead
    pub fn lookahead_within(&self, text: &[u8], from: usize, limit: usize) -> usize {
        let from = from.min(text.len());
        let ceil = char_ceil(text, from.saturating_add(limit));
        self.lookahead_from(&text[..ceil], from)
    }
}

fn newline_reach(expr: &str) -> usize {
    expr.matches("\\n").count() + expr.matches('\n').count()
}

/// Start of the line `n` lines back from `pos` (0 = the line containing `pos`)
pub fn line_start_back(text: &[u8], pos: usize, n: usize) -> usize {
    let mut remaining = n;
    let mut i = pos.min(text.len());
    while i > 0 {
        if text[i - 1] == b'\n' {
            if remaining == 0 {
                return i;
            }
            remaining -= 1;
        }
        i -= 1;
    }
    0
}

/// First character of the line `n` lines forward from `pos`, or the end
pub fn line_start_forward(text: &[u8], pos: usize, n: usize) -> usize {
    let mut remaining = n;
    let mut i = pos.min(text.len());
    if remaining == 0 {
        return i;
    }
    while i < text.len() {
        if text[i] == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return i + 1;
            }
        }
        i += 1;
    }
    text.len()
}

/// End of the line containing `pos` (position of its newline or text end)
pub fn line_end(text: &[u8], pos: usize) -> usize {
    text[pos.min(text.len())..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(text.len(), |i| pos + i)
}

fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Move `pos` back to a UTF-8 character boundary
pub fn char_floor(text: &[u8], pos: usize) -> usize {
    let mut p = pos.min(text.len());
    while p > 0 && p < text.len() && is_continuation(text[p]) {
        p -= 1;
    }
    p
}

/// Move `pos` forward to a UTF-8 character boundary
pub fn char_ceil(text: &[u8], pos: usize) -> usize {
    let mut p = pos.min(text.len());
    while p < text.len() && is_continuation(text[p]) {
        p += 1;
    }
    p
}

/// Position just past the character starting at `pos`
pub fn next_char(text: &[u8], pos: usize) -> usize {
    char_ceil(text, pos + 1)
}
