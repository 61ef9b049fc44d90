//! Per-character style storage
//!
//! The style buffer holds one [`StyleCode`] for every byte of the text it is
//! paired with. It is updated from the same modification notifications as
//! the text so offsets never drift.

use std::ops::Range;

/// Identifier of a visual classification assigned to text
///
/// Every compiled pattern owns one code. Two values are reserved:
/// [`StyleCode::UNFINISHED`] marks text whose style is not yet known and
/// [`StyleCode::PLAIN`] marks text no pattern claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleCode(u16);

impl StyleCode {
    /// Style not yet determined
    pub const UNFINISHED: StyleCode = StyleCode(0);
    /// Unstyled text
    pub const PLAIN: StyleCode = StyleCode(1);

    pub(crate) const fn new(raw: u16) -> Self {
        StyleCode(raw)
    }

    /// Raw numeric value
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Plain or not yet parsed
    pub fn is_plain(self) -> bool {
        self == Self::PLAIN || self == Self::UNFINISHED
    }

    pub fn is_unfinished(self) -> bool {
        self == Self::UNFINISHED
    }
}

/// Style annotation store paired 1:1 with a text buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleBuffer {
    codes: Vec<StyleCode>,
}

impl StyleBuffer {
    /// Create an empty style buffer
    pub fn new() -> Self {
        Self { codes: Vec::new() }
    }

    /// Create a buffer of `len` unfinished codes
    pub fn unfinished(len: usize) -> Self {
        Self {
            codes: vec![StyleCode::UNFINISHED; len],
        }
    }

    /// Number of codes (equals the paired text length in bytes)
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Style at a position
    pub fn get(&self, pos: usize) -> Option<StyleCode> {
        self.codes.get(pos).copied()
    }

    /// Borrow a range of codes
    pub fn slice(&self, range: Range<usize>) -> &[StyleCode] {
        &self.codes[range]
    }

    pub fn as_slice(&self) -> &[StyleCode] {
        &self.codes
    }

    /// Overwrite `[start, end)` with `codes`
    ///
    /// `codes` must hold exactly `end - start` entries.
    pub fn set_range(&mut self, start: usize, end: usize, codes: &[StyleCode]) {
        debug_assert_eq!(end - start, codes.len());
        self.codes[start..end].copy_from_slice(codes);
    }

    /// Fill `[start, end)` with a single code
    pub fn fill(&mut self, start: usize, end: usize, code: StyleCode) {
        let end = end.min(self.codes.len());
        if start < end {
            self.codes[start..end].fill(code);
        }
    }

    /// Open a gap of `len` unfinished codes at `pos`
    pub fn insert_gap(&mut self, pos: usize, len: usize) {
        self.codes
            .splice(pos..pos, std::iter::repeat(StyleCode::UNFINISHED).take(len));
    }

    /// Remove the codes in `[start, end)`
    pub fn delete_range(&mut self, start: usize, end: usize) {
        self.codes.drain(start..end);
    }

    /// Mirror one text modification: `deleted` bytes removed at `pos`,
    /// then `inserted` bytes inserted there
    pub fn replace(&mut self, pos: usize, deleted: usize, inserted: usize) {
        self.codes.splice(
            pos..pos + deleted,
            std::iter::repeat(StyleCode::UNFINISHED).take(inserted),
        );
    }

    /// First unfinished position within `range`
    pub fn first_unfinished(&self, range: Range<usize>) -> Option<usize> {
        let end = range.end.min(self.codes.len());
        let start = range.start.min(end);
        self.codes[start..end]
            .iter()
            .position(|c| c.is_unfinished())
            .map(|i| start + i)
    }

    /// Length of the run of `code` starting at `pos`
    pub fn run_len(&self, pos: usize) -> usize {
        match self.codes.get(pos) {
            Some(&code) => self.codes[pos..].iter().take_while(|&&c| c == code).count(),
            None => 0,
        }
    }
}
