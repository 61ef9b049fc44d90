//! Reparse scheduler
//!
//! A [`Highlighter`] owns the style buffer of one document and keeps it in
//! step with the text. Edits are reparsed from a safe restart position a
//! context distance back until the new styles agree with the stored ones
//! for one full context beyond the last change. Work that would exceed one
//! chunk is cut short: the remainder is marked unfinished and a
//! continuation token is put on the [`IdleQueue`].
//!
//! The parse frontier is the position up to which immediate-pass styles
//! have been computed. Everything at or beyond it is unfinished and is
//! parsed chunk by chunk, resuming inside the patterns that were open when
//! the previous chunk stopped.

use std::ops::Range;

use tracing::{debug, trace, warn};

use super::matcher::{pass_two, resume, MatchFailure, MatchRequest};
use super::pattern::PatternId;
use super::queue::{ContinuationToken, HighlighterId, IdleQueue};
use super::style_buffer::{StyleBuffer, StyleCode};
use super::table::PatternTable;
use crate::buffer::{Modification, ModifyListener};

/// Tunables of the reparse scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSettings {
    /// Most bytes parsed before yielding to the idle queue
    pub chunk_size: usize,
    /// Base distance by which a reparse is extended while styles keep changing
    pub reparse_step: usize,
    /// Runtime failures tolerated before a pattern is disabled
    pub failure_limit: usize,
    /// Parse a newly highlighted document in idle chunks
    pub defer_initial_parse: bool,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            reparse_step: 80,
            failure_limit: 2,
            defer_initial_parse: true,
        }
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    /// All styles are final
    Idle,
    /// Immediate-pass parsing continues in idle chunks
    ParsingChunk,
    /// Immediate pass complete; deferred patterns run on demand
    DeferredPending,
}

/// Notifications for the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleEvent {
    /// Stored styles in the range changed and need redrawing
    Restyled(Range<usize>),
    /// Styles in the range are final
    Valid(Range<usize>),
}

/// Counters describing recent work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReparseStats {
    /// Span parsed by the most recent edit-driven reparse
    pub last_reparse: Option<Range<usize>>,
    /// Immediate-pass chunks run so far
    pub chunks: usize,
    /// Deferred-pass regions parsed on demand
    pub deferred_regions: usize,
    /// Text visible to the most recent parse
    pub last_window: Option<Range<usize>>,
}

/// Incremental highlighter for one document
#[derive(Debug)]
pub struct Highlighter {
    pub(super) id: HighlighterId,
    pub(super) table: PatternTable,
    pub(super) styles: StyleBuffer,
    pub(super) settings: HighlightSettings,
    pub(super) state: HighlightState,
    pub(super) frontier: usize,
    pub(super) resume_stack: Vec<PatternId>,
    pub(super) generation: u64,
    pub(super) queue: IdleQueue,
    pub(super) events: Vec<StyleEvent>,
    pub(super) stats: ReparseStats,
    /// Range already known to differ from what was displayed
    pub(super) changed: Option<Range<usize>>,
    pub(super) failures: Vec<MatchFailure>,
}

impl Highlighter {
    /// Create a highlighter; call [`Highlighter::start`] to parse the text
    pub fn new(table: PatternTable, settings: HighlightSettings, queue: IdleQueue) -> Self {
        Self {
            id: queue.register(),
            table,
            styles: StyleBuffer::new(),
            settings,
            state: HighlightState::Idle,
            frontier: 0,
            resume_stack: Vec::new(),
            generation: 0,
            queue,
            events: Vec::new(),
            stats: ReparseStats::default(),
            changed: None,
            failures: Vec::new(),
        }
    }

    /// Copy of this highlighter for a duplicated document
    ///
    /// Styles and parse progress are copied; the copy gets its own id and
    /// table instance.
    pub fn duplicate(&self) -> Self {
        let mut copy = Self {
            id: self.queue.register(),
            table: self.table.clone(),
            styles: self.styles.clone(),
            settings: self.settings,
            state: self.state,
            frontier: self.frontier,
            resume_stack: self.resume_stack.clone(),
            generation: 0,
            queue: self.queue.clone(),
            events: Vec::new(),
            stats: ReparseStats::default(),
            changed: None,
            failures: Vec::new(),
        };
        if copy.frontier < copy.styles.len() {
            copy.schedule();
        }
        copy
    }

    /// Begin highlighting `text`
    ///
    /// With `deferred` the immediate pass runs in idle chunks; otherwise it
    /// completes before returning. Deferred patterns always run on demand.
    pub fn start(&mut self, text: &[u8], deferred: bool) {
        self.styles = StyleBuffer::unfinished(text.len());
        self.frontier = 0;
        self.resume_stack.clear();
        self.generation += 1;
        self.changed = None;

        if deferred {
            self.schedule();
        } else {
            while self.frontier < text.len() {
                self.parse_chunk(text);
            }
        }
        self.settle(text);
        debug!(
            highlighter = self.id.0,
            mode = %self.table.language_mode(),
            len = text.len(),
            deferred,
            "highlighting started"
        );
    }

    pub fn id(&self) -> HighlighterId {
        self.id
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn styles(&self) -> &StyleBuffer {
        &self.styles
    }

    pub fn frontier(&self) -> usize {
        self.frontier
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &ReparseStats {
        &self.stats
    }

    /// Patterns left open at the end of the document, innermost first
    ///
    /// Empty until the immediate pass has reached the end.
    pub fn open_at_end(&self) -> &[PatternId] {
        if self.frontier >= self.styles.len() {
            &self.resume_stack
        } else {
            &[]
        }
    }

    /// Drain pending display notifications
    pub fn take_events(&mut self) -> Vec<StyleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Stored code without triggering any parsing
    pub fn stored_style(&self, pos: usize) -> Option<StyleCode> {
        self.styles.get(pos)
    }

    /// Length of the run of identical stored codes starting at `pos`
    pub fn style_run_len(&self, pos: usize) -> usize {
        self.styles.run_len(pos)
    }

    /// Run one continuation; returns `false` for a stale or foreign token
    pub fn run_continuation(&mut self, text: &[u8], token: ContinuationToken) -> bool {
        if token.highlighter != self.id || token.generation != self.generation {
            trace!(
                highlighter = self.id.0,
                token_generation = token.generation,
                generation = self.generation,
                "ignoring stale continuation"
            );
            return false;
        }
        if self.frontier < text.len() {
            self.parse_chunk(text);
        }
        self.settle(text);
        true
    }

    /// Update styles after `deleted` bytes at `pos` were replaced by
    /// `inserted` bytes; `text` is the text after the change
    pub fn text_modified(&mut self, text: &[u8], pos: usize, inserted: usize, deleted: usize) {
        let old_len = self.styles.len();
        let fully_parsed = self.frontier >= old_len;
        self.styles.replace(pos, deleted, inserted);
        self.generation += 1;
        self.changed = (inserted > 0).then(|| pos..pos + inserted);

        if fully_parsed {
            self.frontier = text.len();
        } else if pos + deleted <= self.frontier {
            self.frontier = self.frontier + inserted - deleted;
        } else if pos < self.frontier {
            let (restart, stack) = self.find_safe_restart(text, pos);
            self.frontier = restart;
            self.resume_stack = stack;
        }

        // Deleting the tail leaves nothing after `pos`, yet the text before
        // it may style differently now
        let deleted_tail = fully_parsed && deleted > 0 && pos > 0;
        if pos < self.frontier || deleted_tail {
            self.incremental_reparse(text, pos, inserted);
        }
        self.settle(text);
    }

    /// Context start for `from`, looking back at most one chunk
    pub(super) fn look_back(&self, text: &[u8], from: usize) -> usize {
        self.table
            .context()
            .lookback_within(text, from, self.settings.chunk_size.max(1))
    }

    /// Context end for `from`, looking ahead at most one chunk
    pub(super) fn look_ahead(&self, text: &[u8], from: usize) -> usize {
        self.table
            .context()
            .lookahead_within(text, from, self.settings.chunk_size.max(1))
    }

    /// Immediate-pass parse of the next chunk beyond the frontier
    pub(super) fn parse_chunk(&mut self, text: &[u8]) {
        let len = text.len();
        let start = self.frontier.min(len);
        let end = (start + self.settings.chunk_size.max(1)).min(len);
        let look_behind = self.look_back(text, start);
        let till = self.look_ahead(text, end).max(end);
        let request = MatchRequest::new(text, start, end)
            .with_look_behind(look_behind)
            .with_match_till(till);
        let outcome = resume(
            &self.table,
            &self.resume_stack,
            self.table.immediate_root(),
            &request,
        );
        self.styles.set_range(start, outcome.end, &outcome.styles);
        self.frontier = outcome.end.max(end);
        self.resume_stack = outcome.open;
        self.failures.extend(outcome.failures);
        self.stats.chunks += 1;
        self.stats.last_window = Some(look_behind..till);
        trace!(highlighter = self.id.0, start, end = self.frontier, "parsed chunk");

        self.events.push(StyleEvent::Restyled(start..self.frontier));
        if !self.table.has_deferred() {
            self.events.push(StyleEvent::Valid(start..self.frontier));
        }
        if self.frontier < len {
            self.schedule();
        }
    }

    fn incremental_reparse(&mut self, text: &[u8], pos: usize, inserted: usize) {
        let bound = self.frontier.min(text.len());
        let (mut begin, mut stack) = self.find_safe_restart(text, pos);
        let first_begin = begin;
        let limit = (begin + self.settings.chunk_size.max(1)).min(bound);

        let mut last_mod = pos + inserted;
        let mut wanted = self.look_ahead(text, last_mod);
        let mut passes = 0u32;
        let stop = loop {
            let end = wanted.min(limit).min(bound).max(begin);
            let (stop, open) = self.parse_range(text, begin, end, &stack);

            if stop >= bound {
                self.frontier = stop.max(self.frontier);
                self.resume_stack = open;
                break stop;
            }
            if stop < wanted.min(bound) {
                self.cut_at(stop, open);
                break stop;
            }
            let last_changed = self.last_modified();
            if last_changed <= last_mod {
                break stop;
            }
            last_mod = last_changed;
            begin = stop;
            stack = open;
            let step = self
                .settings
                .reparse_step
                .saturating_mul(1usize.checked_shl(passes).unwrap_or(usize::MAX));
            wanted = self.look_ahead(text, last_mod).saturating_add(step);
            passes += 1;
        };

        debug!(highlighter = self.id.0, begin = first_begin, end = stop, "reparsed");
        self.stats.last_reparse = Some(first_begin..stop);
        if let Some(changed) = self.changed.clone() {
            self.events.push(StyleEvent::Restyled(changed.clone()));
            if !self.table.has_deferred() {
                self.events.push(StyleEvent::Valid(changed));
            }
        }
    }

    /// Stop an over-long reparse at `stop`, leaving the rest to idle chunks
    fn cut_at(&mut self, stop: usize, open: Vec<PatternId>) {
        let old_frontier = self.frontier;
        if stop < old_frontier {
            self.styles.fill(stop, old_frontier, StyleCode::UNFINISHED);
            self.extend_changed(stop..old_frontier);
        }
        self.frontier = stop;
        self.resume_stack = open;
        self.schedule();
    }

    /// Parse `[begin, end)` starting inside `stack` and store the result
    ///
    /// Returns where parsing stopped and the patterns open there.
    fn parse_range(
        &mut self,
        text: &[u8],
        begin: usize,
        end: usize,
        stack: &[PatternId],
    ) -> (usize, Vec<PatternId>) {
        let len = text.len();
        let context = self.table.context();
        let root = self.table.immediate_root();
        let begin_style = stack
            .first()
            .map_or(self.table.pattern(root).code(), |&id| self.table.pattern(id).code());

        let begin_safety = if context.can_cross_lines() {
            let floor = self.look_back(text, begin);
            let mut safety = floor;
            let mut p = begin;
            while p > floor {
                let prev = self.styles.get(p - 1).unwrap_or(StyleCode::UNFINISHED);
                if !self.table.equivalent(prev, begin_style) {
                    safety = p;
                    break;
                }
                p -= 1;
            }
            safety
        } else {
            let floor = begin.saturating_sub(self.settings.chunk_size.max(1));
            let mut safety = begin.saturating_sub(1);
            while safety > floor {
                let style = self.styles.get(safety).unwrap_or(StyleCode::UNFINISHED);
                if !self.table.equivalent(style, begin_style) || text[safety] == b'\n' {
                    safety += 1;
                    break;
                }
                safety -= 1;
            }
            safety.min(begin)
        };

        if end == 0 {
            return (0, stack.to_vec());
        }
        let at_line_end = end >= len || text[end - 1] == b'\n';
        let end_safety = if !context.can_cross_lines() && at_line_end {
            end
        } else {
            self.look_ahead(text, end)
        };

        let request = MatchRequest::new(text, begin, end)
            .with_look_behind(begin_safety)
            .with_match_till(end_safety);
        let outcome = resume(&self.table, stack, root, &request);
        let stop = outcome.end;
        self.failures.extend(outcome.failures);

        self.stats.last_window = Some(begin_safety..end_safety.max(stop));
        let mut window = self.styles.slice(begin_safety..end_safety.max(stop)).to_vec();
        window[begin - begin_safety..stop - begin_safety].copy_from_slice(&outcome.styles);

        if self.table.has_deferred() {
            self.deferred_around_change(text, &mut window, begin_safety, end_safety, stop);
        }

        self.modify_style_buf(begin, stop, &window[begin - begin_safety..stop - begin_safety]);
        (stop, outcome.open)
    }

    /// Deferred pass over a reparsed window, leaving the changed region for
    /// on-demand parsing unless it is small
    fn deferred_around_change(
        &mut self,
        text: &[u8],
        window: &mut [StyleCode],
        begin_safety: usize,
        end_safety: usize,
        stop: usize,
    ) {
        let (mod_start, mod_end) = self
            .changed
            .as_ref()
            .map_or((0, 0), |r| (r.start, r.end));
        let at = |p: usize| p - begin_safety;
        let till = self.look_ahead(text, end_safety.max(stop));

        if begin_safety < mod_start {
            let pass_two_end = if end_safety > mod_start {
                let e = self.look_ahead(text, mod_start).min(end_safety);
                if e + self.settings.chunk_size >= mod_end {
                    end_safety
                } else {
                    e
                }
            } else {
                end_safety
            };
            if pass_two_end == end_safety {
                let failures = pass_two(&self.table, text, window, begin_safety, stop, till);
                self.failures.extend(failures);
                return;
            }
            let keep = window[at(mod_start)..at(pass_two_end)].to_vec();
            let failures = pass_two(&self.table, text, window, begin_safety, mod_start, till);
            self.failures.extend(failures);
            window[at(mod_start)..at(pass_two_end)].copy_from_slice(&keep);
        }

        if stop > mod_end {
            if begin_safety > mod_end {
                let failures = pass_two(&self.table, text, window, begin_safety, stop, till);
                self.failures.extend(failures);
            } else {
                let from = begin_safety.max(self.look_back(text, mod_end));
                let keep = window[at(from)..at(mod_end)].to_vec();
                let failures = pass_two(&self.table, text, &mut window[at(from)..], from, stop, till);
                self.failures.extend(failures);
                window[at(from)..at(mod_end)].copy_from_slice(&keep);
            }
        }
    }

    /// Store new codes for `[start, end)`, widening the changed range by
    /// every position outside it whose code really changed
    pub(super) fn modify_style_buf(&mut self, start: usize, end: usize, codes: &[StyleCode]) {
        let (mod_start, mod_end) = self
            .changed
            .as_ref()
            .map_or((start, start), |r| (r.start, r.end));
        let first_deferred = self.table.first_deferred();
        let differs = |old: StyleCode, new: StyleCode| {
            new != old
                && !(old.is_unfinished() && (new == StyleCode::PLAIN || new >= first_deferred))
        };

        let mut min_pos = usize::MAX;
        let mut max_pos = 0;
        for pos in (start..end.min(mod_start)).chain(mod_end.max(start)..end) {
            let old = self.styles.get(pos).unwrap_or(StyleCode::UNFINISHED);
            if differs(old, codes[pos - start]) {
                min_pos = min_pos.min(pos);
                max_pos = max_pos.max(pos + 1);
            }
        }

        self.styles.set_range(start, end, codes);
        let changed = mod_start.min(min_pos)..mod_end.max(max_pos);
        self.changed = (!changed.is_empty()).then_some(changed);
    }

    fn extend_changed(&mut self, range: Range<usize>) {
        self.changed = Some(match self.changed.take() {
            Some(c) => c.start.min(range.start)..c.end.max(range.end),
            None => range,
        });
    }

    fn last_modified(&self) -> usize {
        self.changed.as_ref().map_or(0, |r| r.end)
    }

    /// Find where parsing may safely begin for a change at `pos`
    ///
    /// Backs up one context distance, then follows the stored style
    /// hierarchy back to a boundary from which the patterns open there are
    /// known. Returns the position and the open patterns, innermost first.
    pub fn find_safe_restart(&self, text: &[u8], pos: usize) -> (usize, Vec<PatternId>) {
        let table = &self.table;
        let root = table.immediate_root();
        let pos = self.look_back(text, pos);
        if pos == 0 {
            return (0, Vec::new());
        }
        let stored = |p: usize| table.restart_pattern(self.styles.get(p).unwrap_or(StyleCode::UNFINISHED));

        let start_pattern = stored(pos);
        if start_pattern == root {
            return (pos, Vec::new());
        }

        let (safe_start, check_back_to) = if table.is_resumable(start_pattern) {
            let safe = self.look_back(text, pos);
            (safe, self.look_back(text, safe))
        } else {
            (0, 0)
        };

        let mut running = start_pattern;
        let mut i = pos - 1;
        loop {
            if i == 0 {
                return (0, Vec::new());
            }
            let here = stored(i);
            if table.is_ancestor(here, running) {
                if table.is_resumable(here) {
                    return (i + 1, table.stack_for(here));
                }
                running = here;
            } else if table.is_ancestor(running, here) {
                if table.is_resumable(running) {
                    return (i + 1, table.stack_for(running));
                }
            } else if running != here {
                let parent = table.parent_of(running).unwrap_or(root);
                if table.is_ancestor(parent, here) {
                    if table.is_resumable(parent) {
                        return (i + 1, table.stack_for(parent));
                    }
                    running = here;
                } else {
                    return (i + 1, Vec::new());
                }
            }

            if i == check_back_to {
                while !table.is_resumable(running) {
                    running = table.parent_of(running).unwrap_or(root);
                }
                return (safe_start, table.stack_for(running));
            }
            i -= 1;
        }
    }

    pub(super) fn schedule(&mut self) {
        self.queue.schedule_continuation(ContinuationToken {
            highlighter: self.id,
            generation: self.generation,
        });
    }

    /// Pick the state for the current progress and handle failures
    pub(super) fn settle(&mut self, text: &[u8]) {
        self.apply_failures(text);
        let len = text.len();
        self.state = if self.frontier < len {
            self.schedule();
            HighlightState::ParsingChunk
        } else if self.table.has_deferred() && self.styles.first_unfinished(0..len).is_some() {
            HighlightState::DeferredPending
        } else {
            HighlightState::Idle
        };
    }

    /// Count runtime failures; disabling a pattern restarts highlighting
    ///
    /// Returns whether highlighting was restarted.
    pub(super) fn apply_failures(&mut self, text: &[u8]) -> bool {
        let mut disabled = false;
        for failure in std::mem::take(&mut self.failures) {
            debug!(highlighter = self.id.0, "{}", failure.error);
            if self.table.note_failure(failure.pattern, self.settings.failure_limit) {
                warn!(highlighter = self.id.0, "{}", failure.error);
                disabled = true;
            }
        }
        if disabled {
            self.styles.fill(0, text.len(), StyleCode::UNFINISHED);
            self.frontier = 0;
            self.resume_stack.clear();
            self.events.push(StyleEvent::Restyled(0..text.len()));
            self.schedule();
        }
        disabled
    }
}

impl ModifyListener for Highlighter {
    fn on_modify(&mut self, text: &str, modification: &Modification) {
        self.text_modified(
            text.as_bytes(),
            modification.pos,
            modification.inserted,
            modification.deleted,
        );
    }
}
