//! On-demand deferred pass
//!
//! Deferred patterns are not applied while the immediate pass runs. Text
//! they could claim is left unfinished and resolved here, a region at a
//! time, the first time someone asks for its style.

use std::ops::Range;

use tracing::trace;

use super::matcher::{match_span, MatchRequest};
use super::scheduler::{Highlighter, StyleEvent};
use super::style_buffer::StyleCode;

impl Highlighter {
    /// Final style code at `pos`, parsing whatever is needed first
    pub fn style_at(&mut self, text: &[u8], pos: usize) -> Option<StyleCode> {
        if pos >= text.len() {
            return None;
        }
        self.ensure_styles(text, pos..pos + 1);
        self.styles.get(pos)
    }

    /// Name of the final style at `pos`
    pub fn style_name_at(&mut self, text: &[u8], pos: usize) -> Option<&str> {
        let code = self.style_at(text, pos)?;
        Some(self.table.style_name(code))
    }

    /// Make every style in `range` final
    ///
    /// Runs immediate-pass chunks up to the end of the range if the
    /// frontier has not reached it, then the deferred pass over each
    /// unfinished region inside it.
    pub fn ensure_styles(&mut self, text: &[u8], range: Range<usize>) {
        let len = text.len();
        let range = range.start.min(len)..range.end.min(len);
        if range.is_empty() {
            return;
        }

        let mut worked = false;
        loop {
            if range.end > self.frontier {
                let target = range
                    .end
                    .max(self.frontier + self.settings.chunk_size)
                    .min(len);
                while self.frontier < target {
                    self.parse_chunk(text);
                }
                worked = true;
            }
            if self.table.has_deferred() {
                while let Some(pos) = self.styles.first_unfinished(range.clone()) {
                    self.handle_unparsed(text, pos);
                    worked = true;
                }
            }
            if !self.apply_failures(text) {
                break;
            }
        }

        if worked {
            self.events.push(StyleEvent::Valid(range));
        }
        self.settle(text);
    }

    /// Run the deferred patterns over the unfinished region starting at `pos`
    fn handle_unparsed(&mut self, text: &[u8], pos: usize) {
        let Some(root) = self.table.deferred_root() else {
            return;
        };
        let len = text.len();
        let first_deferred = self.table.first_deferred();
        let code_at = |p: usize| self.styles.get(p).unwrap_or(StyleCode::UNFINISHED);
        let immediate = |code: StyleCode| !code.is_plain() && code < first_deferred;

        // Text styled by the immediate pass is opaque to deferred patterns
        let floor = self.look_back(text, pos);
        let mut begin_safety = floor;
        let mut p = pos;
        while p > floor {
            if immediate(code_at(p - 1)) {
                begin_safety = p;
                break;
            }
            p -= 1;
        }

        let mut end_parse = (pos + self.settings.chunk_size.max(1)).min(self.frontier.min(len));
        let mut end_safety = self.look_ahead(text, end_parse);
        let mut p = pos;
        while p < end_safety {
            let code = code_at(p);
            if immediate(code) {
                end_parse = end_parse.min(p);
                end_safety = p;
                break;
            }
            if !code.is_unfinished() && p < end_parse {
                end_parse = p;
                end_safety = self.look_ahead(text, end_parse);
            }
            p += 1;
        }

        // Assertions at the region's end still see the text after it
        let till = self.look_ahead(text, end_parse).max(end_safety);
        let request = MatchRequest::new(text, begin_safety, end_parse)
            .with_look_behind(begin_safety)
            .with_match_till(till);
        let outcome = match_span(&self.table, root, &request);
        self.styles.set_range(
            pos,
            end_parse,
            &outcome.styles[pos - begin_safety..end_parse - begin_safety],
        );
        self.failures.extend(outcome.failures);
        self.stats.deferred_regions += 1;
        self.stats.last_window = Some(begin_safety..till);
        self.events.push(StyleEvent::Restyled(pos..end_parse));
        trace!(highlighter = self.id.0, start = pos, end = end_parse, "deferred region");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::pattern_set::PatternSet;
    use crate::syntax::queue::IdleQueue;
    use crate::syntax::scheduler::{HighlightSettings, HighlightState};
    use crate::syntax::style::StyleTable;
    use crate::syntax::table::PatternTable;

    const KEYWORDS: &str = r#"
comment::"/\*":"\*/":Comment:
kw::"\bif\b"::Keyword:D
"#;

    fn highlighter(settings: HighlightSettings) -> Highlighter {
        let set = PatternSet::parse("Test", KEYWORDS).unwrap();
        let (table, _) = PatternTable::compile(&set, &StyleTable::new());
        Highlighter::new(table, settings, IdleQueue::new())
    }

    fn names(h: &Highlighter) -> Vec<&str> {
        h.styles()
            .as_slice()
            .iter()
            .map(|&c| h.table().style_name(c))
            .collect()
    }

    #[test]
    fn test_deferred_patterns_wait_for_demand() {
        let text = b"x if y";
        let mut h = highlighter(HighlightSettings::default());
        h.start(text, false);
        assert_eq!(h.state(), HighlightState::DeferredPending);
        assert!(h.styles().as_slice().iter().all(|c| c.is_unfinished()));

        assert_eq!(h.style_name_at(text, 0), Some("Plain"));
        assert_eq!(names(&h), ["Plain", "Plain", "Keyword", "Keyword", "Plain", "Plain"]);
        assert_eq!(h.state(), HighlightState::Idle);
        assert_eq!(h.stats().deferred_regions, 1);
        assert_eq!(h.style_at(text, 6), None);
    }

    #[test]
    fn test_immediate_styles_bound_the_region() {
        let text = b"if/*x*/if";
        let mut h = highlighter(HighlightSettings::default());
        h.start(text, false);
        h.ensure_styles(text, 0..text.len());

        let mut expected = vec!["Keyword"; 2];
        expected.extend(["Comment"; 5]);
        expected.extend(["Keyword"; 2]);
        assert_eq!(names(&h), expected);
        assert_eq!(h.stats().deferred_regions, 2);
        assert!(h.take_events().contains(&StyleEvent::Valid(0..text.len())));
    }

    #[test]
    fn test_plain_text_beyond_region_stays_visible() {
        let text = b"iff";
        let mut h = highlighter(HighlightSettings::default());
        h.start(text, false);
        h.styles.fill(2, 3, StyleCode::PLAIN);

        assert_eq!(h.style_name_at(text, 0), Some("Plain"));
        assert_eq!(names(&h), ["Plain"; 3]);
    }

    #[test]
    fn test_typing_past_a_keyword() {
        let mut text = String::from("x if y");
        let mut h = highlighter(HighlightSettings::default());
        h.start(text.as_bytes(), false);
        h.ensure_styles(text.as_bytes(), 0..text.len());
        assert_eq!(h.style_name_at(text.as_bytes(), 3), Some("Keyword"));

        text.insert(4, 'f');
        h.text_modified(text.as_bytes(), 4, 1, 0);
        h.ensure_styles(text.as_bytes(), 0..text.len());
        assert_eq!(names(&h), ["Plain"; 7]);
    }

    #[test]
    fn test_demand_beyond_frontier_parses_chunks() {
        let text = "if x\n".repeat(20);
        let settings = HighlightSettings {
            chunk_size: 10,
            ..HighlightSettings::default()
        };
        let mut h = highlighter(settings);
        h.start(text.as_bytes(), true);
        assert_eq!(h.frontier(), 0);

        assert_eq!(h.style_name_at(text.as_bytes(), 50), Some("Keyword"));
        assert!(h.frontier() > 50);
        assert_eq!(h.state(), HighlightState::ParsingChunk);
        assert!(h.stored_style(0).is_some_and(|c| c.is_unfinished()));
    }

    #[test]
    fn test_demand_on_a_large_line_parses_one_chunk() {
        let text = "x if ".repeat(40_000);
        let mut h = highlighter(HighlightSettings::default());
        h.start(text.as_bytes(), true);

        assert_eq!(h.style_name_at(text.as_bytes(), 0), Some("Plain"));
        assert_eq!(h.frontier(), 1000);
        assert_eq!(h.stats().deferred_regions, 1);
        let window = h.stats().last_window.clone().unwrap();
        assert!(window.end - window.start <= 2000, "{window:?}");
        assert!(h.stored_style(999).is_some_and(|c| !c.is_unfinished()));
        assert_eq!(h.stored_style(1000), Some(StyleCode::UNFINISHED));
        assert_eq!(h.state(), HighlightState::ParsingChunk);
    }
}
