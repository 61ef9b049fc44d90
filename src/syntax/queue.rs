//! Idle-time continuation queue
//!
//! Long parses are split into chunks. After each chunk the highlighter
//! schedules a token here and returns to the caller; the application drains
//! the queue when it has nothing better to do. Tokens carry the generation
//! they were issued for, so work scheduled before an edit is recognized as
//! stale and skipped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Identifies one highlighter among those sharing a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HighlighterId(pub(crate) usize);

/// Request to continue parsing where the last chunk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationToken {
    pub highlighter: HighlighterId,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct QueueInner {
    tokens: VecDeque<ContinuationToken>,
    next_id: usize,
}

/// Shared single-threaded queue of pending continuations
#[derive(Debug, Clone, Default)]
pub struct IdleQueue {
    inner: Rc<RefCell<QueueInner>>,
}

impl IdleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh highlighter id
    pub fn register(&self) -> HighlighterId {
        let mut inner = self.inner.borrow_mut();
        let id = HighlighterId(inner.next_id);
        inner.next_id += 1;
        id
    }

    /// Queue a continuation; a token equal to one already queued is dropped
    pub fn schedule_continuation(&self, token: ContinuationToken) {
        let mut inner = self.inner.borrow_mut();
        if !inner.tokens.contains(&token) {
            inner.tokens.push_back(token);
        }
    }

    /// Take the oldest pending continuation
    pub fn next(&self) -> Option<ContinuationToken> {
        self.inner.borrow_mut().tokens.pop_front()
    }

    /// Drop every continuation of one highlighter
    pub fn cancel(&self, highlighter: HighlighterId) {
        self.inner
            .borrow_mut()
            .tokens
            .retain(|t| t.highlighter != highlighter);
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_and_dedup() {
        let queue = IdleQueue::new();
        let a = queue.register();
        let b = queue.register();
        assert_ne!(a, b);

        let first = ContinuationToken { highlighter: a, generation: 1 };
        let second = ContinuationToken { highlighter: b, generation: 4 };
        queue.schedule_continuation(first);
        queue.schedule_continuation(second);
        queue.schedule_continuation(first);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next(), Some(first));
        assert_eq!(queue.next(), Some(second));
        assert!(queue.next().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_tokens() {
        let queue = IdleQueue::new();
        let shared = queue.clone();
        let id = queue.register();
        shared.schedule_continuation(ContinuationToken { highlighter: id, generation: 0 });
        assert_eq!(queue.len(), 1);
        queue.cancel(id);
        assert!(shared.is_empty());
    }
}
