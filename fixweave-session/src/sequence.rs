/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Sequence number management.
//!
//! Atomic counters for the next outbound and next expected inbound sequence
//! numbers, plus classification of inbound numbers against the expectation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of checking an inbound sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    /// Exactly the expected number.
    InOrder,
    /// Higher than expected; the range `[expected, received - 1]` is missing.
    Gap {
        /// The number we expected.
        expected: u64,
        /// The number that arrived.
        received: u64,
    },
    /// Lower than expected; duplicate or fatal depending on PossDupFlag.
    TooLow {
        /// The number we expected.
        expected: u64,
        /// The number that arrived.
        received: u64,
    },
}

/// Sequence counters for one session.
#[derive(Debug)]
pub struct SequenceManager {
    next_send: AtomicU64,
    next_expect: AtomicU64,
}

impl SequenceManager {
    /// Creates counters starting at 1, as a fresh session requires.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial(1, 1)
    }

    /// Creates counters resuming from persisted values.
    #[must_use]
    pub fn with_initial(next_send: u64, next_expect: u64) -> Self {
        Self {
            next_send: AtomicU64::new(next_send),
            next_expect: AtomicU64::new(next_expect),
        }
    }

    /// The sequence number the next outbound message will carry.
    #[inline]
    #[must_use]
    pub fn next_send(&self) -> u64 {
        self.next_send.load(Ordering::SeqCst)
    }

    /// The sequence number of the next inbound message we will accept.
    #[inline]
    #[must_use]
    pub fn next_expect(&self) -> u64 {
        self.next_expect.load(Ordering::SeqCst)
    }

    /// Allocates the next outbound number, incrementing the counter.
    #[inline]
    pub fn allocate_send(&self) -> u64 {
        self.next_send.fetch_add(1, Ordering::SeqCst)
    }

    /// Advances the inbound expectation after accepting a message.
    #[inline]
    pub fn advance_expect(&self) {
        self.next_expect.fetch_add(1, Ordering::SeqCst);
    }

    /// Forces the inbound expectation, e.g. for SequenceReset.
    #[inline]
    pub fn set_next_expect(&self, seq: u64) {
        self.next_expect.store(seq, Ordering::SeqCst);
    }

    /// Forces the outbound counter.
    #[inline]
    pub fn set_next_send(&self, seq: u64) {
        self.next_send.store(seq, Ordering::SeqCst);
    }

    /// Restarts both counters at 1.
    pub fn reset(&self) {
        self.next_send.store(1, Ordering::SeqCst);
        self.next_expect.store(1, Ordering::SeqCst);
    }

    /// Classifies an inbound sequence number against the expectation.
    #[must_use]
    pub fn check_inbound(&self, received: u64) -> SeqCheck {
        let expected = self.next_expect();
        if received == expected {
            SeqCheck::InOrder
        } else if received > expected {
            SeqCheck::Gap { expected, received }
        } else {
            SeqCheck::TooLow { expected, received }
        }
    }
}

impl Default for SequenceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_counters_start_at_one() {
        let seq = SequenceManager::new();
        assert_eq!(seq.next_send(), 1);
        assert_eq!(seq.next_expect(), 1);
    }

    #[test]
    fn allocate_is_monotonic_by_one() {
        let seq = SequenceManager::new();
        assert_eq!(seq.allocate_send(), 1);
        assert_eq!(seq.allocate_send(), 2);
        assert_eq!(seq.allocate_send(), 3);
        assert_eq!(seq.next_send(), 4);
    }

    #[test]
    fn advance_and_set_expect() {
        let seq = SequenceManager::new();
        seq.advance_expect();
        assert_eq!(seq.next_expect(), 2);

        seq.set_next_expect(9);
        assert_eq!(seq.next_expect(), 9);
    }

    #[test]
    fn inbound_classification() {
        let seq = SequenceManager::with_initial(1, 5);
        assert_eq!(seq.check_inbound(5), SeqCheck::InOrder);
        assert_eq!(
            seq.check_inbound(8),
            SeqCheck::Gap {
                expected: 5,
                received: 8
            }
        );
        assert_eq!(
            seq.check_inbound(2),
            SeqCheck::TooLow {
                expected: 5,
                received: 2
            }
        );
    }

    #[test]
    fn reset_restarts_both() {
        let seq = SequenceManager::with_initial(40, 50);
        seq.reset();
        assert_eq!(seq.next_send(), 1);
        assert_eq!(seq.next_expect(), 1);
    }
}
