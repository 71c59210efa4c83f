// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reversible operation record.
//
// A record holds the forward operations of one write transaction in the
// order they were applied. Rolling back means reversing the record and
// consuming it, applying each operation's inverse.
//
// Replaying the reverse of a record restores the prior state exactly only
// if the record is compact: every journaled operation actually changed the
// store. Callers keep it compact by journaling only effective adds and
// deletes.
//
// Records are not synchronized. The owner serializes all access.

use std::collections::VecDeque;

use quadstore_dataset::Quad;
use tracing::debug;

use crate::operation::QuadOperation;

/// An ordered, consumable log of operations.
pub trait ReversibleOperationRecord<Op> {
    /// Append `op` after every operation already held.
    fn append(&mut self, op: Op);

    /// Visit and remove every held operation, oldest first.
    fn consume<F: FnMut(Op)>(&mut self, visitor: F);

    /// The same operations in the opposite order. Consumes `self`; the
    /// result may reuse its storage.
    fn reverse(self) -> Self
    where
        Self: Sized;

    /// Discard every held operation without visiting it.
    fn clear(&mut self) {
        self.consume(|_| {});
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record backed by a double-ended queue.
///
/// `reverse` flips a direction flag instead of moving elements, so it is
/// O(1). Appends to a reversed record land at its logical end.
#[derive(Debug, Clone)]
pub struct ListBackedOperationRecord<Op> {
    ops: VecDeque<Op>,
    reversed: bool,
}

/// The journal kept by a transactional dataset.
pub type QuadJournal = ListBackedOperationRecord<QuadOperation>;

impl<Op> ListBackedOperationRecord<Op> {
    pub fn new() -> Self {
        Self {
            ops: VecDeque::new(),
            reversed: false,
        }
    }

    /// Iterate without consuming, in consumption order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Op> + '_> {
        if self.reversed {
            Box::new(self.ops.iter().rev())
        } else {
            Box::new(self.ops.iter())
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// The most recently appended operation.
    pub fn newest(&self) -> Option<&Op> {
        if self.reversed {
            self.ops.front()
        } else {
            self.ops.back()
        }
    }

    /// Remove and return the most recently appended operation.
    pub fn pop_newest(&mut self) -> Option<Op> {
        if self.reversed {
            self.ops.pop_front()
        } else {
            self.ops.pop_back()
        }
    }
}

impl<Op> Default for ListBackedOperationRecord<Op> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Op> ReversibleOperationRecord<Op> for ListBackedOperationRecord<Op> {
    fn append(&mut self, op: Op) {
        if self.reversed {
            self.ops.push_front(op);
        } else {
            self.ops.push_back(op);
        }
    }

    fn consume<F: FnMut(Op)>(&mut self, mut visitor: F) {
        let count = self.ops.len();
        loop {
            let next = if self.reversed {
                self.ops.pop_back()
            } else {
                self.ops.pop_front()
            };
            match next {
                Some(op) => visitor(op),
                None => break,
            }
        }
        if count > 0 {
            debug!(operations = count, "Consumed operation record");
        }
    }

    fn reverse(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }

    fn clear(&mut self) {
        self.ops.clear();
    }

    fn len(&self) -> usize {
        self.ops.len()
    }
}

impl ListBackedOperationRecord<QuadOperation> {
    /// Quads touched by the record, in consumption order.
    pub fn quads(&self) -> impl Iterator<Item = &Quad> {
        self.iter().map(QuadOperation::quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadstore_dataset::{GraphName, Term};

    fn drain(record: &mut ListBackedOperationRecord<u32>) -> Vec<u32> {
        let mut seen = Vec::new();
        record.consume(|op| seen.push(op));
        seen
    }

    #[test]
    fn test_consume_oldest_first_and_empties() {
        let mut record = ListBackedOperationRecord::new();
        for i in 0..5 {
            record.append(i);
        }
        assert_eq!(record.len(), 5);
        assert_eq!(drain(&mut record), vec![0, 1, 2, 3, 4]);
        assert!(record.is_empty());
    }

    #[test]
    fn test_reverse_consumes_newest_first() {
        let mut record = ListBackedOperationRecord::new();
        for i in 0..4 {
            record.append(i);
        }
        let mut reversed = record.reverse();
        assert!(reversed.is_reversed());
        assert_eq!(drain(&mut reversed), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_double_reverse_restores_order() {
        let mut record = ListBackedOperationRecord::new();
        record.append(1);
        record.append(2);
        let mut twice = record.reverse().reverse();
        assert_eq!(drain(&mut twice), vec![1, 2]);
    }

    #[test]
    fn test_append_after_reverse_goes_to_logical_end() {
        let mut record = ListBackedOperationRecord::new();
        record.append(1);
        record.append(2);
        let mut reversed = record.reverse();
        reversed.append(0);
        assert_eq!(reversed.iter().copied().collect::<Vec<_>>(), vec![2, 1, 0]);
        assert_eq!(drain(&mut reversed), vec![2, 1, 0]);
    }

    #[test]
    fn test_newest_in_both_directions() {
        let mut record = ListBackedOperationRecord::new();
        record.append(1);
        record.append(2);
        assert_eq!(record.newest(), Some(&2));
        assert_eq!(record.pop_newest(), Some(2));
        assert_eq!(record.len(), 1);

        let mut reversed = record.reverse();
        reversed.append(5);
        assert_eq!(reversed.newest(), Some(&5));
        assert_eq!(reversed.pop_newest(), Some(5));
        assert_eq!(reversed.pop_newest(), Some(1));
        assert_eq!(reversed.pop_newest(), None);
    }

    #[test]
    fn test_quads_follow_consumption_order() {
        let first = Quad::new(
            GraphName::Default,
            Term::iri("https://example.org/a"),
            Term::iri("https://example.org/p"),
            Term::literal("1"),
        );
        let second = Quad::new(
            GraphName::Default,
            Term::iri("https://example.org/b"),
            Term::iri("https://example.org/p"),
            Term::literal("2"),
        );
        let mut record = QuadJournal::new();
        record.append(QuadOperation::Addition(first.clone()));
        record.append(QuadOperation::Deletion(second.clone()));
        assert_eq!(record.quads().collect::<Vec<_>>(), vec![&first, &second]);

        let reversed = record.reverse();
        assert_eq!(reversed.quads().collect::<Vec<_>>(), vec![&second, &first]);
    }

    #[test]
    fn test_clear_discards_without_visiting() {
        let mut record = ListBackedOperationRecord::new();
        record.append(7);
        record.clear();
        assert!(record.is_empty());
        assert!(drain(&mut record).is_empty());
    }

    #[test]
    fn test_default_clear_goes_through_consume() {
        struct Counting(Vec<u8>, usize);
        impl ReversibleOperationRecord<u8> for Counting {
            fn append(&mut self, op: u8) {
                self.0.push(op);
            }
            fn consume<F: FnMut(u8)>(&mut self, mut visitor: F) {
                for op in self.0.drain(..) {
                    self.1 += 1;
                    visitor(op);
                }
            }
            fn reverse(self) -> Self {
                self
            }
            fn len(&self) -> usize {
                self.0.len()
            }
        }

        let mut record = Counting(Vec::new(), 0);
        record.append(1);
        record.append(2);
        record.clear();
        assert!(record.is_empty());
        assert_eq!(record.1, 2);
    }
}
