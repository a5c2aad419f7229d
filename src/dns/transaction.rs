//! Tracks outstanding DNS query/response pairs so a reply can be matched
//! back to its query and timed (spec.md §4.1 DNS Transaction, §5 concurrency
//! notes on the bound).

use crate::common::Direction;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Opaque flow identifier supplied by whatever reassembles packets into
/// flows upstream (5-tuple hash, socket pair, etc).
pub type FlowKey = u64;

#[derive(Debug, Clone, Copy)]
struct Open {
    start: Instant,
    direction: Direction,
}

/// Bounded table of in-flight `(flow, transaction id)` pairs.
#[derive(Debug)]
pub struct Transactions {
    table: FxHashMap<(FlowKey, u16), Open>,
    /// Insertion log used for oldest-first eviction/purge. May contain
    /// stale entries for keys that were since replaced or completed —
    /// these are recognized and skipped by timestamp comparison rather
    /// than hunted down and removed eagerly.
    order: VecDeque<(FlowKey, u16, Instant)>,
    max_open: usize,
}

impl Transactions {
    pub fn new(max_open: usize) -> Self {
        Self {
            table: FxHashMap::default(),
            order: VecDeque::new(),
            max_open: max_open.max(1),
        }
    }

    /// Records a query's start. Idempotent: a duplicate `(flow, xid)`
    /// replaces the prior entry's start time and direction.
    pub fn start_transaction(&mut self, flow: FlowKey, xid: u16, direction: Direction) {
        let now = Instant::now();
        self.table.insert((flow, xid), Open { start: now, direction });
        self.order.push_back((flow, xid, now));
        self.evict_over_capacity();
    }

    /// Matches a response back to its query, returning the elapsed time if
    /// one was open. Removes the transaction either way it's called with
    /// a match.
    pub fn maybe_end_transaction(&mut self, flow: FlowKey, xid: u16) -> Option<Duration> {
        self.table
            .remove(&(flow, xid))
            .map(|open| Instant::now().duration_since(open.start))
    }

    pub fn open_count(&self) -> usize {
        self.table.len()
    }

    fn evict_over_capacity(&mut self) {
        while self.table.len() > self.max_open {
            let Some((flow, xid, ts)) = self.order.pop_front() else {
                break;
            };
            if matches!(self.table.get(&(flow, xid)), Some(open) if open.start == ts) {
                self.table.remove(&(flow, xid));
            }
        }
    }

    /// Walks the insertion log and removes every transaction older than
    /// `max_age`, returning how many were purged.
    pub fn purge_old(&mut self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        let mut retained = VecDeque::with_capacity(self.order.len());

        while let Some((flow, xid, ts)) = self.order.pop_front() {
            match self.table.get(&(flow, xid)) {
                Some(open) if open.start == ts => {
                    if now.duration_since(open.start) > max_age {
                        self.table.remove(&(flow, xid));
                        removed += 1;
                    } else {
                        retained.push_back((flow, xid, ts));
                    }
                }
                _ => {
                    // stale log entry: already replaced or matched, drop it
                }
            }
        }

        self.order = retained;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn matched_response_returns_elapsed_and_consumes_entry() {
        let mut t = Transactions::new(100);
        t.start_transaction(1, 42, Direction::FromHost);
        let elapsed = t.maybe_end_transaction(1, 42);
        assert!(elapsed.is_some());
        assert!(t.maybe_end_transaction(1, 42).is_none());
    }

    #[test]
    fn mismatched_flow_does_not_match() {
        let mut t = Transactions::new(100);
        t.start_transaction(1, 42, Direction::FromHost);
        assert!(t.maybe_end_transaction(2, 42).is_none());
    }

    #[test]
    fn purge_old_removes_expired_and_counts_them() {
        let mut t = Transactions::new(100);
        t.start_transaction(1, 1, Direction::FromHost);
        t.start_transaction(1, 2, Direction::FromHost);
        sleep(Duration::from_millis(20));
        let removed = t.purge_old(Duration::from_millis(5));
        assert_eq!(removed, 2);
        assert_eq!(t.open_count(), 0);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut t = Transactions::new(2);
        t.start_transaction(1, 1, Direction::FromHost);
        t.start_transaction(1, 2, Direction::FromHost);
        t.start_transaction(1, 3, Direction::FromHost);
        assert_eq!(t.open_count(), 2);
        assert!(t.maybe_end_transaction(1, 1).is_none());
        assert!(t.maybe_end_transaction(1, 3).is_some());
    }
}
