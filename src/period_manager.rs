//! Sliding-window ring of buckets shared by every handler's metrics manager
//! (spec.md §4.5). One live bucket accumulates the current period; on
//! rotation it's sealed read-only and a fresh live bucket takes its place,
//! with the oldest bucket dropped once the ring exceeds `window_count`.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::bucket::{Bucket, Mergeable};
use crate::config::{StreamKind, WindowConfig};
use crate::error::CoreError;

pub struct PeriodManager<M> {
    window: WindowConfig,
    /// Pristine, zero-state metrics bucket cloned for every new live bucket.
    /// Carries the handler's sketch capacities (TopN size, HLL precision,
    /// ...), which a bare `M::default()` has no way to know about.
    template: M,
    buckets: VecDeque<Arc<RwLock<Bucket<M>>>>,
}

impl<M: Clone> PeriodManager<M> {
    pub fn new(window: WindowConfig, template: M) -> Self {
        let recorded = window.stream_kind == StreamKind::Recorded;
        let mut buckets = VecDeque::with_capacity(window.window_count.max(1));
        buckets.push_front(Arc::new(RwLock::new(Bucket::from_template(recorded, &template))));
        Self {
            window,
            template,
            buckets,
        }
    }

    /// The currently accumulating bucket (age 0).
    pub fn live(&self) -> Arc<RwLock<Bucket<M>>> {
        self.buckets
            .front()
            .expect("period manager always keeps at least one live bucket")
            .clone()
    }

    /// A closed (or live, at age 0) bucket by age, oldest-last.
    pub fn bucket(&self, age: usize) -> Option<Arc<RwLock<Bucket<M>>>> {
        self.buckets.get(age).cloned()
    }

    pub fn available(&self) -> usize {
        self.buckets.len()
    }

    /// Returns whether an event observed right now should be run through
    /// the (expensive) deep-sampled sketches, per `deep_sample_rate`.
    pub fn should_deep_sample(&self) -> bool {
        let rate = self.window.deep_sample_rate;
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            rand::random::<f64>() < rate
        }
    }

    /// Seals the live bucket and opens a fresh one, trimming the ring back
    /// to `window_count`. Returns the now-read-only bucket that was retired,
    /// so a caller can act on the period shift (export, log, persist).
    pub fn rotate(&mut self) -> Arc<RwLock<Bucket<M>>> {
        let retired = self.live();
        retired.write().meta.seal();

        let recorded = self.window.stream_kind == StreamKind::Recorded;
        self.buckets.push_front(Arc::new(RwLock::new(Bucket::from_template(
            recorded,
            &self.template,
        ))));
        while self.buckets.len() > self.window.window_count.max(1) {
            self.buckets.pop_back();
        }
        retired
    }
}

impl<M: Mergeable + Clone> PeriodManager<M> {
    /// Merges buckets in age range `[from, to]` (inclusive, 0 = live) into
    /// a single snapshot without disturbing the ring.
    pub fn merge_range(&self, from: usize, to: usize) -> Result<Bucket<M>, CoreError> {
        let available = self.buckets.len();
        if to >= available {
            return Err(CoreError::WindowTooEarly {
                requested: to + 1,
                available,
            });
        }

        let mut acc = self.buckets[from].read().clone();
        for bucket in self.buckets.iter().take(to + 1).skip(from + 1) {
            let other = bucket.read();
            acc.merge_from(&other);
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Counter(u64);
    impl Mergeable for Counter {
        fn merge(&mut self, other: &Self) {
            self.0 += other.0;
        }
    }

    fn window(count: usize) -> WindowConfig {
        WindowConfig {
            window_count: count,
            period: Duration::from_secs(60),
            deep_sample_rate: 1.0,
            stream_kind: StreamKind::Live,
        }
    }

    #[test]
    fn rotate_seals_previous_and_opens_fresh_live_bucket() {
        let mut pm: PeriodManager<Counter> = PeriodManager::new(window(3), Counter::default());
        pm.live().write().metrics.0 = 5;
        let retired = pm.rotate();
        assert!(retired.read().meta.read_only);
        assert_eq!(retired.read().metrics.0, 5);
        assert_eq!(pm.live().read().metrics.0, 0);
    }

    #[test]
    fn ring_never_exceeds_window_count() {
        let mut pm: PeriodManager<Counter> = PeriodManager::new(window(2), Counter::default());
        pm.rotate();
        pm.rotate();
        pm.rotate();
        assert_eq!(pm.available(), 2);
    }

    #[test]
    fn merge_range_is_associative() {
        let mut pm: PeriodManager<Counter> = PeriodManager::new(window(4), Counter::default());
        pm.live().write().metrics.0 = 1;
        pm.rotate();
        pm.live().write().metrics.0 = 2;
        pm.rotate();
        pm.live().write().metrics.0 = 3;

        let left = pm.merge_range(0, 2).unwrap();
        assert_eq!(left.metrics.0, 6);
    }

    #[test]
    fn window_beyond_available_buckets_errors() {
        let pm: PeriodManager<Counter> = PeriodManager::new(window(2), Counter::default());
        let err = pm.merge_range(0, 5).unwrap_err();
        assert!(matches!(err, CoreError::WindowTooEarly { .. }));
    }

    #[test]
    fn deep_sample_rate_zero_never_samples() {
        let pm: PeriodManager<Counter> = PeriodManager::new(
            WindowConfig {
                deep_sample_rate: 0.0,
                ..window(2)
            },
            Counter::default(),
        );
        assert!(!pm.should_deep_sample());
    }
}
