//! A bucket holds one period's worth of a handler's metrics plus the
//! bookkeeping the period manager needs to retire and render it (spec.md
//! §4.5, §GLOSSARY "Bucket").

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Implemented by every handler-specific metrics payload (`DnsMetricsBucket`,
/// `FlowMetricsBucket`, ...) so the period manager can fold a closed bucket
/// into an adjacent one for a multi-period window query (spec.md §8,
/// testable property: merge is associative).
pub trait Mergeable {
    fn merge(&mut self, other: &Self);
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketMeta {
    #[serde(skip)]
    pub start: Instant,
    #[serde(skip)]
    pub end: Option<Instant>,
    /// Wall-clock time this bucket became live. `Instant` has no wall-clock
    /// correlate, so this is what gets rendered in scrape output.
    pub recorded_at: DateTime<Utc>,
    pub sealed_at: Option<DateTime<Utc>>,
    /// Set once this bucket is retired from the live position; a read-only
    /// bucket's counters never change again.
    pub read_only: bool,
    /// Whether this manager is summarizing a live tap (renders an
    /// instantaneous rate) or a recorded capture (does not).
    pub recorded_stream: bool,
    pub event_count: u64,
    pub deep_sample_count: u64,
}

impl BucketMeta {
    pub fn new(recorded_stream: bool) -> Self {
        Self {
            start: Instant::now(),
            end: None,
            recorded_at: Utc::now(),
            sealed_at: None,
            read_only: false,
            recorded_stream,
            event_count: 0,
            deep_sample_count: 0,
        }
    }

    pub fn record_event(&mut self, deep_sampled: bool) {
        self.event_count += 1;
        if deep_sampled {
            self.deep_sample_count += 1;
        }
    }

    pub fn seal(&mut self) {
        self.read_only = true;
        self.end = Some(Instant::now());
        self.sealed_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone)]
pub struct Bucket<M> {
    pub meta: BucketMeta,
    pub metrics: M,
}

impl<M: Default> Bucket<M> {
    pub fn new(recorded_stream: bool) -> Self {
        Self {
            meta: BucketMeta::new(recorded_stream),
            metrics: M::default(),
        }
    }
}

impl<M> Bucket<M> {
    /// Builds a fresh bucket from a pristine metrics template (used by
    /// `PeriodManager`, which configures sketch capacities once and clones
    /// a zero-state copy on every rotation rather than relying on `Default`).
    pub fn from_template(recorded_stream: bool, template: &M) -> Self
    where
        M: Clone,
    {
        Self {
            meta: BucketMeta::new(recorded_stream),
            metrics: template.clone(),
        }
    }
}

impl<M: Mergeable> Bucket<M> {
    pub fn merge_from(&mut self, other: &Bucket<M>) {
        self.metrics.merge(&other.metrics);
        self.meta.event_count += other.meta.event_count;
        self.meta.deep_sample_count += other.meta.deep_sample_count;
    }
}
