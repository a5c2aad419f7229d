//! Instantaneous rate: derivative over a fixed 1s sub-window within the
//! live bucket (spec.md §4.6).

use crate::metric::{render_prometheus_line, LabelMap, MetricMeta};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Rate {
    pub meta: MetricMeta,
    sub_window: Duration,
    window_start: Instant,
    count_in_window: u64,
    last_rate: f64,
    total: u64,
}

impl Rate {
    pub fn new(schema: &'static str, path: &[&'static str], help: &'static str) -> Self {
        Self {
            meta: MetricMeta::new(schema, path, help),
            sub_window: Duration::from_secs(1),
            window_start: Instant::now(),
            count_in_window: 0,
            last_rate: 0.0,
            total: 0,
        }
    }

    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    fn update_at(&mut self, now: Instant) {
        self.roll(now);
        self.count_in_window += 1;
        self.total += 1;
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.sub_window {
            self.last_rate = self.count_in_window as f64 / self.sub_window.as_secs_f64();
            self.count_in_window = 0;
            self.window_start = now;
        }
    }

    /// Instantaneous value as of the last `update`/`roll`.
    pub fn get(&self) -> f64 {
        self.last_rate
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Rate isn't normally merged across historical buckets (it only makes
    /// sense for the live bucket), but an associative merge is required for
    /// structural uniformity with the other sketches: event totals add.
    pub fn merge(&mut self, other: &Rate) {
        self.total += other.total;
        self.last_rate += other.last_rate;
    }

    pub fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert(self.meta.json_path(), serde_json::json!(self.get()));
    }

    pub fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        render_prometheus_line(out, &self.meta, "gauge", labels, self.get());
    }
}
