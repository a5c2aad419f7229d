//! Space-saving Top-N: a bounded heavy-hitter sketch with guaranteed error
//! <= total/n (spec.md §4.6, §GLOSSARY).

use crate::metric::{render_prometheus_line, LabelMap, MetricMeta};
use rustc_hash::FxHashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Entry<K> {
    item: K,
    count: u64,
    /// Upper bound on the overestimation error for this entry, inherited
    /// from the item it replaced when it was first admitted.
    error: u64,
}

/// Space-saving Top-N sketch of capacity `n`.
#[derive(Debug, Clone)]
pub struct TopN<K: Eq + Hash + Clone> {
    pub meta: MetricMeta,
    capacity: usize,
    percentile_threshold: f64,
    entries: FxHashMap<K, Entry<K>>,
}

impl<K: Eq + Hash + Clone + ToString> TopN<K> {
    pub fn new(
        schema: &'static str,
        path: &[&'static str],
        help: &'static str,
        capacity: usize,
        percentile_threshold: f64,
    ) -> Self {
        Self {
            meta: MetricMeta::new(schema, path, help),
            capacity: capacity.max(1),
            percentile_threshold,
            entries: FxHashMap::default(),
        }
    }

    /// Observe one occurrence of `item`.
    pub fn update(&mut self, item: K) {
        self.update_by(item, 1);
    }

    /// Observe `item` with an arbitrary weight (e.g. byte/packet counts
    /// rather than a bare occurrence — spec.md §4.4's byte/packet Top-Ns).
    pub fn update_by(&mut self, item: K, weight: u64) {
        if let Some(entry) = self.entries.get_mut(&item) {
            entry.count += weight;
            return;
        }

        if self.entries.len() < self.capacity {
            self.entries.insert(
                item.clone(),
                Entry {
                    item,
                    count: weight,
                    error: 0,
                },
            );
            return;
        }

        // Evict the minimum-count entry, replacing it with the new item at
        // min_count + weight; the evicted count becomes this entry's error bound.
        let min_key = self
            .entries
            .values()
            .min_by_key(|e| e.count)
            .map(|e| e.item.clone());
        if let Some(min_key) = min_key {
            let min_count = self.entries[&min_key].count;
            self.entries.remove(&min_key);
            self.entries.insert(
                item.clone(),
                Entry {
                    item,
                    count: min_count + weight,
                    error: min_count,
                },
            );
        }
    }

    /// Merge by combining counter tables and re-truncating (spec.md §4.6).
    pub fn merge(&mut self, other: &TopN<K>) {
        for entry in other.entries.values() {
            self.entries
                .entry(entry.item.clone())
                .and_modify(|e| {
                    e.count += entry.count;
                    e.error += entry.error;
                })
                .or_insert_with(|| entry.clone());
        }

        while self.entries.len() > self.capacity {
            if let Some(min_key) = self
                .entries
                .values()
                .min_by_key(|e| e.count)
                .map(|e| e.item.clone())
            {
                self.entries.remove(&min_key);
            } else {
                break;
            }
        }
    }

    /// Entries sorted by descending count, with tail entries below
    /// `percentile_threshold` of the total dropped (spec.md §4.6).
    fn ranked(&self) -> Vec<&Entry<K>> {
        let mut sorted: Vec<&Entry<K>> = self.entries.values().collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));

        let total: u64 = sorted.iter().map(|e| e.count).sum();
        if total == 0 || self.percentile_threshold <= 0.0 {
            return sorted;
        }

        let mut cumulative = 0u64;
        let cutoff = (total as f64 * self.percentile_threshold) as u64;
        let mut kept = Vec::with_capacity(sorted.len());
        for entry in sorted {
            cumulative += entry.count;
            kept.push(entry);
            if cumulative >= cutoff {
                break;
            }
        }
        kept
    }

    pub fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        let items: Vec<serde_json::Value> = self
            .ranked()
            .into_iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.item.to_string(),
                    "estimate": e.count,
                    "error": e.error,
                })
            })
            .collect();
        out.insert(self.meta.json_path(), serde_json::Value::Array(items));
    }

    pub fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        for entry in self.ranked() {
            let mut item_labels = labels.clone();
            item_labels.insert("item".to_string(), entry.item.to_string());
            render_prometheus_line(out, &self.meta, "gauge", &item_labels, entry.count);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_by_capacity() {
        let mut topn: TopN<String> = TopN::new("dns", &["top_qname2"], "h", 3, 0.0);
        for i in 0..10 {
            topn.update(format!("item{i}"));
        }
        assert!(topn.entries.len() <= 3);
    }

    #[test]
    fn heavy_hitter_survives_eviction_pressure() {
        let mut topn: TopN<String> = TopN::new("dns", &["top_qname2"], "h", 2, 0.0);
        for _ in 0..50 {
            topn.update("heavy".to_string());
        }
        for i in 0..50 {
            topn.update(format!("light{i}"));
        }
        assert!(topn.entries.contains_key("heavy"));
    }

    #[test]
    fn merge_sums_shared_items() {
        let mut a: TopN<String> = TopN::new("dns", &["x"], "h", 10, 0.0);
        let mut b: TopN<String> = TopN::new("dns", &["x"], "h", 10, 0.0);
        a.update("foo".to_string());
        a.update("foo".to_string());
        b.update("foo".to_string());
        a.merge(&b);
        assert_eq!(a.entries["foo"].count, 3);
    }
}
