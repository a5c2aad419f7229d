//! Streaming quantile digest: bounded-memory centroid compression with
//! `update`, `get_quantile`, `get_n`, and an associative `merge` (spec.md
//! §4.6 — "e.g., t-digest or KLL").

use crate::metric::{render_prometheus_line, LabelMap, MetricMeta};

const DEFAULT_MAX_CENTROIDS: usize = 128;

#[derive(Debug, Clone, Copy)]
struct Centroid {
    mean: f64,
    weight: u64,
}

#[derive(Debug, Clone)]
pub struct Quantile {
    pub meta: MetricMeta,
    max_centroids: usize,
    centroids: Vec<Centroid>,
    n: u64,
}

impl Quantile {
    pub fn new(schema: &'static str, path: &[&'static str], help: &'static str) -> Self {
        Self {
            meta: MetricMeta::new(schema, path, help),
            max_centroids: DEFAULT_MAX_CENTROIDS,
            centroids: Vec::new(),
            n: 0,
        }
    }

    pub fn update(&mut self, value: u64) {
        self.centroids.push(Centroid {
            mean: value as f64,
            weight: 1,
        });
        self.n += 1;

        // Compress eagerly once the uncompressed buffer grows past a small
        // multiple of the target size, keeping memory bounded.
        if self.centroids.len() > self.max_centroids * 4 {
            self.compress();
        }
    }

    pub fn get_n(&self) -> u64 {
        self.n
    }

    fn compress(&mut self) {
        self.centroids
            .sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap());

        while self.centroids.len() > self.max_centroids {
            let mut merge_at = 0;
            let mut smallest_gap = f64::MAX;
            for i in 0..self.centroids.len() - 1 {
                let gap = self.centroids[i + 1].mean - self.centroids[i].mean;
                if gap < smallest_gap {
                    smallest_gap = gap;
                    merge_at = i;
                }
            }

            let a = self.centroids[merge_at];
            let b = self.centroids[merge_at + 1];
            let total_weight = a.weight + b.weight;
            let merged_mean =
                (a.mean * a.weight as f64 + b.mean * b.weight as f64) / total_weight as f64;
            self.centroids[merge_at] = Centroid {
                mean: merged_mean,
                weight: total_weight,
            };
            self.centroids.remove(merge_at + 1);
        }
    }

    /// Linear-interpolation-free quantile read: walks sorted centroids by
    /// cumulative weight until the target rank is reached.
    pub fn get_quantile(&self, p: f64) -> f64 {
        if self.centroids.is_empty() {
            return 0.0;
        }

        let mut sorted = self.centroids.clone();
        sorted.sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap());

        let total: u64 = sorted.iter().map(|c| c.weight).sum();
        let target = (p.clamp(0.0, 1.0) * total as f64).ceil();

        let mut cumulative = 0u64;
        for centroid in &sorted {
            cumulative += centroid.weight;
            if cumulative as f64 >= target {
                return centroid.mean;
            }
        }
        sorted.last().unwrap().mean
    }

    /// Merge is associative: union the centroid multisets, then recompress
    /// (spec.md §8, property 8).
    pub fn merge(&mut self, other: &Quantile) {
        self.centroids.extend_from_slice(&other.centroids);
        self.n += other.n;
        self.compress();
    }

    pub fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        let mut obj = serde_json::Map::new();
        obj.insert("n".to_string(), serde_json::json!(self.n));
        for p in [0.5, 0.9, 0.95, 0.99] {
            obj.insert(
                format!("p{}", (p * 100.0) as u32),
                serde_json::json!(self.get_quantile(p)),
            );
        }
        out.insert(self.meta.json_path(), serde_json::Value::Object(obj));
    }

    pub fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        for p in [0.5, 0.9, 0.95, 0.99] {
            let mut quantile_labels = labels.clone();
            quantile_labels.insert("quantile".to_string(), p.to_string());
            render_prometheus_line(
                out,
                &self.meta,
                "summary",
                &quantile_labels,
                self.get_quantile(p),
            );
        }
    }
}
