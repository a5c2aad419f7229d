//! Metric primitives shared by every sketch: the schema-key path + help text
//! that every aggregator carries (spec.md §3), label composition, and the
//! `Counter` itself. Cardinality/Quantile/TopN/Rate live in `sketches`; this
//! module is just the common vocabulary they're all built on.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Labels attached to a rendered metric line. Kept as a `BTreeMap` so
/// Prometheus output is deterministically ordered (useful for tests and
/// for scrape diffing).
pub type LabelMap = BTreeMap<String, String>;

pub fn labels(pairs: &[(&str, &str)]) -> LabelMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The schema-key path and help text every metric/sketch carries
/// (spec.md §3: "Each carries a schema-key path ... help text, and
/// rendering callbacks").
#[derive(Debug, Clone)]
pub struct MetricMeta {
    pub schema: &'static str,
    pub path: Vec<&'static str>,
    pub help: &'static str,
}

impl MetricMeta {
    pub fn new(schema: &'static str, path: &[&'static str], help: &'static str) -> Self {
        Self {
            schema,
            path: path.to_vec(),
            help,
        }
    }

    /// `<schema>_<path joined by underscore>` (spec.md §6, Prometheus exposition).
    pub fn prometheus_name(&self) -> String {
        let mut name = self.schema.to_string();
        for segment in &self.path {
            name.push('_');
            name.push_str(segment);
        }
        name
    }

    /// JSON uses the path as a dotted key, schema as the top-level object.
    pub fn json_path(&self) -> String {
        self.path.join(".")
    }
}

fn format_label_suffix(labels: &LabelMap) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut out = String::from("{");
    for (i, (k, v)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{k}=\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""));
    }
    out.push('}');
    out
}

/// Emit one Prometheus exposition line, including HELP/TYPE preamble.
pub fn render_prometheus_line(
    out: &mut String,
    meta: &MetricMeta,
    type_name: &str,
    labels: &LabelMap,
    value: impl std::fmt::Display,
) {
    let name = meta.prometheus_name();
    let _ = writeln!(out, "# HELP {name} {}", meta.help);
    let _ = writeln!(out, "# TYPE {name} {type_name}");
    let _ = writeln!(out, "{name}{} {value}", format_label_suffix(labels));
}

/// Integer counter with associative `+=` (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct Counter {
    pub meta: MetricMeta,
    value: u64,
}

impl Counter {
    pub fn new(schema: &'static str, path: &[&'static str], help: &'static str) -> Self {
        Self {
            meta: MetricMeta::new(schema, path, help),
            value: 0,
        }
    }

    pub fn inc(&mut self) {
        self.value += 1;
    }

    pub fn add(&mut self, n: u64) {
        self.value += n;
    }

    pub fn get(&self) -> u64 {
        self.value
    }

    /// Associative merge: the required law for historical window compaction
    /// (spec.md §4.3, "Merging two buckets accumulates counters").
    pub fn merge(&mut self, other: &Counter) {
        self.value += other.value;
    }

    pub fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert(self.meta.json_path(), serde_json::json!(self.value));
    }

    pub fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        render_prometheus_line(out, &self.meta, "counter", labels, self.value);
    }
}
