//! HyperLogLog-class cardinality estimator (spec.md §4.6, §GLOSSARY).

use crate::metric::{render_prometheus_line, LabelMap, MetricMeta};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct Cardinality {
    pub meta: MetricMeta,
    precision: u8,
    registers: Vec<u8>,
}

impl Cardinality {
    /// `precision` is the register-index width in bits (spec.md default: 12).
    pub fn new(schema: &'static str, path: &[&'static str], help: &'static str, precision: u8) -> Self {
        let precision = precision.clamp(4, 18);
        let m = 1usize << precision;
        Self {
            meta: MetricMeta::new(schema, path, help),
            precision,
            registers: vec![0; m],
        }
    }

    pub fn update<T: Hash>(&mut self, value: T) {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        self.update_hash(hasher.finish());
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        self.update_hash(hasher.finish());
    }

    fn update_hash(&mut self, hash: u64) {
        let m = self.registers.len() as u64;
        let idx = (hash & (m - 1)) as usize;
        let rest = hash >> self.precision;
        // +1 so an all-zero remainder still counts as rank 1, bounded by the
        // number of bits left after carving out the register index.
        let max_rank = (64 - self.precision) as u32;
        let rank = (rest.trailing_zeros().min(max_rank) as u8) + 1;
        if rank > self.registers[idx] {
            self.registers[idx] = rank;
        }
    }

    /// Merge by element-wise max of registers (spec.md §4.6).
    pub fn merge(&mut self, other: &Cardinality) {
        debug_assert_eq!(self.registers.len(), other.registers.len());
        for (a, b) in self.registers.iter_mut().zip(other.registers.iter()) {
            *a = (*a).max(*b);
        }
    }

    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let alpha_m = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };

        let sum: f64 = self
            .registers
            .iter()
            .map(|&r| 2f64.powi(-(r as i32)))
            .sum();
        let raw_estimate = alpha_m * m * m / sum;

        if raw_estimate <= 2.5 * m {
            let zero_registers = self.registers.iter().filter(|&&r| r == 0).count();
            if zero_registers > 0 {
                return m * (m / zero_registers as f64).ln();
            }
        }
        raw_estimate
    }

    pub fn to_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        out.insert(
            self.meta.json_path(),
            serde_json::json!(self.estimate().round() as u64),
        );
    }

    pub fn to_prometheus(&self, out: &mut String, labels: &LabelMap) {
        render_prometheus_line(out, &self.meta, "gauge", labels, self.estimate().round() as u64);
    }
}
