use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// Deserializes any of this module's config structs from TOML text
/// (spec.md §1.1's "serde + toml-deserializable" config surface). No
/// file-watching/hot-reload — that belongs to the excluded control plane.
pub fn from_toml_str<T: DeserializeOwned>(content: &str) -> Result<T, CoreError> {
    toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
}

/// How a bucket's `recorded_stream` flag should be interpreted: live traffic
/// renders an instantaneous rate, a recorded capture/replay does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Live,
    Recorded,
}

/// Configuration for the sliding window bucket/period manager, shared by
/// every handler's metrics manager (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of buckets kept in the ring (spec.md default: 5).
    pub window_count: usize,

    /// Length of one period (spec.md default: 60s).
    pub period: Duration,

    /// Fraction of events chosen for deep sampling, in `[0.0, 1.0]`
    /// (spec.md default: 1.0, i.e. 100%).
    pub deep_sample_rate: f64,

    /// Whether this manager aggregates a live tap or a recorded capture.
    pub stream_kind: StreamKind,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_count: 5,
            period: Duration::from_secs(60),
            deep_sample_rate: 1.0,
            stream_kind: StreamKind::Live,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window_count == 0 {
            return Err(CoreError::Config(
                "window_count must be at least 1".to_string(),
            ));
        }
        if self.period.is_zero() {
            return Err(CoreError::Config("period must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.deep_sample_rate) {
            return Err(CoreError::Config(
                "deep_sample_rate must be in [0.0, 1.0]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Capacity knobs shared by the sketch family (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchConfig {
    /// TopN capacity (spec.md default: 10).
    pub topn_count: usize,
    /// Percentile below which TopN tail entries are dropped on render.
    pub topn_percentile_threshold: f64,
    /// HyperLogLog register index precision, in bits (spec.md default: 12).
    pub cardinality_precision: u8,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            topn_count: 10,
            topn_percentile_threshold: 0.0,
            cardinality_precision: 12,
        }
    }
}

/// Configuration specific to the DNS handler (spec.md §4.3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsHandlerConfig {
    pub window: WindowConfig,
    pub sketches: SketchConfig,
    /// Bound on outstanding query/response pairs (spec.md §5, default 10000).
    pub max_open_transactions: usize,
    /// Age at which an unmatched query is purged as timed out (default 5s).
    pub transaction_timeout: Duration,
    /// If set, only replies with this rcode are counted (spec.md §8 example).
    pub only_rcode: Option<crate::dns::ResponseCode>,
}

impl Default for DnsHandlerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            sketches: SketchConfig::default(),
            max_open_transactions: 10_000,
            transaction_timeout: Duration::from_secs(5),
            only_rcode: None,
        }
    }
}

/// How an IP address is rendered in flow Top-N labels (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpSummarization {
    None,
    BySubnet { cidrs: Vec<ipnetwork::IpNetwork> },
    ByAsn {
        exclude_unknown: bool,
        exclude_prefixes: Vec<String>,
        /// CIDRs to fall back on when the ASN is unknown/excluded (spec.md §4.4).
        fallback_cidrs: Vec<ipnetwork::IpNetwork>,
    },
}

impl Default for IpSummarization {
    fn default() -> Self {
        IpSummarization::None
    }
}

/// Configuration specific to the flow handler (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowHandlerConfig {
    pub window: WindowConfig,
    pub sketches: SketchConfig,
    pub summarization: IpSummarization,
    /// Prefixes always rendered as literal addresses regardless of
    /// `summarization`.
    pub exclude_from_summarization: Vec<ipnetwork::IpNetwork>,
    /// Maximum entries kept in the port→service-name resolution cache.
    pub service_name_cache_size: usize,
    pub enrichment_enabled: bool,
}

impl Default for FlowHandlerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            sketches: SketchConfig::default(),
            summarization: IpSummarization::None,
            exclude_from_summarization: Vec::new(),
            service_name_cache_size: 4096,
            enrichment_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_config_is_valid() {
        assert!(WindowConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_window_count_is_invalid() {
        let cfg = WindowConfig {
            window_count: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_sample_rate_is_invalid() {
        let cfg = WindowConfig {
            deep_sample_rate: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn window_config_loads_from_toml() {
        let toml = r#"
            window_count = 8
            deep_sample_rate = 0.5
            stream_kind = "Recorded"

            [period]
            secs = 30
            nanos = 0
        "#;
        let cfg: WindowConfig = from_toml_str(toml).unwrap();
        assert_eq!(cfg.window_count, 8);
        assert_eq!(cfg.period, Duration::from_secs(30));
        assert_eq!(cfg.stream_kind, StreamKind::Recorded);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = from_toml_str::<WindowConfig>("not = [valid").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
