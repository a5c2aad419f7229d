//! The three traffic handlers named in spec.md §2's component table, each
//! wrapping its own `PeriodManager` over a handler-specific metrics bucket.

pub mod dns_handler;
pub mod flow_handler;
pub mod net_handler;

pub use dns_handler::{DnsHandler, DnsMetricsBucket};
pub use flow_handler::{FlowHandler, FlowMetricsBucket};
pub use net_handler::{NetHandler, NetMetricsBucket};
