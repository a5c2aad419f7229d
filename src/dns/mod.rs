//! DNS wire parsing, transaction matching, and TCP framing (spec.md §4.1,
//! §4.8). Grounded in the teacher's `dns/` layout — one file per concern —
//! but built on an arena/handle model rather than `bitstream-io`'s packed
//! structs, since the aggregator edits resources in place on a borrowed
//! buffer rather than round-tripping whole packets.

mod error;
mod header;
mod layer;
mod name;
mod resource;
mod tcp_framing;
mod transaction;
mod types;

pub use error::ParseError;
pub use header::{Header, HEADER_LEN};
pub use layer::{is_dns_port, DnsLayer, MAX_RESOURCES};
pub use name::{decode_name, encode_name};
pub use resource::{ResourceArena, ResourceHandle, ResourceRecord, Section};
pub use tcp_framing::{TcpDnsSession, TcpSessionBuffer};
pub use transaction::{FlowKey, Transactions};
pub use types::{Opcode, QClass, QType, ResponseCode};
