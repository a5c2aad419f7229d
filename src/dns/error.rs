//! Internal parse failure reasons. Never escapes the `dns` module as a
//! `CoreError`: malformed wire data is counted by the handler, not
//! propagated (spec.md §7).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The packet claims more than 100 combined resources across all
    /// sections (spec.md §4.1 anti-DoS cap).
    TooManyResources,
    /// A length, offset, or compression pointer reaches past the buffer.
    OutOfBounds,
    /// A label length byte used a reserved high-bit pattern, or produced
    /// non-UTF8 bytes.
    InvalidLabel,
    /// Compression pointers formed a cycle or exceeded the jump budget.
    CompressionLoop,
    /// Buffer shorter than a fixed-size header/field.
    Truncated,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TooManyResources => write!(f, "too many resources"),
            ParseError::OutOfBounds => write!(f, "read past end of buffer"),
            ParseError::InvalidLabel => write!(f, "invalid label"),
            ParseError::CompressionLoop => write!(f, "compression pointer loop"),
            ParseError::Truncated => write!(f, "truncated"),
        }
    }
}

impl std::error::Error for ParseError {}
