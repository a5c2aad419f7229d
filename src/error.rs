use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Unified error type for the aggregation core.
///
/// Returned only from construction/configuration/admin paths. The hot
/// ingestion path (`process_*` on handlers) never surfaces `CoreError` to
/// its caller: malformed input or filter rejection is counted, not
/// propagated (see spec.md §7).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("metrics registration error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("org id store error: {0}")]
    OrgIdStore(#[from] sled::Error),

    #[error("policy {0} already exists")]
    DuplicatePolicy(String),

    #[error("policy {0} not found")]
    PolicyNotFound(String),

    #[error("handler {0} not found")]
    HandlerNotFound(String),

    #[error("window of {requested} periods exceeds {available} available closed buckets")]
    WindowTooEarly { requested: usize, available: usize },

    #[error("internal error: {0}")]
    Internal(String),
}
