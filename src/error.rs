use thiserror::Error;

/// Crate-wide error type. Fatal variants bubble up to `main`, which logs
/// them once and exits non-zero.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid node address '{0}': expected HOST:PORT")]
    BadAddress(String),

    #[error("no nodes to monitor")]
    NoNodes,
}
