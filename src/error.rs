use std::path::PathBuf;

use thiserror::Error;

/// Startup-fatal conditions. Anything that can be recovered per-line,
/// per-order, or per-request is not modeled as an error (see `parser::Rejection`
/// and `order::OrderStatus`); these are the handful of conditions that should
/// never be recovered silently.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("watch root does not exist or is not a directory: {0}")]
    WatchRootMissing(PathBuf),

    #[error("failed to load cache from {path}: {source}")]
    CacheLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid rate limiter configuration for adapter {adapter}: {reason}")]
    InvalidRateLimiter { adapter: String, reason: String },

    #[error("adapter {0} has no base URL configured")]
    AdapterMissingBaseUrl(String),

    #[error("failed to initialize filesystem watcher: {0}")]
    WatchInit(#[from] notify::Error),
}
