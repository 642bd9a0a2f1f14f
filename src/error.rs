//! Error types for watchcast

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for watchcast operations
#[derive(Error, Debug)]
pub enum ServeError {
    /// The listening endpoint could not be bound. Always fatal.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The recursive filesystem watch could not be established.
    /// Fatal under [`WatchFailurePolicy::FailFast`](crate::WatchFailurePolicy).
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// `close` was called on a server that is already closing or closed.
    #[error("server is already closed")]
    AlreadyClosed,

    /// A broadcast was attempted after the server was closed.
    #[error("server is closed")]
    ServerClosed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for watchcast operations
pub type Result<T> = std::result::Result<T, ServeError>;
