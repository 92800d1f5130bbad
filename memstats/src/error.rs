//! Error types

use thiserror::Error;

/// Errors raised while sampling or publishing runtime statistics
#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime stats publisher already started")]
    AlreadyStarted,

    #[error("no tokio runtime available to run the publisher")]
    NoRuntime,

    #[error("invalid metric prefix {0:?}: must start with a letter and contain only [A-Za-z0-9_.]")]
    InvalidPrefix(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: &'static str, reason: String },

    #[error("failed to register instrument {name}: {reason}")]
    Register { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
