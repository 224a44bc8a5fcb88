//! Error types for certificate retrieval and storage.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for certificate operations.
pub type CertResult<T> = Result<T, CertError>;

/// Errors that can occur while fetching or persisting certificates.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("control plane returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("control plane request timed out after {0:?}")]
    Timeout(Duration),

    #[error("control plane request failed: {0}")]
    Transport(String),

    #[error("malformed control plane response: {0}")]
    MalformedResponse(String),

    #[error("invalid certificate bundle: {0}")]
    InvalidBundle(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate file was not written: {0}")]
    NotWritten(PathBuf),
}

impl CertError {
    /// Whether redelivering the same event may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CertError::Remote { .. }
                | CertError::Timeout(_)
                | CertError::Transport(_)
                | CertError::Io { .. }
                | CertError::NotWritten(_)
        )
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> CertError {
    let path = path.into();
    move |source| CertError::Io { path, source }
}
