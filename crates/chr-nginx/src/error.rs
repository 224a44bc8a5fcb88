//! Error types for site files and proxy reloads.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for proxy operations.
pub type NginxResult<T> = Result<T, NginxError>;

#[derive(Debug, Error)]
pub enum NginxError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Disk and live proxy state have diverged until a reload succeeds.
    #[error("nginx reload failed: {0}")]
    Reload(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> NginxError {
    let path = path.into();
    move |source| NginxError::Io { path, source }
}
