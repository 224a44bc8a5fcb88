//! Reconciliation errors, tagged with the domain and failing step.

use std::fmt;

use chr_certs::CertError;
use chr_nginx::NginxError;
use thiserror::Error;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Step of an event's action sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchCertificate,
    WriteCertificates,
    WriteConfig,
    RemoveConfig,
    RemoveCertificates,
    Reload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchCertificate => "fetch certificate",
            Stage::WriteCertificates => "write certificates",
            Stage::WriteConfig => "write site config",
            Stage::RemoveConfig => "remove site config",
            Stage::RemoveCertificates => "remove certificates",
            Stage::Reload => "reload nginx",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component error underlying a [`ReconcileError`].
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Cert(#[from] CertError),

    #[error(transparent)]
    Nginx(#[from] NginxError),
}

#[derive(Debug, Error)]
#[error("{stage} failed for {domain}: {source}")]
pub struct ReconcileError {
    pub domain: String,
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl ReconcileError {
    pub fn new(domain: &str, stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            domain: domain.to_string(),
            stage,
            source: source.into(),
        }
    }

    /// Whether redelivering the event may succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.source {
            StageError::Cert(e) => e.is_retryable(),
            StageError::Nginx(_) => true,
        }
    }
}

/// `map_err` adapter attaching domain and stage.
pub(crate) fn at<E: Into<StageError>>(domain: &str, stage: Stage) -> impl FnOnce(E) -> ReconcileError + '_ {
    move |e| ReconcileError::new(domain, stage, e)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn message_names_stage_domain_and_cause() {
        let err = ReconcileError::new(
            "example.com",
            Stage::FetchCertificate,
            CertError::Timeout(Duration::from_secs(10)),
        );
        assert_eq!(
            err.to_string(),
            "fetch certificate failed for example.com: control plane request timed out after 10s"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_bundle_is_terminal() {
        let err = ReconcileError::new(
            "example.com",
            Stage::WriteCertificates,
            CertError::InvalidBundle("empty fields: privateKey".into()),
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn reload_failure_keeps_prefix() {
        let err = ReconcileError::new("a.test", Stage::Reload, NginxError::Reload("exit 1".into()));
        assert!(err.to_string().contains("nginx reload failed: exit 1"));
    }
}
