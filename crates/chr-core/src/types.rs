//! Shared types used across chr-agent crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// A lifecycle notification pushed by the control plane.
///
/// The wire form is a JSON object tagged by its `event` field, e.g.
/// `{"event":"cert.issued","domain":"example.com","certId":"c1"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    #[serde(rename = "cert.issued")]
    CertIssued {
        domain: String,
        #[serde(rename = "certId")]
        cert_id: String,
    },
    #[serde(rename = "cert.renewed")]
    CertRenewed {
        domain: String,
        #[serde(rename = "certId")]
        cert_id: String,
    },
    #[serde(rename = "cert.revoked")]
    CertRevoked { domain: String },
    #[serde(rename = "domain.added")]
    DomainAdded { domain: String },
    #[serde(rename = "domain.removed")]
    DomainRemoved { domain: String },
}

impl LifecycleEvent {
    /// Domain this event applies to.
    pub fn domain(&self) -> &str {
        match self {
            LifecycleEvent::CertIssued { domain, .. }
            | LifecycleEvent::CertRenewed { domain, .. }
            | LifecycleEvent::CertRevoked { domain }
            | LifecycleEvent::DomainAdded { domain }
            | LifecycleEvent::DomainRemoved { domain } => domain,
        }
    }

    /// Certificate identifier, present on issuance and renewal only.
    ///
    /// Used for log correlation; never drives control flow.
    pub fn cert_id(&self) -> Option<&str> {
        match self {
            LifecycleEvent::CertIssued { cert_id, .. }
            | LifecycleEvent::CertRenewed { cert_id, .. } => Some(cert_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::CertIssued { .. } => EventKind::CertIssued,
            LifecycleEvent::CertRenewed { .. } => EventKind::CertRenewed,
            LifecycleEvent::CertRevoked { .. } => EventKind::CertRevoked,
            LifecycleEvent::DomainAdded { .. } => EventKind::DomainAdded,
            LifecycleEvent::DomainRemoved { .. } => EventKind::DomainRemoved,
        }
    }
}

/// Discriminant of a [`LifecycleEvent`], for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CertIssued,
    CertRenewed,
    CertRevoked,
    DomainAdded,
    DomainRemoved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CertIssued => "cert.issued",
            EventKind::CertRenewed => "cert.renewed",
            EventKind::CertRevoked => "cert.revoked",
            EventKind::DomainAdded => "domain.added",
            EventKind::DomainRemoved => "domain.removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PEM material needed to serve TLS for one domain.
///
/// Every field reads an absent key or `null` as empty, so that an
/// incomplete control-plane response still parses and is then rejected by
/// validation (or repaired, for `domain`) rather than reported as an
/// unreadable body.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateBundle {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub domain: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub private_key: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub certificate: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub full_chain: String,
    /// ISO-8601 expiry, written verbatim to `expires.txt`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub expires_at: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Key material stays out of logs and panic messages.
impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("domain", &self.domain)
            .field("private_key", &format_args!("<{} bytes>", self.private_key.len()))
            .field("certificate", &format_args!("<{} bytes>", self.certificate.len()))
            .field("full_chain", &format_args!("<{} bytes>", self.full_chain.len()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Which proxy configuration template a domain is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    /// Domain known, no certificate yet: plaintext only.
    Pending,
    /// Certificate on disk: redirect plaintext, terminate TLS.
    Active,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Pending => "pending",
            ConfigMode::Active => "active",
        }
    }
}

impl fmt::Display for ConfigMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ConfigMode::Pending),
            "active" => Ok(ConfigMode::Active),
            other => Err(format!("unknown config mode '{other}', expected pending or active")),
        }
    }
}

/// Whether side effects are performed or only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Live,
    /// Every write, remove, and reload is skipped and logged instead.
    Sandbox,
}

impl AgentMode {
    pub fn from_sandbox(sandbox: bool) -> Self {
        if sandbox { AgentMode::Sandbox } else { AgentMode::Live }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, AgentMode::Sandbox)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Live => "live",
            AgentMode::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
