//! On-disk layout for certificate material and proxy configuration.
//!
//! ```text
//! <cert_dir>/<domain>/privkey.pem
//! <cert_dir>/<domain>/fullchain.pem
//! <cert_dir>/<domain>/cert.pem
//! <cert_dir>/<domain>/expires.txt
//! <sites_dir>/<domain>.conf
//! ```
//!
//! Presence of these files is the only record of a domain's state.
//! Domain names are trusted as delivered by an authenticated event.

use std::path::{Path, PathBuf};

pub const PRIVKEY_FILE: &str = "privkey.pem";
pub const FULLCHAIN_FILE: &str = "fullchain.pem";
pub const CERT_FILE: &str = "cert.pem";
pub const EXPIRES_FILE: &str = "expires.txt";

/// Resolves domain-qualified paths under the configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    cert_root: PathBuf,
    sites_root: PathBuf,
}

impl SiteLayout {
    pub fn new(cert_root: impl Into<PathBuf>, sites_root: impl Into<PathBuf>) -> Self {
        Self {
            cert_root: cert_root.into(),
            sites_root: sites_root.into(),
        }
    }

    pub fn cert_root(&self) -> &Path {
        &self.cert_root
    }

    pub fn sites_root(&self) -> &Path {
        &self.sites_root
    }

    /// Directory holding one domain's certificate artifacts.
    pub fn cert_dir(&self, domain: &str) -> PathBuf {
        self.cert_root.join(domain)
    }

    /// Proxy configuration file for a domain.
    pub fn site_config(&self, domain: &str) -> PathBuf {
        self.sites_root.join(format!("{domain}.conf"))
    }
}
