//! Certificate retrieval from the control plane.
//!
//! `CertFetcher` issues `GET <base>/api/internal/cert/<domain>` with the
//! shared internal secret and a bounded timeout. It never retries; the
//! control plane redelivers the event if the agent answers with an error.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chr_core::{AgentConfig, CertificateBundle};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::error::{CertError, CertResult};

/// Header carrying the shared internal secret.
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// Boxed future alias for certificate fetches.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = CertResult<CertificateBundle>> + Send + 'a>>;

/// Source of certificate bundles.
pub trait CertSource: Send + Sync {
    /// Retrieve the current bundle for `domain`.
    fn fetch<'a>(&'a self, domain: &'a str) -> FetchFuture<'a>;
}

/// HTTP client for the control plane's internal certificate endpoint.
#[derive(Clone)]
pub struct CertFetcher {
    client: reqwest::Client,
    base_url: String,
    internal_secret: String,
    timeout: Duration,
}

impl CertFetcher {
    pub fn new(
        base_url: impl Into<String>,
        internal_secret: impl Into<String>,
        timeout: Duration,
    ) -> CertResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chr-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CertError::Transport(format!("client setup: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            internal_secret: internal_secret.into(),
            timeout,
        })
    }

    pub fn from_config(config: &AgentConfig) -> CertResult<Self> {
        Self::new(
            &config.control_plane_url,
            &config.internal_secret,
            config.fetch_timeout(),
        )
    }

    /// Endpoint URL for one domain.
    pub fn endpoint(&self, domain: &str) -> String {
        format!(
            "{}/api/internal/cert/{}",
            self.base_url,
            urlencoding::encode(domain)
        )
    }

    async fn fetch_bundle(&self, domain: &str) -> CertResult<CertificateBundle> {
        let url = self.endpoint(domain);
        info!(domain, "fetching certificate");

        let resp = self
            .client
            .get(&url)
            .header(INTERNAL_SECRET_HEADER, &self.internal_secret)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.classify(e))?;

        if status != StatusCode::OK {
            warn!(domain, status = status.as_u16(), "control plane refused certificate request");
            return Err(CertError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let mut bundle: CertificateBundle = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            CertError::MalformedResponse(format!("{e}: {preview}"))
        })?;

        if bundle.domain.is_empty() {
            warn!(domain, "control plane omitted domain field, using requested domain");
        } else if !bundle.domain.eq_ignore_ascii_case(domain) {
            return Err(CertError::MalformedResponse(format!(
                "bundle is for {}, requested {domain}",
                bundle.domain
            )));
        }
        // Files land under the requested name, whatever case the plane used.
        bundle.domain = domain.to_string();

        debug!(?bundle, "certificate bundle received");
        Ok(bundle)
    }

    fn classify(&self, err: reqwest::Error) -> CertError {
        if err.is_timeout() {
            CertError::Timeout(self.timeout)
        } else {
            CertError::Transport(err.to_string())
        }
    }
}

impl CertSource for CertFetcher {
    fn fetch<'a>(&'a self, domain: &'a str) -> FetchFuture<'a> {
        Box::pin(self.fetch_bundle(domain))
    }
}
