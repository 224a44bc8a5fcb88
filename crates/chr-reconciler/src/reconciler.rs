//! Reconciler — runs the action sequence for one lifecycle event.

use std::sync::Arc;

use chr_certs::{CertSource, CertStore};
use chr_core::{ConfigMode, LifecycleEvent};
use chr_nginx::{ProxyReloader, SiteStore};
use tracing::{Instrument, info, info_span};

use crate::error::{ReconcileResult, Stage, at};
use crate::locks::DomainLocks;

/// What an event did to its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Certificates and the active site file written, proxy reloaded.
    Activated,
    /// Pending site file written, proxy reloaded.
    Pending,
    /// `domain.added` for a domain that already has a site file; no-op.
    AlreadyConfigured,
    /// Site file and certificates removed, proxy reloaded.
    Removed,
}

/// Event handler. Holds no per-domain state; every decision is made from
/// the event and the files on disk.
pub struct Reconciler {
    source: Arc<dyn CertSource>,
    certs: CertStore,
    sites: SiteStore,
    reloader: Arc<dyn ProxyReloader>,
    locks: DomainLocks,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn CertSource>,
        certs: CertStore,
        sites: SiteStore,
        reloader: Arc<dyn ProxyReloader>,
    ) -> Self {
        Self {
            source,
            certs,
            sites,
            reloader,
            locks: DomainLocks::new(),
        }
    }

    /// Apply `event`, stopping at the first failed step.
    pub async fn handle(&self, event: &LifecycleEvent) -> ReconcileResult<Outcome> {
        let domain = event.domain();
        let span = info_span!(
            "event",
            event = %event.kind(),
            domain,
            cert_id = event.cert_id()
        );

        async move {
            let _guard = self.locks.acquire(domain).await;
            info!(domains_in_flight = self.locks.active(), "handling event");

            let outcome = match event {
                LifecycleEvent::CertIssued { .. } | LifecycleEvent::CertRenewed { .. } => {
                    self.activate(domain).await?
                }
                LifecycleEvent::DomainAdded { .. } => self.add_pending(domain).await?,
                LifecycleEvent::DomainRemoved { .. } | LifecycleEvent::CertRevoked { .. } => {
                    self.remove(domain).await?
                }
            };

            info!(?outcome, "event reconciled");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn activate(&self, domain: &str) -> ReconcileResult<Outcome> {
        let bundle = self
            .source
            .fetch(domain)
            .await
            .map_err(at(domain, Stage::FetchCertificate))?;
        self.certs
            .write(&bundle)
            .await
            .map_err(at(domain, Stage::WriteCertificates))?;
        self.sites
            .write(domain, ConfigMode::Active)
            .await
            .map_err(at(domain, Stage::WriteConfig))?;
        self.reload(domain).await?;
        Ok(Outcome::Activated)
    }

    async fn add_pending(&self, domain: &str) -> ReconcileResult<Outcome> {
        // Re-announcing an active domain must not downgrade it.
        if self.sites.exists(domain) {
            info!("site config already present, nothing to do");
            return Ok(Outcome::AlreadyConfigured);
        }
        self.sites
            .write(domain, ConfigMode::Pending)
            .await
            .map_err(at(domain, Stage::WriteConfig))?;
        self.reload(domain).await?;
        Ok(Outcome::Pending)
    }

    async fn remove(&self, domain: &str) -> ReconcileResult<Outcome> {
        self.sites
            .remove(domain)
            .await
            .map_err(at(domain, Stage::RemoveConfig))?;
        self.certs
            .remove(domain)
            .await
            .map_err(at(domain, Stage::RemoveCertificates))?;
        self.reload(domain).await?;
        Ok(Outcome::Removed)
    }

    async fn reload(&self, domain: &str) -> ReconcileResult<()> {
        self.reloader
            .reload()
            .await
            .map_err(at(domain, Stage::Reload))
    }
}
