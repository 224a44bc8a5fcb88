//! chr-agentd — assembles the agent from an [`AgentConfig`].
//!
//! The binary and the end-to-end tests build the router through the same
//! functions; only the proxy reloader differs.

use std::sync::Arc;

use anyhow::Context;
use chr_api::{ApiState, SignatureVerifier};
use chr_certs::{CertFetcher, CertStore};
use chr_core::AgentConfig;
use chr_nginx::{ProxyReloader, ShellReloader, SiteStore};
use chr_reconciler::Reconciler;

/// Reloader that runs the configured command (or only logs, in sandbox).
pub fn shell_reloader(config: &AgentConfig) -> Arc<dyn ProxyReloader> {
    Arc::new(ShellReloader::new(&config.reload_command, config.mode()))
}

pub fn build_reconciler(
    config: &AgentConfig,
    reloader: Arc<dyn ProxyReloader>,
) -> anyhow::Result<Reconciler> {
    let mode = config.mode();
    let layout = config.layout();
    let fetcher = CertFetcher::from_config(config).context("building certificate fetcher")?;

    Ok(Reconciler::new(
        Arc::new(fetcher),
        CertStore::new(layout.clone(), mode),
        SiteStore::new(layout, &config.upstream, mode),
        reloader,
    ))
}

pub fn build_state(
    config: &AgentConfig,
    reloader: Arc<dyn ProxyReloader>,
) -> anyhow::Result<ApiState> {
    let reconciler = build_reconciler(config, reloader)?;
    let verifier = SignatureVerifier::new(config.agent_secret.as_bytes())?;
    Ok(ApiState::new(Arc::new(reconciler), verifier, config.mode()))
}

/// Complete router for `config`.
pub fn build_app(
    config: &AgentConfig,
    reloader: Arc<dyn ProxyReloader>,
) -> anyhow::Result<axum::Router> {
    Ok(chr_api::build_router(build_state(config, reloader)?))
}
