//! chr-agentd — the chr-agent daemon.
//!
//! Listens for signed lifecycle webhooks from the Changerawr control plane
//! and keeps the local nginx sites and TLS files in line with them.
//!
//! # Usage
//!
//! ```text
//! chr-agentd run --config /etc/chragent.conf
//! chr-agentd render --domain example.com --mode active
//! chr-agentd sign --file event.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use chr_api::SignatureVerifier;
use chr_core::{AgentConfig, ConfigMode};
use chr_nginx::SiteStore;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "chr-agentd", about = "Changerawr custom-domain agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the webhook and health endpoints.
    Run {
        /// TOML config file. Defaults to /etc/chragent.conf when present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log output format.
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },

    /// Print the site configuration that would be written for a domain.
    Render {
        #[arg(long)]
        domain: String,

        /// `pending` or `active`.
        #[arg(long)]
        mode: ConfigMode,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the signature header value for a request body.
    Sign {
        /// File holding the exact body bytes.
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, log_format } => {
            init_tracing(log_format);
            let config = load_config(config.as_deref())?;
            run(config).await
        }
        Command::Render { domain, mode, config } => {
            init_tracing(LogFormat::Text);
            let config = load_config(config.as_deref())?;
            let sites = SiteStore::new(config.layout(), &config.upstream, config.mode());
            print!("{}", sites.render(&domain, mode));
            Ok(())
        }
        Command::Sign { file, config } => {
            init_tracing(LogFormat::Text);
            let config = load_config(config.as_deref())?;
            let body = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let verifier = SignatureVerifier::new(config.agent_secret.as_bytes())?;
            println!("{}", verifier.sign(&body));
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chr=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    AgentConfig::load(path).context("loading configuration")
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let mode = config.mode();
    let addr = config.listen_addr();

    // ── Startup banner ─────────────────────────────────────────

    info!(%mode, "chr-agent starting");
    info!(
        %addr,
        upstream = %config.upstream,
        cert_dir = %config.cert_dir.display(),
        sites_dir = %config.nginx_sites_dir.display(),
        control_plane = %config.control_plane_url,
        "configuration loaded"
    );
    if mode.is_sandbox() {
        warn!("sandbox mode: no files will be written and no commands will be executed");
    }

    // ── Assemble ───────────────────────────────────────────────

    let reloader = chr_agentd::shell_reloader(&config);
    let router = chr_agentd::build_app(&config, reloader)?;

    // ── Serve ──────────────────────────────────────────────────

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("chr-agent stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
