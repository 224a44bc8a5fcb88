//! Proxy reload.
//!
//! [`ProxyReloader`] is the only way the reconciler reaches the running
//! proxy, so a signal- or API-based reload can replace the shell command
//! without touching the event handling.

use std::future::Future;
use std::pin::Pin;

use chr_core::AgentMode;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{NginxError, NginxResult};

/// Boxed future alias for reload results.
pub type ReloadFuture<'a> = Pin<Box<dyn Future<Output = NginxResult<()>> + Send + 'a>>;

/// Makes the proxy re-read its configuration.
pub trait ProxyReloader: Send + Sync {
    /// Reload and wait for the outcome. Failure means on-disk and live
    /// configuration differ.
    fn reload(&self) -> ReloadFuture<'_>;
}

/// Runs a configured command through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellReloader {
    command: String,
    mode: AgentMode,
}

impl ShellReloader {
    pub fn new(command: impl Into<String>, mode: AgentMode) -> Self {
        Self {
            command: command.into(),
            mode,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self) -> NginxResult<()> {
        if self.mode.is_sandbox() {
            info!(command = %self.command, "sandbox: would reload nginx");
            return Ok(());
        }

        info!(command = %self.command, "reloading nginx");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NginxError::Reload(format!("failed to run `{}`: {e}", self.command)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            info!(stdout = %stdout.trim(), "reload output");
        }
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "reload output");
        }

        if !output.status.success() {
            return Err(NginxError::Reload(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl ProxyReloader for ShellReloader {
    fn reload(&self) -> ReloadFuture<'_> {
        Box::pin(self.run())
    }
}
