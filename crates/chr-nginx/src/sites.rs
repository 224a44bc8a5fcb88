//! SiteStore — per-domain site files in the nginx sites directory.
//!
//! A site file is always replaced whole (temp file, then rename), never
//! edited in place.

use std::path::Path;

use chr_core::{AgentMode, ConfigMode, SiteLayout};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{NginxResult, io_err};
use crate::template::{SiteParams, render};

const SITE_MODE: u32 = 0o644;

/// Persists rendered site files for each domain.
#[derive(Debug, Clone)]
pub struct SiteStore {
    layout: SiteLayout,
    upstream: String,
    mode: AgentMode,
}

impl SiteStore {
    pub fn new(layout: SiteLayout, upstream: impl Into<String>, mode: AgentMode) -> Self {
        Self {
            layout,
            upstream: upstream.into(),
            mode,
        }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Text that [`SiteStore::write`] would persist for `domain`.
    pub fn render(&self, domain: &str, mode: ConfigMode) -> String {
        render(
            mode,
            &SiteParams {
                domain,
                upstream: &self.upstream,
                cert_dir: self.layout.cert_root(),
            },
        )
    }

    /// Render and persist the site file for `domain`.
    pub async fn write(&self, domain: &str, mode: ConfigMode) -> NginxResult<()> {
        if self.mode.is_sandbox() {
            info!(domain, %mode, "sandbox: would write site config");
            return Ok(());
        }

        let content = self.render(domain, mode);
        let path = self.layout.site_config(domain);
        tokio::fs::create_dir_all(self.layout.sites_root())
            .await
            .map_err(io_err(self.layout.sites_root()))?;

        let tmp = path.with_extension("conf.tmp");
        write_site(&tmp, content.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err(&path))?;

        info!(domain, %mode, "wrote site config");
        Ok(())
    }

    /// Delete the site file for `domain`. Absence is not an error.
    pub async fn remove(&self, domain: &str) -> NginxResult<()> {
        if self.mode.is_sandbox() {
            info!(domain, "sandbox: would remove site config");
            return Ok(());
        }

        let path = self.layout.site_config(domain);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(domain, "removed site config");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(domain, "no site config to remove");
                Ok(())
            }
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Whether a site file exists for `domain`, in any mode.
    pub fn exists(&self, domain: &str) -> bool {
        self.layout.site_config(domain).exists()
    }
}

async fn write_site(path: &Path, contents: &[u8]) -> NginxResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(SITE_MODE)
        .open(path)
        .await
        .map_err(io_err(path))?;
    file.write_all(contents).await.map_err(io_err(path))?;
    file.sync_all().await.map_err(io_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path, mode: AgentMode) -> SiteStore {
        SiteStore::new(
            SiteLayout::new(root.join("certs"), root.join("sites")),
            "http://localhost:3000",
            mode,
        )
    }

    #[tokio::test]
    async fn write_creates_named_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path(), AgentMode::Live);
        assert!(!store.exists("example.com"));

        store.write("example.com", ConfigMode::Pending).await.unwrap();

        assert!(store.exists("example.com"));
        let path = tmp.path().join("sites/example.com.conf");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# chr-agent: PENDING"));
        assert!(!tmp.path().join("sites/example.com.conf.tmp").exists());
    }

    #[tokio::test]
    async fn active_replaces_pending_entirely() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path(), AgentMode::Live);
        store.write("example.com", ConfigMode::Pending).await.unwrap();
        store.write("example.com", ConfigMode::Active).await.unwrap();

        let text = std::fs::read_to_string(store.layout().site_config("example.com")).unwrap();
        assert!(text.starts_with("# chr-agent: ACTIVE"));
        assert!(!text.contains("PENDING"));
        assert_eq!(text.matches("# chr-agent:").count(), 1);
    }

    #[tokio::test]
    async fn remove_tolerates_absence() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path(), AgentMode::Live);
        store.remove("example.com").await.unwrap();

        store.write("example.com", ConfigMode::Active).await.unwrap();
        store.remove("example.com").await.unwrap();
        assert!(!store.exists("example.com"));
    }

    #[tokio::test]
    async fn other_domains_are_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path(), AgentMode::Live);
        store.write("a.test", ConfigMode::Active).await.unwrap();
        store.write("b.test", ConfigMode::Pending).await.unwrap();
        store.remove("a.test").await.unwrap();
        assert!(store.exists("b.test"));
    }

    #[tokio::test]
    async fn sandbox_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let live = store(tmp.path(), AgentMode::Live);
        live.write("kept.test", ConfigMode::Pending).await.unwrap();

        let sandbox = store(tmp.path(), AgentMode::Sandbox);
        sandbox.write("example.com", ConfigMode::Active).await.unwrap();
        sandbox.remove("kept.test").await.unwrap();

        assert!(!sandbox.exists("example.com"));
        assert!(sandbox.exists("kept.test"));
    }
}
