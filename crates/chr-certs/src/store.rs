//! CertStore — atomic placement of certificate material on disk.
//!
//! All four artifacts are first written to `<name>.tmp` siblings and
//! synced. Only when every temporary exists are they renamed over the
//! live files, so the proxy never opens a truncated key or chain. If a
//! temporary write fails, the live files are untouched and the
//! temporaries already written are removed.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chr_core::layout::{CERT_FILE, EXPIRES_FILE, FULLCHAIN_FILE, PRIVKEY_FILE};
use chr_core::{AgentMode, CertificateBundle, SiteLayout};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::bundle::validate_bundle;
use crate::error::{CertError, CertResult, io_err};

const KEY_MODE: u32 = 0o600;
const PUBLIC_MODE: u32 = 0o644;

/// One file of a bundle as it lands on disk.
struct Artifact<'a> {
    name: &'static str,
    mode: u32,
    contents: &'a str,
}

/// Rename order. The key goes first so a chain is never live without it.
fn artifacts(bundle: &CertificateBundle) -> [Artifact<'_>; 4] {
    [
        Artifact { name: PRIVKEY_FILE, mode: KEY_MODE, contents: &bundle.private_key },
        Artifact { name: FULLCHAIN_FILE, mode: PUBLIC_MODE, contents: &bundle.full_chain },
        Artifact { name: CERT_FILE, mode: PUBLIC_MODE, contents: &bundle.certificate },
        Artifact { name: EXPIRES_FILE, mode: PUBLIC_MODE, contents: &bundle.expires_at },
    ]
}

fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.tmp"))
}

/// Persists and removes per-domain certificate directories.
#[derive(Debug, Clone)]
pub struct CertStore {
    layout: SiteLayout,
    mode: AgentMode,
}

impl CertStore {
    pub fn new(layout: SiteLayout, mode: AgentMode) -> Self {
        Self { layout, mode }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Validate `bundle` and atomically replace the domain's certificate files.
    ///
    /// In sandbox mode this only logs; the bundle is not inspected.
    pub async fn write(&self, bundle: &CertificateBundle) -> CertResult<()> {
        if self.mode.is_sandbox() {
            info!(
                domain = %bundle.domain,
                expires_at = %bundle.expires_at,
                "sandbox: would write certificates"
            );
            return Ok(());
        }

        validate_bundle(bundle)?;

        let dir = self.layout.cert_dir(&bundle.domain);
        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let artifacts = artifacts(bundle);

        for (index, artifact) in artifacts.iter().enumerate() {
            let tmp = temp_path(&dir, artifact.name);
            if let Err(e) = write_synced(&tmp, artifact.contents.as_bytes(), artifact.mode).await {
                warn!(domain = %bundle.domain, file = artifact.name, error = %e, "temp write failed");
                discard_temps(&dir, &artifacts[..=index]).await;
                return Err(e);
            }
            debug!(file = artifact.name, "wrote temp file");
        }

        for artifact in &artifacts {
            let tmp = temp_path(&dir, artifact.name);
            let dest = dir.join(artifact.name);
            tokio::fs::rename(&tmp, &dest).await.map_err(io_err(&dest))?;
            debug!(file = artifact.name, "renamed into place");
        }

        let fullchain = dir.join(FULLCHAIN_FILE);
        let size = match tokio::fs::metadata(&fullchain).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(CertError::NotWritten(fullchain)),
        };

        info!(
            domain = %bundle.domain,
            expires_at = %bundle.expires_at,
            fullchain_bytes = size,
            "wrote certificates"
        );
        Ok(())
    }

    /// Delete the domain's certificate directory. Absence is not an error.
    pub async fn remove(&self, domain: &str) -> CertResult<()> {
        if self.mode.is_sandbox() {
            info!(domain, "sandbox: would remove certificates");
            return Ok(());
        }

        let dir = self.layout.cert_dir(domain);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(domain, "removed certificates");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(domain, "no certificates to remove");
                Ok(())
            }
            Err(e) => Err(io_err(&dir)(e)),
        }
    }
}

/// Write `contents` to `path` with `mode`, flushed to stable storage.
async fn write_synced(path: &Path, contents: &[u8], mode: u32) -> CertResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .await
        .map_err(io_err(path))?;

    // `mode` only applies on creation; a stale temp keeps its old bits.
    file.set_permissions(std::fs::Permissions::from_mode(mode))
        .await
        .map_err(io_err(path))?;
    file.write_all(contents).await.map_err(io_err(path))?;
    file.sync_all().await.map_err(io_err(path))?;
    Ok(())
}

async fn discard_temps(dir: &Path, written: &[Artifact<'_>]) {
    for artifact in written {
        let tmp = temp_path(dir, artifact.name);
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            debug!(path = ?tmp, error = %e, "could not discard temp file");
        }
    }
}
