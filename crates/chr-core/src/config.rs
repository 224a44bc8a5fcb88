//! Agent configuration.
//!
//! Built once at startup from defaults, an optional TOML file, and the
//! process environment (later sources win), then handed to each component
//! by value. Nothing reads configuration after startup.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::layout::SiteLayout;
use crate::types::AgentMode;

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/chragent.conf";

pub const DEFAULT_PORT: u16 = 7842;
pub const DEFAULT_CERT_DIR: &str = "/etc/ssl/changerawr";
pub const DEFAULT_SITES_DIR: &str = "/etc/nginx/sites-enabled";
pub const DEFAULT_RELOAD_COMMAND: &str = "nginx -s reload";
pub const DEFAULT_UPSTREAM: &str = "http://localhost:3000";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Errors raised while assembling an [`AgentConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Fully resolved agent configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// HMAC key for inbound webhook signatures.
    pub agent_secret: String,
    /// Base URL of the control plane, e.g. `https://changerawr.example`.
    pub control_plane_url: String,
    /// Sent as `x-internal-secret` when fetching certificates.
    pub internal_secret: String,
    pub cert_dir: PathBuf,
    pub nginx_sites_dir: PathBuf,
    /// Shell command that makes the proxy re-read its configuration.
    pub reload_command: String,
    /// Origin the proxy forwards traffic to.
    pub upstream: String,
    pub sandbox: bool,
    pub fetch_timeout_secs: u64,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("agent_secret", &"<redacted>")
            .field("control_plane_url", &self.control_plane_url)
            .field("internal_secret", &"<redacted>")
            .field("cert_dir", &self.cert_dir)
            .field("nginx_sites_dir", &self.nginx_sites_dir)
            .field("reload_command", &self.reload_command)
            .field("upstream", &self.upstream)
            .field("sandbox", &self.sandbox)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .finish()
    }
}

/// On-disk form of the config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind_address: Option<IpAddr>,
    pub port: Option<u16>,
    pub agent_secret: Option<String>,
    pub control_plane_url: Option<String>,
    pub internal_secret: Option<String>,
    pub cert_dir: Option<PathBuf>,
    pub nginx_sites_dir: Option<PathBuf>,
    pub reload_command: Option<String>,
    pub upstream: Option<String>,
    pub sandbox: Option<bool>,
    pub fetch_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl AgentConfig {
    /// Build a config with defaults for everything but the three secrets.
    pub fn new(
        agent_secret: impl Into<String>,
        control_plane_url: impl Into<String>,
        internal_secret: impl Into<String>,
    ) -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            agent_secret: agent_secret.into(),
            control_plane_url: control_plane_url.into(),
            internal_secret: internal_secret.into(),
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            nginx_sites_dir: PathBuf::from(DEFAULT_SITES_DIR),
            reload_command: DEFAULT_RELOAD_COMMAND.to_string(),
            upstream: DEFAULT_UPSTREAM.to_string(),
            sandbox: false,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }

    /// Load from `path` (or [`DEFAULT_CONFIG_PATH`] if it exists), then
    /// overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(FileConfig::from_file(path)?),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Some(FileConfig::from_file(default)?)
                } else {
                    None
                }
            }
        };
        Self::resolve(file.unwrap_or_default(), |key| std::env::var(key).ok())
    }

    /// Merge defaults, `file`, and variables looked up through `env`.
    ///
    /// Empty variables count as unset.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mut config = AgentConfig::new(
            file.agent_secret.unwrap_or_default(),
            file.control_plane_url.unwrap_or_default(),
            file.internal_secret.unwrap_or_default(),
        );
        if let Some(addr) = file.bind_address {
            config.bind_address = addr;
        }
        if let Some(port) = file.port {
            config.port = port;
        }
        if let Some(dir) = file.cert_dir {
            config.cert_dir = dir;
        }
        if let Some(dir) = file.nginx_sites_dir {
            config.nginx_sites_dir = dir;
        }
        if let Some(cmd) = file.reload_command {
            config.reload_command = cmd;
        }
        if let Some(upstream) = file.upstream {
            config.upstream = upstream;
        }
        if let Some(sandbox) = file.sandbox {
            config.sandbox = sandbox;
        }
        if let Some(secs) = file.fetch_timeout_secs {
            config.fetch_timeout_secs = secs;
        }

        if let Some(port) = env("AGENT_PORT") {
            config.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "AGENT_PORT",
                reason: format!("{port:?}: {e}"),
            })?;
        }
        if let Some(secret) = env("AGENT_SECRET") {
            config.agent_secret = secret;
        }
        if let Some(url) = env("CHANGERAWR_URL") {
            config.control_plane_url = url;
        }
        if let Some(secret) = env("INTERNAL_API_SECRET") {
            config.internal_secret = secret;
        }
        if let Some(dir) = env("CERT_DIR") {
            config.cert_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env("NGINX_DIR") {
            config.nginx_sites_dir = PathBuf::from(dir);
        }
        if let Some(cmd) = env("NGINX_RELOAD_CMD") {
            config.reload_command = cmd;
        }
        if let Some(upstream) = env("UPSTREAM") {
            config.upstream = upstream;
        }
        if let Some(sandbox) = env("SANDBOX_MODE") {
            config.sandbox = sandbox == "true";
        }
        if let Some(secs) = env("FETCH_TIMEOUT_SECS") {
            config.fetch_timeout_secs = secs.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "FETCH_TIMEOUT_SECS",
                reason: format!("{secs:?}: {e}"),
            })?;
        }

        config.validate()?;
        debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Check required keys and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_secret.is_empty() {
            return Err(ConfigError::Missing("AGENT_SECRET"));
        }
        if self.control_plane_url.is_empty() {
            return Err(ConfigError::Missing("CHANGERAWR_URL"));
        }
        if self.internal_secret.is_empty() {
            return Err(ConfigError::Missing("INTERNAL_API_SECRET"));
        }
        if !(self.control_plane_url.starts_with("http://")
            || self.control_plane_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                key: "CHANGERAWR_URL",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.cert_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("CERT_DIR"));
        }
        if self.nginx_sites_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("NGINX_DIR"));
        }
        if self.reload_command.trim().is_empty() {
            return Err(ConfigError::Missing("NGINX_RELOAD_CMD"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "FETCH_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn mode(&self) -> AgentMode {
        AgentMode::from_sandbox(self.sandbox)
    }

    pub fn layout(&self) -> SiteLayout {
        SiteLayout::new(&self.cert_dir, &self.nginx_sites_dir)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
