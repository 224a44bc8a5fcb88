//! chr-nginx — everything the agent knows about the reverse proxy.
//!
//! - [`template`]: pure rendering of a site file in pending or active mode.
//! - [`sites`]: per-domain site files under the sites directory.
//! - [`reload`]: the [`ProxyReloader`] capability and its shell implementation.
//!
//! Only the shape of the generated configuration is fixed here; the
//! security policy in the active template is deliberately not configurable.

pub mod error;
pub mod reload;
pub mod sites;
pub mod template;

pub use error::{NginxError, NginxResult};
pub use reload::{ProxyReloader, ReloadFuture, ShellReloader};
pub use sites::SiteStore;
pub use template::{CertPaths, SiteParams, cert_paths, render, render_at};
