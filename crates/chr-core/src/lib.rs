//! chr-core — shared types for the chr-agent reconciler.
//!
//! The agent keeps no in-memory record of domains. Everything here is
//! either configuration (read once at startup) or data that travels with a
//! single lifecycle event. Per-domain state lives on disk, addressed
//! through [`SiteLayout`].

pub mod config;
pub mod layout;
pub mod types;

pub use config::{AgentConfig, ConfigError};
pub use layout::SiteLayout;
pub use types::*;
