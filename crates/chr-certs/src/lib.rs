//! chr-certs — certificate material for proxied domains.
//!
//! # Architecture
//!
//! ```text
//! CertSource (capability)
//!   └── CertFetcher: GET <control plane>/api/internal/cert/<domain>
//! validate_bundle() → rejects empty or marker-less PEM
//! CertStore
//!   ├── write: temp files (fsync) → rename, private key 0600
//!   └── remove: recursive, tolerant of absence
//! ```
//!
//! Both store operations are no-ops that only log in sandbox mode.

pub mod bundle;
pub mod error;
pub mod fetcher;
pub mod store;

pub use bundle::validate_bundle;
pub use error::{CertError, CertResult};
pub use fetcher::{CertFetcher, CertSource, FetchFuture};
pub use store::CertStore;
