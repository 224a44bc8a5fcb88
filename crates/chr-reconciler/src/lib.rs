//! chr-reconciler — maps lifecycle events to ordered side effects.
//!
//! | Event | Actions | Guard |
//! |---|---|---|
//! | `cert.issued`, `cert.renewed` | fetch → write certs → write active site → reload | none |
//! | `domain.added` | write pending site → reload | skipped if a site file exists |
//! | `domain.removed`, `cert.revoked` | remove site → remove certs → reload | none |
//!
//! Steps run strictly in order and the first failure ends the event.
//! Nothing is rolled back: every write is atomic and every remove
//! tolerates absence, so redelivering the event converges.
//!
//! Events for the same domain are serialized by [`DomainLocks`]; events
//! for different domains run concurrently.

pub mod error;
pub mod locks;
pub mod reconciler;

pub use error::{ReconcileError, ReconcileResult, Stage, StageError};
pub use locks::{DomainGuard, DomainLocks};
pub use reconciler::{Outcome, Reconciler};
