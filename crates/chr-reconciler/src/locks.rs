//! Per-domain mutual exclusion.
//!
//! The control plane may deliver overlapping events for one domain (a
//! renewal racing a revocation). Each domain gets its own async mutex,
//! held for an event's entire action sequence; entries are dropped once
//! no holder or waiter remains, so the map only ever contains domains
//! with work in flight. This is not a cache of domain state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;
use tracing::trace;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct DomainLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl DomainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other event for `domain` is in progress.
    pub async fn acquire(&self, domain: &str) -> DomainGuard {
        let lock = self.map().entry(domain.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        trace!(domain, "domain lock acquired");
        DomainGuard {
            locks: self.clone(),
            domain: domain.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of domains with a holder or waiter.
    pub fn active(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        // The map is only mutated by single insert/remove calls.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held for the duration of one event. Releases on drop.
#[derive(Debug)]
pub struct DomainGuard {
    locks: DomainLocks,
    domain: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DomainGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map();
        if let Some(entry) = map.get(&self.domain)
            && Arc::strong_count(entry) == 1
        {
            map.remove(&self.domain);
        }
    }
}
