//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the loaded configuration, the backend handle, and a keyed lock
//! map. Services take the backend as `&dyn Backend`, so tests swap in the
//! in-memory backend without touching handler code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::baas::Backend;
use crate::config::AppConfig;

// =============================================================================
// KEYED LOCKS
// =============================================================================

/// Per-key async mutexes.
///
/// Toggles are read-then-write against the backend; holding the lock for a
/// (user, target) pair keeps two concurrent toggles from both observing the
/// same "before" state within this process.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let entry = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // Drop entries nobody holds so the map stays bounded.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(key.to_owned()).or_default().clone()
        };
        entry.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn Backend>,
    pub locks: KeyedLocks,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, backend: Arc<dyn Backend>) -> Self {
        Self { config: Arc::new(config), backend, locks: KeyedLocks::new() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
