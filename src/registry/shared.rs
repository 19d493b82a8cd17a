//! Shared, serialized access to one registry across threads.

use super::core::Registry;
use super::results::ProviderError;
use parking_lot::Mutex;
use std::sync::Arc;

/// One registry behind one lock. Every `transact` runs alone and commits only if it
/// returns Ok, which is the single-writer model the ledger needs.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    pub fn transact<T, F>(&self, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce(&mut Registry) -> Result<T, ProviderError>,
    {
        let mut registry = self.inner.lock();
        registry.atomically(f)
    }

    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Registry) -> T,
    {
        let registry = self.inner.lock();
        f(&registry)
    }
}
