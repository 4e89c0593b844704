use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tokio::time::{Duration, Instant};

use super::KeyPair;

/// A key pair together with the moment it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedKeys {
    pub pair: KeyPair,
    pub refreshed_at: Instant,
}

impl CachedKeys {
    pub fn new(pair: KeyPair) -> Self {
        Self {
            pair,
            refreshed_at: Instant::now(),
        }
    }

    pub fn is_stale(&self, interval: Duration) -> bool {
        self.refreshed_at.elapsed() > interval
    }
}

/// Storage for the current key pair. Holds no refresh logic.
///
/// Implementations must replace the cached value as a unit; readers never see a pair from
/// one refresh with the timestamp of another.
pub trait KeyStore: Send + Sync {
    fn get(&self) -> Option<CachedKeys>;
    fn set(&self, keys: CachedKeys);
}

/// In-process [`KeyStore`] behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<Option<CachedKeys>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self) -> Option<CachedKeys> {
        self.keys.read().clone()
    }

    fn set(&self, keys: CachedKeys) {
        *self.keys.write() = Some(keys);
    }
}

static DEFAULT_STORE: LazyLock<Arc<MemoryKeyStore>> = LazyLock::new(Default::default);

/// The process-wide store shared by every [`Wbi`](super::Wbi) built with `Wbi::new`.
pub fn default_store() -> Arc<dyn KeyStore> {
    DEFAULT_STORE.clone()
}
