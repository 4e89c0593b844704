use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::KeyPair;
use super::store::{CachedKeys, KeyStore};
use crate::error::RefreshError;

/// Where fresh key pairs come from. One call is one upstream round trip.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_keys(&self) -> Result<KeyPair, RefreshError>;
}

type InFlight = Shared<BoxFuture<'static, Result<KeyPair, RefreshError>>>;

/// Serves fresh keys from the store and collapses concurrent refreshes into one.
///
/// While a refresh is running, every caller that finds the keys stale awaits the same
/// shared future and receives the same outcome, error included. The slot is cleared once
/// that future completes, so the next staleness cycle starts a new refresh.
pub(crate) struct RefreshCoordinator {
    source: Arc<dyn KeySource>,
    store: Arc<dyn KeyStore>,
    interval: Duration,
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        source: Arc<dyn KeySource>,
        store: Arc<dyn KeyStore>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            interval,
            in_flight: Mutex::new(None),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    fn fresh(&self) -> Option<KeyPair> {
        self.store
            .get()
            .filter(|cached| !cached.is_stale(self.interval))
            .map(|cached| cached.pair)
    }

    /// Current key pair, refreshing first when absent or older than the interval.
    pub(crate) async fn keys(&self) -> Result<KeyPair, RefreshError> {
        if let Some(pair) = self.fresh() {
            return Ok(pair);
        }

        let refresh = {
            let mut slot = self.in_flight.lock();
            if let Some(pending) = slot.as_ref() {
                debug!("joining in-flight wbi key refresh");
                pending.clone()
            } else {
                // A refresh may have finished between the check above and taking the lock.
                if let Some(pair) = self.fresh() {
                    return Ok(pair);
                }
                let pending = self.start_refresh();
                *slot = Some(pending.clone());
                pending
            }
        };

        let outcome = refresh.clone().await;

        {
            let mut slot = self.in_flight.lock();
            if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&refresh)) {
                *slot = None;
            }
        }

        outcome?;
        // Re-read so every caller sees what the store holds. A pair stored by this refresh is
        // used even when a zero interval already calls it stale.
        self.store
            .get()
            .map(|cached| cached.pair)
            .ok_or(RefreshError::Missing)
    }

    fn start_refresh(&self) -> InFlight {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        async move {
            info!("refreshing wbi keys");
            match source.fetch_keys().await {
                Ok(pair) => {
                    store.set(CachedKeys::new(pair.clone()));
                    info!("wbi keys refreshed");
                    Ok(pair)
                }
                Err(err) => {
                    warn!(error = %err, "wbi key refresh failed");
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}
