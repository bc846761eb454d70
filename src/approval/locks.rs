//! Per-contract locks
//!
//! Every contract is an independently lockable unit; different contracts never contend.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct ContractLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ContractLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `contract_id`. Not reentrant.
    pub async fn lock(&self, contract_id: Uuid) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let mutex = self
            .inner
            .entry(contract_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
