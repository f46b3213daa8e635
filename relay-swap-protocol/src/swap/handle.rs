// Shared handle that serializes swap execution across tasks

use crate::data_structures::{Domain, Party, SwapRequest};
use crate::ledger::{InMemoryNonceLedger, NonceStore};
use crate::swap::coordinator::SwapCoordinator;
use crate::swap::types::{SwapError, SwapRecord};
use ethers::types::U256;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cloneable front for a [`SwapCoordinator`]. Swaps submitted through any
/// clone run one at a time; a swap never observes another one half done.
pub struct CoordinatorHandle<S: NonceStore = InMemoryNonceLedger> {
    inner: Arc<Mutex<SwapCoordinator<S>>>,
}

impl<S: NonceStore> Clone for CoordinatorHandle<S> {
    fn clone(&self) -> Self {
        CoordinatorHandle { inner: Arc::clone(&self.inner) }
    }
}

impl<S: NonceStore> CoordinatorHandle<S> {
    pub fn new(coordinator: SwapCoordinator<S>) -> Self {
        CoordinatorHandle { inner: Arc::new(Mutex::new(coordinator)) }
    }

    pub async fn perform_swap(&self, request: SwapRequest) -> Result<SwapRecord, SwapError> {
        let mut coordinator = self.inner.lock().await;
        coordinator.perform_swap(&request).await
    }

    pub async fn nonce_of(&self, party: Party) -> U256 {
        self.inner.lock().await.nonce_of(&party)
    }

    pub async fn domain(&self) -> Domain {
        self.inner.lock().await.domain().clone()
    }

    /// Direct access for inspection, e.g. subscribing or reading history.
    pub fn coordinator(&self) -> &Arc<Mutex<SwapCoordinator<S>>> {
        &self.inner
    }
}
