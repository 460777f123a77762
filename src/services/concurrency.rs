use crate::constants::concurrency::MAX_IN_FLIGHT;
use crate::errors::ApiError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct ConcurrencyGate {
    key: String,
    limit: usize,
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
}

// Dropping the slot returns the permit, on every exit path.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGate {
    pub fn new(key: impl Into<String>, limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_IN_FLIGHT);
        Self {
            key: key.into(),
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    // tokio's semaphore is fair: waiters are served in arrival order.
    pub async fn acquire(&self) -> Result<Slot, ApiError> {
        if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            return Ok(Slot { _permit: permit });
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _waiting = WaitingGuard(&self.waiting);
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::unknown())?;
        Ok(Slot { _permit: permit })
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencyLedger {
    limit: usize,
    gates: Arc<DashMap<String, Arc<ConcurrencyGate>>>,
}

impl ConcurrencyLedger {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            gates: Arc::new(DashMap::new()),
        }
    }

    pub fn gate_for(&self, instance_key: &str) -> Arc<ConcurrencyGate> {
        self.gates
            .entry(instance_key.to_string())
            .or_insert_with(|| Arc::new(ConcurrencyGate::new(instance_key, self.limit)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
