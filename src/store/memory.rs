// In-memory reference store for embedding and tests. Mirrors the semantics
// the SQLite store provides: versioned writes and monotonic sequences.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;
use crate::permit::Permit;
use crate::store::{PermitStore, WorkerStore};
use crate::worker::Worker;

/// First number handed out for both permit and worker ids (WP-1001, W-1001).
pub const SEQUENCE_FLOOR: u64 = 1001;

#[derive(Default)]
pub struct MemoryStore {
    permits: RwLock<HashMap<String, Permit>>,
    workers: RwLock<HashMap<String, Worker>>,
    sequences: Mutex<HashMap<&'static str, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn next_sequence(&self, name: &'static str) -> u64 {
        let mut sequences = self.sequences.lock().await;
        let next = sequences
            .get(name)
            .map(|last| last + 1)
            .unwrap_or(SEQUENCE_FLOOR);
        sequences.insert(name, next);
        next
    }
}

#[async_trait]
impl PermitStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Permit, StoreError> {
        self.permits
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn insert(&self, permit: &Permit) -> Result<(), StoreError> {
        let mut permits = self.permits.write().await;
        if permits.contains_key(&permit.id) {
            return Err(StoreError::AlreadyExists {
                id: permit.id.clone(),
            });
        }
        permits.insert(permit.id.clone(), permit.clone());
        Ok(())
    }

    async fn put(&self, permit: &Permit, expected_version: u64) -> Result<(), StoreError> {
        let mut permits = self.permits.write().await;
        let stored = permits.get(&permit.id).ok_or_else(|| StoreError::NotFound {
            id: permit.id.clone(),
        })?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: permit.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        permits.insert(permit.id.clone(), permit.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Permit>, StoreError> {
        Ok(self.permits.read().await.values().cloned().collect())
    }

    async fn next_permit_number(&self) -> Result<u64, StoreError> {
        Ok(self.next_sequence("permits").await)
    }
}

#[async_trait]
impl WorkerStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Worker, StoreError> {
        self.workers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn insert(&self, worker: &Worker) -> Result<(), StoreError> {
        let mut workers = self.workers.write().await;
        if workers.contains_key(&worker.id) {
            return Err(StoreError::AlreadyExists {
                id: worker.id.clone(),
            });
        }
        workers.insert(worker.id.clone(), worker.clone());
        Ok(())
    }

    async fn put(&self, worker: &Worker, expected_version: u64) -> Result<(), StoreError> {
        let mut workers = self.workers.write().await;
        let stored = workers.get(&worker.id).ok_or_else(|| StoreError::NotFound {
            id: worker.id.clone(),
        })?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: worker.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        workers.insert(worker.id.clone(), worker.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut workers = self.workers.write().await;
        workers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn list(&self) -> Result<Vec<Worker>, StoreError> {
        Ok(self.workers.read().await.values().cloned().collect())
    }

    async fn next_worker_number(&self) -> Result<u64, StoreError> {
        Ok(self.next_sequence("workers").await)
    }
}
