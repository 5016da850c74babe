// Record store boundary. The engine mutates exclusively through versioned
// `put` calls; `list` exists for read-side consumers only.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::permit::Permit;
use crate::worker::Worker;

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use memory::MemoryStore;

/// Documents carrying an optimistic-concurrency version token.
pub trait Versioned {
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

/// Durable permit storage.
#[async_trait]
pub trait PermitStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Permit, StoreError>;

    /// Insert a new permit; fails if the id is taken.
    async fn insert(&self, permit: &Permit) -> Result<(), StoreError>;

    /// Write back a mutated permit. `expected_version` is the version the
    /// caller read; a mismatch means a concurrent writer won and the call
    /// fails with `VersionConflict`, leaving the stored document unchanged.
    async fn put(&self, permit: &Permit, expected_version: u64) -> Result<(), StoreError>;

    /// Read-side listing; never used by mutations.
    async fn list(&self) -> Result<Vec<Permit>, StoreError>;

    /// Allocate the next permit number from a store-backed sequence.
    async fn next_permit_number(&self) -> Result<u64, StoreError>;
}

/// Durable worker storage.
#[async_trait]
pub trait WorkerStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Worker, StoreError>;
    async fn insert(&self, worker: &Worker) -> Result<(), StoreError>;
    async fn put(&self, worker: &Worker, expected_version: u64) -> Result<(), StoreError>;

    /// Hard delete; destructive and irreversible.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Worker>, StoreError>;
    async fn next_worker_number(&self) -> Result<u64, StoreError>;
}

/// Uniform load/store view over either entity store, so the concurrency
/// guard can drive both with one implementation.
#[async_trait]
pub trait VersionedStore<T>: Send + Sync {
    async fn load(&self, id: &str) -> Result<T, StoreError>;
    async fn write_back(&self, doc: &T, expected_version: u64) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: PermitStore + ?Sized> VersionedStore<Permit> for S {
    async fn load(&self, id: &str) -> Result<Permit, StoreError> {
        self.get(id).await
    }

    async fn write_back(&self, doc: &Permit, expected_version: u64) -> Result<(), StoreError> {
        self.put(doc, expected_version).await
    }
}

#[async_trait]
impl<S: WorkerStore + ?Sized> VersionedStore<Worker> for S {
    async fn load(&self, id: &str) -> Result<Worker, StoreError> {
        self.get(id).await
    }

    async fn write_back(&self, doc: &Worker, expected_version: u64) -> Result<(), StoreError> {
        self.put(doc, expected_version).await
    }
}
