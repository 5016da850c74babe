// Concurrency guard: the read-modify-write contract every mutation uses.
//
// Strategy: optimistic version check. Read the document, apply the validated
// transition purely in memory, write back against the version that was read.
// A losing writer re-reads and re-validates against the new current state,
// up to a bounded number of attempts. Retrying an action the document
// already reflects returns it unchanged instead of advancing state again.

use crate::error::{EngineError, StoreError};
use crate::store::{Versioned, VersionedStore};
use crate::telemetry;

/// One logical action against a document, applied purely in memory.
pub trait Mutation<T>: Sync {
    /// Short action label for logs and error context.
    fn describe(&self) -> String;

    /// Compare the requested source-state to the actual current state: has
    /// this exact action already been applied?
    fn already_applied(&self, current: &T) -> bool;

    fn apply(&self, current: T) -> Result<T, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_write_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_write_attempts: 3,
        }
    }
}

/// Run one guarded read-modify-write. Either the full document commits
/// durably or nothing changes.
pub async fn run_guarded<T, S, M>(
    store: &S,
    entity: &'static str,
    id: &str,
    policy: RetryPolicy,
    mutation: &M,
) -> Result<T, EngineError>
where
    T: Versioned + Send,
    S: VersionedStore<T> + ?Sized,
    M: Mutation<T>,
{
    let action = mutation.describe();
    let correlation_id = telemetry::generate_correlation_id();

    for attempt in 1..=policy.max_write_attempts {
        let current = store
            .load(id)
            .await
            .map_err(|e| EngineError::from_store(e, entity, &action, id))?;

        if mutation.already_applied(&current) {
            tracing::info!(
                entity = entity,
                id = %id,
                action = %action,
                correlation.id = %correlation_id,
                "action already applied, returning document unchanged"
            );
            return Ok(current);
        }

        let read_version = current.version();
        let mut next = mutation.apply(current)?;
        next.set_version(read_version + 1);

        match store.write_back(&next, read_version).await {
            Ok(()) => {
                tracing::info!(
                    entity = entity,
                    id = %id,
                    action = %action,
                    version = read_version + 1,
                    attempt = attempt,
                    correlation.id = %correlation_id,
                    "transition committed"
                );
                return Ok(next);
            }
            Err(StoreError::VersionConflict { expected, found, .. }) => {
                tracing::warn!(
                    entity = entity,
                    id = %id,
                    action = %action,
                    expected = expected,
                    found = found,
                    attempt = attempt,
                    correlation.id = %correlation_id,
                    "lost write race, re-reading"
                );
            }
            Err(e) => return Err(EngineError::from_store(e, entity, &action, id)),
        }
    }

    Err(EngineError::Conflict {
        entity,
        id: id.to_string(),
        action,
        attempts: policy.max_write_attempts,
    })
}
