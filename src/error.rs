// Error taxonomy for the workflow engine and its store boundary.

use thiserror::Error;

use crate::directory::Role;

/// Errors surfaced by record store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {id} not found")]
    NotFound { id: String },
    #[error("record {id} already exists")]
    AlreadyExists { id: String },
    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors returned by the engine's boundary operations.
///
/// Validation and transition errors are local business-rule failures and mean
/// no mutation occurred. Conflict and StoreUnavailable are retryable by the
/// caller; the document is unchanged in either case.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed on {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{role:?} may not {action} a {entity} in state {state}")]
    InvalidTransition {
        entity: &'static str,
        state: String,
        role: Role,
        action: String,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("concurrent write on {entity} {id} ({action}) after {attempts} attempt(s)")]
    Conflict {
        entity: &'static str,
        id: String,
        action: String,
        attempts: u32,
    },
    #[error("store unavailable during {action} on {entity} {id}: {reason}")]
    StoreUnavailable {
        entity: &'static str,
        id: String,
        action: String,
        reason: String,
    },
}

impl EngineError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        state: impl ToString,
        role: Role,
        action: impl std::fmt::Debug,
    ) -> Self {
        EngineError::InvalidTransition {
            entity,
            state: state.to_string(),
            role,
            action: format!("{action:?}"),
        }
    }

    /// Attach operation context to a store failure (which record, which action).
    pub fn from_store(err: StoreError, entity: &'static str, action: &str, id: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => EngineError::NotFound {
                entity,
                id: id.to_string(),
            },
            StoreError::VersionConflict { .. } | StoreError::AlreadyExists { .. } => {
                EngineError::Conflict {
                    entity,
                    id: id.to_string(),
                    action: action.to_string(),
                    attempts: 1,
                }
            }
            StoreError::Unavailable { reason } => EngineError::StoreUnavailable {
                entity,
                id: id.to_string(),
                action: action.to_string(),
                reason,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict { .. } | EngineError::StoreUnavailable { .. }
        )
    }
}
