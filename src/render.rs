// Document renderer boundary. The engine hands renderers a fully resolved,
// read-only permit snapshot; layout is entirely the renderer's concern.

use serde::Serialize;

use crate::error::{EngineError, StoreError};
use crate::permit::Permit;
use crate::store::{PermitStore, WorkerStore};
use crate::transitions::WorkerStatus;
use crate::worker::WorkerProfile;

/// A crew reference resolved against the worker store. Workers deleted
/// since the permit referenced them surface as dangling.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCrewMember {
    pub worker_id: String,
    pub status: Option<WorkerStatus>,
    pub profile: Option<WorkerProfile>,
}

impl ResolvedCrewMember {
    pub fn is_dangling(&self) -> bool {
        self.status.is_none()
    }
}

/// Input document for renderers: the permit with its crew references
/// resolved to profiles.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPermit {
    pub permit: Permit,
    pub crew: Vec<ResolvedCrewMember>,
}

/// Render target boundary (PDF, HTML, ...). Implementations own formatting
/// and layout entirely.
pub trait PermitRenderer {
    type Output;

    fn render(&self, document: &ResolvedPermit) -> anyhow::Result<Self::Output>;
}

/// Resolve a permit and its crew into a renderer-ready snapshot.
pub async fn resolve_permit(
    permits: &dyn PermitStore,
    workers: &dyn WorkerStore,
    id: &str,
) -> Result<ResolvedPermit, EngineError> {
    let permit = permits
        .get(id)
        .await
        .map_err(|e| EngineError::from_store(e, "permit", "resolve", id))?;

    let mut crew = Vec::with_capacity(permit.crew.len());
    for worker_id in &permit.crew {
        match workers.get(worker_id).await {
            Ok(worker) => crew.push(ResolvedCrewMember {
                worker_id: worker_id.clone(),
                status: Some(worker.status),
                profile: worker.details().cloned(),
            }),
            Err(StoreError::NotFound { .. }) => crew.push(ResolvedCrewMember {
                worker_id: worker_id.clone(),
                status: None,
                profile: None,
            }),
            Err(e) => return Err(EngineError::from_store(e, "worker", "resolve", worker_id)),
        }
    }

    Ok(ResolvedPermit { permit, crew })
}
