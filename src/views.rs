// Read-side projections for dashboards, stats and maps. Query-only: these
// functions never write, and consumers get detached snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::directory::{Actor, Role};
use crate::error::EngineError;
use crate::store::{PermitStore, WorkerStore};
use crate::transitions::{PermitStatus, WorkerStatus};
use crate::worker::WorkerProfile;

/// One permit line on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub id: String,
    pub status: PermitStatus,
    pub work_type: String,
    pub requester_id: String,
    pub requester_name: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub location_unit: String,
}

/// Requesters see their own permits; reviewers and approvers see all.
/// Sorted newest id first.
pub async fn dashboard(
    store: &dyn PermitStore,
    viewer: &Actor,
) -> Result<Vec<DashboardRow>, EngineError> {
    let permits = store
        .list()
        .await
        .map_err(|e| EngineError::from_store(e, "permit", "dashboard", "*"))?;

    let mut rows: Vec<DashboardRow> = permits
        .into_iter()
        .filter(|p| viewer.role != Role::Requester || p.requester_id == viewer.id)
        .map(|p| DashboardRow {
            id: p.id,
            status: p.status,
            work_type: p.work_type,
            requester_id: p.requester_id,
            requester_name: p.requester_name,
            valid_from: p.valid_from,
            valid_to: p.valid_to,
            location_unit: p.location_unit,
        })
        .collect();
    rows.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(rows)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PermitStats {
    pub by_status: BTreeMap<String, u64>,
    pub by_work_type: BTreeMap<String, u64>,
}

pub async fn stats(store: &dyn PermitStore) -> Result<PermitStats, EngineError> {
    let permits = store
        .list()
        .await
        .map_err(|e| EngineError::from_store(e, "permit", "stats", "*"))?;

    let mut stats = PermitStats::default();
    for permit in permits {
        *stats.by_status.entry(permit.status.to_string()).or_insert(0) += 1;
        *stats.by_work_type.entry(permit.work_type).or_insert(0) += 1;
    }
    Ok(stats)
}

/// Map pin for an open permit with coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct MapMarker {
    pub id: String,
    pub work_type: String,
    pub lat: f64,
    pub lng: f64,
    pub location_detail: String,
    pub requester_name: String,
    pub valid_to: Option<DateTime<Utc>>,
}

pub async fn map_markers(store: &dyn PermitStore) -> Result<Vec<MapMarker>, EngineError> {
    let permits = store
        .list()
        .await
        .map_err(|e| EngineError::from_store(e, "permit", "map_markers", "*"))?;

    Ok(permits
        .into_iter()
        .filter(|p| p.status != PermitStatus::Closed)
        .filter_map(|p| {
            let location = p.location?;
            Some(MapMarker {
                id: p.id,
                work_type: p.work_type,
                lat: location.lat,
                lng: location.lng,
                location_detail: p.location_detail,
                requester_name: p.requester_name,
                valid_to: p.valid_to,
            })
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerListMode {
    /// The shared pool of approved workers, for permit crew selection.
    PermitDropdown,
    /// Role-filtered dashboard listing.
    Dashboard,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerRow {
    pub id: String,
    pub status: WorkerStatus,
    pub requestor_id: String,
    pub is_edit: bool,
    /// Pending-else-current snapshot, merged for display.
    pub details: Option<WorkerProfile>,
}

pub async fn worker_directory(
    store: &dyn WorkerStore,
    viewer: &Actor,
    mode: WorkerListMode,
) -> Result<Vec<WorkerRow>, EngineError> {
    let workers = store
        .list()
        .await
        .map_err(|e| EngineError::from_store(e, "worker", "worker_directory", "*"))?;

    let mut rows: Vec<WorkerRow> = workers
        .into_iter()
        .filter(|w| match mode {
            WorkerListMode::PermitDropdown => w.status == WorkerStatus::Approved,
            WorkerListMode::Dashboard => {
                // Requesters see their own submissions plus the approved
                // shared pool; senior roles see everyone.
                viewer.role != Role::Requester
                    || w.requestor_id == viewer.id
                    || w.status == WorkerStatus::Approved
            }
        })
        .map(|w| WorkerRow {
            is_edit: w.status.is_edit(),
            details: w.details().cloned(),
            id: w.id,
            status: w.status,
            requestor_id: w.requestor_id,
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(rows)
}
