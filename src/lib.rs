// Permitflow - work permit and worker credential approval workflows
// This exposes the engine, the store boundary and the read-side views

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod permit;
pub mod render;
pub mod renewal;
pub mod store;
pub mod telemetry;
pub mod transitions;
pub mod views;
pub mod worker;

// Re-export key types for easy access
pub use config::{config, init_config, PermitflowConfig};
pub use directory::{Actor, Credential, Directory, DirectoryError, Role, StaticDirectory};
pub use engine::{Mutation, RetryPolicy, WorkerActionResult, WorkflowEngine};
pub use error::{EngineError, StoreError};
pub use permit::{
    ClosureRecord, GeoPoint, Permit, PermitActionFields, PermitDraft, RejectionRecord,
    StageDecision,
};
pub use render::{resolve_permit, PermitRenderer, ResolvedCrewMember, ResolvedPermit};
pub use renewal::{GasReadings, RenewalEntry, RenewalFields};
pub use store::{MemoryStore, PermitStore, Versioned, VersionedStore, WorkerStore};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use transitions::{
    permit_transition, renewal_transition, worker_transition, PermitAction, PermitStatus,
    RenewalAction, RenewalStatus, WorkerAction, WorkerDisposition, WorkerStatus,
};
pub use views::{
    dashboard, map_markers, stats, worker_directory, DashboardRow, MapMarker, PermitStats,
    WorkerListMode, WorkerRow,
};
pub use worker::{Worker, WorkerChanges, WorkerOutcome, WorkerProfile, MIN_WORKER_AGE};

#[cfg(feature = "database")]
pub use store::sqlite::SqliteStore;
