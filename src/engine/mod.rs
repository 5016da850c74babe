// Engine boundary: the four operations external surfaces call into. Every
// mutation funnels through the transition validator and the concurrency
// guard; callers get the updated document or a typed error.

pub mod guard;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::directory::{Actor, Role};
use crate::error::EngineError;
use crate::permit::{validate_draft, Permit, PermitActionFields, PermitDraft};
use crate::renewal::{apply_renewal_action, renewal_already_applied, RenewalFields};
use crate::store::{PermitStore, WorkerStore};
use crate::transitions::{PermitAction, RenewalAction, WorkerAction};
use crate::worker::{Worker, WorkerChanges, WorkerOutcome};

pub use guard::{Mutation, RetryPolicy};

/// Result of `apply_worker_action`; delete removes the record outright.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerActionResult {
    Updated(Worker),
    Deleted { id: String },
}

pub struct WorkflowEngine {
    permits: Arc<dyn PermitStore>,
    workers: Arc<dyn WorkerStore>,
    policy: RetryPolicy,
}

impl WorkflowEngine {
    pub fn new(permits: Arc<dyn PermitStore>, workers: Arc<dyn WorkerStore>) -> Self {
        Self {
            permits,
            workers,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn permit_store(&self) -> &Arc<dyn PermitStore> {
        &self.permits
    }

    pub fn worker_store(&self) -> &Arc<dyn WorkerStore> {
        &self.workers
    }

    /// Create a permit in `PendingReview`. Only requesters create permits;
    /// the id comes from the store-backed sequence.
    pub async fn create_permit(
        &self,
        actor: &Actor,
        draft: PermitDraft,
    ) -> Result<Permit, EngineError> {
        if actor.role != Role::Requester {
            return Err(EngineError::InvalidTransition {
                entity: "permit",
                state: "new".to_string(),
                role: actor.role,
                action: "create".to_string(),
            });
        }
        validate_draft(&draft)?;

        let number = self
            .permits
            .next_permit_number()
            .await
            .map_err(|e| EngineError::from_store(e, "permit", "create", "new"))?;
        let id = format!("WP-{number}");
        let permit = Permit::from_draft(id.clone(), actor, draft, Utc::now());

        self.permits
            .insert(&permit)
            .await
            .map_err(|e| EngineError::from_store(e, "permit", "create", &id))?;

        info!(permit = %id, requester = %actor.id, "permit created");
        Ok(permit)
    }

    /// Apply a top-level lifecycle action to a permit.
    pub async fn apply_permit_action(
        &self,
        id: &str,
        actor: &Actor,
        action: PermitAction,
        fields: PermitActionFields,
    ) -> Result<Permit, EngineError> {
        let mutation = PermitActionMutation {
            actor,
            action,
            fields,
            now: Utc::now(),
        };
        guard::run_guarded(self.permits.as_ref(), "permit", id, self.policy, &mutation).await
    }

    /// Apply a renewal action to a permit's renewal log. The log is only
    /// ever edited through a full permit read-modify-write.
    pub async fn apply_renewal_action(
        &self,
        id: &str,
        actor: &Actor,
        action: RenewalAction,
        fields: RenewalFields,
    ) -> Result<Permit, EngineError> {
        let mutation = RenewalActionMutation {
            actor,
            action,
            fields,
            now: Utc::now(),
        };
        guard::run_guarded(self.permits.as_ref(), "permit", id, self.policy, &mutation).await
    }

    /// Apply a worker credential action. `Create` allocates a new record
    /// (pass `id: None`); everything else targets an existing one.
    pub async fn apply_worker_action(
        &self,
        id: Option<&str>,
        actor: &Actor,
        action: WorkerAction,
        changes: WorkerChanges,
    ) -> Result<WorkerActionResult, EngineError> {
        match action {
            WorkerAction::Create => {
                if id.is_some() {
                    return Err(EngineError::validation(
                        "id",
                        "worker ids are assigned by the engine",
                    ));
                }
                if actor.role != Role::Requester {
                    return Err(EngineError::InvalidTransition {
                        entity: "worker",
                        state: "new".to_string(),
                        role: actor.role,
                        action: "create".to_string(),
                    });
                }
                // Validates (name, age) before any store call.
                let worker = Worker::create(String::new(), actor, &changes)?;
                let number = self
                    .workers
                    .next_worker_number()
                    .await
                    .map_err(|e| EngineError::from_store(e, "worker", "create", "new"))?;
                let worker = Worker {
                    id: format!("W-{number}"),
                    ..worker
                };
                self.workers
                    .insert(&worker)
                    .await
                    .map_err(|e| EngineError::from_store(e, "worker", "create", &worker.id))?;
                info!(worker = %worker.id, requestor = %actor.id, "worker created");
                Ok(WorkerActionResult::Updated(worker))
            }
            WorkerAction::Delete => {
                let id = require_id(id)?;
                let worker = self
                    .workers
                    .get(id)
                    .await
                    .map_err(|e| EngineError::from_store(e, "worker", "delete", id))?;
                // Role/state gate runs before the destructive call.
                match worker.apply_action(actor, action, &changes, Utc::now())? {
                    WorkerOutcome::Remove => {}
                    WorkerOutcome::Updated(_) => unreachable!("delete never advances state"),
                }
                self.workers
                    .delete(id)
                    .await
                    .map_err(|e| EngineError::from_store(e, "worker", "delete", id))?;
                info!(worker = %id, by = %actor.id, "worker deleted");
                Ok(WorkerActionResult::Deleted { id: id.to_string() })
            }
            WorkerAction::EditRequest | WorkerAction::Approve | WorkerAction::Reject => {
                let id = require_id(id)?;
                let mutation = WorkerActionMutation {
                    actor,
                    action,
                    changes,
                    now: Utc::now(),
                };
                let worker =
                    guard::run_guarded(self.workers.as_ref(), "worker", id, self.policy, &mutation)
                        .await?;
                Ok(WorkerActionResult::Updated(worker))
            }
        }
    }
}

fn require_id(id: Option<&str>) -> Result<&str, EngineError> {
    id.ok_or_else(|| EngineError::validation("id", "a target worker id is required"))
}

struct PermitActionMutation<'a> {
    actor: &'a Actor,
    action: PermitAction,
    fields: PermitActionFields,
    now: DateTime<Utc>,
}

impl Mutation<Permit> for PermitActionMutation<'_> {
    fn describe(&self) -> String {
        format!("{:?}", self.action)
    }

    fn already_applied(&self, current: &Permit) -> bool {
        current.action_already_applied(self.actor, self.action, &self.fields)
    }

    fn apply(&self, current: Permit) -> Result<Permit, EngineError> {
        current.apply_action(self.actor, self.action, &self.fields, self.now)
    }
}

struct RenewalActionMutation<'a> {
    actor: &'a Actor,
    action: RenewalAction,
    fields: RenewalFields,
    now: DateTime<Utc>,
}

impl Mutation<Permit> for RenewalActionMutation<'_> {
    fn describe(&self) -> String {
        format!("renewal_{:?}", self.action)
    }

    fn already_applied(&self, current: &Permit) -> bool {
        renewal_already_applied(current, self.actor, self.action, &self.fields)
    }

    fn apply(&self, current: Permit) -> Result<Permit, EngineError> {
        apply_renewal_action(current, self.actor, self.action, &self.fields, self.now)
    }
}

struct WorkerActionMutation<'a> {
    actor: &'a Actor,
    action: WorkerAction,
    changes: WorkerChanges,
    now: DateTime<Utc>,
}

impl Mutation<Worker> for WorkerActionMutation<'_> {
    fn describe(&self) -> String {
        format!("{:?}", self.action)
    }

    fn already_applied(&self, current: &Worker) -> bool {
        current.action_already_applied(self.actor, self.action)
    }

    fn apply(&self, current: Worker) -> Result<Worker, EngineError> {
        match current.apply_action(self.actor, self.action, &self.changes, self.now)? {
            WorkerOutcome::Updated(worker) => Ok(worker),
            WorkerOutcome::Remove => unreachable!("delete is not a guarded mutation"),
        }
    }
}
