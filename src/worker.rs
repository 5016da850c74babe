// Worker credential records: an independent approval chain with a
// Current/Pending dual snapshot. `current` is the last approved profile,
// `pending` the one awaiting a decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::directory::{Actor, Role};
use crate::error::EngineError;
use crate::store::Versioned;
use crate::transitions::{worker_transition, WorkerAction, WorkerDisposition, WorkerStatus};

pub const MIN_WORKER_AGE: u32 = 18;

/// One snapshot of a worker's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub name: String,
    pub age: u32,
    pub id_type: String,
    pub id_number: String,
    /// Free-form attributes (trade, contractor, photo reference, ...).
    pub extra: Map<String, Value>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub version: u64,
    pub status: WorkerStatus,
    /// Owner; only this requester may submit edits.
    pub requestor_id: String,
    /// Last approved snapshot; `None` until first approval.
    pub current: Option<WorkerProfile>,
    /// Snapshot awaiting approval; cleared on any terminal decision.
    pub pending: Option<WorkerProfile>,
}

/// Submitted attribute changes. Fields left `None` in an edit keep the
/// current value; a create must supply name and age.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerChanges {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub extra: Map<String, Value>,
}

impl Worker {
    /// Seed a brand-new record in `PendingReview`. Age and name are checked
    /// before this is called; nothing is persisted on validation failure.
    pub fn create(
        id: String,
        requester: &Actor,
        changes: &WorkerChanges,
    ) -> Result<Self, EngineError> {
        let profile = WorkerProfile {
            name: required_name(changes.name.as_deref())?,
            age: required_age(changes.age)?,
            id_type: changes.id_type.clone().unwrap_or_default(),
            id_number: changes.id_number.clone().unwrap_or_default(),
            extra: changes.extra.clone(),
            approved_by: None,
            approved_at: None,
        };
        Ok(Worker {
            id,
            version: 0,
            status: WorkerStatus::PendingReview,
            requestor_id: requester.id.clone(),
            current: None,
            pending: Some(profile),
        })
    }

    /// Dashboard/render view of the record: the snapshot most recently
    /// submitted, falling back to the approved one.
    pub fn details(&self) -> Option<&WorkerProfile> {
        self.pending.as_ref().or(self.current.as_ref())
    }

    /// Merge an edit over the approved snapshot; unspecified fields retain
    /// their current values.
    fn merged_profile(&self, changes: &WorkerChanges) -> Result<WorkerProfile, EngineError> {
        let base = self.current.as_ref().ok_or_else(|| {
            EngineError::validation("current", "worker has no approved snapshot to edit")
        })?;
        let mut extra = base.extra.clone();
        for (key, value) in &changes.extra {
            extra.insert(key.clone(), value.clone());
        }
        let profile = WorkerProfile {
            name: changes.name.clone().unwrap_or_else(|| base.name.clone()),
            age: changes.age.unwrap_or(base.age),
            id_type: changes
                .id_type
                .clone()
                .unwrap_or_else(|| base.id_type.clone()),
            id_number: changes
                .id_number
                .clone()
                .unwrap_or_else(|| base.id_number.clone()),
            extra,
            approved_by: None,
            approved_at: None,
        };
        required_name(Some(&profile.name))?;
        required_age(Some(profile.age))?;
        Ok(profile)
    }

    /// True when the record already reflects this action, so a retried
    /// request returns it unchanged.
    pub fn action_already_applied(&self, actor: &Actor, action: WorkerAction) -> bool {
        match (action, actor.role) {
            (WorkerAction::Approve, Role::Reviewer) => matches!(
                self.status,
                WorkerStatus::PendingApproval | WorkerStatus::EditPendingApproval
            ),
            (WorkerAction::Approve, Role::Approver) => {
                self.status == WorkerStatus::Approved
                    && self
                        .current
                        .as_ref()
                        .is_some_and(|c| c.approved_by.as_deref() == Some(actor.name.as_str()))
            }
            (WorkerAction::Reject, _) => self.status == WorkerStatus::Rejected,
            (WorkerAction::EditRequest, Role::Requester) => {
                self.status == WorkerStatus::EditPendingReview && self.pending.is_some()
            }
            _ => false,
        }
    }

    /// Apply an approval-chain action purely in memory. `Delete` is decided
    /// here but executed by the caller against the store.
    pub fn apply_action(
        mut self,
        actor: &Actor,
        action: WorkerAction,
        changes: &WorkerChanges,
        now: DateTime<Utc>,
    ) -> Result<WorkerOutcome, EngineError> {
        let disposition = worker_transition(self.status, actor.role, action).ok_or_else(|| {
            EngineError::invalid_transition("worker", self.status, actor.role, action)
        })?;

        let next = match disposition {
            WorkerDisposition::Remove => return Ok(WorkerOutcome::Remove),
            WorkerDisposition::Advance(next) => next,
        };

        match action {
            WorkerAction::EditRequest => {
                if actor.id != self.requestor_id {
                    return Err(EngineError::invalid_transition(
                        "worker",
                        self.status,
                        actor.role,
                        action,
                    ));
                }
                self.pending = Some(self.merged_profile(changes)?);
            }
            WorkerAction::Approve if next == WorkerStatus::Approved => {
                // The pending snapshot becomes the approved one, stamped.
                let mut profile = self.pending.take().ok_or_else(|| {
                    EngineError::validation("pending", "no pending snapshot to approve")
                })?;
                profile.approved_by = Some(actor.name.clone());
                profile.approved_at = Some(now);
                self.current = Some(profile);
            }
            WorkerAction::Approve => {
                // Reviewer stage: the snapshot just moves along the chain.
            }
            WorkerAction::Reject => {
                // First-time rejection leaves `current` empty; edit rejection
                // keeps the prior approved snapshot.
                self.pending = None;
            }
            WorkerAction::Create | WorkerAction::Delete => {
                unreachable!("handled before the advance path")
            }
        }

        self.status = next;
        Ok(WorkerOutcome::Updated(self))
    }
}

/// Result of applying a worker action.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Updated(Worker),
    Remove,
}

impl Versioned for Worker {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

fn required_name(name: Option<&str>) -> Result<String, EngineError> {
    match name {
        Some(n) if !n.trim().is_empty() => Ok(n.to_string()),
        _ => Err(EngineError::validation("name", "worker name is required")),
    }
}

fn required_age(age: Option<u32>) -> Result<u32, EngineError> {
    match age {
        Some(a) if a >= MIN_WORKER_AGE => Ok(a),
        Some(a) => Err(EngineError::validation(
            "age",
            format!("worker must be {MIN_WORKER_AGE}+, got {a}"),
        )),
        None => Err(EngineError::validation("age", "worker age is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester() -> Actor {
        Actor::new("req@plant", "S. Bose", Role::Requester)
    }

    fn reviewer() -> Actor {
        Actor::new("rev@plant", "R. Iyer", Role::Reviewer)
    }

    fn approver() -> Actor {
        Actor::new("app@plant", "A. Sharma", Role::Approver)
    }

    fn submission() -> WorkerChanges {
        WorkerChanges {
            name: Some("M. Kumar".to_string()),
            age: Some(34),
            id_type: Some("Aadhaar".to_string()),
            id_number: Some("xxxx-1234".to_string()),
            ..Default::default()
        }
    }

    fn approved_worker(now: DateTime<Utc>) -> Worker {
        let worker = Worker::create("W-1001".to_string(), &requester(), &submission()).unwrap();
        let WorkerOutcome::Updated(worker) = worker
            .apply_action(&reviewer(), WorkerAction::Approve, &Default::default(), now)
            .unwrap()
        else {
            panic!("expected update")
        };
        let WorkerOutcome::Updated(worker) = worker
            .apply_action(&approver(), WorkerAction::Approve, &Default::default(), now)
            .unwrap()
        else {
            panic!("expected update")
        };
        worker
    }

    #[test]
    fn under_18_is_rejected_before_any_record_exists() {
        let mut changes = submission();
        changes.age = Some(17);
        let err = Worker::create("W-1001".to_string(), &requester(), &changes).unwrap_err();
        assert!(matches!(err, EngineError::Validation { field: "age", .. }));
    }

    #[test]
    fn approval_merges_pending_into_current_with_stamp() {
        let now = Utc::now();
        let worker = approved_worker(now);

        assert_eq!(worker.status, WorkerStatus::Approved);
        assert!(worker.pending.is_none());
        let current = worker.current.unwrap();
        assert_eq!(current.name, "M. Kumar");
        assert_eq!(current.approved_by.as_deref(), Some("A. Sharma"));
        assert_eq!(current.approved_at, Some(now));
    }

    #[test]
    fn first_time_rejection_leaves_current_empty() {
        let now = Utc::now();
        let worker = Worker::create("W-1001".to_string(), &requester(), &submission()).unwrap();
        let WorkerOutcome::Updated(worker) = worker
            .apply_action(&reviewer(), WorkerAction::Reject, &Default::default(), now)
            .unwrap()
        else {
            panic!("expected update")
        };
        assert_eq!(worker.status, WorkerStatus::Rejected);
        assert!(worker.current.is_none());
        assert!(worker.pending.is_none());
    }

    #[test]
    fn edit_merge_keeps_unspecified_fields() {
        let now = Utc::now();
        let worker = approved_worker(now);

        let WorkerOutcome::Updated(worker) = worker
            .apply_action(
                &requester(),
                WorkerAction::EditRequest,
                &WorkerChanges {
                    id_number: Some("yyyy-9999".to_string()),
                    ..Default::default()
                },
                now,
            )
            .unwrap()
        else {
            panic!("expected update")
        };

        assert_eq!(worker.status, WorkerStatus::EditPendingReview);
        let pending = worker.pending.as_ref().unwrap();
        assert_eq!(pending.name, "M. Kumar");
        assert_eq!(pending.age, 34);
        assert_eq!(pending.id_number, "yyyy-9999");
        // The approved snapshot is untouched until the approver signs off.
        assert_eq!(worker.current.as_ref().unwrap().id_number, "xxxx-1234");
    }

    #[test]
    fn edit_rejection_keeps_prior_approved_snapshot() {
        let now = Utc::now();
        let worker = approved_worker(now);
        let WorkerOutcome::Updated(worker) = worker
            .apply_action(
                &requester(),
                WorkerAction::EditRequest,
                &WorkerChanges {
                    age: Some(35),
                    ..Default::default()
                },
                now,
            )
            .unwrap()
        else {
            panic!("expected update")
        };
        let WorkerOutcome::Updated(worker) = worker
            .apply_action(&reviewer(), WorkerAction::Reject, &Default::default(), now)
            .unwrap()
        else {
            panic!("expected update")
        };

        assert_eq!(worker.status, WorkerStatus::Rejected);
        assert!(worker.pending.is_none());
        assert_eq!(worker.current.as_ref().unwrap().age, 34);
    }

    #[test]
    fn only_the_owner_may_submit_edits() {
        let now = Utc::now();
        let worker = approved_worker(now);
        let stranger = Actor::new("other@plant", "T. Das", Role::Requester);
        let err = worker
            .apply_action(
                &stranger,
                WorkerAction::EditRequest,
                &WorkerChanges {
                    age: Some(40),
                    ..Default::default()
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn edit_cannot_drop_age_below_minimum() {
        let now = Utc::now();
        let worker = approved_worker(now);
        let err = worker
            .apply_action(
                &requester(),
                WorkerAction::EditRequest,
                &WorkerChanges {
                    age: Some(16),
                    ..Default::default()
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { field: "age", .. }));
    }

    #[test]
    fn delete_is_an_approver_decision() {
        let now = Utc::now();
        let worker = approved_worker(now);
        assert_eq!(
            worker
                .clone()
                .apply_action(&approver(), WorkerAction::Delete, &Default::default(), now)
                .unwrap(),
            WorkerOutcome::Remove
        );
        let err = worker
            .apply_action(&requester(), WorkerAction::Delete, &Default::default(), now)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }
}
