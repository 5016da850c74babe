// Permit document model and top-level lifecycle application.
//
// State-machine fields are strongly typed; genuinely free-form form content
// (hazards, PPE, checklists) rides in an opaque payload map the engine never
// branches on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::directory::{Actor, Role};
use crate::error::EngineError;
use crate::renewal::RenewalEntry;
use crate::store::Versioned;
use crate::transitions::{permit_transition, PermitAction, PermitStatus, RenewalStatus};

/// Audit triple written by a single transition: who acted, when, and what
/// they said. Additive; a later unrelated transition never overwrites one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDecision {
    pub actor: String,
    pub at: DateTime<Utc>,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub by: String,
    pub role: Role,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Closure sub-record, populated once closure begins and retained as history
/// even when the closure attempt is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub site_restored: bool,
    pub requestor: Option<StageDecision>,
    pub reviewer: Option<StageDecision>,
    pub approver: Option<StageDecision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// The primary approvable work-authorization record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permit {
    pub id: String,
    /// Optimistic-concurrency token; bumped by every committed write.
    pub version: u64,
    pub status: PermitStatus,
    pub work_type: String,
    pub requester_id: String,
    pub requester_name: String,
    pub reviewer_id: String,
    pub approver_id: String,
    pub created_at: DateTime<Utc>,
    /// Currently active work-clearance window; mutated by renewal approval.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub location_detail: String,
    pub location_unit: String,
    /// Worker ids referenced by this permit (non-owning).
    pub crew: Vec<String>,
    /// Free-form form fields, opaque to the state machine.
    pub payload: Map<String, Value>,
    pub review: Option<StageDecision>,
    pub approval: Option<StageDecision>,
    pub rejection: Option<RejectionRecord>,
    pub closure: Option<ClosureRecord>,
    /// Append-only; only the last entry may still change.
    pub renewal_log: Vec<RenewalEntry>,
}

/// Requester-submitted permit content, used at creation and resubmission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermitDraft {
    pub work_type: String,
    pub reviewer_id: String,
    pub approver_id: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub location_detail: String,
    pub location_unit: String,
    pub crew: Vec<String>,
    pub payload: Map<String, Value>,
}

/// Fields accompanying a permit action. `reason` is required on `Reject`,
/// `site_restored` on `InitiateClosure`, `draft` on `Resubmit`.
#[derive(Debug, Clone, Default)]
pub struct PermitActionFields {
    pub remarks: String,
    pub reason: Option<String>,
    pub site_restored: Option<bool>,
    pub draft: Option<PermitDraft>,
}

impl Permit {
    pub fn from_draft(id: String, requester: &Actor, draft: PermitDraft, now: DateTime<Utc>) -> Self {
        Permit {
            id,
            version: 0,
            status: PermitStatus::PendingReview,
            work_type: draft.work_type,
            requester_id: requester.id.clone(),
            requester_name: requester.name.clone(),
            reviewer_id: draft.reviewer_id,
            approver_id: draft.approver_id,
            created_at: now,
            valid_from: draft.valid_from,
            valid_to: draft.valid_to,
            location: draft.location,
            location_detail: draft.location_detail,
            location_unit: draft.location_unit,
            crew: draft.crew,
            payload: draft.payload,
            review: None,
            approval: None,
            rejection: None,
            closure: None,
            renewal_log: Vec::new(),
        }
    }

    /// The last renewal entry, if it is still in flight.
    pub fn open_renewal(&self) -> Option<&RenewalEntry> {
        self.renewal_log.last().filter(|entry| entry.is_open())
    }

    /// Status/renewal-log consistency: a non-terminal last entry and a
    /// renewal-pending status imply each other.
    pub fn renewal_consistent(&self) -> bool {
        match self.open_renewal().map(|entry| entry.status) {
            Some(RenewalStatus::PendingReview) => {
                self.status == PermitStatus::RenewalPendingReview
            }
            Some(RenewalStatus::PendingApproval) => {
                self.status == PermitStatus::RenewalPendingApproval
            }
            Some(_) => false,
            None => !self.status.is_renewal_pending(),
        }
    }

    fn stamp(actor: &Actor, remarks: &str, now: DateTime<Utc>) -> StageDecision {
        StageDecision {
            actor: actor.name.clone(),
            at: now,
            remarks: remarks.to_string(),
        }
    }

    /// True when this permit already reflects the given action by the given
    /// actor: the retry of an applied action must be a no-op.
    pub fn action_already_applied(
        &self,
        actor: &Actor,
        action: PermitAction,
        fields: &PermitActionFields,
    ) -> bool {
        let by = |decision: &Option<StageDecision>| {
            decision
                .as_ref()
                .is_some_and(|d| d.actor == actor.name)
        };
        match action {
            PermitAction::Review => {
                self.status == PermitStatus::PendingApproval && by(&self.review)
            }
            PermitAction::Approve => {
                (self.status == PermitStatus::Active && by(&self.approval))
                    || (self.status == PermitStatus::Closed
                        && self
                            .closure
                            .as_ref()
                            .is_some_and(|c| by(&c.approver)))
            }
            PermitAction::Reject => {
                self.status == PermitStatus::Rejected
                    && self
                        .rejection
                        .as_ref()
                        .is_some_and(|r| r.by == actor.name && r.role == actor.role)
            }
            PermitAction::Resubmit => {
                self.status == PermitStatus::PendingReview
                    && fields.draft.as_ref().is_some_and(|draft| {
                        self.work_type == draft.work_type
                            && self.payload == draft.payload
                            && self.crew == draft.crew
                    })
            }
            PermitAction::InitiateClosure => {
                self.status == PermitStatus::ClosurePendingReview
                    && self
                        .closure
                        .as_ref()
                        .is_some_and(|c| by(&c.requestor))
            }
            PermitAction::ApproveClosure => {
                self.status == PermitStatus::ClosurePendingApproval
                    && self
                        .closure
                        .as_ref()
                        .is_some_and(|c| by(&c.reviewer))
            }
            PermitAction::RejectClosure => false,
        }
    }

    /// Apply one lifecycle action purely in memory. Validates before any
    /// mutation: an error leaves the document untouched by construction
    /// (the caller still holds the stored copy).
    pub fn apply_action(
        mut self,
        actor: &Actor,
        action: PermitAction,
        fields: &PermitActionFields,
        now: DateTime<Utc>,
    ) -> Result<Permit, EngineError> {
        let next = permit_transition(self.status, actor.role, action).ok_or_else(|| {
            EngineError::invalid_transition("permit", self.status, actor.role, action)
        })?;

        match action {
            PermitAction::Review => {
                self.review = Some(Self::stamp(actor, &fields.remarks, now));
            }
            PermitAction::Approve if next == PermitStatus::Active => {
                self.approval = Some(Self::stamp(actor, &fields.remarks, now));
            }
            PermitAction::Approve => {
                // Closure approval; the record exists from initiate_closure.
                self.closure
                    .get_or_insert_with(ClosureRecord::default)
                    .approver = Some(Self::stamp(actor, &fields.remarks, now));
            }
            PermitAction::Reject => {
                let reason = require_reason(fields.reason.as_deref(), "permit rejection")?;
                self.rejection = Some(RejectionRecord {
                    by: actor.name.clone(),
                    role: actor.role,
                    at: now,
                    reason,
                });
            }
            PermitAction::Resubmit => {
                let draft = fields.draft.clone().ok_or_else(|| {
                    EngineError::validation("draft", "resubmission requires the edited content")
                })?;
                validate_draft(&draft)?;
                // Re-review on edit: the new content discards prior decisions.
                self.work_type = draft.work_type;
                self.reviewer_id = draft.reviewer_id;
                self.approver_id = draft.approver_id;
                self.valid_from = draft.valid_from;
                self.valid_to = draft.valid_to;
                self.location = draft.location;
                self.location_detail = draft.location_detail;
                self.location_unit = draft.location_unit;
                self.crew = draft.crew;
                self.payload = draft.payload;
                self.review = None;
                self.approval = None;
            }
            PermitAction::InitiateClosure => {
                let site_restored = fields.site_restored.ok_or_else(|| {
                    EngineError::validation(
                        "site_restored",
                        "closure initiation requires the site-restored flag",
                    )
                })?;
                self.closure = Some(ClosureRecord {
                    site_restored,
                    requestor: Some(Self::stamp(actor, &fields.remarks, now)),
                    reviewer: None,
                    approver: None,
                });
            }
            PermitAction::ApproveClosure => {
                self.closure
                    .get_or_insert_with(ClosureRecord::default)
                    .reviewer = Some(Self::stamp(actor, &fields.remarks, now));
            }
            PermitAction::RejectClosure => {
                // The closure record stays behind as history; the rejecting
                // role's slot records who sent it back.
                let stamp = Self::stamp(actor, &fields.remarks, now);
                let closure = self.closure.get_or_insert_with(ClosureRecord::default);
                match actor.role {
                    Role::Reviewer => closure.reviewer = Some(stamp),
                    _ => closure.approver = Some(stamp),
                }
            }
        }

        self.status = next;
        Ok(self)
    }
}

impl Versioned for Permit {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

pub(crate) fn validate_draft(draft: &PermitDraft) -> Result<(), EngineError> {
    if draft.work_type.trim().is_empty() {
        return Err(EngineError::validation("work_type", "must not be empty"));
    }
    if let (Some(from), Some(to)) = (draft.valid_from, draft.valid_to) {
        if from >= to {
            return Err(EngineError::validation(
                "valid_to",
                "validity window must end after it starts",
            ));
        }
    }
    Ok(())
}

fn require_reason(reason: Option<&str>, what: &str) -> Result<String, EngineError> {
    match reason {
        Some(r) if !r.trim().is_empty() => Ok(r.to_string()),
        _ => Err(EngineError::validation(
            "reason",
            format!("{what} requires a reason"),
        )),
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

    fn draft() -> PermitDraft {
        PermitDraft {
            work_type: "Cold Work".to_string(),
            reviewer_id: "rev@plant".to_string(),
            approver_id: "app@plant".to_string(),
            ..Default::default()
        }
    }

    fn fresh_permit() -> Permit {
        Permit::from_draft("WP-1001".to_string(), &requester(), draft(), Utc::now())
    }

    #[test]
    fn review_stamps_an_audit_triple() {
        let now = Utc::now();
        let permit = fresh_permit()
            .apply_action(
                &reviewer(),
                PermitAction::Review,
                &PermitActionFields {
                    remarks: "checked isolation points".to_string(),
                    ..Default::default()
                },
                now,
            )
            .unwrap();

        assert_eq!(permit.status, PermitStatus::PendingApproval);
        let review = permit.review.unwrap();
        assert_eq!(review.actor, "R. Iyer");
        assert_eq!(review.at, now);
        assert_eq!(review.remarks, "checked isolation points");
    }

    #[test]
    fn reject_requires_a_reason_and_leaves_no_stamp_otherwise() {
        let err = fresh_permit()
            .apply_action(
                &reviewer(),
                PermitAction::Reject,
                &PermitActionFields::default(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { field: "reason", .. }));
    }

    #[test]
    fn resubmission_clears_prior_decisions() {
        let now = Utc::now();
        let permit = fresh_permit()
            .apply_action(&reviewer(), PermitAction::Review, &Default::default(), now)
            .unwrap()
            .apply_action(&approver(), PermitAction::Approve, &Default::default(), now)
            .unwrap();
        assert!(permit.review.is_some());
        assert!(permit.approval.is_some());

        let mut edited = draft();
        edited.work_type = "Hot Work".to_string();
        let permit = permit
            .apply_action(
                &requester(),
                PermitAction::Resubmit,
                &PermitActionFields {
                    draft: Some(edited),
                    ..Default::default()
                },
                now,
            )
            .unwrap();

        assert_eq!(permit.status, PermitStatus::PendingReview);
        assert_eq!(permit.work_type, "Hot Work");
        assert!(permit.review.is_none());
        assert!(permit.approval.is_none());
    }

    #[test]
    fn closure_initiation_requires_the_site_flag() {
        let now = Utc::now();
        let permit = fresh_permit()
            .apply_action(&reviewer(), PermitAction::Review, &Default::default(), now)
            .unwrap()
            .apply_action(&approver(), PermitAction::Approve, &Default::default(), now)
            .unwrap();

        let err = permit
            .clone()
            .apply_action(
                &requester(),
                PermitAction::InitiateClosure,
                &PermitActionFields::default(),
                now,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation { field: "site_restored", .. }
        ));

        let permit = permit
            .apply_action(
                &requester(),
                PermitAction::InitiateClosure,
                &PermitActionFields {
                    site_restored: Some(true),
                    remarks: "area handed back".to_string(),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(permit.status, PermitStatus::ClosurePendingReview);
        assert!(permit.closure.unwrap().site_restored);
    }

    #[test]
    fn role_mismatch_is_an_invalid_transition() {
        let err = fresh_permit()
            .apply_action(
                &requester(),
                PermitAction::Review,
                &Default::default(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn applied_review_is_detected_for_idempotent_retry() {
        let now = Utc::now();
        let fields = PermitActionFields::default();
        let permit = fresh_permit()
            .apply_action(&reviewer(), PermitAction::Review, &fields, now)
            .unwrap();

        assert!(permit.action_already_applied(&reviewer(), PermitAction::Review, &fields));
        // A different reviewer retrying is not the same logical action.
        let other = Actor::new("rev2@plant", "K. Rao", Role::Reviewer);
        assert!(!permit.action_already_applied(&other, PermitAction::Review, &fields));
    }

    #[test]
    fn renewal_consistency_holds_on_quiet_permits() {
        let permit = fresh_permit();
        assert!(permit.renewal_consistent());
    }
}
