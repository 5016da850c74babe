// Renewal sub-workflow: an append-only log of renewal requests nested in a
// permit. Only the last entry may change; earlier entries are history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{Actor, Role};
use crate::error::EngineError;
use crate::permit::Permit;
use crate::transitions::{renewal_transition, RenewalAction, RenewalStatus};

/// Gas test readings captured with a renewal request, stored as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasReadings {
    pub hc: String,
    pub toxic: String,
    pub oxygen: String,
}

/// One renewal cycle. Audit fields are each written exactly once, by the
/// transition they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalEntry {
    pub status: RenewalStatus,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub gas_readings: GasReadings,
    pub precautions: String,
    pub worker_list: Vec<String>,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_role: Option<Role>,
    pub rejection_reason: Option<String>,
}

impl RenewalEntry {
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Fields accompanying a renewal action. The proposed window is required on
/// `Request`; `reason` is required on `Reject`.
#[derive(Debug, Clone, Default)]
pub struct RenewalFields {
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub gas_readings: GasReadings,
    pub precautions: String,
    pub worker_list: Vec<String>,
    pub reason: Option<String>,
}

/// True when `permit` already reflects this exact renewal action, so a retry
/// must return the document unchanged instead of advancing it again.
pub fn renewal_already_applied(
    permit: &Permit,
    actor: &Actor,
    action: RenewalAction,
    fields: &RenewalFields,
) -> bool {
    let Some(last) = permit.renewal_log.last() else {
        return false;
    };
    match (action, actor.role) {
        (RenewalAction::Request, Role::Requester) => {
            permit.status.is_renewal_pending()
                && last.status == RenewalStatus::PendingReview
                && last.requested_by == actor.name
                && Some(last.valid_to) == fields.valid_to
        }
        (RenewalAction::Approve, Role::Reviewer) => {
            last.status == RenewalStatus::PendingApproval
                && last.reviewed_by.as_deref() == Some(actor.name.as_str())
        }
        (RenewalAction::Approve, Role::Approver) => {
            last.status == RenewalStatus::Approved
                && last.approved_by.as_deref() == Some(actor.name.as_str())
        }
        (RenewalAction::Reject, _) => {
            last.status == RenewalStatus::Rejected
                && last.rejected_by.as_deref() == Some(actor.name.as_str())
                && last.rejected_role == Some(actor.role)
        }
        _ => false,
    }
}

/// Apply one renewal action to a permit, purely in memory.
///
/// A requester action appends a fresh entry; reviewer/approver actions
/// mutate the last entry in place. The parent status always moves in the
/// same step so the two can never disagree.
pub fn apply_renewal_action(
    mut permit: Permit,
    actor: &Actor,
    action: RenewalAction,
    fields: &RenewalFields,
    now: DateTime<Utc>,
) -> Result<Permit, EngineError> {
    let (entry_status, permit_status) = renewal_transition(permit.status, actor.role, action)
        .ok_or_else(|| {
            EngineError::invalid_transition("permit", permit.status, actor.role, action)
        })?;

    match action {
        RenewalAction::Request => {
            if permit.open_renewal().is_some() {
                // Status said Active but the log disagrees; refuse to stack a
                // second open entry.
                return Err(EngineError::invalid_transition(
                    "permit",
                    permit.status,
                    actor.role,
                    action,
                ));
            }
            let (valid_from, valid_to) = match (fields.valid_from, fields.valid_to) {
                (Some(from), Some(to)) if from < to => (from, to),
                (Some(_), Some(_)) => {
                    return Err(EngineError::validation(
                        "valid_to",
                        "proposed window must end after it starts",
                    ))
                }
                _ => {
                    return Err(EngineError::validation(
                        "valid_from",
                        "renewal request requires a proposed validity window",
                    ))
                }
            };
            permit.renewal_log.push(RenewalEntry {
                status: entry_status,
                valid_from,
                valid_to,
                gas_readings: fields.gas_readings.clone(),
                precautions: fields.precautions.clone(),
                worker_list: fields.worker_list.clone(),
                requested_by: actor.name.clone(),
                requested_at: now,
                reviewed_by: None,
                reviewed_at: None,
                approved_by: None,
                approved_at: None,
                rejected_by: None,
                rejected_at: None,
                rejected_role: None,
                rejection_reason: None,
            });
        }
        RenewalAction::Approve => {
            let last = permit.renewal_log.last_mut().ok_or_else(|| {
                EngineError::validation("renewal_log", "no renewal entry to act on")
            })?;
            last.status = entry_status;
            match actor.role {
                Role::Reviewer => {
                    last.reviewed_by = Some(actor.name.clone());
                    last.reviewed_at = Some(now);
                }
                Role::Approver => {
                    last.approved_by = Some(actor.name.clone());
                    last.approved_at = Some(now);
                    // The approved window becomes the permit's active window.
                    permit.valid_from = Some(last.valid_from);
                    permit.valid_to = Some(last.valid_to);
                }
                Role::Requester => unreachable!("validator admits no requester approve edge"),
            }
        }
        RenewalAction::Reject => {
            let reason = match fields.reason.as_deref() {
                Some(r) if !r.trim().is_empty() => r.to_string(),
                _ => {
                    return Err(EngineError::validation(
                        "reason",
                        "renewal rejection requires a reason",
                    ))
                }
            };
            let last = permit.renewal_log.last_mut().ok_or_else(|| {
                EngineError::validation("renewal_log", "no renewal entry to act on")
            })?;
            last.status = entry_status;
            last.rejected_by = Some(actor.name.clone());
            last.rejected_at = Some(now);
            last.rejected_role = Some(actor.role);
            last.rejection_reason = Some(reason);
            // A rejected renewal leaves the validity window untouched.
        }
    }

    permit.status = permit_status;
    Ok(permit)
}
