// Authorization & transition validator.
//
// Every state machine edge in the system is decided here and only here:
// pure (state, role, action) lookups with no side effects, so legality can
// be tested exhaustively without touching storage. Handlers never match on
// roles or status strings themselves.

use serde::{Deserialize, Serialize};

use crate::directory::Role;

/// Top-level permit lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
    PendingReview,
    PendingApproval,
    Active,
    Rejected,
    RenewalPendingReview,
    RenewalPendingApproval,
    ClosurePendingReview,
    ClosurePendingApproval,
    Closed,
}

impl PermitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PermitStatus::Closed | PermitStatus::Rejected)
    }

    /// True while a renewal entry is in flight.
    pub fn is_renewal_pending(&self) -> bool {
        matches!(
            self,
            PermitStatus::RenewalPendingReview | PermitStatus::RenewalPendingApproval
        )
    }
}

impl std::fmt::Display for PermitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PermitStatus::PendingReview => "Pending Review",
            PermitStatus::PendingApproval => "Pending Approval",
            PermitStatus::Active => "Active",
            PermitStatus::Rejected => "Rejected",
            PermitStatus::RenewalPendingReview => "Renewal Pending Review",
            PermitStatus::RenewalPendingApproval => "Renewal Pending Approval",
            PermitStatus::ClosurePendingReview => "Closure Pending Review",
            PermitStatus::ClosurePendingApproval => "Closure Pending Approval",
            PermitStatus::Closed => "Closed",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitAction {
    Review,
    Approve,
    Reject,
    Resubmit,
    InitiateClosure,
    ApproveClosure,
    RejectClosure,
}

/// Lifecycle of a single renewal entry, nested inside a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalStatus {
    PendingReview,
    PendingApproval,
    Approved,
    Rejected,
}

impl RenewalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenewalStatus::Approved | RenewalStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalAction {
    Request,
    Approve,
    Reject,
}

/// Worker credential lifecycle. Edit states mirror the create states so a
/// record keeps its track through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    PendingReview,
    PendingApproval,
    Approved,
    Rejected,
    EditPendingReview,
    EditPendingApproval,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerStatus::Approved | WorkerStatus::Rejected)
    }

    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            WorkerStatus::EditPendingReview | WorkerStatus::EditPendingApproval
        )
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerStatus::PendingReview => "Pending Review",
            WorkerStatus::PendingApproval => "Pending Approval",
            WorkerStatus::Approved => "Approved",
            WorkerStatus::Rejected => "Rejected",
            WorkerStatus::EditPendingReview => "Edit Pending Review",
            WorkerStatus::EditPendingApproval => "Edit Pending Approval",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerAction {
    Create,
    EditRequest,
    Approve,
    Reject,
    Delete,
}

/// What a legal worker action does to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerDisposition {
    Advance(WorkerStatus),
    Remove,
}

/// Permit lifecycle table. Returns the next status, or `None` when the
/// (state, role, action) triple has no edge.
pub fn permit_transition(
    state: PermitStatus,
    role: Role,
    action: PermitAction,
) -> Option<PermitStatus> {
    use PermitAction::*;
    use PermitStatus::*;

    match (state, role, action) {
        (PendingReview, Role::Reviewer, Review) => Some(PendingApproval),
        (PendingReview, Role::Reviewer, Reject) => Some(Rejected),
        (PendingApproval, Role::Approver, Approve) => Some(Active),
        (PendingApproval, Role::Approver, Reject) => Some(Rejected),
        (Active, Role::Requester, Resubmit) => Some(PendingReview),
        (Active, Role::Requester, InitiateClosure) => Some(ClosurePendingReview),
        (ClosurePendingReview, Role::Reviewer, ApproveClosure) => Some(ClosurePendingApproval),
        (ClosurePendingApproval, Role::Approver, Approve) => Some(Closed),
        (ClosurePendingApproval, Role::Approver | Role::Reviewer, RejectClosure) => Some(Active),
        _ => None,
    }
}

/// Renewal table, keyed on the parent permit's status. Returns the status
/// the affected entry lands in together with the permit's next status.
pub fn renewal_transition(
    permit: PermitStatus,
    role: Role,
    action: RenewalAction,
) -> Option<(RenewalStatus, PermitStatus)> {
    use RenewalAction::*;

    match (permit, role, action) {
        (PermitStatus::Active, Role::Requester, Request) => Some((
            RenewalStatus::PendingReview,
            PermitStatus::RenewalPendingReview,
        )),
        (PermitStatus::RenewalPendingReview, Role::Reviewer, Approve) => Some((
            RenewalStatus::PendingApproval,
            PermitStatus::RenewalPendingApproval,
        )),
        (PermitStatus::RenewalPendingReview, Role::Reviewer, Reject) => {
            Some((RenewalStatus::Rejected, PermitStatus::Active))
        }
        (PermitStatus::RenewalPendingApproval, Role::Approver, Approve) => {
            Some((RenewalStatus::Approved, PermitStatus::Active))
        }
        (PermitStatus::RenewalPendingApproval, Role::Approver, Reject) => {
            Some((RenewalStatus::Rejected, PermitStatus::Active))
        }
        _ => None,
    }
}

/// Worker table. `Create` is not an edge (there is no source state); the
/// engine seeds new records in `PendingReview` directly.
pub fn worker_transition(
    state: WorkerStatus,
    role: Role,
    action: WorkerAction,
) -> Option<WorkerDisposition> {
    use WorkerAction::*;
    use WorkerDisposition::*;
    use WorkerStatus::*;

    match (state, role, action) {
        (PendingReview, Role::Reviewer, Approve) => Some(Advance(PendingApproval)),
        (EditPendingReview, Role::Reviewer, Approve) => Some(Advance(EditPendingApproval)),
        (PendingApproval, Role::Approver, Approve) => Some(Advance(Approved)),
        (EditPendingApproval, Role::Approver, Approve) => Some(Advance(Approved)),
        (PendingReview | EditPendingReview, Role::Reviewer, Reject) => Some(Advance(Rejected)),
        (PendingApproval | EditPendingApproval, Role::Approver, Reject) => Some(Advance(Rejected)),
        (Approved, Role::Requester, EditRequest) => Some(Advance(EditPendingReview)),
        (_, Role::Approver, Delete) => Some(Remove),
        _ => None,
    }
}
