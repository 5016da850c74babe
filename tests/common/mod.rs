#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use permitflow::{
    Actor, MemoryStore, Permit, PermitAction, PermitActionFields, PermitDraft, RenewalFields, Role,
    WorkflowEngine,
};

pub fn requester() -> Actor {
    Actor::new("req@plant", "S. Bose", Role::Requester)
}

pub fn reviewer() -> Actor {
    Actor::new("rev@plant", "R. Iyer", Role::Reviewer)
}

pub fn approver() -> Actor {
    Actor::new("app@plant", "A. Sharma", Role::Approver)
}

pub fn engine_with_store() -> (WorkflowEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (WorkflowEngine::new(store.clone(), store.clone()), store)
}

pub fn draft() -> PermitDraft {
    PermitDraft {
        work_type: "Hot Work".to_string(),
        reviewer_id: "rev@plant".to_string(),
        approver_id: "app@plant".to_string(),
        valid_from: Some(Utc::now()),
        valid_to: Some(Utc::now() + Duration::days(1)),
        location_unit: "Mainline".to_string(),
        ..Default::default()
    }
}

/// Create a permit and walk it through review and approval.
pub async fn active_permit(engine: &WorkflowEngine) -> Permit {
    let permit = engine.create_permit(&requester(), draft()).await.unwrap();
    engine
        .apply_permit_action(
            &permit.id,
            &reviewer(),
            PermitAction::Review,
            PermitActionFields::default(),
        )
        .await
        .unwrap();
    engine
        .apply_permit_action(
            &permit.id,
            &approver(),
            PermitAction::Approve,
            PermitActionFields::default(),
        )
        .await
        .unwrap()
}

pub fn renewal_request_fields(days: i64) -> RenewalFields {
    let now = Utc::now();
    RenewalFields {
        valid_from: Some(now),
        valid_to: Some(now + Duration::days(days)),
        precautions: "fresh gas test before re-entry".to_string(),
        ..Default::default()
    }
}
