// Worker credential chain: create/edit approval tracks, the dual snapshot,
// and the destructive delete.

mod common;

use common::*;
use permitflow::{
    EngineError, Worker, WorkerAction, WorkerActionResult, WorkerChanges, WorkerStatus,
    WorkerStore, WorkflowEngine,
};

fn submission() -> WorkerChanges {
    WorkerChanges {
        name: Some("M. Kumar".to_string()),
        age: Some(34),
        id_type: Some("Aadhaar".to_string()),
        id_number: Some("xxxx-1234".to_string()),
        ..Default::default()
    }
}

async fn unwrap_updated(result: Result<WorkerActionResult, EngineError>) -> Worker {
    match result.unwrap() {
        WorkerActionResult::Updated(worker) => worker,
        WorkerActionResult::Deleted { id } => panic!("unexpected delete of {id}"),
    }
}

async fn approved_worker(engine: &WorkflowEngine) -> Worker {
    let worker = unwrap_updated(
        engine
            .apply_worker_action(None, &requester(), WorkerAction::Create, submission())
            .await,
    )
    .await;
    unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &reviewer(),
                WorkerAction::Approve,
                WorkerChanges::default(),
            )
            .await,
    )
    .await;
    unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &approver(),
                WorkerAction::Approve,
                WorkerChanges::default(),
            )
            .await,
    )
    .await
}

#[tokio::test]
async fn create_starts_in_pending_review_with_a_pending_snapshot() {
    let (engine, _store) = engine_with_store();
    let worker = unwrap_updated(
        engine
            .apply_worker_action(None, &requester(), WorkerAction::Create, submission())
            .await,
    )
    .await;
    assert_eq!(worker.id, "W-1001");
    assert_eq!(worker.status, WorkerStatus::PendingReview);
    assert!(worker.current.is_none());
    assert!(worker.pending.is_some());
    assert_eq!(worker.requestor_id, "req@plant");

    let worker = unwrap_updated(
        engine
            .apply_worker_action(
                Some("W-1001"),
                &reviewer(),
                WorkerAction::Approve,
                WorkerChanges::default(),
            )
            .await,
    )
    .await;
    assert_eq!(worker.status, WorkerStatus::PendingApproval);
    // The reviewer stage moves the record along without touching snapshots.
    assert!(worker.current.is_none());
    assert!(worker.pending.is_some());
}

#[tokio::test]
async fn approval_stamps_the_pending_snapshot_into_current() {
    let (engine, _store) = engine_with_store();
    let worker = approved_worker(&engine).await;

    assert_eq!(worker.status, WorkerStatus::Approved);
    assert!(worker.pending.is_none());
    let current = worker.current.as_ref().unwrap();
    assert_eq!(current.name, "M. Kumar");
    assert_eq!(current.approved_by.as_deref(), Some("A. Sharma"));
    assert!(current.approved_at.is_some());
}

#[tokio::test]
async fn approved_snapshot_comes_from_the_latest_pending_edit() {
    let (engine, _store) = engine_with_store();
    let worker = approved_worker(&engine).await;

    // Owner submits an edit; unspecified fields keep current values.
    let worker = unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &requester(),
                WorkerAction::EditRequest,
                WorkerChanges {
                    id_number: Some("yyyy-9999".to_string()),
                    ..Default::default()
                },
            )
            .await,
    )
    .await;
    assert_eq!(worker.status, WorkerStatus::EditPendingReview);

    unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &reviewer(),
                WorkerAction::Approve,
                WorkerChanges::default(),
            )
            .await,
    )
    .await;
    let worker = unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &approver(),
                WorkerAction::Approve,
                WorkerChanges::default(),
            )
            .await,
    )
    .await;

    assert_eq!(worker.status, WorkerStatus::Approved);
    let current = worker.current.as_ref().unwrap();
    assert_eq!(current.id_number, "yyyy-9999");
    assert_eq!(current.name, "M. Kumar");
    assert_eq!(current.age, 34);
}

#[tokio::test]
async fn under_18_create_never_reaches_the_store() {
    let (engine, store) = engine_with_store();
    let err = engine
        .apply_worker_action(
            None,
            &requester(),
            WorkerAction::Create,
            WorkerChanges {
                name: Some("Too Young".to_string()),
                age: Some(17),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { field: "age", .. }));

    // No record, no consumed sequence number: insert was never invoked.
    assert!(WorkerStore::list(store.as_ref()).await.unwrap().is_empty());
    assert_eq!(store.next_worker_number().await.unwrap(), 1001);
}

#[tokio::test]
async fn edit_rejection_keeps_the_prior_approved_snapshot() {
    let (engine, _store) = engine_with_store();
    let worker = approved_worker(&engine).await;

    unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &requester(),
                WorkerAction::EditRequest,
                WorkerChanges {
                    age: Some(35),
                    ..Default::default()
                },
            )
            .await,
    )
    .await;
    let worker = unwrap_updated(
        engine
            .apply_worker_action(
                Some(&worker.id),
                &reviewer(),
                WorkerAction::Reject,
                WorkerChanges::default(),
            )
            .await,
    )
    .await;

    assert_eq!(worker.status, WorkerStatus::Rejected);
    assert!(worker.pending.is_none());
    assert_eq!(worker.current.as_ref().unwrap().age, 34);
}

#[tokio::test]
async fn requester_cannot_work_the_approval_chain() {
    let (engine, _store) = engine_with_store();
    let worker = unwrap_updated(
        engine
            .apply_worker_action(None, &requester(), WorkerAction::Create, submission())
            .await,
    )
    .await;

    let err = engine
        .apply_worker_action(
            Some(&worker.id),
            &requester(),
            WorkerAction::Approve,
            WorkerChanges::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn delete_is_hard_and_approver_only() {
    let (engine, store) = engine_with_store();
    let worker = approved_worker(&engine).await;

    let err = engine
        .apply_worker_action(
            Some(&worker.id),
            &requester(),
            WorkerAction::Delete,
            WorkerChanges::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let result = engine
        .apply_worker_action(
            Some(&worker.id),
            &approver(),
            WorkerAction::Delete,
            WorkerChanges::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        WorkerActionResult::Deleted {
            id: worker.id.clone()
        }
    );

    let err = WorkerStore::get(store.as_ref(), &worker.id).await.unwrap_err();
    assert!(matches!(err, permitflow::StoreError::NotFound { .. }));
}

#[tokio::test]
async fn worker_ids_are_sequential_and_independent_of_permits() {
    let (engine, _store) = engine_with_store();
    engine.create_permit(&requester(), draft()).await.unwrap();

    let first = unwrap_updated(
        engine
            .apply_worker_action(None, &requester(), WorkerAction::Create, submission())
            .await,
    )
    .await;
    let second = unwrap_updated(
        engine
            .apply_worker_action(None, &requester(), WorkerAction::Create, submission())
            .await,
    )
    .await;
    assert_eq!(first.id, "W-1001");
    assert_eq!(second.id, "W-1002");
}
