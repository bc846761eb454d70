mod common;

use chrono::Duration;
use contract_anchor::approval::ApprovalState;
use contract_anchor::audit::EventKind;
use contract_anchor::database::models::{ChainStatus, ContractCategory, ContractStatus};
use contract_anchor::parties::{PartyApproval, PartyRole};
use contract_anchor::ContractError;
use uuid::Uuid;

use common::setup;

#[tokio::test]
async fn test_upload_to_anchored() {
    let app = setup(true).await;
    let id = app.upload().await;

    // Bob holds no role until he is added.
    let early = app.facade.decide_approval(id, app.bob.id, true).await;
    assert!(matches!(early, Err(ContractError::AuthorizationError(_))));

    let party = app
        .facade
        .add_second_party(id, app.alice.id, "Bob@Example.com")
        .await
        .unwrap();
    assert_eq!(party.user_id, app.bob.id);
    assert_eq!(party.role, PartyRole::SecondParty);
    assert_eq!(party.approval, PartyApproval::Pending);

    let status = app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::AwaitingApproval);
    assert!(!status.can_approve);
    assert!(status.is_owner);
    assert!(status.anchor.is_none());

    let status = app.facade.decide_approval(id, app.bob.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::Finalized);
    assert!(!status.can_approve);
    assert!(!status.is_owner);
    assert_eq!(status.first_party.name.as_deref(), Some("Alice Owner"));
    assert_eq!(
        status.second_party.as_ref().map(|p| p.approval_status),
        Some(PartyApproval::Approved)
    );

    let anchor = status.anchor.expect("finalized contract must carry its hash");
    assert!(anchor.document_hash.starts_with("0x"));
    assert_eq!(anchor.tx_reference.as_deref(), Some("0xtx0001"));
    assert_eq!(anchor.chain_status, ChainStatus::Confirmed);
    assert_eq!(app.ledger.submissions(), 1);

    assert_eq!(
        app.event_kinds(id).await,
        vec![
            EventKind::DocumentUploaded,
            EventKind::SecondPartyAdded,
            EventKind::FirstPartyApproved,
            EventKind::SecondPartyApproved,
            EventKind::ContractFinalized,
            EventKind::BlockchainVerified,
        ]
    );

    let trail = app.facade.get_audit_trail(id).await.unwrap();
    let finalized = &trail.events[4];
    assert_eq!(
        finalized.metadata.as_ref().unwrap()["document_hash"],
        anchor.document_hash.as_str()
    );
    assert_eq!(trail.events[3].user_name.as_deref(), Some("Bob Counterparty"));
    assert_eq!(trail.events[5].user_id, None);
    assert_eq!(trail.anchor.unwrap().tx_reference.as_deref(), Some("0xtx0001"));

    assert!(app.facade.verify_audit_trail(id).await.unwrap().valid);
}

#[tokio::test]
async fn test_analysis_event_recorded_on_upload() {
    let app = setup(false).await;
    let id = app.upload_analyzed().await;

    let trail = app.facade.get_audit_trail(id).await.unwrap();
    assert_eq!(trail.events.len(), 2);
    assert_eq!(trail.events[0].event_type, EventKind::DocumentUploaded);
    assert_eq!(trail.events[0].user_name.as_deref(), Some("Alice Owner"));
    assert_eq!(trail.events[1].event_type, EventKind::AiAnalysisCompleted);
    assert_eq!(trail.events[1].metadata.as_ref().unwrap()["risks"], 3);
}

#[tokio::test]
async fn test_remove_second_party_discards_approvals() {
    let app = setup(true).await;
    let id = app.upload().await;

    let status = app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::NoSecondParty);
    assert_eq!(status.first_party.approval_status, PartyApproval::Approved);

    app.facade
        .add_second_party(id, app.alice.id, &app.bob.email)
        .await
        .unwrap();
    let status = app.facade.get_approval_status(id, app.alice.id).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::AwaitingApproval);

    app.facade.remove_second_party(id, app.alice.id).await.unwrap();
    let status = app.facade.get_approval_status(id, app.alice.id).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::NoSecondParty);
    assert!(status.second_party.is_none());
    assert_eq!(status.first_party.approval_status, PartyApproval::Pending);
    assert_eq!(status.first_party.approved_at, None);
    assert!(status.anchor.is_none());

    // Bob no longer holds a role.
    let gone = app.facade.get_approval_status(id, app.bob.id).await;
    assert!(matches!(gone, Err(ContractError::AuthorizationError(_))));

    // A re-added pairing starts from pending on both sides.
    app.facade
        .add_second_party(id, app.alice.id, &app.bob.email)
        .await
        .unwrap();
    let status = app.facade.decide_approval(id, app.bob.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::AwaitingApproval);
    assert!(status.anchor.is_none());

    let status = app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::Finalized);
    assert_eq!(app.count(id, EventKind::ContractFinalized).await, 1);
    assert_eq!(app.count(id, EventKind::SecondPartyRemoved).await, 1);
}

#[tokio::test]
async fn test_rejection_and_reapproval() {
    let app = setup(false).await;
    let id = app.upload().await;
    app.facade
        .add_second_party(id, app.alice.id, &app.bob.email)
        .await
        .unwrap();

    let status = app.facade.decide_approval(id, app.bob.id, false).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::Rejected);
    assert!(status.can_approve);
    assert!(status.second_party.as_ref().unwrap().approved_at.is_some());

    let again = app.facade.decide_approval(id, app.bob.id, false).await;
    assert!(matches!(
        again,
        Err(ContractError::InvalidStateError {
            status: ApprovalState::Rejected,
            ..
        })
    ));

    let status = app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::Rejected);
    assert_eq!(status.second_party.unwrap().approval_status, PartyApproval::Rejected);

    let status = app.facade.decide_approval(id, app.bob.id, true).await.unwrap();
    assert_eq!(status.overall_status, ApprovalState::Finalized);

    assert_eq!(
        app.event_kinds(id).await,
        vec![
            EventKind::DocumentUploaded,
            EventKind::SecondPartyAdded,
            EventKind::SecondPartyRejected,
            EventKind::FirstPartyApproved,
            EventKind::SecondPartyApproved,
            EventKind::ContractFinalized,
        ]
    );
}

#[tokio::test]
async fn test_party_management_errors() {
    let app = setup(false).await;
    let id = app.upload().await;

    let unknown = app
        .facade
        .add_second_party(id, app.alice.id, "nobody@example.com")
        .await;
    assert!(matches!(unknown, Err(ContractError::NotFoundError(_))));

    let owner = app
        .facade
        .add_second_party(id, app.alice.id, &app.alice.email)
        .await;
    assert!(matches!(owner, Err(ContractError::ConflictError(_))));

    let outsider = app
        .facade
        .add_second_party(id, app.carol.id, &app.bob.email)
        .await;
    assert!(matches!(outsider, Err(ContractError::AuthorizationError(_))));

    let no_second = app.facade.remove_second_party(id, app.alice.id).await;
    assert!(matches!(no_second, Err(ContractError::NotFoundError(_))));

    app.facade
        .add_second_party(id, app.alice.id, &app.bob.email)
        .await
        .unwrap();

    let second_add = app
        .facade
        .add_second_party(id, app.alice.id, &app.carol.email)
        .await;
    assert!(matches!(second_add, Err(ContractError::ConflictError(_))));

    let by_second_party = app.facade.remove_second_party(id, app.bob.id).await;
    assert!(matches!(by_second_party, Err(ContractError::AuthorizationError(_))));

    let missing = app.facade.get_approval_status(Uuid::new_v4(), app.alice.id).await;
    assert!(matches!(missing, Err(ContractError::NotFoundError(_))));

    let stranger = app.facade.get_approval_status(id, app.carol.id).await;
    assert!(matches!(stranger, Err(ContractError::AuthorizationError(_))));

    app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    let twice = app.facade.decide_approval(id, app.alice.id, true).await;
    assert!(matches!(
        twice,
        Err(ContractError::InvalidStateError {
            status: ApprovalState::AwaitingApproval,
            ..
        })
    ));

    // Failed calls leave no trace.
    assert_eq!(
        app.event_kinds(id).await,
        vec![
            EventKind::DocumentUploaded,
            EventKind::SecondPartyAdded,
            EventKind::FirstPartyApproved,
        ]
    );
}

#[tokio::test]
async fn test_finalized_contract_is_frozen() {
    let app = setup(false).await;
    let id = app.finalized_contract().await;
    let events_before = app.event_kinds(id).await.len();

    let reject = app.facade.decide_approval(id, app.bob.id, false).await;
    assert!(matches!(
        reject,
        Err(ContractError::InvalidStateError {
            status: ApprovalState::Finalized,
            ..
        })
    ));

    let remove = app.facade.remove_second_party(id, app.alice.id).await;
    assert!(matches!(remove, Err(ContractError::InvalidStateError { .. })));

    // A repeated approval is answered with the current snapshot.
    let replay = app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    assert_eq!(replay.overall_status, ApprovalState::Finalized);
    assert!(!replay.can_approve);

    assert_eq!(app.event_kinds(id).await.len(), events_before);
}

#[tokio::test]
async fn test_stored_status_follows_transitions() {
    let app = setup(false).await;
    let id = app.upload().await;
    app.facade
        .add_second_party(id, app.alice.id, &app.bob.email)
        .await
        .unwrap();

    app.facade.decide_approval(id, app.alice.id, false).await.unwrap();
    let record = app.facade.update_details(id, app.alice.id, None, None).await.unwrap();
    assert_eq!(record.status, ContractStatus::Rejected);
    assert!(record.finalized_at.is_none());

    app.facade.decide_approval(id, app.alice.id, true).await.unwrap();
    app.facade.decide_approval(id, app.bob.id, true).await.unwrap();
    let record = app.facade.update_details(id, app.alice.id, None, None).await.unwrap();
    assert_eq!(record.status, ContractStatus::Finalized);
    assert!(record.finalized_at.is_some());
}

#[tokio::test]
async fn test_details_and_expiring_contracts() {
    let app = setup(false).await;
    let soon = app.upload().await;
    let later = app.upload().await;
    app.facade
        .add_second_party(soon, app.alice.id, &app.bob.email)
        .await
        .unwrap();

    let by_bob = app
        .facade
        .update_details(soon, app.bob.id, Some(ContractCategory::Rental), None)
        .await;
    assert!(matches!(by_bob, Err(ContractError::AuthorizationError(_))));

    let now = contract_anchor::database::now();
    let updated = app
        .facade
        .update_details(soon, app.alice.id, Some(ContractCategory::Rental), Some(now + Duration::days(3)))
        .await
        .unwrap();
    assert_eq!(updated.category, Some(ContractCategory::Rental));
    app.facade
        .update_details(later, app.alice.id, None, Some(now + Duration::days(20)))
        .await
        .unwrap();

    let alice_week = app.facade.expiring_contracts(app.alice.id, 7).await.unwrap();
    assert_eq!(alice_week.iter().map(|c| c.id).collect::<Vec<_>>(), vec![soon]);

    let alice_month = app.facade.expiring_contracts(app.alice.id, 30).await.unwrap();
    assert_eq!(alice_month.iter().map(|c| c.id).collect::<Vec<_>>(), vec![soon, later]);

    let bob_month = app.facade.expiring_contracts(app.bob.id, 30).await.unwrap();
    assert_eq!(bob_month.len(), 1);
    assert!(app.facade.expiring_contracts(app.carol.id, 30).await.unwrap().is_empty());
    assert!(app.facade.expiring_contracts(app.alice.id, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_translation_views_are_party_only() {
    let app = setup(false).await;
    let id = app.upload().await;

    let outsider = app.facade.record_translation_viewed(id, app.carol.id, "hi").await;
    assert!(matches!(outsider, Err(ContractError::AuthorizationError(_))));

    app.facade
        .record_translation_viewed(id, app.alice.id, "hi")
        .await
        .unwrap();
    let trail = app.facade.get_audit_trail(id).await.unwrap();
    let last = trail.events.last().unwrap();
    assert_eq!(last.event_type, EventKind::TranslationViewed);
    assert_eq!(last.metadata.as_ref().unwrap()["language"], "hi");
}
