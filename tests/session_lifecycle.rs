//! ---
//! updraft_section: "06-testing-qa"
//! updraft_subsection: "integration-tests"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "End-to-end update session lifecycle against the in-memory backend."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use updraft_api::wire::{
    ConfigValue, EngineEvent, EngineEventBatch, RequiredPolicy, TagMap, UpdateStatus,
};
use updraft_api::{StackIdentifier, UpdateKind};
use updraft_core::testing::{minimal_program_request, MockBackend};
use updraft_core::{read_all_events, StackBackend, TerminalState, UpdateSession};

fn event(sequence: u64) -> EngineEvent {
    EngineEvent {
        sequence,
        timestamp: Utc::now(),
        payload: json!({"step": sequence}),
    }
}

#[tokio::test]
async fn full_update_lifecycle_reaches_completion() {
    let mock = Arc::new(MockBackend::new());
    let stack = StackIdentifier::new("acme", "website", "prod");
    mock.create_stack(&stack, TagMap::new()).await.unwrap();

    let mut request = minimal_program_request();
    request.config.insert(
        "website:region".to_owned(),
        ConfigValue::plaintext("eu-west-1"),
    );
    request.config.insert(
        "website:dbPassword".to_owned(),
        ConfigValue::secret("AAAAB3NzaC1lZDI1"),
    );

    let session = UpdateSession::create(mock.clone(), stack.clone(), UpdateKind::Update, request)
        .await
        .unwrap();
    assert!(session.required_policies().is_empty());
    let update = session.update().clone();

    let mut tags = TagMap::new();
    tags.insert("env".to_owned(), "production".to_owned());
    let started = session.start(tags.clone()).await.unwrap();
    assert_eq!(started.stack_version(), 1);

    let running = started.run(Duration::from_secs(60));

    // Checkpoint as the operation progresses; every submission carries the
    // complete snapshot.
    for step in 1..=3usize {
        let resources: Vec<_> = (0..step)
            .map(|index| json!({"urn": format!("res-{index}")}))
            .collect();
        running
            .checkpoint(json!({"resources": resources}))
            .await
            .unwrap();
    }

    // Ship the event stream in production order.
    let sequences: Vec<u64> = (0..10).collect();
    for chunk in sequences.chunks(3) {
        running
            .record_events(EngineEventBatch {
                events: chunk.iter().map(|&sequence| event(sequence)).collect(),
            })
            .await
            .unwrap();
    }

    running.complete(UpdateStatus::Succeeded).await.unwrap();
    assert_eq!(running.terminal_state(), Some(TerminalState::Completed));
    assert_eq!(
        mock.terminal_status(&update.update_id),
        Some(UpdateStatus::Succeeded)
    );

    // The stored checkpoint is the last full snapshot submitted.
    let stored = mock.stored_checkpoint(&update.update_id).unwrap();
    assert_eq!(stored["resources"].as_array().unwrap().len(), 3);

    // Start replaced the stack's tag set atomically.
    let fetched = mock.get_stack(&stack).await.unwrap();
    assert_eq!(fetched.tags, tags);

    // The first-run condition has cleared: latest configuration is now the
    // one submitted with this update, secrets still opaque.
    let config = mock.get_latest_configuration(&stack).await.unwrap();
    assert_eq!(config.get("website:region").unwrap().value, "eu-west-1");
    assert!(config.get("website:dbPassword").unwrap().secret);

    // Reading the stream back in pages reassembles the original order.
    mock.set_page_size(3);
    let events = read_all_events(mock.as_ref(), &update).await.unwrap();
    let recovered: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    assert_eq!(recovered, sequences);
}

#[tokio::test]
async fn abort_path_cancels_exactly_once() {
    let mock = Arc::new(MockBackend::new());
    let stack = StackIdentifier::new("acme", "website", "staging");
    mock.create_stack(&stack, TagMap::new()).await.unwrap();

    let session = UpdateSession::create(
        mock.clone(),
        stack,
        UpdateKind::Destroy,
        minimal_program_request(),
    )
    .await
    .unwrap();
    let update = session.update().clone();
    let running = session
        .start(TagMap::new())
        .await
        .unwrap()
        .run(Duration::from_secs(60));

    running.checkpoint(json!({"resources": []})).await.unwrap();

    running.cancel().await.unwrap();
    assert!(mock.update_canceled(&update.update_id));

    // Repeated terminal calls are no-ops in either order.
    running.cancel().await.unwrap();
    running.complete(UpdateStatus::Failed).await.unwrap();
    assert_eq!(running.terminal_state(), Some(TerminalState::Canceled));
    assert!(mock.update_canceled(&update.update_id));

    // A canceled session refuses further submissions.
    let err = running
        .checkpoint(json!({"resources": []}))
        .await
        .unwrap_err();
    assert!(matches!(err, updraft_core::BackendError::Closed));
}

#[tokio::test]
async fn required_policies_are_passed_through_at_creation() {
    let mock = Arc::new(MockBackend::new());
    let stack = StackIdentifier::new("acme", "website", "prod");
    mock.create_stack(&stack, TagMap::new()).await.unwrap();
    mock.set_required_policies(vec![RequiredPolicy {
        name: "security-baseline".to_owned(),
        version: 4,
        pack_location: Some("policies/security-baseline".to_owned()),
    }]);

    let session = UpdateSession::create(
        mock.clone(),
        stack,
        UpdateKind::Preview,
        minimal_program_request(),
    )
    .await
    .unwrap();

    let policies = session.required_policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].name, "security-baseline");
    assert_eq!(policies[0].version, 4);
}
