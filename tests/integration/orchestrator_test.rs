//! Orchestrator integration tests: gating discipline, all-settled cohort
//! joins, outcome classification, cancellation, and single-phase retry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use diligence_core::models::phase::{PhaseKey, PhaseRegistry, PhaseState};
use diligence_core::models::run::AnalysisInput;
use diligence_core::services::client::{AnalysisClient, ClientError};
use diligence_core::services::orchestrator::{AnalysisEvent, Orchestrator};

use crate::support::{all_ok_clients, MockClient};

fn url_input() -> AnalysisInput {
    AnalysisInput::from_url("https://acme.example", "Alice")
}

async fn drain_until_terminal(rx: &mut mpsc::Receiver<AnalysisEvent>) -> Vec<AnalysisEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = matches!(
            event,
            AnalysisEvent::Completed { .. }
                | AnalysisEvent::PartialCompleted { .. }
                | AnalysisEvent::Failed { .. }
                | AnalysisEvent::Cancelled { .. }
        );
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

#[tokio::test]
async fn test_url_only_run_gates_then_fans_out() {
    let (orchestrator, mut rx) = Orchestrator::new(all_ok_clients(), PhaseRegistry::default());
    orchestrator.start(url_input()).await.unwrap();
    let events = drain_until_terminal(&mut rx).await;

    let overview_at = events
        .iter()
        .position(|e| matches!(e, AnalysisEvent::OverviewReady { .. }))
        .expect("overview event expected");

    // Exactly the five cohort phases start, all strictly after the
    // overview is banked
    let mut cohort_started = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if let AnalysisEvent::PhaseStarted { phase } = event {
            if !phase.is_gating() {
                assert!(i > overview_at, "{} started before overview", phase);
                cohort_started.push(*phase);
            }
        }
    }
    cohort_started.sort_by_key(|k| k.as_str());
    let mut expected = PhaseKey::COHORT.to_vec();
    expected.sort_by_key(|k| k.as_str());
    assert_eq!(cohort_started, expected);

    assert!(matches!(
        events.last().unwrap(),
        AnalysisEvent::Completed { .. }
    ));
}

#[tokio::test]
async fn test_gating_timeout_ends_run_without_cohort() {
    let mut clients = all_ok_clients();
    let team = MockClient::ok("team", json!({}));
    clients.insert(PhaseKey::Team, team.clone());
    clients.insert(
        PhaseKey::Company,
        MockClient::failing("company", ClientError::Timeout { seconds: 720 }),
    );

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    orchestrator.start(url_input()).await.unwrap();
    let events = drain_until_terminal(&mut rx).await;

    assert!(matches!(
        events.last().unwrap(),
        AnalysisEvent::Failed { .. }
    ));
    assert!(!events.iter().any(
        |e| matches!(e, AnalysisEvent::PhaseStarted { phase } if !phase.is_gating())
    ));
    assert_eq!(team.call_count(), 0);

    let snapshot = orchestrator.run_snapshot().await.unwrap();
    for key in PhaseKey::COHORT {
        assert_eq!(snapshot.phase(key).unwrap().state, PhaseState::Pending);
    }
}

#[tokio::test]
async fn test_single_cohort_failure_yields_partial_complete() {
    let mut clients = all_ok_clients();
    clients.insert(
        PhaseKey::Market,
        MockClient::failing(
            "market",
            ClientError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            },
        ),
    );

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    orchestrator.start(url_input()).await.unwrap();
    let events = drain_until_terminal(&mut rx).await;

    match events.last().unwrap() {
        AnalysisEvent::PartialCompleted { failed_phases, .. } => {
            assert_eq!(failed_phases, &vec![PhaseKey::Market]);
        }
        other => panic!("expected PartialCompleted, got {:?}", other),
    }

    // The four successful cohort results arrived well-formed
    for key in [
        PhaseKey::Team,
        PhaseKey::Funding,
        PhaseKey::Competitive,
        PhaseKey::IpRisk,
    ] {
        let completed = events.iter().any(|e| {
            matches!(e, AnalysisEvent::PhaseCompleted { phase, result }
                if *phase == key && result["dimension"] == key.as_str())
        });
        assert!(completed, "missing completed result for {}", key);
    }
}

#[tokio::test]
async fn test_cohort_calls_carry_banked_brief() {
    let mut clients = all_ok_clients();
    let team = MockClient::ok("team", json!({}));
    clients.insert(PhaseKey::Team, team.clone());

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    orchestrator.start(url_input()).await.unwrap();
    drain_until_terminal(&mut rx).await;

    let requests = team.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].brief.as_deref(), Some("Acme builds anvils"));
    assert_eq!(requests[0].input, "https://acme.example");
}

#[tokio::test]
async fn test_retry_leaves_siblings_untouched() {
    let mut clients = all_ok_clients();
    clients.insert(
        PhaseKey::Market,
        MockClient::scripted(
            "market",
            vec![
                Err(ClientError::Network {
                    message: "connection reset".to_string(),
                }),
                Ok(json!({"dimension": "market"})),
            ],
        ),
    );

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    orchestrator.start(url_input()).await.unwrap();
    drain_until_terminal(&mut rx).await;

    let before = orchestrator.run_snapshot().await.unwrap();
    orchestrator.retry_phase(PhaseKey::Market).await.unwrap();
    let events = drain_until_terminal(&mut rx).await;
    let after = orchestrator.run_snapshot().await.unwrap();

    for key in [
        PhaseKey::Company,
        PhaseKey::Team,
        PhaseKey::Funding,
        PhaseKey::Competitive,
        PhaseKey::IpRisk,
    ] {
        let b = before.phase(key).unwrap();
        let a = after.phase(key).unwrap();
        assert_eq!(a.state, b.state, "{} state changed by retry", key);
        assert_eq!(a.started_at, b.started_at, "{} restarted by retry", key);
        assert_eq!(a.ended_at, b.ended_at);
    }
    assert_eq!(
        after.phase(PhaseKey::Market).unwrap().state,
        PhaseState::Completed
    );
    assert!(matches!(
        events.last().unwrap(),
        AnalysisEvent::Completed { .. }
    ));
}

#[tokio::test]
async fn test_retry_reuses_brief_without_rerunning_gating() {
    let mut clients = all_ok_clients();
    let company = MockClient::ok("company", json!({"summary": "Acme builds anvils"}));
    clients.insert(PhaseKey::Company, company.clone());
    let market = MockClient::scripted(
        "market",
        vec![
            Err(ClientError::Timeout { seconds: 600 }),
            Ok(json!({"dimension": "market"})),
        ],
    );
    clients.insert(PhaseKey::Market, market.clone());

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    orchestrator.start(url_input()).await.unwrap();
    drain_until_terminal(&mut rx).await;
    orchestrator.retry_phase(PhaseKey::Market).await.unwrap();
    drain_until_terminal(&mut rx).await;

    assert_eq!(company.call_count(), 1);
    let requests = market.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].brief.as_deref(), Some("Acme builds anvils"));
}

#[tokio::test]
async fn test_cancellation_keeps_completed_results() {
    let mut clients: HashMap<PhaseKey, Arc<dyn AnalysisClient>> = all_ok_clients();
    for key in [PhaseKey::Funding, PhaseKey::Competitive, PhaseKey::Market] {
        clients.insert(key, MockClient::slow(key.as_str(), json!({}), 10_000));
    }

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    let handle = orchestrator.start(url_input()).await.unwrap();

    // Let the fast team phase finish, then cancel the rest
    while let Some(event) = rx.recv().await {
        if matches!(event, AnalysisEvent::PhaseCompleted { phase, .. } if phase == PhaseKey::Team) {
            break;
        }
    }
    handle.cancel();
    let events = drain_until_terminal(&mut rx).await;

    assert!(matches!(
        events.last().unwrap(),
        AnalysisEvent::Cancelled { .. }
    ));
    let snapshot = orchestrator.run_snapshot().await.unwrap();
    assert!(snapshot.cancelled);
    assert_eq!(
        snapshot.phase(PhaseKey::Company).unwrap().state,
        PhaseState::Completed
    );
    assert_eq!(
        snapshot.phase(PhaseKey::Team).unwrap().state,
        PhaseState::Completed
    );
    assert_eq!(
        snapshot.phase(PhaseKey::Market).unwrap().state,
        PhaseState::Error
    );
}

#[tokio::test]
async fn test_document_only_input_accepted() {
    use diligence_core::models::run::DocumentRef;

    let mut clients = all_ok_clients();
    let company = MockClient::ok("company", json!({"summary": "Acme builds anvils"}));
    clients.insert(PhaseKey::Company, company.clone());

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    let input = AnalysisInput::from_document(
        DocumentRef {
            file_name: "acme-deck.pdf".to_string(),
            text: "Acme pitch deck contents".to_string(),
        },
        "Alice",
    );
    orchestrator.start(input).await.unwrap();
    let events = drain_until_terminal(&mut rx).await;

    assert!(matches!(
        events.last().unwrap(),
        AnalysisEvent::Completed { .. }
    ));
    // The gating call sees the document text and the attachment
    let requests = company.requests();
    assert_eq!(requests[0].input, "Acme pitch deck contents");
    assert!(requests[0].document.is_some());
}
