//! Tests for driving a photo through the orchestrator from the CLI layer.

#![allow(clippy::unwrap_used)]

mod common;

use common::{FakeRuntime, NOT_PLANT, PLANT, ROSE, photo, ready};
use plantid::cli::OnReject;
use plantid::cli::classify::classify_photo;
use plantid::output::{JsonReporter, Outcome, Reporter};
use std::path::Path;

#[tokio::test]
async fn test_accepted_photo_is_identified() {
    let runtime = FakeRuntime::new(3);
    runtime.push_output("gate", &PLANT);
    runtime.push_output("species", &ROSE);
    let (orchestrator, _dir) = ready(&runtime).await;

    let report = classify_photo(&orchestrator, Path::new("leaf.jpg"), photo(), OnReject::Cancel)
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Identified);
    assert!(!report.bypassed);
    assert!(report.decision.unwrap().accepted);
    assert_eq!(report.species.unwrap().top_label(), "Rosa canina");
}

#[tokio::test]
async fn test_rejected_photo_bypassed() {
    let runtime = FakeRuntime::new(3);
    runtime.push_output("gate", &NOT_PLANT);
    runtime.push_output("species", &ROSE);
    let (orchestrator, _dir) = ready(&runtime).await;

    let report = classify_photo(&orchestrator, Path::new("rock.jpg"), photo(), OnReject::Bypass)
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Identified);
    assert!(report.bypassed);
    assert!(!report.decision.unwrap().accepted);
}

#[tokio::test]
async fn test_rejected_photo_cancelled() {
    let runtime = FakeRuntime::new(3);
    runtime.push_output("gate", &NOT_PLANT);
    let (orchestrator, _dir) = ready(&runtime).await;

    let report = classify_photo(&orchestrator, Path::new("rock.jpg"), photo(), OnReject::Cancel)
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Cancelled);
    assert!(report.species.is_none());
    assert_eq!(report.gate.unwrap().top_label(), "rock");
}

#[tokio::test]
async fn test_failed_session_is_reported_as_json() {
    let runtime = FakeRuntime::new(3);
    let (orchestrator, _dir) = ready(&runtime).await;

    let report = classify_photo(&orchestrator, Path::new("leaf.jpg"), photo(), OnReject::Cancel)
        .await
        .unwrap();
    assert_eq!(report.outcome, Outcome::Failed);

    let mut out = Vec::new();
    JsonReporter.report(&mut out, &report).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["payload"]["outcome"], "failed");
    assert!(
        value["payload"]["error"]
            .as_str()
            .unwrap()
            .contains("no scripted output")
    );
}
