//! Project submission integration tests.
//!
//! Run with: cargo test --test submission_test -- --ignored
//! Requires a running Aero server.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

fn base_url() -> String {
    std::env::var("AERO_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn square(x: f64, y: f64, size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
    })
}

/// Submitting a project that overlaps a protection area yields a conflict.
#[tokio::test]
#[ignore]
async fn test_submission_reports_conflict() {
    let client = Client::new();
    let base = base_url();
    let suffix = chrono::Utc::now().timestamp_millis();

    // Offset far from anything else stored on the server
    let origin = 100.0 + (suffix % 1000) as f64 * 0.01;
    let resp = client.post(format!("{}/v1/procedures", base))
        .json(&json!({
            "procedure_code": format!("LIVE-{}", suffix),
            "name": "Live test approach",
            "procedure_type": "APPROACH",
            "airport_icao": "LFBO",
            "protection_name": "Live Zone",
            "protection_geometry": square(origin + 0.5, 0.5, 1.0)
        }))
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let procedure: Value = resp.json().await.unwrap();

    let resp = client.post(format!("{}/v1/projects", base))
        .json(&json!({ "title": format!("Live submission {}", suffix) }))
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let project: Value = resp.json().await.unwrap();
    let project_id = project["id"].as_i64().unwrap();

    let resp = client.post(format!("{}/v1/projects/{}/submit", base, project_id))
        .json(&json!({ "geometry": square(origin, 0.0, 1.0) }))
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    // Wait for the background analysis
    let mut status = Value::Null;
    for _ in 0..50 {
        sleep(Duration::from_millis(200)).await;
        let project: Value = client.get(format!("{}/v1/projects/{}", base, project_id))
            .send().await.unwrap()
            .json().await.unwrap();
        status = project["status"].clone();
        if status == "under_review" {
            break;
        }
    }
    assert_eq!(status, "under_review");

    let conflicts: Vec<Value> = client.get(format!("{}/v1/projects/{}/conflicts", base, project_id))
        .send().await.unwrap()
        .json().await.unwrap();
    assert!(conflicts
        .iter()
        .any(|c| c["flight_procedure_id"] == procedure["id"]));
}
