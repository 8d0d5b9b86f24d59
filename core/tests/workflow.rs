//! Upload check end-to-end against the mock server.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use mock_server::AppState;
use sketch_client::{run_upload, ClientConfig, ClientError, UploadOptions};

fn config_for(server: &str, vars: &[(&str, &str)]) -> Result<ClientConfig, ClientError> {
    let mut vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.insert("SKETCH_API_BASE_URL".to_string(), server.to_string());
    ClientConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn upload_check_with_cookie_keeps_the_sketch() {
    let addr = common::spawn_server(Arc::new(AppState::default()));
    let url = common::api_url(addr);
    let client = config_for(&url, &[("SKETCH_SESSION_COOKIE", "alice-session")])
        .unwrap()
        .into_client()
        .unwrap();

    let options = UploadOptions {
        name: "Smoke".to_string(),
        cleanup: false,
    };
    let report = run_upload(&client, &options).unwrap();

    assert_eq!(report.access, Some(true));
    assert_eq!(report.project.name, "Smoke - updated");
    let sketch = report
        .project
        .files
        .iter()
        .find(|f| f.name == "sketch.js")
        .unwrap();
    assert!(sketch.content.contains("rotate(angle)"));
    assert_eq!(report.project.files.len(), 2);

    let origin = format!("http://{addr}");
    assert_eq!(
        report.sketch_url.as_deref(),
        Some(format!("{origin}/alice/sketches/{}", report.project.id).as_str())
    );
    assert_eq!(
        report.full_view_url.as_deref(),
        Some(format!("{origin}/alice/full/{}", report.project.id).as_str())
    );
    assert_eq!(report.listed.len(), 1);
    assert!(!report.deleted);
    assert!(client.get_project(&report.project.id).is_ok());
}

#[test]
fn upload_check_with_token_and_cleanup() {
    let addr = common::spawn_server(Arc::new(AppState::default()));
    let client = config_for(
        &common::api_url(addr),
        &[
            ("SKETCH_USE_TOKEN_AUTH", "true"),
            ("SKETCH_USERNAME", "bob"),
            ("SKETCH_ACCESS_TOKEN", "bob-token"),
        ],
    )
    .unwrap()
    .into_client()
    .unwrap();

    let options = UploadOptions {
        cleanup: true,
        ..UploadOptions::default()
    };
    let report = run_upload(&client, &options).unwrap();

    assert!(report.deleted);
    assert_eq!(report.project.owner_username(), Some("bob"));
    let err = client.get_project(&report.project.id).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn upload_check_stops_on_rejected_credential() {
    let addr = common::spawn_server(Arc::new(AppState::default()));
    let client = config_for(&common::api_url(addr), &[("SKETCH_SESSION_COOKIE", "expired")])
        .unwrap()
        .into_client()
        .unwrap();

    let err = run_upload(&client, &UploadOptions::default()).unwrap_err();
    assert_eq!(err.status(), Some(401));
}
