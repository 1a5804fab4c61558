//! HTTP-level tests for the version-control API.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`
//! against a seeded in-memory service.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use eam_test_utils::{seeded_service, Harness, ADMIN, ALICE, BOB, VIEWER};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let Harness { vc, .. } = seeded_service();
    eam_server::router(Arc::new(vc))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(eam_server::USER_HEADER, user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn checkout_body(initiative: &str) -> Value {
    json!({"artifactType": "application", "artifactId": 42, "initiativeId": initiative})
}

fn checkin_body(initiative: &str, name: &str) -> Value {
    json!({
        "artifactType": "application",
        "artifactId": 42,
        "initiativeId": initiative,
        "changes": {"name": name},
        "changeDescription": "rename",
    })
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

/// Second checkout is a 409 naming the holder.
#[tokio::test]
async fn checkout_conflict_returns_holder() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock"]["lockedBy"], ALICE.0);
    assert_eq!(body["lock"]["initiativeId"], "I-100");

    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(BOB.0),
        Some(checkout_body("I-200")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "lock_conflict");
    assert_eq!(body["conflict"]["lockedByUser"], "alice");
    assert_eq!(body["conflict"]["initiativeId"], "I-100");
}

/// Checkin returns the shadow and releases the lock; a repeat is 412.
#[tokio::test]
async fn checkin_then_stale_checkin() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Renamed App")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artifact"]["name"], "Renamed App");
    assert_eq!(body["artifact"]["state"], "initiative_changes");
    assert_eq!(body["shadow"]["versionNumber"], 1);
    assert_eq!(body["changedFields"], json!(["name"]));
    assert_eq!(body["conflict"], Value::Null);

    let (status, body) = send(&app, Method::GET, "/version-control/locks", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Again")),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "stale_lock");
}

#[tokio::test]
async fn viewer_is_forbidden() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(VIEWER.0),
        Some(checkout_body("I-100")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");
}

#[tokio::test]
async fn missing_or_bad_identity() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkout",
        None,
        Some(checkout_body("I-100")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let request = Request::builder()
        .method(Method::GET)
        .uri("/artifacts/application")
        .header(eam_server::USER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_payloads_are_400() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(json!({
            "artifactType": "application",
            "artifactId": 42,
            "initiativeId": "I-100",
            "changes": {},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = send(&app, Method::GET, "/artifacts/widget", Some(ALICE.0), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_entities_are_404() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/artifacts/application/999",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "artifact_not_found");

    let (status, _) = send(&app, Method::GET, "/initiatives/I-404", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Lock listing filters by initiative and resolves names.
#[tokio::test]
async fn locks_listing_and_admin_release() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;

    let (_, body) = send(
        &app,
        Method::GET,
        "/version-control/locks?initiativeId=I-100",
        None,
        None,
    )
    .await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["user"]["username"], "alice");
    assert_eq!(body[0]["artifactName"], "Billing");

    let (_, body) = send(
        &app,
        Method::GET,
        "/version-control/locks?initiativeId=I-200",
        None,
        None,
    )
    .await;
    assert_eq!(body, json!([]));

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/version-control/locks/application/42",
        Some(BOB.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/version-control/locks/application/42",
        Some(ADMIN.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"]["lockedBy"], ALICE.0);
}

/// Production view hides the shadow; the initiative view shows it.
#[tokio::test]
async fn artifact_reads_follow_view_context() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Billing Hub")),
    )
    .await;

    let (_, production) = send(
        &app,
        Method::GET,
        "/artifacts/application/42",
        Some(BOB.0),
        None,
    )
    .await;
    assert_eq!(production["name"], "Billing");
    assert_eq!(production["source"], "baseline");

    let (_, working) = send(
        &app,
        Method::GET,
        "/artifacts/application/42?initiativeId=I-100",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(working["name"], "Billing Hub");
    assert_eq!(working["source"], "shadow");

    let (_, listed) = send(
        &app,
        Method::GET,
        "/artifacts/application?state=initiative_changes",
        Some(BOB.0),
        None,
    )
    .await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

/// Create, status change, completion and the audit trail over HTTP.
#[tokio::test]
async fn initiative_flow_over_http() {
    let app = app();
    let (status, created) = send(
        &app,
        Method::POST,
        "/initiatives",
        Some(ALICE.0),
        Some(json!({"initiativeId": "I-300", "name": "Data platform"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "active");

    let (status, detail) = send(&app, Method::GET, "/initiatives/I-300", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["participants"][0]["role"], "lead");

    let (status, _) = send(
        &app,
        Method::POST,
        "/initiatives/I-300/participants",
        Some(ALICE.0),
        Some(json!({"userId": BOB.0, "role": "developer"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(BOB.0),
        Some(checkout_body("I-300")),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(BOB.0),
        Some(checkin_body("I-300", "Billing Platform")),
    )
    .await;

    let (_, changes) = send(&app, Method::GET, "/initiatives/I-300/changes", None, None).await;
    assert_eq!(changes.as_array().map(Vec::len), Some(1));

    let (status, _) = send(
        &app,
        Method::POST,
        "/initiatives/I-300/complete",
        Some(BOB.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = send(
        &app,
        Method::POST,
        "/initiatives/I-300/complete",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["initiative"]["status"], "completed");

    let (_, promoted) = send(
        &app,
        Method::GET,
        "/artifacts/application/42",
        Some(BOB.0),
        None,
    )
    .await;
    assert_eq!(promoted["name"], "Billing Platform");
    assert_eq!(promoted["revision"], 2);

    let (status, trail) = send(
        &app,
        Method::GET,
        "/audit?artifactType=application&artifactId=42",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = trail
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert_eq!(actions, vec!["checkout", "checkin"]);

    let (status, _) = send(&app, Method::GET, "/audit?artifactType=application", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Overlapping production edit surfaces as a conflict and blocks completion.
#[tokio::test]
async fn conflicts_over_http() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Billing Hub")),
    )
    .await;
    let (status, _) = send(
        &app,
        Method::PATCH,
        "/artifacts/application/42",
        Some(ADMIN.0),
        Some(json!({"name": "Billing Prod"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, pending) = send(
        &app,
        Method::POST,
        "/initiatives/I-100/detect-conflicts",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(pending.as_array().map(Vec::len), Some(1));
    let id = pending[0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/initiatives/I-100/complete",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "unresolved_conflicts");

    let (status, resolved) = send(
        &app,
        Method::POST,
        &format!("/conflicts/{id}/resolve"),
        Some(ALICE.0),
        Some(json!({"strategy": "accept_production"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");

    let (_, listed) = send(&app, Method::GET, "/initiatives/I-100/conflicts", None, None).await;
    assert_eq!(listed[0]["resolution"], "accept_production");
}

/// Extractor failures use the same JSON envelope as service errors.
#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(json!({"artifactType": "application", "artifactId": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert_eq!(body["retryable"], false);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("initiativeId")));

    let (status, body) = send(
        &app,
        Method::GET,
        "/artifacts/application/not-a-number",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, body) = send(
        &app,
        Method::GET,
        "/artifacts/application?productionView=maybe",
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/version-control/checkout")
        .header(eam_server::USER_HEADER, ALICE.0.to_string())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "bad_request");
}

/// A lock released by an admin and re-acquired is 412 for the old holder.
#[tokio::test]
async fn checkin_after_takeover_is_412() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;
    send(
        &app,
        Method::DELETE,
        "/version-control/locks/application/42",
        Some(ADMIN.0),
        None,
    )
    .await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(BOB.0),
        Some(checkout_body("I-200")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Billing Hub")),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "stale_lock");
}

/// Production revisions and comparisons are readable over HTTP.
#[tokio::test]
async fn version_history_over_http() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::PATCH,
        "/artifacts/application/42",
        Some(ADMIN.0),
        Some(json!({"name": "Billing Prod"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, history) = send(
        &app,
        Method::GET,
        "/artifacts/application/42/versions",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["revisions"].as_array().map(Vec::len), Some(2));
    assert_eq!(history["revisions"][1]["changedFields"], json!(["name"]));

    let (status, cmp) = send(
        &app,
        Method::GET,
        "/audit/compare-versions?artifactType=application&artifactId=42&from=1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cmp["to"], "current");
    assert_eq!(cmp["changes"][0]["field"], "name");
    assert_eq!(cmp["changes"][0]["from"], "Billing");
    assert_eq!(cmp["changes"][0]["to"], "Billing Prod");

    let (status, body) = send(
        &app,
        Method::GET,
        "/audit/compare-versions?artifactType=application&artifactId=42&from=r9",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send(
        &app,
        Method::GET,
        "/audit/compare-versions?artifactType=application&artifactId=42&from=yesterday",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

/// Auto-resolve refuses fields needing review until they are accepted.
#[tokio::test]
async fn auto_resolve_over_http() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Billing Hub")),
    )
    .await;
    send(
        &app,
        Method::PATCH,
        "/artifacts/application/42",
        Some(ADMIN.0),
        Some(json!({"name": "Billing Prod"})),
    )
    .await;
    let (_, pending) = send(
        &app,
        Method::POST,
        "/initiatives/I-100/detect-conflicts",
        Some(ALICE.0),
        None,
    )
    .await;
    let id = pending[0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/initiatives/I-100/conflicts/{id}/auto-resolve"),
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/initiatives/I-200/conflicts/{id}/auto-resolve"),
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "conflict_not_found");

    let (status, outcome) = send(
        &app,
        Method::POST,
        &format!("/initiatives/I-100/conflicts/{id}/auto-resolve?acceptReview=true"),
        Some(ALICE.0),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["conflict"]["status"], "resolved");
    assert_eq!(outcome["conflict"]["resolution"], "auto_merge");
    assert_eq!(outcome["merges"][0]["field"], "name");
    assert_eq!(outcome["merges"][0]["strategy"], "manual");
    assert_eq!(outcome["merges"][0]["requiresReview"], true);
}

/// Dependency graph and impact report read the initiative's view.
#[tokio::test]
async fn dependencies_and_impact_over_http() {
    let app = app();
    let (status, iface) = send(
        &app,
        Method::POST,
        "/artifacts/interface",
        Some(ADMIN.0),
        Some(json!({
            "imlNumber": "IML-0042",
            "interfaceType": "REST",
            "version": "1.0",
            "providerApplicationId": 42,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let iface_id = iface["artifactId"].as_i64().unwrap();

    send(
        &app,
        Method::POST,
        "/version-control/checkout",
        Some(ALICE.0),
        Some(checkout_body("I-100")),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/version-control/checkin",
        Some(ALICE.0),
        Some(checkin_body("I-100", "Billing Hub")),
    )
    .await;

    let (status, graph) = send(
        &app,
        Method::GET,
        "/initiatives/I-100/dependencies/application/42",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["nodes"][0]["name"], "Billing Hub");
    assert_eq!(graph["nodes"][1]["artifactId"], iface_id);
    assert_eq!(graph["edges"][0]["type"], "provides");
    assert_eq!(graph["impactAnalysis"]["riskLevel"], "low");

    let (status, report) = send(
        &app,
        Method::GET,
        "/initiatives/I-100/impact-report",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["initiativeId"], "I-100");
    assert_eq!(report["totalImpacts"], 1);
    assert_eq!(report["affectedArtifacts"][0]["artifactType"], "interface");
    assert_eq!(report["affectedArtifacts"][0]["reason"], "modified application#42");

    let (status, body) = send(
        &app,
        Method::GET,
        "/initiatives/I-100/dependencies/application/404",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "artifact_not_found");
}
