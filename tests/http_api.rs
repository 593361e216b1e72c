use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use cdp_adapter::memory::{MemoryDocument, NodeSpec};
use serde_json::{json, Value};
use stepwise_cli::server::{build_router, ServeState};
use stepwise_cli::{Config, EngineService};
use tokio::time::{sleep, Duration};
use tower::ServiceExt;

const LAUNCHER: &str = "div.appLauncher button";
const SEARCH: &str = "one-app-launcher-menu input[type='search']";
const DIRECT_NEW: &str = "a[title='New']";

fn router_with(doc: MemoryDocument) -> (Arc<MemoryDocument>, Router) {
    let doc = Arc::new(doc);
    let mut config = Config::default();
    config.engine.step_pacing_ms = 0;
    let service = EngineService::new(doc.clone(), &config).unwrap();
    (doc, build_router(ServeState::new(Arc::new(service))))
}

fn post(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(start_paused = true)]
async fn run_plan_executes_every_step() {
    let (doc, router) = router_with(
        MemoryDocument::new()
            .with_node(NodeSpec::new("input[name='Name']").tag("input"))
            .with_node(NodeSpec::new("select[name='Stage']").tag("select"))
            .with_node(NodeSpec::new("button[name='SaveEdit']").tag("button")),
    );
    let plan = json!([
        { "action": "type", "details": { "selector": "input[name='Name']", "text": "Acme" } },
        { "action": "selectByValue", "details": { "selector": "select[name='Stage']", "value": "won" } },
        { "action": "hover", "details": { "selector": "#menu" } },
        { "action": "click", "details": { "selector": ["#save", "button[name='SaveEdit']"] } }
    ]);

    let response = router.oneshot(post("/run-plan", plan.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["stepsExecuted"], 3);
    assert!(body["message"].as_str().unwrap().contains("skipped 1"));
    assert_eq!(doc.value_of("input[name='Name']").as_deref(), Some("Acme"));
    assert_eq!(doc.value_of("select[name='Stage']").as_deref(), Some("won"));
    assert_eq!(doc.clicks("button[name='SaveEdit']"), 1);
}

#[tokio::test(start_paused = true)]
async fn run_plan_accepts_wrapped_plan_with_workflow() {
    let (doc, router) = router_with(
        MemoryDocument::new()
            .with_node(NodeSpec::new(LAUNCHER).tag("button"))
            .with_node(NodeSpec::new(SEARCH).tag("input").revealed_by(LAUNCHER))
            .with_node(
                NodeSpec::new("a[data-label='Opportunity']")
                    .tag("a")
                    .revealed_by(LAUNCHER),
            )
            .with_node(
                NodeSpec::new(DIRECT_NEW)
                    .tag("a")
                    .revealed_by("a[data-label='Opportunity']"),
            ),
    );
    let body = json!({
        "actionPlan": [
            { "action": "app_launcher", "details": { "objectName": "Opportunity" } }
        ]
    });

    let response = router.oneshot(post("/run-plan", body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["stepsExecuted"], 1);
    assert_eq!(doc.value_of(SEARCH).as_deref(), Some("Opportunity"));
    assert_eq!(doc.clicks(DIRECT_NEW), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_step_reports_its_index() {
    let (_doc, router) = router_with(MemoryDocument::new().with_node(NodeSpec::new("#first")));
    let plan = json!([
        { "action": "click", "details": { "selector": "#first" } },
        { "action": "waitForVisible", "details": { "selector": "#never", "timeout": 800 } },
        { "action": "click", "details": { "selector": "#first" } }
    ]);

    let response = router.oneshot(post("/run-plan", plan.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["stepIndex"], 2);
    assert!(body["message"].as_str().unwrap().contains("#never"));
}

#[tokio::test]
async fn malformed_and_invalid_plans_are_bad_requests() {
    let (_doc, router) = router_with(MemoryDocument::new());

    let response = router
        .clone()
        .oneshot(post("/run-plan", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(post(
            "/run-plan",
            json!([{ "action": "type", "details": { "selector": "#x" } }]).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("requires text"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_run_is_rejected() {
    let (_doc, router) = router_with(MemoryDocument::new());
    let slow = json!([{ "action": "sleep", "details": { "ms": 5000 } }]).to_string();

    let first = {
        let router = router.clone();
        let slow = slow.clone();
        tokio::spawn(async move { router.oneshot(post("/run-plan", slow)).await.unwrap() })
    };
    sleep(Duration::from_millis(10)).await;

    let status = json_body(router.clone().oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(status["state"], "running");

    let second = router.clone().oneshot(post("/run-plan", slow)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    assert_eq!(first.await.unwrap().status(), StatusCode::OK);
    let status = json_body(router.oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(status["state"], "succeeded");
}

#[tokio::test]
async fn message_surface_round_trip() {
    let (_doc, router) = router_with(MemoryDocument::new().with_node(NodeSpec::new("#go")));

    let response = router
        .clone()
        .oneshot(post(
            "/message",
            json!({
                "action": "executeAutomation",
                "actionPlan": [{ "action": "click", "details": { "selector": "#go" } }]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["status"], "success");

    let body = json_body(
        router
            .oneshot(post(
                "/message",
                json!({ "action": "generatePlan", "instruction": "new contact" }).to_string(),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn malformed_message_gets_surface_reply() {
    let (_doc, router) = router_with(MemoryDocument::new());
    let request = Request::builder()
        .method("POST")
        .uri("/message")
        .header("content-type", "text/plain")
        .body(Body::from("not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Malformed message"));
}

#[tokio::test]
async fn generate_plan_without_generator_is_unavailable() {
    let (_doc, router) = router_with(MemoryDocument::new());
    let response = router
        .oneshot(post(
            "/generate-plan",
            json!({ "instruction": "create an account" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_and_metrics_are_exposed() {
    let (_doc, router) = router_with(MemoryDocument::new());

    let health = json_body(router.clone().oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["running"], false);
    assert_eq!(health["generator"], false);

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("stepwise_"));
}
