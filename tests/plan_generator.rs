use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use stepwise_cli::llm::{GenerationError, OpenAiConfig, OpenAiPlanGenerator, PlanGenerator};
use stepwise_core_types::{PlanEntry, Step};
use tokio::net::TcpListener;

#[derive(Clone)]
struct Mock {
    reply: Arc<dyn Fn(&HeaderMap) -> (StatusCode, Value) + Send + Sync>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

async fn completions(State(mock): State<Mock>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    mock.calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(mock.delay).await;
    let (status, body) = (mock.reply)(&headers);
    (status, Json(body))
}

async fn spawn_mock(mock: Mock) -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn generator(addr: SocketAddr, keys: &[&str], timeout: Duration) -> OpenAiPlanGenerator {
    OpenAiPlanGenerator::new(OpenAiConfig {
        api_keys: keys.iter().map(|key| key.to_string()).collect(),
        model: "gpt-4o-mini".to_string(),
        api_base: format!("http://{}/v1", addr),
        temperature: 0.0,
        timeout,
    })
    .unwrap()
}

fn completion(content: &str) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn mock(reply: impl Fn(&HeaderMap) -> (StatusCode, Value) + Send + Sync + 'static) -> Mock {
    Mock {
        reply: Arc::new(reply),
        delay: Duration::ZERO,
        calls: Arc::new(AtomicUsize::new(0)),
    }
}

#[tokio::test]
async fn generates_plan_from_wrapped_payload() {
    let addr = spawn_mock(mock(|_| {
        let plan = json!({
            "actionPlan": [
                { "action": "app_launcher", "details": { "objectName": "Account" } },
                { "action": "type", "details": { "selector": "input[name='Name']", "text": "Acme" } }
            ]
        });
        (StatusCode::OK, completion(&plan.to_string()))
    }))
    .await;

    let plan = generator(addr, &["sk-test"], Duration::from_secs(5))
        .generate("create an account called Acme")
        .await
        .unwrap();

    assert_eq!(plan.len(), 2);
    assert!(matches!(
        &plan.entries()[0],
        PlanEntry::Step(Step::LaunchObjectWorkflow { object, .. }) if object == "Account"
    ));
}

#[tokio::test]
async fn slow_service_times_out() {
    let mut slow = mock(|_| (StatusCode::OK, completion("{\"actionPlan\": []}")));
    slow.delay = Duration::from_secs(3);
    let addr = spawn_mock(slow).await;

    let err = generator(addr, &["sk-test"], Duration::from_millis(200))
        .generate("create a lead")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Timeout { timeout_ms: 200 }));
}

#[tokio::test]
async fn refusal_is_a_failure() {
    let addr = spawn_mock(mock(|_| {
        (
            StatusCode::OK,
            json!({
                "choices": [{
                    "message": { "role": "assistant", "content": null, "refusal": "I can't help with that." },
                    "finish_reason": "stop"
                }]
            }),
        )
    }))
    .await;

    let err = generator(addr, &["sk-test"], Duration::from_secs(5))
        .generate("do something")
        .await
        .unwrap_err();

    match err {
        GenerationError::Failed(message) => assert!(message.contains("refused")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn rate_limited_key_rotates_to_next() {
    let limited = mock(|headers| {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if auth.ends_with("sk-first") {
            (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": { "message": "Rate limit reached" } }),
            )
        } else {
            (
                StatusCode::OK,
                completion("```json\n[{\"action\": \"sleep\", \"details\": {\"ms\": 100}}]\n```"),
            )
        }
    });
    let calls = limited.calls.clone();
    let addr = spawn_mock(limited).await;

    let plan = generator(addr, &["sk-first", "sk-second"], Duration::from_secs(5))
        .generate("wait a moment")
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(plan.entries(), &[PlanEntry::Step(Step::pause(100))]);
}

#[tokio::test]
async fn invalid_generated_plan_is_a_failure() {
    let addr = spawn_mock(mock(|_| {
        (
            StatusCode::OK,
            completion("{\"actionPlan\": [{\"action\": \"click\", \"details\": {}}]}"),
        )
    }))
    .await;

    let err = generator(addr, &["sk-test"], Duration::from_secs(5))
        .generate("click something")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("requires a selector"));
}
