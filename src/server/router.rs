use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use stepwise_core_types::{ExecutionResult, PlanError};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::errors::ServiceError;
use crate::llm::GenerationError;
use crate::metrics;
use crate::service::plan_from_body;

use super::state::ServeState;

pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .route("/run-plan", post(run_plan_handler))
        .route("/generate-plan", post(generate_plan_handler))
        .route("/message", post(message_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Body is read as text so malformed JSON gets the same 400 envelope as an invalid plan.
async fn run_plan_handler(State(state): State<ServeState>, body: String) -> impl IntoResponse {
    let plan = match serde_json::from_str::<Value>(&body)
        .map_err(PlanError::from)
        .and_then(plan_from_body)
    {
        Ok(plan) => plan,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string(), None),
    };
    info!(entries = plan.len(), "Plan received");

    match state.service.run_plan(plan).await {
        Ok(ExecutionResult::Success {
            summary,
            steps_executed,
        }) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": summary,
                "stepsExecuted": steps_executed,
            })),
        ),
        Ok(ExecutionResult::Failure {
            step_index,
            message,
        }) => error_response(StatusCode::INTERNAL_SERVER_ERROR, message, Some(step_index)),
        Err(err) => service_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct GeneratePlanRequest {
    instruction: String,
}

async fn generate_plan_handler(State(state): State<ServeState>, body: String) -> impl IntoResponse {
    let request = match serde_json::from_str::<GeneratePlanRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid request: {err}"),
                None,
            )
        }
    };

    match state.service.generate_plan(&request.instruction).await {
        Ok(plan) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "actionPlan": plan,
            })),
        ),
        Err(err) => service_error_response(err),
    }
}

async fn message_handler(State(state): State<ServeState>, body: String) -> Json<Value> {
    let reply = state.surface.handle_text(&body).await;
    Json(serde_json::to_value(reply).unwrap_or_else(|err| {
        json!({ "success": false, "error": format!("failed to encode reply: {err}") })
    }))
}

async fn status_handler(State(state): State<ServeState>) -> Json<Value> {
    Json(json!(state.service.status()))
}

async fn health_handler(State(state): State<ServeState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "running": state.service.status().is_running(),
        "generator": state.service.has_generator(),
    }))
}

async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(err) => {
            error!(?err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn service_error_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        ServiceError::Busy => StatusCode::CONFLICT,
        ServiceError::Plan(_) => StatusCode::BAD_REQUEST,
        ServiceError::Generation(GenerationError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Generation(GenerationError::Failed(_)) => StatusCode::BAD_GATEWAY,
        ServiceError::GeneratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    error_response(status, err.to_string(), None)
}

fn error_response(
    status: StatusCode,
    message: String,
    step_index: Option<usize>,
) -> (StatusCode, Json<Value>) {
    let mut body = json!({
        "status": "error",
        "message": message,
    });
    if let Some(index) = step_index {
        body["stepIndex"] = json!(index);
    }
    (status, Json(body))
}
