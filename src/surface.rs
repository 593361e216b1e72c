//! Message surface: request/response envelopes exchanged with a UI bridge
//!
//! A request is `{"action": <name>, ...}`; every reply carries `success` and,
//! depending on the action, `result`, `actionPlan` or `error`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepwise_core_types::{ActionPlan, ExecutionResult};
use tracing::debug;

use crate::errors::ServiceError;
use crate::service::{plan_from_body, EngineService};
use crate::status::RunStatus;

#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
pub enum SurfaceRequest {
    #[serde(rename = "executeAutomation")]
    ExecuteAutomation {
        #[serde(rename = "actionPlan")]
        action_plan: Value,
    },
    #[serde(rename = "generatePlan")]
    GeneratePlan { instruction: String },
    #[serde(rename = "getStatus")]
    GetStatus,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_plan: Option<ActionPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SurfaceResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

pub struct MessageSurface {
    service: Arc<EngineService>,
}

impl MessageSurface {
    pub fn new(service: Arc<EngineService>) -> Self {
        Self { service }
    }

    /// Handle a message body as received on the wire.
    pub async fn handle_text(&self, body: &str) -> SurfaceResponse {
        match serde_json::from_str::<Value>(body) {
            Ok(message) => self.handle(message).await,
            Err(err) => {
                debug!(error = %err, "Rejecting unparseable surface message");
                SurfaceResponse::error(format!("Malformed message: {err}"))
            }
        }
    }

    /// Handle one decoded message. Malformed or unknown requests get an error reply.
    pub async fn handle(&self, message: Value) -> SurfaceResponse {
        let request = match serde_json::from_value::<SurfaceRequest>(message) {
            Ok(request) => request,
            Err(err) => {
                debug!(error = %err, "Rejecting surface message");
                return SurfaceResponse::error(format!("Unsupported message: {err}"));
            }
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: SurfaceRequest) -> SurfaceResponse {
        match request {
            SurfaceRequest::ExecuteAutomation { action_plan } => {
                let outcome = match plan_from_body(action_plan) {
                    Ok(plan) => self.service.run_plan(plan).await,
                    Err(err) => Err(ServiceError::Plan(err)),
                };
                match outcome {
                    Ok(result) => SurfaceResponse {
                        success: result.is_success(),
                        error: (!result.is_success()).then(|| result.message().to_string()),
                        result: Some(result),
                        ..SurfaceResponse::default()
                    },
                    Err(err) => SurfaceResponse::error(err.to_string()),
                }
            }
            SurfaceRequest::GeneratePlan { instruction } => {
                match self.service.generate_plan(&instruction).await {
                    Ok(plan) => SurfaceResponse {
                        success: true,
                        action_plan: Some(plan),
                        ..SurfaceResponse::default()
                    },
                    Err(err) => SurfaceResponse::error(err.to_string()),
                }
            }
            SurfaceRequest::GetStatus => SurfaceResponse {
                success: true,
                status: Some(self.service.status()),
                ..SurfaceResponse::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use cdp_adapter::memory::{MemoryDocument, NodeSpec};
    use serde_json::json;

    fn surface(doc: MemoryDocument) -> MessageSurface {
        let mut config = Config::default();
        config.engine.step_pacing_ms = 0;
        let service = EngineService::new(Arc::new(doc), &config).unwrap();
        MessageSurface::new(Arc::new(service))
    }

    #[tokio::test]
    async fn execute_automation_runs_plan() {
        let surface = surface(MemoryDocument::new().with_node(NodeSpec::new("#save")));
        let reply = surface
            .handle(json!({
                "action": "executeAutomation",
                "actionPlan": [{ "action": "click", "details": { "selector": "#save" } }]
            }))
            .await;

        assert!(reply.success);
        assert!(reply.error.is_none());
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["result"]["status"], "success");
        assert_eq!(value["result"]["steps_executed"], 1);
    }

    #[tokio::test]
    async fn invalid_plan_is_an_error_reply() {
        let surface = surface(MemoryDocument::new());
        let reply = surface
            .handle(json!({
                "action": "executeAutomation",
                "actionPlan": [{ "action": "type", "details": { "selector": "#name" } }]
            }))
            .await;
        assert!(!reply.success);
        assert!(reply.error.unwrap().contains("requires text"));
    }

    #[tokio::test]
    async fn unknown_action_and_missing_generator() {
        let surface = surface(MemoryDocument::new());
        let reply = surface.handle(json!({ "action": "reboot" })).await;
        assert!(!reply.success);
        assert!(reply.error.unwrap().starts_with("Unsupported message"));

        let reply = surface
            .handle(json!({ "action": "generatePlan", "instruction": "new lead" }))
            .await;
        assert_eq!(reply.error.as_deref(), Some("Plan generation is not configured"));
    }

    #[tokio::test]
    async fn unparseable_body_is_an_error_reply() {
        let surface = surface(MemoryDocument::new());
        let reply = surface.handle_text("{\"action\": ").await;
        assert!(!reply.success);
        assert!(reply.error.unwrap().starts_with("Malformed message"));
    }

    #[tokio::test]
    async fn status_reply_is_idle_before_any_run() {
        let surface = surface(MemoryDocument::new());
        let value = serde_json::to_value(surface.handle(json!({ "action": "getStatus" })).await)
            .unwrap();
        assert_eq!(value, json!({ "success": true, "status": { "state": "idle" } }));
    }
}
