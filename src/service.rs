//! Engine service: the single entry point every surface runs plans through
//!
//! The service owns the wiring (locator, primitives, dispatcher, executor), the
//! run status board and a gate that admits one run at a time. Surfaces (HTTP,
//! message bridge, CLI) only hand it plans and read results.

use std::sync::Arc;

use action_flow::{
    execution_result, DefaultPlanExecutor, FlowError, PlanExecutor, PlanReport, RunObserver,
    SkippedEntry, StepDispatcher, StepRecord,
};
use action_locator::ElementLocator;
use action_primitives::{DefaultActionPrimitives, ExecCtx};
use cdp_adapter::Document;
use serde_json::Value;
use stepwise_core_types::{ActionPlan, ExecutionResult, PlanError, Step};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::ServiceError;
use crate::llm::utils::PLAN_KEY;
use crate::llm::PlanGenerator;
use crate::metrics::{self, MetricsObserver};
use crate::status::{RunStatus, StatusBoard};

pub struct EngineService {
    executor: DefaultPlanExecutor,
    generator: Option<Arc<dyn PlanGenerator>>,
    status: Arc<StatusBoard>,
    gate: Mutex<()>,
    shutdown: CancellationToken,
}

impl EngineService {
    pub fn new(document: Arc<dyn Document>, config: &Config) -> Result<Self, FlowError> {
        let locator = ElementLocator::new(document, config.engine.locator.clone());
        let primitives = Arc::new(DefaultActionPrimitives::new(locator, config.settle));
        let dispatcher = StepDispatcher::new(primitives, config.workflow.clone())?;
        let executor = DefaultPlanExecutor::new(Arc::new(dispatcher), config.engine.clone());
        metrics::register_metrics();
        info!(
            budget_policy = config.engine.locator.budget_policy.name(),
            settle = config.settle.name(),
            step_pacing_ms = config.engine.step_pacing_ms,
            "Engine service ready"
        );
        Ok(Self {
            executor,
            generator: None,
            status: Arc::new(StatusBoard::new()),
            gate: Mutex::new(()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_generator(mut self, generator: Option<Arc<dyn PlanGenerator>>) -> Self {
        self.generator = generator;
        self
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Run `plan`, rejecting it when another run is in progress.
    pub async fn run_plan(&self, plan: ActionPlan) -> Result<ExecutionResult, ServiceError> {
        let _guard = self.gate.try_lock().map_err(|_| {
            warn!("Rejecting plan: another run is in progress");
            ServiceError::Busy
        })?;

        let ctx = ExecCtx::new(self.shutdown.child_token());
        let observers: [&dyn RunObserver; 2] = [self.status.as_ref(), &MetricsObserver];
        let outcome = self
            .executor
            .execute(plan, &ctx, &FanOut(&observers))
            .await;
        let result = execution_result(&outcome);
        match &outcome {
            Ok(report) => info!(run_id = %report.run_id, "{}", report.summary()),
            Err(err) => warn!(step = err.step_index(), "Plan run failed: {}", err),
        }
        Ok(result)
    }

    /// Decode a request body and run it.
    pub async fn run_plan_value(&self, body: Value) -> Result<ExecutionResult, ServiceError> {
        let plan = plan_from_body(body)?;
        self.run_plan(plan).await
    }

    pub async fn generate_plan(&self, instruction: &str) -> Result<ActionPlan, ServiceError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(ServiceError::GeneratorUnavailable)?;
        match generator.generate(instruction).await {
            Ok(plan) => {
                metrics::record_plan_generation("success");
                Ok(plan)
            }
            Err(err) => {
                metrics::record_plan_generation(if err.is_timeout() { "timeout" } else { "failure" });
                warn!(error = %err, "Plan generation failed");
                Err(err.into())
            }
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status.snapshot()
    }

    pub fn status_board(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.status)
    }

    /// Interrupt the active run, if any, and every later one.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Accept either a bare plan array or an object carrying it under `actionPlan`.
pub fn plan_from_body(body: Value) -> Result<ActionPlan, PlanError> {
    match body {
        Value::Object(mut map) if map.contains_key(PLAN_KEY) => {
            ActionPlan::from_json_value(map.remove(PLAN_KEY).unwrap_or(Value::Null))
        }
        other => ActionPlan::from_json_value(other),
    }
}

pub fn plan_from_str(raw: &str) -> Result<ActionPlan, PlanError> {
    plan_from_body(serde_json::from_str(raw)?)
}

struct FanOut<'a>(&'a [&'a dyn RunObserver]);

impl RunObserver for FanOut<'_> {
    fn plan_started(&self, run_id: &str, total_entries: usize) {
        self.0
            .iter()
            .for_each(|observer| observer.plan_started(run_id, total_entries));
    }

    fn step_started(&self, index: usize, step: &Step) {
        self.0
            .iter()
            .for_each(|observer| observer.step_started(index, step));
    }

    fn step_succeeded(&self, record: &StepRecord) {
        self.0
            .iter()
            .for_each(|observer| observer.step_succeeded(record));
    }

    fn step_skipped(&self, entry: &SkippedEntry) {
        self.0.iter().for_each(|observer| observer.step_skipped(entry));
    }

    fn plan_finished(&self, report: &PlanReport) {
        self.0
            .iter()
            .for_each(|observer| observer.plan_finished(report));
    }

    fn plan_failed(&self, run_id: &str, error: &FlowError) {
        self.0
            .iter()
            .for_each(|observer| observer.plan_failed(run_id, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationError;
    use async_trait::async_trait;
    use cdp_adapter::memory::{MemoryDocument, NodeSpec};
    use serde_json::json;
    use std::time::Duration;

    fn service(doc: MemoryDocument) -> (Arc<MemoryDocument>, Arc<EngineService>) {
        let doc = Arc::new(doc);
        let mut config = Config::default();
        config.engine.step_pacing_ms = 0;
        let service = EngineService::new(doc.clone(), &config).unwrap();
        (doc, Arc::new(service))
    }

    #[test]
    fn body_accepts_array_or_wrapped_plan() {
        let step = json!({ "action": "click", "details": { "selector": "#go" } });
        assert_eq!(plan_from_body(json!([step.clone()])).unwrap().len(), 1);
        assert_eq!(
            plan_from_body(json!({ "actionPlan": [step.clone(), step] }))
                .unwrap()
                .len(),
            2
        );
        assert!(matches!(
            plan_from_body(json!({ "steps": [] })),
            Err(PlanError::Malformed(_))
        ));
        assert!(plan_from_str("not json").is_err());
    }

    #[tokio::test]
    async fn run_updates_status_board() {
        let (doc, service) = service(MemoryDocument::new().with_node(NodeSpec::new("#go")));
        let result = service
            .run_plan_value(json!([{ "action": "click", "details": { "selector": "#go" } }]))
            .await
            .unwrap();

        assert!(matches!(
            result,
            ExecutionResult::Success { steps_executed: 1, .. }
        ));
        assert_eq!(doc.clicks("#go"), 1);
        assert!(matches!(
            service.status(),
            RunStatus::Succeeded { steps_executed: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_is_rejected_while_busy() {
        let (_doc, service) = service(MemoryDocument::new());
        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .run_plan(ActionPlan::from_steps([Step::pause(5_000)]))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(service.status().is_running());

        let second = service
            .run_plan(ActionPlan::from_steps([Step::pause(10)]))
            .await;
        assert!(matches!(second, Err(ServiceError::Busy)));

        assert!(first.await.unwrap().unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_active_run() {
        let (_doc, service) = service(MemoryDocument::new());
        let run = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .run_plan(ActionPlan::from_steps([Step::pause(60_000)]))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.shutdown();

        match run.await.unwrap().unwrap() {
            ExecutionResult::Failure { step_index, .. } => assert_eq!(step_index, 1),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(service.status(), RunStatus::Failed { .. }));
    }

    struct FixedGenerator(Result<Value, u64>);

    #[async_trait]
    impl PlanGenerator for FixedGenerator {
        async fn generate(&self, _instruction: &str) -> Result<ActionPlan, GenerationError> {
            match &self.0 {
                Ok(value) => ActionPlan::from_json_value(value.clone())
                    .map_err(|err| GenerationError::failed(err.to_string())),
                Err(timeout_ms) => Err(GenerationError::Timeout {
                    timeout_ms: *timeout_ms,
                }),
            }
        }
    }

    #[tokio::test]
    async fn generation_requires_a_generator() {
        let (_doc, service) = service(MemoryDocument::new());
        assert!(matches!(
            service.generate_plan("create an account").await,
            Err(ServiceError::GeneratorUnavailable)
        ));
    }

    #[tokio::test]
    async fn generation_passes_through_plan_and_timeout() {
        let doc: Arc<dyn Document> = Arc::new(MemoryDocument::new());
        let config = Config::default();
        let ok = EngineService::new(doc.clone(), &config)
            .unwrap()
            .with_generator(Some(Arc::new(FixedGenerator(Ok(json!([
                { "action": "app_launcher", "details": { "objectName": "Account" } }
            ]))))));
        assert_eq!(ok.generate_plan("new account").await.unwrap().len(), 1);

        let slow = EngineService::new(doc, &config)
            .unwrap()
            .with_generator(Some(Arc::new(FixedGenerator(Err(30_000)))));
        assert!(matches!(
            slow.generate_plan("new account").await,
            Err(ServiceError::Generation(GenerationError::Timeout { timeout_ms: 30_000 }))
        ));
    }
}
