//! Plan executor implementation

use std::sync::Arc;

use action_primitives::ExecCtx;
use async_trait::async_trait;
use stepwise_core_types::{ActionPlan, PlanEntry};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    dispatcher::StepDispatcher,
    errors::FlowError,
    types::{EngineConfig, PlanReport, RunObserver, SkippedEntry, StepRecord},
};

/// Plan executor trait
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    /// Run `plan` to completion or to its first failing step.
    ///
    /// The plan is consumed: one plan, one run.
    async fn execute(
        &self,
        plan: ActionPlan,
        ctx: &ExecCtx,
        observer: &dyn RunObserver,
    ) -> Result<PlanReport, FlowError>;
}

/// Default plan executor: strictly sequential, fail-fast, paced.
pub struct DefaultPlanExecutor {
    dispatcher: Arc<StepDispatcher>,
    config: EngineConfig,
}

impl DefaultPlanExecutor {
    pub fn new(dispatcher: Arc<StepDispatcher>, config: EngineConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn pace(&self, ctx: &ExecCtx, index: usize) -> Result<(), FlowError> {
        let pacing = self.config.step_pacing();
        if pacing.is_zero() {
            return Ok(());
        }
        debug!(step = index, pacing_ms = self.config.step_pacing_ms, "Pacing after step");
        self.dispatcher
            .primitives()
            .pause(ctx, pacing)
            .await
            .map(|_| ())
            .map_err(|err| FlowError::Interrupted {
                index,
                reason: err.to_string(),
            })
    }
}

#[async_trait]
impl PlanExecutor for DefaultPlanExecutor {
    async fn execute(
        &self,
        plan: ActionPlan,
        ctx: &ExecCtx,
        observer: &dyn RunObserver,
    ) -> Result<PlanReport, FlowError> {
        let mut report = PlanReport::new(uuid::Uuid::new_v4().to_string(), plan.len());
        let run_id = report.run_id.clone();
        info!(
            run_id = %run_id,
            entries = plan.len(),
            steps = plan.step_count(),
            "Executing action plan"
        );
        observer.plan_started(&run_id, plan.len());

        for (offset, entry) in plan.entries().iter().enumerate() {
            let index = offset + 1;
            let step = match entry {
                PlanEntry::Step(step) => step,
                PlanEntry::Unsupported { action } => {
                    let skipped = FlowError::UnsupportedAction {
                        index,
                        action: action.clone(),
                    };
                    warn!(run_id = %run_id, step = index, "{}; skipping", skipped);
                    let entry = SkippedEntry {
                        index,
                        action: action.clone(),
                    };
                    observer.step_skipped(&entry);
                    report.skip(entry.index, entry.action);
                    continue;
                }
            };

            observer.step_started(index, step);
            let step_ctx = ctx.child();
            let started = Instant::now();
            match self.dispatcher.dispatch(&step_ctx, step).await {
                Ok(outcome) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    info!(
                        run_id = %run_id,
                        action_id = %step_ctx.action_id,
                        step = index,
                        kind = %step.kind(),
                        latency_ms,
                        "Step completed"
                    );
                    let record = StepRecord::new(index, step, latency_ms, outcome);
                    observer.step_succeeded(&record);
                    report.record(record);
                }
                Err(source) => {
                    let err = FlowError::StepFailed {
                        index,
                        description: step.describe(),
                        source: Box::new(source),
                    };
                    warn!(run_id = %run_id, step = index, error = %err, "Plan aborted");
                    observer.plan_failed(&run_id, &err);
                    return Err(err);
                }
            }

            if let Err(err) = self.pace(ctx, index).await {
                warn!(run_id = %run_id, error = %err, "Plan interrupted");
                observer.plan_failed(&run_id, &err);
                return Err(err);
            }
        }

        let report = report.finish();
        info!(run_id = %run_id, summary = %report.summary(), "Action plan completed");
        observer.plan_finished(&report);
        Ok(report)
    }
}
