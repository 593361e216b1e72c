//! Step dispatcher: maps one typed step onto the primitive that performs it

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{ActionPrimitives, ActionReport, ExecCtx, WaitCondition};
use serde::{Deserialize, Serialize};
use stepwise_core_types::{Step, StepKind};
use tracing::debug;

use crate::{
    errors::FlowError,
    types::WorkflowConfig,
    workflow::{ObjectWorkflow, WorkflowReport},
};

/// What a dispatched step produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutcome {
    Action(ActionReport),
    Workflow(WorkflowReport),
}

/// Performs single steps against the document behind `primitives`.
pub struct StepDispatcher {
    primitives: Arc<dyn ActionPrimitives>,
    workflow: ObjectWorkflow,
}

impl StepDispatcher {
    pub fn new(
        primitives: Arc<dyn ActionPrimitives>,
        workflow: WorkflowConfig,
    ) -> Result<Self, FlowError> {
        Ok(Self {
            workflow: ObjectWorkflow::new(primitives.clone(), workflow)?,
            primitives,
        })
    }

    pub fn primitives(&self) -> &Arc<dyn ActionPrimitives> {
        &self.primitives
    }

    /// Perform `step`. Failures carry the step kind and the target's selectors.
    pub async fn dispatch(&self, ctx: &ExecCtx, step: &Step) -> Result<StepOutcome, FlowError> {
        debug!(action_id = %ctx.action_id, step = %step, "Dispatching step");
        let primitives = self.primitives.as_ref();
        let report = match step {
            Step::Click { target, timeout_ms } => primitives
                .click(ctx, target, millis(*timeout_ms))
                .await
                .map_err(|err| FlowError::action(StepKind::Click, target, err))?,
            Step::Type {
                target,
                text,
                timeout_ms,
            } => primitives
                .type_text(ctx, target, text, millis(*timeout_ms))
                .await
                .map_err(|err| FlowError::action(StepKind::Type, target, err))?,
            Step::SelectByValue {
                target,
                value,
                timeout_ms,
            } => primitives
                .select_value(ctx, target, value, millis(*timeout_ms))
                .await
                .map_err(|err| FlowError::action(StepKind::SelectByValue, target, err))?,
            Step::WaitForPresent { target, timeout_ms } => primitives
                .wait_for(ctx, target, WaitCondition::Present, millis(*timeout_ms))
                .await
                .map_err(|err| FlowError::action(StepKind::WaitForPresent, target, err))?,
            Step::WaitForVisible { target, timeout_ms } => primitives
                .wait_for(ctx, target, WaitCondition::Visible, millis(*timeout_ms))
                .await
                .map_err(|err| FlowError::action(StepKind::WaitForVisible, target, err))?,
            Step::Pause { duration_ms } => primitives
                .pause(ctx, millis(*duration_ms))
                .await
                .map_err(|err| FlowError::action(StepKind::Pause, "-", err))?,
            Step::LaunchObjectWorkflow { object, timeout_ms } => {
                let report = self.workflow.run(ctx, object, millis(*timeout_ms)).await?;
                return Ok(StepOutcome::Workflow(report));
            }
        };
        Ok(StepOutcome::Action(report))
    }
}

fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}
