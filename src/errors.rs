//! Service-level errors

use stepwise_core_types::PlanError;
use thiserror::Error;

use crate::llm::GenerationError;

/// Failures that happen outside a run: the plan never started executing.
///
/// Step failures are not errors at this level; they come back as
/// [`ExecutionResult::Failure`](stepwise_core_types::ExecutionResult).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("a plan is already running")]
    Busy,

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Plan generation is not configured")]
    GeneratorUnavailable,
}
