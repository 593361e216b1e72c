use serde::{Deserialize, Serialize};

/// Caller-facing outcome of a plan run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        summary: String,
        steps_executed: usize,
    },
    Failure {
        /// 1-based index of the failing step
        step_index: usize,
        message: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ExecutionResult::Success { summary, .. } => summary,
            ExecutionResult::Failure { message, .. } => message,
        }
    }
}
