//! Plan execution error types

use std::fmt;

use action_primitives::ActionError;
use serde::{Deserialize, Serialize};
use stepwise_core_types::StepKind;
use thiserror::Error;

/// Stages of the object creation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    OpenLauncher,
    Search,
    SelectResult,
    OpenCreationForm,
}

impl WorkflowStage {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStage::OpenLauncher => "open launcher",
            WorkflowStage::Search => "search",
            WorkflowStage::SelectResult => "select result",
            WorkflowStage::OpenCreationForm => "open creation form",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plan execution errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// A primitive failed while performing a step
    #[error("{action} failed on '{target}': {source}")]
    Action {
        action: StepKind,
        target: String,
        #[source]
        source: ActionError,
    },

    /// Neither an attribute match nor a text match was found among the launcher results
    #[error("No launcher result link matched object '{object}'")]
    ObjectLinkNotFound { object: String },

    /// Neither a direct nor an overflow-menu "New" control was found
    #[error("No 'New' control found for object '{object}'")]
    NewControlNotFound { object: String },

    /// A workflow stage failed for a reason other than a missing control
    #[error("Workflow stage '{stage}' failed for object '{object}': {source}")]
    Workflow {
        stage: WorkflowStage,
        object: String,
        #[source]
        source: ActionError,
    },

    /// Unknown action kind; logged and skipped, never fatal
    #[error("Unsupported action '{action}' at step {index}")]
    UnsupportedAction { index: usize, action: String },

    /// A step failed; wraps the cause with the step's 1-based position
    #[error("Step {index} ({description}) failed: {source}")]
    StepFailed {
        index: usize,
        description: String,
        #[source]
        source: Box<FlowError>,
    },

    /// The run was cancelled while pacing after step `index`
    #[error("Run interrupted after step {index}: {reason}")]
    Interrupted { index: usize, reason: String },

    /// Engine configuration cannot be used
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl FlowError {
    pub fn action(action: StepKind, target: impl fmt::Display, source: ActionError) -> Self {
        FlowError::Action {
            action,
            target: target.to_string(),
            source,
        }
    }

    /// 1-based index of the failing step, when the error carries one.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            FlowError::StepFailed { index, .. }
            | FlowError::UnsupportedAction { index, .. }
            | FlowError::Interrupted { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Innermost flow-level cause (unwraps `StepFailed`).
    pub fn root_cause(&self) -> &FlowError {
        match self {
            FlowError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::LocatorError;

    #[test]
    fn step_failure_message_names_index_and_cause() {
        let cause = FlowError::action(
            StepKind::Click,
            "#btn",
            ActionError::Locator(LocatorError::ElementNotFound {
                target: "#btn".to_string(),
                timeout_ms: 10_000,
            }),
        );
        let err = FlowError::StepFailed {
            index: 3,
            description: "click '#btn'".to_string(),
            source: Box::new(cause),
        };

        assert_eq!(err.step_index(), Some(3));
        assert_eq!(
            err.to_string(),
            "Step 3 (click '#btn') failed: click failed on '#btn': Element not found: #btn (waited 10000ms)"
        );
        assert!(matches!(err.root_cause(), FlowError::Action { .. }));
    }
}
