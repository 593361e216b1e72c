use thiserror::Error;

/// Errors raised while decoding or constructing an action plan.
///
/// All of these are detected before the first step runs.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Payload is not valid JSON or not an array of actions
    #[error("Malformed action plan: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A step is missing a field its kind requires
    #[error("Invalid step {index}: {reason}")]
    InvalidStep { index: usize, reason: String },

    /// A target was built without any usable selector
    #[error("Target has no selector candidates")]
    EmptyTarget,
}

impl PlanError {
    pub fn invalid_step(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidStep {
            index,
            reason: reason.into(),
        }
    }

    /// 1-based index of the offending step, when known.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            PlanError::InvalidStep { index, .. } => Some(*index),
            _ => None,
        }
    }
}
