//! Plan generation through an external chat-completions service

pub mod openai;
pub mod prompt;
pub mod utils;

use std::sync::Arc;

use async_trait::async_trait;
use stepwise_core_types::ActionPlan;
use thiserror::Error;

use crate::config::GeneratorConfig;

pub use openai::{OpenAiConfig, OpenAiPlanGenerator};

/// Generator failures. A timeout is kept apart from every other failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Plan generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Plan generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        GenerationError::Failed(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Timeout { .. })
    }
}

/// Turns a free-text instruction into an action plan.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, instruction: &str) -> Result<ActionPlan, GenerationError>;
}

/// Generator described by `config`, or `None` when no API key is configured.
pub fn build_generator(
    config: &GeneratorConfig,
) -> Result<Option<Arc<dyn PlanGenerator>>, GenerationError> {
    if !config.is_configured() {
        return Ok(None);
    }
    let generator = OpenAiPlanGenerator::new(OpenAiConfig {
        api_keys: config.api_keys.clone(),
        model: config.model.clone(),
        api_base: config.api_base.clone(),
        temperature: config.temperature,
        timeout: config.timeout(),
    })?;
    Ok(Some(Arc::new(generator)))
}
