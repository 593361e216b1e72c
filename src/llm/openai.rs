use crate::llm::prompt::PromptBuilder;
use crate::llm::utils::extract_plan_payload;
use crate::llm::{GenerationError, PlanGenerator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stepwise_core_types::ActionPlan;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    /// Bounds the whole generation, key rotation included
    pub timeout: Duration,
}

pub struct OpenAiPlanGenerator {
    client: Client,
    prompt: PromptBuilder,
    config: OpenAiConfig,
}

impl OpenAiPlanGenerator {
    pub fn new(mut config: OpenAiConfig) -> Result<Self, GenerationError> {
        config.api_keys.retain(|key| !key.trim().is_empty());
        if config.api_keys.is_empty() {
            return Err(GenerationError::failed(
                "missing OpenAI API key for plan generation",
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GenerationError::failed(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            prompt: PromptBuilder::new(),
            config,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn invoke(&self, instruction: &str) -> Result<ActionPlan, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        let mut last_error: Option<GenerationError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let body = ChatCompletionRequest {
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                response_format: ResponseFormat {
                    r#type: "json_object".to_string(),
                },
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: self.prompt.system_prompt().to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: self.prompt.build_user_prompt(instruction),
                    },
                ],
            };

            let response = match self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) if err.is_timeout() => {
                    return Err(GenerationError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    })
                }
                Err(err) => {
                    last_error = Some(GenerationError::failed(format!(
                        "openai request failed: {err}"
                    )));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 && index + 1 < self.config.api_keys.len() {
                    let friendly = openai_rate_limit_message(&text);
                    warn!(
                        target: "openai",
                        message = %friendly,
                        attempt = index + 1,
                        remaining = self.config.api_keys.len() - index - 1,
                        "OpenAI rate limited plan request; switching API key"
                    );
                    last_error = Some(GenerationError::Failed(friendly));
                    continue;
                }
                let message = if status.as_u16() == 429 {
                    openai_rate_limit_message(&text)
                } else {
                    format!("openai returned {}: {}", status, text)
                };
                return Err(GenerationError::Failed(message));
            }

            let response: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|err| GenerationError::failed(format!("openai response invalid: {err}")))?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| GenerationError::failed("openai response has no choices"))?;
            if let Some(refusal) = choice.message.refusal.as_deref() {
                return Err(GenerationError::failed(format!(
                    "model refused to generate a plan: {}",
                    refusal.trim()
                )));
            }
            if choice.finish_reason.as_deref() == Some("content_filter") {
                return Err(GenerationError::failed(
                    "plan generation was blocked by the content filter",
                ));
            }
            let content = choice
                .message
                .content
                .as_ref()
                .and_then(ChatCompletionContent::as_text)
                .ok_or_else(|| GenerationError::failed("openai response missing content"))?;

            let payload = extract_plan_payload(&content)
                .ok_or_else(|| GenerationError::failed("openai response missing JSON plan"))?;
            let plan = ActionPlan::from_json_value(payload)
                .map_err(|err| GenerationError::failed(format!("generated plan invalid: {err}")))?;
            info!(
                target: "openai",
                model = %self.config.model,
                entries = plan.len(),
                "plan generated"
            );
            return Ok(plan);
        }

        Err(last_error
            .unwrap_or_else(|| GenerationError::failed("OpenAI request exhausted all API keys")))
    }
}

#[async_trait]
impl PlanGenerator for OpenAiPlanGenerator {
    async fn generate(&self, instruction: &str) -> Result<ActionPlan, GenerationError> {
        if instruction.trim().is_empty() {
            return Err(GenerationError::failed("instruction must not be empty"));
        }
        match tokio::time::timeout(self.config.timeout, self.invoke(instruction)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_ref())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorMessage {
    message: Option<String>,
}

fn openai_rate_limit_message(raw: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<OpenAiErrorEnvelope>(raw) {
        if let Some(message) = envelope.error.message {
            return format!("OpenAI rate limit exceeded: {}", message.trim());
        }
    }
    "OpenAI rate limit exceeded; please retry later".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_keys: vec!["  ".to_string()],
            model: "gpt-4o-mini".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn blank_keys_are_rejected() {
        assert!(matches!(
            OpenAiPlanGenerator::new(config()),
            Err(GenerationError::Failed(_))
        ));
    }

    #[test]
    fn rate_limit_message_prefers_envelope() {
        let raw = r#"{"error":{"message":"Too many requests "}}"#;
        assert_eq!(
            openai_rate_limit_message(raw),
            "OpenAI rate limit exceeded: Too many requests"
        );
        assert!(openai_rate_limit_message("nope").contains("retry later"));
    }

    #[test]
    fn content_parts_are_joined() {
        let content: ChatCompletionContent =
            serde_json::from_str(r#"[{"type":"text","text":"{\"a\":"},{"text":"1}"}]"#).unwrap();
        assert_eq!(content.as_text().as_deref(), Some("{\"a\":\n1}"));
    }
}
