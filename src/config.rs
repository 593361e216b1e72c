//! Application configuration
//!
//! Loaded from YAML, then adjusted by `STEPWISE_*` environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use action_flow::{EngineConfig, WorkflowConfig};
use action_locator::BudgetPolicy;
use action_primitives::SettlePolicy;
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_HEADLESS: &str = "STEPWISE_HEADLESS";
pub const ENV_CHROME: &str = "STEPWISE_CHROME";
pub const ENV_WS_URL: &str = "STEPWISE_WS_URL";
pub const ENV_START_URL: &str = "STEPWISE_START_URL";
pub const ENV_BUDGET_POLICY: &str = "STEPWISE_BUDGET_POLICY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_LLM_MODEL: &str = "STEPWISE_LLM_MODEL";
pub const ENV_LLM_API_BASE: &str = "STEPWISE_LLM_API_BASE";

/// Effective configuration of one process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: CdpConfig,
    pub engine: EngineConfig,
    pub settle: SettlePolicy,
    pub workflow: WorkflowConfig,
    pub generator: GeneratorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// OpenAI-compatible plan generator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub api_base: String,
    pub model: String,
    /// Tried in order; a rate-limited key falls through to the next one
    pub api_keys: Vec<String>,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_keys: Vec::new(),
            temperature: 0.0,
            timeout_ms: 30_000,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_configured(&self) -> bool {
        self.api_keys.iter().any(|key| !key.trim().is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Daily rolling log files are written here when set
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            directory: None,
        }
    }
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(raw) = value(ENV_HEADLESS) {
            match parse_bool(&raw) {
                Some(headless) => self.browser.headless = headless,
                None => warn!(key = ENV_HEADLESS, value = %raw, "ignoring non-boolean override"),
            }
        }
        if let Some(path) = value(ENV_CHROME) {
            self.browser.executable = Some(PathBuf::from(path));
        }
        if let Some(url) = value(ENV_WS_URL) {
            self.browser.websocket_url = Some(url);
        }
        if let Some(url) = value(ENV_START_URL) {
            self.browser.start_url = Some(url);
        }
        if let Some(raw) = value(ENV_BUDGET_POLICY) {
            match BudgetPolicy::parse(&raw) {
                Some(policy) => self.engine.locator.budget_policy = policy,
                None => warn!(key = ENV_BUDGET_POLICY, value = %raw, "unknown budget policy"),
            }
        }
        if let Some(key) = value(ENV_OPENAI_API_KEY) {
            if !self.generator.api_keys.contains(&key) {
                self.generator.api_keys.insert(0, key);
            }
        }
        if let Some(model) = value(ENV_LLM_MODEL) {
            self.generator.model = model;
        }
        if let Some(base) = value(ENV_LLM_API_BASE) {
            self.generator.api_base = base;
        }
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.generator.api_keys = copy
            .generator
            .api_keys
            .iter()
            .map(|key| redact_key(key))
            .collect();
        copy
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn redact_key(key: &str) -> String {
    let visible: String = key.chars().take(3).collect();
    format!("{}***", visible)
}
