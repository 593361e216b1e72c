//! Engine configuration, run reports and observer hooks

use std::time::Duration;

use action_locator::LocatorConfig;
use action_primitives::ActionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core_types::{ExecutionResult, Step, StepKind};

use crate::{dispatcher::StepOutcome, errors::FlowError};

/// Default delay between consecutive successful steps.
pub const DEFAULT_STEP_PACING_MS: u64 = 1_000;

/// Executor tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub locator: LocatorConfig,

    /// Delay after every successful step, the last one included
    pub step_pacing_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locator: LocatorConfig::default(),
            step_pacing_ms: DEFAULT_STEP_PACING_MS,
        }
    }
}

impl EngineConfig {
    pub fn step_pacing(&self) -> Duration {
        Duration::from_millis(self.step_pacing_ms)
    }

    pub fn with_step_pacing_ms(mut self, value: u64) -> Self {
        self.step_pacing_ms = value;
        self
    }
}

/// Placeholder substituted with the object name in result-link templates.
pub const OBJECT_PLACEHOLDER: &str = "{object}";

/// Selectors and timings of the object creation workflow.
///
/// Defaults target the Lightning app launcher. Every list is an ordered set of
/// locator candidates; `result_links` entries are templates containing
/// [`OBJECT_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub launcher_triggers: Vec<String>,
    pub search_inputs: Vec<String>,
    pub result_links: Vec<String>,
    /// Links scanned for an exact text match when no templated link resolves
    pub result_scan: Vec<String>,
    pub new_controls: Vec<String>,
    pub overflow_triggers: Vec<String>,
    pub overflow_new_controls: Vec<String>,

    pub launcher_settle_ms: u64,
    pub search_settle_ms: u64,
    /// Budget for each "New" control lookup (direct, overflow trigger, overflow item)
    pub new_control_budget_ms: u64,
    pub overflow_settle_ms: u64,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            launcher_triggers: strings(&[
                "div.appLauncher button",
                "button.slds-icon-waffle_container",
                "button[title='App Launcher']",
                "//button[.//span[text()='App Launcher']]",
            ]),
            search_inputs: strings(&[
                "one-app-launcher-menu input[type='search']",
                "input[placeholder='Search apps and items...']",
                "input.slds-input[type='search']",
                "//input[contains(@placeholder, 'Search apps')]",
            ]),
            result_links: strings(&[
                "one-app-launcher-menu-item a[data-label='{object}']",
                "a[data-label='{object}']",
                "a[title='{object}']",
                "//a[@data-label='{object}']",
            ]),
            result_scan: strings(&["one-app-launcher-menu-item a", "a[role='option']"]),
            new_controls: strings(&[
                "a[title='New']",
                "button[name='New']",
                "//a[@title='New']",
                "//button[normalize-space(text())='New']",
            ]),
            overflow_triggers: strings(&[
                "button[title='Show more actions']",
                "lightning-button-menu button",
                "//button[.//span[text()='Show more actions']]",
            ]),
            overflow_new_controls: strings(&[
                "lightning-menu-item a[title='New']",
                "runtime_platform_actions-action-renderer a[title='New']",
                "//lightning-menu-item//span[text()='New']/ancestor::a[1]",
            ]),
            launcher_settle_ms: 2_000,
            search_settle_ms: 1_500,
            new_control_budget_ms: 3_000,
            overflow_settle_ms: 500,
        }
    }
}

impl WorkflowConfig {
    /// Every selector list must carry at least one non-blank entry and every
    /// result-link template must reference the object.
    pub fn validate(&self) -> Result<(), FlowError> {
        let lists = [
            ("launcher_triggers", &self.launcher_triggers),
            ("search_inputs", &self.search_inputs),
            ("result_links", &self.result_links),
            ("result_scan", &self.result_scan),
            ("new_controls", &self.new_controls),
            ("overflow_triggers", &self.overflow_triggers),
            ("overflow_new_controls", &self.overflow_new_controls),
        ];
        for (name, list) in lists {
            if list.iter().all(|entry| entry.trim().is_empty()) {
                return Err(FlowError::InvalidConfig(format!(
                    "workflow.{} needs at least one selector",
                    name
                )));
            }
        }
        if let Some(template) = self
            .result_links
            .iter()
            .find(|template| !template.contains(OBJECT_PLACEHOLDER))
        {
            return Err(FlowError::InvalidConfig(format!(
                "workflow.result_links entry '{}' does not contain {}",
                template, OBJECT_PLACEHOLDER
            )));
        }
        Ok(())
    }

    pub fn new_control_budget(&self) -> Duration {
        Duration::from_millis(self.new_control_budget_ms)
    }
}

/// One executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the plan
    pub index: usize,
    pub kind: StepKind,
    pub description: String,
    pub latency_ms: u64,
    pub outcome: StepOutcome,
}

impl StepRecord {
    pub fn new(index: usize, step: &Step, latency_ms: u64, outcome: StepOutcome) -> Self {
        Self {
            index,
            kind: step.kind(),
            description: step.describe(),
            latency_ms,
            outcome,
        }
    }

    /// Primitive report, when the step was a single primitive.
    pub fn action_report(&self) -> Option<&ActionReport> {
        match &self.outcome {
            StepOutcome::Action(report) => Some(report),
            StepOutcome::Workflow(_) => None,
        }
    }
}

/// Plan entry skipped because its action kind is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub index: usize,
    pub action: String,
}

/// Report of one successful plan run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    pub run_id: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub finished_at: Option<DateTime<Utc>>,

    pub latency_ms: Option<u64>,

    /// Plan length, unsupported entries included
    pub total_entries: usize,

    pub steps: Vec<StepRecord>,

    pub skipped: Vec<SkippedEntry>,
}

impl PlanReport {
    pub fn new(run_id: impl Into<String>, total_entries: usize) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            latency_ms: None,
            total_entries,
            steps: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn skip(&mut self, index: usize, action: impl Into<String>) {
        self.skipped.push(SkippedEntry {
            index,
            action: action.into(),
        });
    }

    pub fn finish(mut self) -> Self {
        let finished_at = Utc::now();
        self.latency_ms = Some(
            finished_at
                .signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.finished_at = Some(finished_at);
        self
    }

    pub fn steps_executed(&self) -> usize {
        self.steps.len()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Executed {} of {} steps",
            self.steps_executed(),
            self.total_entries
        );
        if !self.skipped.is_empty() {
            summary.push_str(&format!(", skipped {} unsupported", self.skipped.len()));
        }
        if let Some(latency_ms) = self.latency_ms {
            summary.push_str(&format!(" in {}ms", latency_ms));
        }
        summary
    }

    pub fn to_result(&self) -> ExecutionResult {
        ExecutionResult::Success {
            summary: self.summary(),
            steps_executed: self.steps_executed(),
        }
    }
}

/// Hooks invoked while a plan runs.
///
/// Callbacks are synchronous and must not block; every method defaults to a no-op.
pub trait RunObserver: Send + Sync {
    fn plan_started(&self, _run_id: &str, _total_entries: usize) {}

    fn step_started(&self, _index: usize, _step: &Step) {}

    fn step_succeeded(&self, _record: &StepRecord) {}

    fn step_skipped(&self, _entry: &SkippedEntry) {}

    fn plan_finished(&self, _report: &PlanReport) {}

    fn plan_failed(&self, _run_id: &str, _error: &FlowError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Convert an executor outcome into the caller-facing result.
pub fn execution_result(outcome: &Result<PlanReport, FlowError>) -> ExecutionResult {
    match outcome {
        Ok(report) => report.to_result(),
        Err(err) => ExecutionResult::Failure {
            step_index: err.step_index().unwrap_or(0),
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workflow_config_is_valid() {
        WorkflowConfig::default().validate().unwrap();
    }

    #[test]
    fn templates_without_placeholder_are_rejected() {
        let config = WorkflowConfig {
            result_links: vec!["a.result".to_string()],
            ..WorkflowConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("a.result"));
    }

    #[test]
    fn blank_selector_lists_are_rejected() {
        let config = WorkflowConfig {
            new_controls: vec!["  ".to_string()],
            ..WorkflowConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FlowError::InvalidConfig(message)) if message.contains("new_controls")
        ));
    }

    #[test]
    fn engine_config_reads_flat_keys() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "poll_interval_ms": 250,
            "budget_policy": "per_candidate",
            "step_pacing_ms": 0
        }))
        .unwrap();
        assert_eq!(config.locator.poll_interval_ms, 250);
        assert_eq!(config.step_pacing(), Duration::ZERO);
    }

    #[test]
    fn summary_mentions_skipped_entries() {
        let mut report = PlanReport::new("run", 3);
        report.skip(2, "hover");
        let report = report.finish();
        assert!(report.summary().starts_with("Executed 0 of 3 steps, skipped 1 unsupported in "));
        assert!(matches!(
            report.to_result(),
            ExecutionResult::Success { steps_executed: 0, .. }
        ));
    }
}
