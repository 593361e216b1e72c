//! Core data types for action primitives

use action_locator::ResolvedNode;
use cdp_adapter::{DomEvent, NodeHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::waiting::SettleOutcome;

/// Execution context for action primitives
///
/// Carries the cancellation token of the surrounding run and a unique action id
/// used to correlate log lines of one primitive.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,

    /// Unique identifier for this action
    pub action_id: String,
}

impl ExecCtx {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Child context sharing the cancellation token, with a fresh action id.
    pub fn child(&self) -> Self {
        Self::new(self.cancel_token.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Default for ExecCtx {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

/// Notifications emitted after a value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notify {
    Input,
    InputAndChange,
}

impl Notify {
    pub fn events(&self) -> &'static [DomEvent] {
        match self {
            Notify::Input => &[DomEvent::Input],
            Notify::InputAndChange => &[DomEvent::Input, DomEvent::Change],
        }
    }
}

/// How a click reached the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    Native,
    Synthetic,
}

/// Report of one applied primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// Node the primitive acted on
    pub node: Option<NodeHandle>,

    /// Candidate expression that resolved the target
    pub selector: Option<String>,

    /// Position of that candidate in the target
    pub candidate_index: Option<usize>,

    pub click_mode: Option<ClickMode>,

    pub settle: Option<SettleOutcome>,
}

impl ActionReport {
    pub fn success(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            node: None,
            selector: None,
            candidate_index: None,
            click_mode: None,
            settle: None,
        }
    }

    pub fn with_resolution(mut self, resolved: &ResolvedNode) -> Self {
        self.node = Some(resolved.node);
        self.selector = Some(resolved.candidate.expression.clone());
        self.candidate_index = Some(resolved.candidate_index);
        self
    }

    pub fn with_click_mode(mut self, mode: ClickMode) -> Self {
        self.click_mode = Some(mode);
        self
    }

    pub fn with_settle(mut self, outcome: SettleOutcome) -> Self {
        self.settle = Some(outcome);
        self
    }
}

/// Condition for explicit waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    /// Node attached to the document
    Present,

    /// Node attached with a non-empty rendered box
    Visible,
}
