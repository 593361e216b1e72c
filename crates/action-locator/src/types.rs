//! Core types for locator system

use std::time::Duration;

use cdp_adapter::NodeHandle;
use serde::{Deserialize, Serialize};
use stepwise_core_types::LocatorCandidate;

/// Default interval between poll rounds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// How a target's timeout is spent across its candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPolicy {
    /// One deadline for the whole target; each round tries every candidate
    #[default]
    Shared,

    /// `timeout / n` slice per candidate, polled one candidate after another
    PerCandidate,
}

impl BudgetPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            BudgetPolicy::Shared => "shared",
            BudgetPolicy::PerCandidate => "per_candidate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shared" => Some(BudgetPolicy::Shared),
            "per_candidate" => Some(BudgetPolicy::PerCandidate),
            _ => None,
        }
    }
}

/// Locator tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub poll_interval_ms: u64,
    pub budget_policy: BudgetPolicy,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            budget_policy: BudgetPolicy::default(),
        }
    }
}

impl LocatorConfig {
    pub fn with_policy(mut self, policy: BudgetPolicy) -> Self {
        self.budget_policy = policy;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// What a matched node must satisfy to count as resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Attached,
    Rendered,
}

/// A node resolved from a target, with the candidate that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub node: NodeHandle,
    pub candidate: LocatorCandidate,

    /// Position of the matching candidate in the target (0-based)
    pub candidate_index: usize,

    /// Query rounds performed before the match
    pub attempts: u32,

    pub elapsed: Duration,
}
