//! Settle waits for transient UI that exposes no completion signal

use cdp_adapter::{Document, SettleSignal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default quiet window for [`SettlePolicy::MutationQuiet`].
pub const DEFAULT_QUIET_MS: u64 = 300;

/// How to wait for transient UI to settle.
///
/// Every settle call carries a duration: the full delay for `Fixed`, the ceiling
/// for `MutationQuiet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Sleep the full duration
    Fixed,

    /// Resolve once no mutation happened for `quiet_ms`, bounded by the duration
    MutationQuiet {
        #[serde(default = "default_quiet_ms")]
        quiet_ms: u64,
    },
}

fn default_quiet_ms() -> u64 {
    DEFAULT_QUIET_MS
}

impl Default for SettlePolicy {
    fn default() -> Self {
        SettlePolicy::Fixed
    }
}

/// How a settle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleOutcome {
    /// The full delay elapsed
    Elapsed,
    /// The document reported mutation quiet before the ceiling
    Quiet,
    /// Mutations continued up to the ceiling
    CeilingReached,
}

impl SettlePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SettlePolicy::Fixed => "fixed",
            SettlePolicy::MutationQuiet { .. } => "mutation_quiet",
        }
    }

    pub async fn settle(&self, document: &dyn Document, duration: Duration) -> SettleOutcome {
        let quiet_ms = match self {
            SettlePolicy::Fixed => {
                sleep(duration).await;
                return SettleOutcome::Elapsed;
            }
            SettlePolicy::MutationQuiet { quiet_ms } => *quiet_ms,
        };

        match document
            .wait_for_settle(Duration::from_millis(quiet_ms), duration)
            .await
        {
            Ok(SettleSignal::Quiet) => SettleOutcome::Quiet,
            Ok(SettleSignal::CeilingReached) => SettleOutcome::CeilingReached,
            Ok(SettleSignal::Unsupported) => {
                debug!("document has no mutation signal; using fixed delay");
                sleep(duration).await;
                SettleOutcome::Elapsed
            }
            Err(err) => {
                warn!(error = %err, "settle signal failed; using fixed delay");
                sleep(duration).await;
                SettleOutcome::Elapsed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::memory::MemoryDocument;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fixed_policy_sleeps_full_duration() {
        let doc = MemoryDocument::new().with_settle_signal(Duration::from_millis(100));
        let started = Instant::now();
        let outcome = SettlePolicy::Fixed
            .settle(&doc, Duration::from_millis(2_000))
            .await;
        assert_eq!(outcome, SettleOutcome::Elapsed);
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_quiet_returns_early_when_signalled() {
        let doc = MemoryDocument::new().with_settle_signal(Duration::from_millis(300));
        let policy = SettlePolicy::MutationQuiet { quiet_ms: 300 };
        let started = Instant::now();
        let outcome = policy.settle(&doc, Duration::from_millis(2_000)).await;
        assert_eq!(outcome, SettleOutcome::Quiet);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_quiet_falls_back_to_ceiling_without_signal() {
        let doc = MemoryDocument::new();
        let policy = SettlePolicy::MutationQuiet { quiet_ms: 300 };
        let started = Instant::now();
        let outcome = policy.settle(&doc, Duration::from_millis(1_500)).await;
        assert_eq!(outcome, SettleOutcome::Elapsed);
        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn policy_config_shape() {
        let policy: SettlePolicy = serde_json::from_str(r#"{"policy":"mutation_quiet"}"#).unwrap();
        assert_eq!(policy, SettlePolicy::MutationQuiet { quiet_ms: DEFAULT_QUIET_MS });
        let policy: SettlePolicy = serde_json::from_str(r#"{"policy":"fixed"}"#).unwrap();
        assert_eq!(policy, SettlePolicy::Fixed);
    }
}
