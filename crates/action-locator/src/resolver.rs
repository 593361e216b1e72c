//! Element resolver with candidate fallback and polling

use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{AdapterErrorKind, Document, NodeHandle};
use stepwise_core_types::{LocatorCandidate, Target};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::{errors::LocatorError, types::*};

/// Resolves targets against a live document.
#[derive(Clone)]
pub struct ElementLocator {
    document: Arc<dyn Document>,
    config: LocatorConfig,
}

/// Per-resolution bookkeeping.
struct Attempt<'a> {
    target: &'a Target,
    requirement: Requirement,
    started: Instant,
    rounds: u32,
    invalid: Vec<bool>,
}

impl ElementLocator {
    pub fn new(document: Arc<dyn Document>, config: LocatorConfig) -> Self {
        Self { document, config }
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// First attached node matched by any candidate, polling until `timeout`.
    pub async fn locate(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ResolvedNode, LocatorError> {
        self.resolve(target, timeout, Requirement::Attached).await
    }

    /// Like [`locate`](Self::locate), but the node must also have a rendered box.
    pub async fn locate_visible(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<ResolvedNode, LocatorError> {
        self.resolve(target, timeout, Requirement::Rendered).await
    }

    /// Single non-waiting round over all candidates.
    pub async fn probe(&self, target: &Target) -> Result<Option<ResolvedNode>, LocatorError> {
        let mut attempt = Attempt::new(target, Requirement::Attached);
        self.round(&mut attempt, 0..target.len()).await
    }

    async fn resolve(
        &self,
        target: &Target,
        timeout: Duration,
        requirement: Requirement,
    ) -> Result<ResolvedNode, LocatorError> {
        let mut attempt = Attempt::new(target, requirement);
        debug!(
            selector = %target,
            timeout_ms = timeout.as_millis() as u64,
            policy = self.config.budget_policy.name(),
            ?requirement,
            "resolving target"
        );

        let resolved = match self.config.budget_policy {
            BudgetPolicy::Shared => self.resolve_shared(&mut attempt, timeout).await?,
            BudgetPolicy::PerCandidate => self.resolve_per_candidate(&mut attempt, timeout).await?,
        };

        match resolved {
            Some(node) => {
                debug!(
                    selector = %node.candidate,
                    attempts = node.attempts,
                    latency_ms = node.elapsed.as_millis() as u64,
                    "target resolved"
                );
                Ok(node)
            }
            None => {
                let target = target.describe();
                let timeout_ms = timeout.as_millis() as u64;
                Err(match requirement {
                    Requirement::Attached => LocatorError::ElementNotFound { target, timeout_ms },
                    Requirement::Rendered => LocatorError::ElementNotVisible { target, timeout_ms },
                })
            }
        }
    }

    async fn resolve_shared(
        &self,
        attempt: &mut Attempt<'_>,
        timeout: Duration,
    ) -> Result<Option<ResolvedNode>, LocatorError> {
        let deadline = attempt.started + timeout;
        let count = attempt.target.len();
        loop {
            if let Some(node) = self.round(attempt, 0..count).await? {
                return Ok(Some(node));
            }
            if !self.wait_for_next_round(deadline).await {
                return Ok(None);
            }
        }
    }

    async fn resolve_per_candidate(
        &self,
        attempt: &mut Attempt<'_>,
        timeout: Duration,
    ) -> Result<Option<ResolvedNode>, LocatorError> {
        let count = attempt.target.len();
        let slice = timeout / count.max(1) as u32;
        for index in 0..count {
            let deadline = Instant::now() + slice;
            loop {
                if let Some(node) = self.round(attempt, index..index + 1).await? {
                    return Ok(Some(node));
                }
                if attempt.invalid[index] || !self.wait_for_next_round(deadline).await {
                    break;
                }
            }
        }
        Ok(None)
    }

    /// Sleep one poll interval, truncated at `deadline`. `false` once the deadline passed.
    async fn wait_for_next_round(&self, deadline: Instant) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(self.config.poll_interval().min(deadline - now)).await;
        true
    }

    /// Query the candidates in `range` once, in preference order.
    async fn round(
        &self,
        attempt: &mut Attempt<'_>,
        range: std::ops::Range<usize>,
    ) -> Result<Option<ResolvedNode>, LocatorError> {
        attempt.rounds += 1;
        let target = attempt.target;
        for index in range {
            if attempt.invalid[index] {
                continue;
            }
            let candidate = &target.candidates()[index];
            match self.check(candidate, attempt.requirement).await {
                Ok(Some(node)) => {
                    return Ok(Some(ResolvedNode {
                        node,
                        candidate: candidate.clone(),
                        candidate_index: index,
                        attempts: attempt.rounds,
                        elapsed: attempt.started.elapsed(),
                    }))
                }
                Ok(None) => {}
                Err(err) if err.is(AdapterErrorKind::InvalidSelector) => {
                    warn!(selector = %candidate, error = %err, "skipping invalid selector candidate");
                    attempt.invalid[index] = true;
                }
                Err(source) => {
                    return Err(LocatorError::Document {
                        target: target.describe(),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }

    async fn check(
        &self,
        candidate: &LocatorCandidate,
        requirement: Requirement,
    ) -> Result<Option<NodeHandle>, cdp_adapter::AdapterError> {
        let Some(node) = self.document.query(candidate).await? else {
            return Ok(None);
        };
        match requirement {
            Requirement::Attached => Ok(Some(node)),
            Requirement::Rendered => match self.document.is_rendered(node).await {
                Ok(true) => Ok(Some(node)),
                Ok(false) => Ok(None),
                Err(err) if err.is(AdapterErrorKind::NodeDetached) => Ok(None),
                Err(err) => Err(err),
            },
        }
    }
}

impl<'a> Attempt<'a> {
    fn new(target: &'a Target, requirement: Requirement) -> Self {
        Self {
            target,
            requirement,
            started: Instant::now(),
            rounds: 0,
            invalid: vec![false; target.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::memory::{MemoryDocument, NodeSpec};

    const POLL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);

    fn locator(doc: MemoryDocument, policy: BudgetPolicy) -> ElementLocator {
        ElementLocator::new(Arc::new(doc), LocatorConfig::default().with_policy(policy))
    }

    fn target(expressions: &[&str]) -> Target {
        Target::from_expressions(expressions.iter().copied()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn finds_node_that_appears_before_timeout() {
        let doc = MemoryDocument::new()
            .with_node(NodeSpec::new("#late").appear_after(Duration::from_millis(1_200)));
        let locator = locator(doc, BudgetPolicy::Shared);

        let started = Instant::now();
        let resolved = locator
            .locate(&target(&["#late"]), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(resolved.candidate.expression, "#late");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1_200));
        assert!(elapsed <= Duration::from_millis(1_200) + POLL);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_budget_plus_one_poll() {
        let doc = MemoryDocument::new()
            .with_node(NodeSpec::new("#later").appear_after(Duration::from_secs(30)));
        let locator = locator(doc, BudgetPolicy::Shared);
        let timeout = Duration::from_millis(2_000);

        let started = Instant::now();
        let err = locator
            .locate(&target(&["#later"]), timeout)
            .await
            .unwrap_err();

        assert!(matches!(err, LocatorError::ElementNotFound { timeout_ms: 2_000, .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + POLL);
    }

    #[tokio::test(start_paused = true)]
    async fn last_candidate_matches_under_both_policies() {
        for policy in [BudgetPolicy::Shared, BudgetPolicy::PerCandidate] {
            let doc = MemoryDocument::new().with_node(NodeSpec::new("#third"));
            let locator = locator(doc, policy);
            let timeout = Duration::from_millis(3_000);

            let started = Instant::now();
            let resolved = locator
                .locate(&target(&["#first", "#second", "#third"]), timeout)
                .await
                .unwrap();

            assert_eq!(resolved.candidate_index, 2, "policy {:?}", policy);
            assert!(started.elapsed() <= timeout, "policy {:?}", policy);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn per_candidate_slices_starve_slow_first_candidate() {
        let spec = || NodeSpec::new("#slow").appear_after(Duration::from_millis(1_500));
        let timeout = Duration::from_millis(2_000);
        let wanted = target(&["#slow", "#never"]);

        let shared = locator(MemoryDocument::new().with_node(spec()), BudgetPolicy::Shared);
        assert!(shared.locate(&wanted, timeout).await.is_ok());

        let sliced = locator(
            MemoryDocument::new().with_node(spec()),
            BudgetPolicy::PerCandidate,
        );
        let err = sliced.locate(&wanted, timeout).await.unwrap_err();
        assert!(matches!(err, LocatorError::ElementNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn visible_variant_requires_rendered_box() {
        let doc = MemoryDocument::new().with_node(NodeSpec::new("#ghost").hidden());
        let locator = locator(doc, BudgetPolicy::Shared);
        let wanted = target(&["#ghost"]);

        assert!(locator.locate(&wanted, Duration::from_secs(1)).await.is_ok());
        let err = locator
            .locate_visible(&wanted, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::ElementNotVisible { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_candidates_are_skipped() {
        let doc = MemoryDocument::new()
            .with_invalid_selector("a[[")
            .with_node(NodeSpec::new("#ok"));
        let locator = locator(doc, BudgetPolicy::Shared);

        let resolved = locator
            .locate(&target(&["a[[", "#ok"]), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resolved.candidate_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_does_not_wait() {
        let doc = MemoryDocument::new()
            .with_node(NodeSpec::new("#soon").appear_after(Duration::from_millis(100)));
        let locator = locator(doc, BudgetPolicy::Shared);

        let started = Instant::now();
        assert!(locator.probe(&target(&["#soon"])).await.unwrap().is_none());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn budget_policy_parses_config_spellings() {
        assert_eq!(BudgetPolicy::parse("per-candidate"), Some(BudgetPolicy::PerCandidate));
        assert_eq!(BudgetPolicy::parse("Shared"), Some(BudgetPolicy::Shared));
        assert_eq!(BudgetPolicy::parse("random"), None);

        let cfg: LocatorConfig = serde_json::from_str(r#"{"budget_policy":"per_candidate"}"#).unwrap();
        assert_eq!(cfg.budget_policy, BudgetPolicy::PerCandidate);
        assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }
}
