//! Wait primitive - Explicit waits for present or visible targets

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, WaitCondition},
};
use chrono::Utc;
use std::time::Duration;
use stepwise_core_types::Target;
use tokio::time::Instant;
use tracing::info;

/// Execute wait primitive
///
/// Resolves the target under `condition` and reports the node; nothing else is done to it.
pub async fn execute_wait(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &Target,
    condition: WaitCondition,
    timeout: Duration,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        action_id = %ctx.action_id,
        selector = %target,
        ?condition,
        timeout_ms = timeout.as_millis() as u64,
        "Executing wait primitive"
    );

    let resolved = primitives.resolve(ctx, target, condition, timeout).await?;
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms).with_resolution(&resolved))
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::{primitives, target};
    use crate::{ActionError, ActionPrimitives, ExecCtx, WaitCondition};
    use action_locator::LocatorError;
    use cdp_adapter::memory::{MemoryDocument, NodeSpec};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn wait_reports_resolved_node_without_touching_it() {
        let (doc, primitives) = primitives(
            MemoryDocument::new()
                .with_node(NodeSpec::new("#list").appear_after(Duration::from_millis(800))),
        );

        let report = primitives
            .wait_for(
                &ExecCtx::default(),
                &target("#list"),
                WaitCondition::Present,
                Duration::from_secs(3),
            )
            .await
            .unwrap();

        assert!(report.node.is_some());
        assert!(doc.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_node_fails_visible_wait() {
        let (_doc, primitives) =
            primitives(MemoryDocument::new().with_node(NodeSpec::new("#modal").hidden()));

        let err = primitives
            .wait_for(
                &ExecCtx::default(),
                &target("#modal"),
                WaitCondition::Visible,
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ActionError::Locator(LocatorError::ElementNotVisible { .. })
        ));
    }
}
