//! Pause and settle primitives

use crate::{
    errors::ActionError,
    primitives::{ensure_active, DefaultActionPrimitives},
    types::{ActionReport, ExecCtx},
};
use chrono::Utc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Suspend for `duration` with no side effect. Cancellation ends the pause early.
pub async fn execute_pause(ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    ensure_active(ctx)?;

    debug!(action_id = %ctx.action_id, duration_ms = duration.as_millis() as u64, "Pausing");
    tokio::select! {
        _ = sleep(duration) => {}
        _ = ctx.cancel_token.cancelled() => {
            return Err(ActionError::Interrupted("cancelled during pause".to_string()));
        }
    }

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms))
}

/// Wait for transient UI to settle, bounded by `duration`.
pub async fn execute_settle(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    duration: Duration,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    ensure_active(ctx)?;

    let policy = primitives.settle_policy();
    let outcome = tokio::select! {
        outcome = policy.settle(primitives.document().as_ref(), duration) => outcome,
        _ = ctx.cancel_token.cancelled() => {
            return Err(ActionError::Interrupted("cancelled while settling".to_string()));
        }
    };

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    debug!(
        action_id = %ctx.action_id,
        policy = policy.name(),
        ?outcome,
        latency_ms,
        "Settled"
    );
    Ok(ActionReport::success(started_at, latency_ms).with_settle(outcome))
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::primitives;
    use crate::{ActionPrimitives, ExecCtx, SettleOutcome};
    use cdp_adapter::memory::MemoryDocument;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn pause_waits_requested_duration() {
        let (doc, primitives) = primitives(MemoryDocument::new());
        let started = Instant::now();

        primitives
            .pause(&ExecCtx::default(), Duration::from_millis(750))
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(750));
        assert!(doc.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_is_cut_short_by_cancellation() {
        let (_doc, primitives) = primitives(MemoryDocument::new());
        let ctx = ExecCtx::default();
        let token = ctx.cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let started = Instant::now();
        let err = primitives
            .pause(&ctx, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_reports_policy_outcome() {
        let (_doc, primitives) = primitives(MemoryDocument::new());
        let report = primitives
            .settle(&ExecCtx::default(), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(report.settle, Some(SettleOutcome::Elapsed));
    }
}
