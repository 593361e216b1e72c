//! Click primitive - Native click with synthetic fallback

use crate::{
    errors::ActionError,
    primitives::{ensure_active, DefaultActionPrimitives},
    types::{ActionReport, ClickMode, ExecCtx, WaitCondition},
};
use action_locator::ResolvedNode;
use cdp_adapter::AdapterErrorKind;
use chrono::Utc;
use std::time::Duration;
use stepwise_core_types::Target;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Execute click primitive
///
/// Steps:
/// 1. Resolve the target (attached node)
/// 2. Scroll it into view
/// 3. Dispatch a native primary-button click
/// 4. If the native click is rejected, dispatch a synthetic click event instead
pub async fn execute_click(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &Target,
    timeout: Duration,
) -> Result<ActionReport, ActionError> {
    info!(
        action_id = %ctx.action_id,
        selector = %target,
        timeout_ms = timeout.as_millis() as u64,
        "Executing click primitive"
    );
    let resolved = primitives
        .resolve(ctx, target, WaitCondition::Present, timeout)
        .await?;
    execute_click_resolved(primitives, ctx, &resolved).await
}

pub async fn execute_click_resolved(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    resolved: &ResolvedNode,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    ensure_active(ctx)?;

    let document = primitives.document();
    let selector = resolved.candidate.expression.as_str();

    document
        .scroll_into_view(resolved.node)
        .await
        .map_err(|err| ActionError::document("scroll", selector, err))?;

    let mode = match document.native_click(resolved.node).await {
        Ok(()) => ClickMode::Native,
        Err(err) if err.is(AdapterErrorKind::ClickRejected) => {
            warn!(
                action_id = %ctx.action_id,
                selector = %selector,
                reason = %err,
                "Native click rejected; dispatching synthetic click"
            );
            document
                .synthetic_click(resolved.node)
                .await
                .map_err(|err| ActionError::document("click", selector, err))?;
            ClickMode::Synthetic
        }
        Err(err) => return Err(ActionError::document("click", selector, err)),
    };

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    debug!(
        action_id = %ctx.action_id,
        selector = %selector,
        ?mode,
        latency_ms,
        "Click completed"
    );

    Ok(ActionReport::success(started_at, latency_ms)
        .with_resolution(resolved)
        .with_click_mode(mode))
}
