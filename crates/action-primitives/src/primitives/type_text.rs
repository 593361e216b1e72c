//! Type text primitive - Write text into input fields

use crate::{
    errors::ActionError,
    primitives::{ensure_active, DefaultActionPrimitives},
    types::{ActionReport, ExecCtx, Notify, WaitCondition},
};
use action_locator::ResolvedNode;
use chrono::Utc;
use std::time::Duration;
use stepwise_core_types::Target;
use tokio::time::Instant;
use tracing::{debug, info};

/// Execute type_text primitive
///
/// Resolves the target, focuses it, clears the existing value, writes `text` and
/// emits input + change so reactive UIs pick the new value up.
pub async fn execute_type_text(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &Target,
    text: &str,
    timeout: Duration,
) -> Result<ActionReport, ActionError> {
    info!(
        action_id = %ctx.action_id,
        selector = %target,
        text_length = text.chars().count(),
        "Executing type_text primitive"
    );
    let resolved = primitives
        .resolve(ctx, target, WaitCondition::Present, timeout)
        .await?;
    execute_fill(primitives, ctx, &resolved, text, Notify::InputAndChange).await
}

pub async fn execute_fill(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    resolved: &ResolvedNode,
    text: &str,
    notify: Notify,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();
    ensure_active(ctx)?;

    let document = primitives.document();
    let selector = resolved.candidate.expression.as_str();
    let node = resolved.node;

    document
        .focus(node)
        .await
        .map_err(|err| ActionError::document("focus", selector, err))?;
    document
        .set_value(node, "")
        .await
        .map_err(|err| ActionError::document("clear", selector, err))?;
    document
        .set_value(node, text)
        .await
        .map_err(|err| ActionError::document("type", selector, err))?;
    for event in notify.events() {
        document
            .dispatch_event(node, *event)
            .await
            .map_err(|err| ActionError::document("notify", selector, err))?;
    }

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    debug!(
        action_id = %ctx.action_id,
        selector = %selector,
        ?notify,
        latency_ms,
        "Text written"
    );
    Ok(ActionReport::success(started_at, latency_ms).with_resolution(resolved))
}
