//! Select primitive - Set the value of a choice control

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx, WaitCondition},
};
use cdp_adapter::DomEvent;
use chrono::Utc;
use std::time::Duration;
use stepwise_core_types::Target;
use tokio::time::Instant;
use tracing::{info, warn};

/// Execute select primitive
///
/// Resolves the target, writes `value` and emits a change notification. A target that
/// is not a `<select>` is still written (custom comboboxes accept values too), with a
/// warning.
pub async fn execute_select(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &Target,
    value: &str,
    timeout: Duration,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        action_id = %ctx.action_id,
        selector = %target,
        value = %value,
        "Executing select primitive"
    );

    let resolved = primitives
        .resolve(ctx, target, WaitCondition::Present, timeout)
        .await?;
    let document = primitives.document();
    let selector = resolved.candidate.expression.as_str();

    let tag = document
        .tag_name(resolved.node)
        .await
        .map_err(|err| ActionError::document("select", selector, err))?;
    if tag != "select" {
        warn!(
            action_id = %ctx.action_id,
            selector = %selector,
            tag = %tag,
            "Select target is not a choice control"
        );
    }

    document
        .set_value(resolved.node, value)
        .await
        .map_err(|err| ActionError::document("select", selector, err))?;
    document
        .dispatch_event(resolved.node, DomEvent::Change)
        .await
        .map_err(|err| ActionError::document("notify", selector, err))?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms).with_resolution(&resolved))
}
