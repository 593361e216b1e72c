//! Action primitives implementation
//!
//! Core primitives a plan step maps onto:
//! 1. click - native click with synthetic fallback
//! 2. type_text - focus, clear, write, notify input + change
//! 3. select - write a choice control's value, notify change
//! 4. wait - explicit waits for present / visible targets
//! 5. pause / settle - timed suspension, optionally ended by a mutation-quiet signal

mod click;
mod pause;
mod select;
mod type_text;
mod wait;

pub use click::*;
pub use pause::*;
pub use select::*;
pub use type_text::*;
pub use wait::*;

use std::sync::Arc;
use std::time::Duration;

use action_locator::{ElementLocator, ResolvedNode};
use async_trait::async_trait;
use cdp_adapter::Document;
use stepwise_core_types::Target;

use crate::{
    errors::ActionError,
    types::{ActionReport, ExecCtx, Notify, WaitCondition},
    waiting::SettlePolicy,
};

/// Action primitives trait
///
/// Target-based operations resolve the target first; `*_resolved` operations act on a
/// node the caller already resolved (used by compound workflows).
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Locator used for target resolution
    fn locator(&self) -> &ElementLocator;

    async fn click(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError>;

    async fn click_resolved(
        &self,
        ctx: &ExecCtx,
        resolved: &ResolvedNode,
    ) -> Result<ActionReport, ActionError>;

    async fn type_text(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        text: &str,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError>;

    /// Clear and write `text`, then emit `notify` events.
    async fn fill_resolved(
        &self,
        ctx: &ExecCtx,
        resolved: &ResolvedNode,
        text: &str,
        notify: Notify,
    ) -> Result<ActionReport, ActionError>;

    async fn select_value(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        value: &str,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError>;

    async fn wait_for(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError>;

    async fn pause(&self, ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError>;

    /// Wait for transient UI to settle, per the configured policy.
    async fn settle(&self, ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError>;
}

/// Default implementation of action primitives
pub struct DefaultActionPrimitives {
    locator: ElementLocator,
    settle_policy: SettlePolicy,
}

impl DefaultActionPrimitives {
    pub fn new(locator: ElementLocator, settle_policy: SettlePolicy) -> Self {
        Self {
            locator,
            settle_policy,
        }
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        self.locator.document()
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        self.settle_policy
    }

    /// Resolve a target, aborting early when the context is cancelled.
    pub async fn resolve(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<ResolvedNode, ActionError> {
        ensure_active(ctx)?;
        let resolution = async {
            match condition {
                WaitCondition::Present => self.locator.locate(target, timeout).await,
                WaitCondition::Visible => self.locator.locate_visible(target, timeout).await,
            }
        };
        tokio::select! {
            result = resolution => Ok(result?),
            _ = ctx.cancel_token.cancelled() => Err(ActionError::Interrupted(format!(
                "cancelled while resolving {}",
                target
            ))),
        }
    }
}

pub(crate) fn ensure_active(ctx: &ExecCtx) -> Result<(), ActionError> {
    if ctx.is_cancelled() {
        return Err(ActionError::Interrupted("Context cancelled".to_string()));
    }
    Ok(())
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    fn locator(&self) -> &ElementLocator {
        &self.locator
    }

    async fn click(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError> {
        click::execute_click(self, ctx, target, timeout).await
    }

    async fn click_resolved(
        &self,
        ctx: &ExecCtx,
        resolved: &ResolvedNode,
    ) -> Result<ActionReport, ActionError> {
        click::execute_click_resolved(self, ctx, resolved).await
    }

    async fn type_text(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        text: &str,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError> {
        type_text::execute_type_text(self, ctx, target, text, timeout).await
    }

    async fn fill_resolved(
        &self,
        ctx: &ExecCtx,
        resolved: &ResolvedNode,
        text: &str,
        notify: Notify,
    ) -> Result<ActionReport, ActionError> {
        type_text::execute_fill(self, ctx, resolved, text, notify).await
    }

    async fn select_value(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        value: &str,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError> {
        select::execute_select(self, ctx, target, value, timeout).await
    }

    async fn wait_for(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<ActionReport, ActionError> {
        wait::execute_wait(self, ctx, target, condition, timeout).await
    }

    async fn pause(&self, ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError> {
        pause::execute_pause(ctx, duration).await
    }

    async fn settle(&self, ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError> {
        pause::execute_settle(self, ctx, duration).await
    }
}
