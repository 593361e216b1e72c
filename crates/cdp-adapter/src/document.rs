use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stepwise_core_types::LocatorCandidate;

use crate::error::AdapterError;

/// Opaque reference to a node previously returned by a [`Document`] query.
///
/// Handles stay valid until the node leaves the document; operations on a
/// detached node fail with [`AdapterErrorKind::NodeDetached`](crate::AdapterErrorKind).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Notifications emitted so reactive UI frameworks pick up programmatic changes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEvent {
    Input,
    Change,
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
        }
    }
}

/// How a settle wait ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleSignal {
    /// No mutation was observed for the quiet window
    Quiet,
    /// Mutations kept coming until the ceiling elapsed
    CeilingReached,
    /// The document cannot observe mutations; nothing was awaited
    Unsupported,
}

/// Port to the live document a plan runs against.
#[async_trait]
pub trait Document: Send + Sync {
    /// First attached node matched by the candidate, if any.
    async fn query(&self, candidate: &LocatorCandidate) -> Result<Option<NodeHandle>, AdapterError>;

    /// Every attached node matched by the candidate, in document order.
    async fn query_all(&self, candidate: &LocatorCandidate) -> Result<Vec<NodeHandle>, AdapterError>;

    async fn is_attached(&self, node: NodeHandle) -> Result<bool, AdapterError>;

    /// Whether the node currently has a non-empty rendered box.
    async fn is_rendered(&self, node: NodeHandle) -> Result<bool, AdapterError>;

    async fn scroll_into_view(&self, node: NodeHandle) -> Result<(), AdapterError>;

    /// Primary-button click through the input pipeline.
    ///
    /// Fails with `ClickRejected` when the node cannot receive the click
    /// (covered, zero-sized, off-screen).
    async fn native_click(&self, node: NodeHandle) -> Result<(), AdapterError>;

    /// Dispatch a synthetic `click` event directly on the node.
    async fn synthetic_click(&self, node: NodeHandle) -> Result<(), AdapterError>;

    async fn focus(&self, node: NodeHandle) -> Result<(), AdapterError>;

    /// Replace the node's value without emitting notifications.
    async fn set_value(&self, node: NodeHandle, value: &str) -> Result<(), AdapterError>;

    async fn dispatch_event(&self, node: NodeHandle, event: DomEvent) -> Result<(), AdapterError>;

    /// Lower-case tag name.
    async fn tag_name(&self, node: NodeHandle) -> Result<String, AdapterError>;

    async fn text_content(&self, node: NodeHandle) -> Result<String, AdapterError>;

    /// Resolve once no mutation happened for `quiet`, bounded by `ceiling`.
    async fn wait_for_settle(
        &self,
        quiet: Duration,
        ceiling: Duration,
    ) -> Result<SettleSignal, AdapterError>;
}
