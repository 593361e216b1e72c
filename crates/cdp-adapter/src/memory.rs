//! Scripted in-memory document.
//!
//! Nodes are matched by exact selector expression, can show up after a delay or
//! after another node is clicked, and record every interaction they receive. Time is
//! measured with `tokio::time::Instant`, so tests running on a paused clock see
//! deterministic appearance and timeout behaviour.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use stepwise_core_types::LocatorCandidate;
use tokio::time::Instant;

use crate::document::{Document, DomEvent, NodeHandle, SettleSignal};
use crate::error::{AdapterError, AdapterErrorKind};

/// One interaction a node received.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Interaction {
    ScrollIntoView,
    NativeClick,
    SyntheticClick,
    Focus,
    SetValue(String),
    Event(DomEvent),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedEvent {
    /// First selector of the node that received the interaction
    pub node: String,
    pub interaction: Interaction,
}

/// Builder describing one node of the document.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    selectors: Vec<String>,
    tag: String,
    text: String,
    value: String,
    appear_after: Duration,
    revealed_by: Option<String>,
    rendered: bool,
    rejects_native_click: bool,
    detach_on_click: bool,
}

impl NodeSpec {
    /// Node matched by `selector`; add more with [`NodeSpec::also`].
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selectors: vec![selector.into()],
            tag: "div".to_string(),
            text: String::new(),
            value: String::new(),
            appear_after: Duration::ZERO,
            revealed_by: None,
            rendered: true,
            rejects_native_click: false,
            detach_on_click: false,
        }
    }

    pub fn also(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Attach the node only once `delay` has elapsed since the document was built.
    pub fn appear_after(mut self, delay: Duration) -> Self {
        self.appear_after = delay;
        self
    }

    /// Attach the node only after a node matching `selector` receives a click.
    pub fn revealed_by(mut self, selector: impl Into<String>) -> Self {
        self.revealed_by = Some(selector.into());
        self
    }

    /// Attached but without a rendered box.
    pub fn hidden(mut self) -> Self {
        self.rendered = false;
        self
    }

    pub fn rejecting_native_click(mut self) -> Self {
        self.rejects_native_click = true;
        self
    }

    /// Remove the node from the document once it is clicked.
    pub fn detach_on_click(mut self) -> Self {
        self.detach_on_click = true;
        self
    }
}

#[derive(Debug)]
struct MemoryNode {
    spec: NodeSpec,
    value: String,
    revealed: bool,
    detached: bool,
}

impl MemoryNode {
    fn label(&self) -> String {
        self.spec.selectors.first().cloned().unwrap_or_default()
    }

    fn attached(&self, elapsed: Duration) -> bool {
        !self.detached
            && elapsed >= self.spec.appear_after
            && (self.spec.revealed_by.is_none() || self.revealed)
    }

    fn matches(&self, expression: &str) -> bool {
        self.spec.selectors.iter().any(|selector| selector == expression)
    }
}

#[derive(Debug)]
struct MemoryState {
    nodes: Vec<MemoryNode>,
    events: Vec<RecordedEvent>,
    queries: usize,
}

/// In-memory [`Document`] test double.
#[derive(Debug)]
pub struct MemoryDocument {
    created: Instant,
    state: Mutex<MemoryState>,
    invalid_selectors: Vec<String>,
    settle_quiet: Option<Duration>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            state: Mutex::new(MemoryState {
                nodes: Vec::new(),
                events: Vec::new(),
                queries: 0,
            }),
            invalid_selectors: Vec::new(),
            settle_quiet: None,
        }
    }

    pub fn with_node(self, spec: NodeSpec) -> Self {
        self.lock().nodes.push(MemoryNode {
            value: spec.value.clone(),
            spec,
            revealed: false,
            detached: false,
        });
        self
    }

    /// Queries for `expression` fail with `InvalidSelector`.
    pub fn with_invalid_selector(mut self, expression: impl Into<String>) -> Self {
        self.invalid_selectors.push(expression.into());
        self
    }

    /// Report mutation quiet after `quiet` (capped by the requested ceiling).
    pub fn with_settle_signal(mut self, quiet: Duration) -> Self {
        self.settle_quiet = Some(quiet);
        self
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().events.clone()
    }

    /// Interactions received by the node whose first selector is `selector`.
    pub fn interactions(&self, selector: &str) -> Vec<Interaction> {
        self.lock()
            .events
            .iter()
            .filter(|event| event.node == selector)
            .map(|event| event.interaction.clone())
            .collect()
    }

    pub fn clicks(&self, selector: &str) -> usize {
        self.interactions(selector)
            .iter()
            .filter(|interaction| {
                matches!(
                    interaction,
                    Interaction::NativeClick | Interaction::SyntheticClick
                )
            })
            .count()
    }

    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.lock()
            .nodes
            .iter()
            .find(|node| node.matches(selector))
            .map(|node| node.value.clone())
    }

    /// Number of query round-trips served.
    pub fn query_count(&self) -> usize {
        self.lock().queries
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created)
    }

    fn check_selector(&self, candidate: &LocatorCandidate) -> Result<(), AdapterError> {
        if self.invalid_selectors.contains(&candidate.expression) {
            return Err(AdapterError::new(AdapterErrorKind::InvalidSelector)
                .with_hint(candidate.to_string()));
        }
        Ok(())
    }

    fn index(node: NodeHandle) -> usize {
        (node.id() as usize).saturating_sub(1)
    }

    /// Apply `op` to an attached node and record `interaction` against it.
    fn touch<T>(
        &self,
        node: NodeHandle,
        interaction: Option<Interaction>,
        op: impl FnOnce(&mut MemoryNode) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let elapsed = self.elapsed();
        let mut state = self.lock();
        let target = state
            .nodes
            .get_mut(Self::index(node))
            .filter(|candidate| candidate.attached(elapsed))
            .ok_or_else(|| AdapterError::detached().with_hint(node.to_string()))?;
        let label = target.label();
        let result = op(target)?;
        if let Some(interaction) = interaction {
            state.events.push(RecordedEvent {
                node: label,
                interaction,
            });
        }
        Ok(result)
    }

    fn click(&self, node: NodeHandle, interaction: Interaction) -> Result<(), AdapterError> {
        let native = interaction == Interaction::NativeClick;
        let (selectors, detach) = self.touch(node, None, |target| {
            if native && (target.spec.rejects_native_click || !target.spec.rendered) {
                return Err(AdapterError::new(AdapterErrorKind::ClickRejected)
                    .with_hint(format!("{} cannot receive pointer input", target.label())));
            }
            Ok((target.spec.selectors.clone(), target.spec.detach_on_click))
        })?;

        let mut state = self.lock();
        state.events.push(RecordedEvent {
            node: selectors.first().cloned().unwrap_or_default(),
            interaction,
        });
        for other in state.nodes.iter_mut() {
            if let Some(trigger) = &other.spec.revealed_by {
                if selectors.iter().any(|selector| selector == trigger) {
                    other.revealed = true;
                }
            }
        }
        if detach {
            if let Some(target) = state.nodes.get_mut(Self::index(node)) {
                target.detached = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Document for MemoryDocument {
    async fn query(&self, candidate: &LocatorCandidate) -> Result<Option<NodeHandle>, AdapterError> {
        Ok(self.query_all(candidate).await?.into_iter().next())
    }

    async fn query_all(&self, candidate: &LocatorCandidate) -> Result<Vec<NodeHandle>, AdapterError> {
        self.check_selector(candidate)?;
        let elapsed = self.elapsed();
        let mut state = self.lock();
        state.queries += 1;
        Ok(state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.attached(elapsed) && node.matches(&candidate.expression))
            .map(|(index, _)| NodeHandle::new(index as u64 + 1))
            .collect())
    }

    async fn is_attached(&self, node: NodeHandle) -> Result<bool, AdapterError> {
        let elapsed = self.elapsed();
        Ok(self
            .lock()
            .nodes
            .get(Self::index(node))
            .map(|target| target.attached(elapsed))
            .unwrap_or(false))
    }

    async fn is_rendered(&self, node: NodeHandle) -> Result<bool, AdapterError> {
        self.touch(node, None, |target| Ok(target.spec.rendered))
    }

    async fn scroll_into_view(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.touch(node, Some(Interaction::ScrollIntoView), |_| Ok(()))
    }

    async fn native_click(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.click(node, Interaction::NativeClick)
    }

    async fn synthetic_click(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.click(node, Interaction::SyntheticClick)
    }

    async fn focus(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.touch(node, Some(Interaction::Focus), |_| Ok(()))
    }

    async fn set_value(&self, node: NodeHandle, value: &str) -> Result<(), AdapterError> {
        self.touch(node, Some(Interaction::SetValue(value.to_string())), |target| {
            target.value = value.to_string();
            Ok(())
        })
    }

    async fn dispatch_event(&self, node: NodeHandle, event: DomEvent) -> Result<(), AdapterError> {
        self.touch(node, Some(Interaction::Event(event)), |_| Ok(()))
    }

    async fn tag_name(&self, node: NodeHandle) -> Result<String, AdapterError> {
        self.touch(node, None, |target| Ok(target.spec.tag.to_ascii_lowercase()))
    }

    async fn text_content(&self, node: NodeHandle) -> Result<String, AdapterError> {
        self.touch(node, None, |target| Ok(target.spec.text.clone()))
    }

    async fn wait_for_settle(
        &self,
        _quiet: Duration,
        ceiling: Duration,
    ) -> Result<SettleSignal, AdapterError> {
        match self.settle_quiet {
            None => Ok(SettleSignal::Unsupported),
            Some(quiet) if quiet < ceiling => {
                tokio::time::sleep(quiet).await;
                Ok(SettleSignal::Quiet)
            }
            Some(_) => {
                tokio::time::sleep(ceiling).await;
                Ok(SettleSignal::CeilingReached)
            }
        }
    }
}
