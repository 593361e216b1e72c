//! Immutable action plan and its decoding from the wire format

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::errors::PlanError;
use crate::locator::Target;
use crate::step::{Step, StepKind, DEFAULT_PAUSE_MS, DEFAULT_TIMEOUT_MS};
use crate::wire::{WireAction, WireDetails, WireSelector};

/// One position in a plan.
///
/// Unknown wire actions keep their slot so step indices reported to callers
/// match the positions in the array they submitted.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanEntry {
    Step(Step),
    Unsupported { action: String },
}

/// Ordered, finite sequence of steps consumed by a single run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionPlan {
    entries: Vec<PlanEntry>,
}

impl ActionPlan {
    pub fn new(entries: Vec<PlanEntry>) -> Self {
        Self { entries }
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            entries: steps.into_iter().map(PlanEntry::Step).collect(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, PlanError> {
        let actions: Vec<WireAction> = serde_json::from_str(raw)?;
        Self::from_wire(actions)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, PlanError> {
        let actions: Vec<WireAction> = serde_json::from_value(value)?;
        Self::from_wire(actions)
    }

    /// Decode wire actions, validating each step's required fields.
    pub fn from_wire(actions: Vec<WireAction>) -> Result<Self, PlanError> {
        let mut entries = Vec::with_capacity(actions.len());
        for (offset, action) in actions.into_iter().enumerate() {
            let index = offset + 1;
            match StepKind::from_wire(action.action.trim()) {
                Some(kind) => {
                    let details = action.typed_details().map_err(|err| {
                        PlanError::invalid_step(index, format!("{} details: {}", kind, err))
                    })?;
                    entries.push(PlanEntry::Step(decode_step(index, kind, details)?));
                }
                None => {
                    debug!(index, action = %action.action, "keeping unsupported action slot");
                    entries.push(PlanEntry::Unsupported {
                        action: action.action,
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn to_wire(&self) -> Vec<WireAction> {
        self.entries.iter().map(encode_entry).collect()
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that map to a supported step kind.
    pub fn step_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, PlanEntry::Step(_)))
            .count()
    }

    /// `(index, action)` pairs of unsupported entries, 1-based.
    pub fn unsupported(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(offset, entry)| match entry {
                PlanEntry::Unsupported { action } => Some((offset + 1, action.as_str())),
                PlanEntry::Step(_) => None,
            })
    }
}

impl Serialize for ActionPlan {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire().serialize(serializer)
    }
}

fn decode_step(index: usize, kind: StepKind, details: WireDetails) -> Result<Step, PlanError> {
    let timeout_ms = millis(index, "timeout", details.timeout)?.unwrap_or(DEFAULT_TIMEOUT_MS);

    let step = match kind {
        StepKind::Pause => Step::Pause {
            duration_ms: millis(index, "ms", details.ms)?.unwrap_or(DEFAULT_PAUSE_MS),
        },
        StepKind::LaunchObjectWorkflow => {
            let object = details
                .object_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .ok_or_else(|| PlanError::invalid_step(index, "app_launcher requires objectName"))?;
            Step::LaunchObjectWorkflow { object, timeout_ms }
        }
        StepKind::Click => Step::Click {
            target: target(index, kind, details.selector)?,
            timeout_ms,
        },
        StepKind::Type => {
            let target = target(index, kind, details.selector)?;
            let text = details
                .text
                .ok_or_else(|| PlanError::invalid_step(index, "type requires text"))?;
            Step::Type {
                target,
                text,
                timeout_ms,
            }
        }
        StepKind::SelectByValue => {
            let target = target(index, kind, details.selector)?;
            let value = details
                .value
                .ok_or_else(|| PlanError::invalid_step(index, "selectByValue requires value"))?;
            Step::SelectByValue {
                target,
                value,
                timeout_ms,
            }
        }
        StepKind::WaitForPresent => Step::WaitForPresent {
            target: target(index, kind, details.selector)?,
            timeout_ms,
        },
        StepKind::WaitForVisible => Step::WaitForVisible {
            target: target(index, kind, details.selector)?,
            timeout_ms,
        },
    };
    Ok(step)
}

fn target(index: usize, kind: StepKind, selector: Option<WireSelector>) -> Result<Target, PlanError> {
    let selector = selector
        .ok_or_else(|| PlanError::invalid_step(index, format!("{} requires a selector", kind)))?;
    Target::from_expressions(selector.expressions()).map_err(|_| {
        PlanError::invalid_step(index, format!("{} selector must not be blank", kind))
    })
}

fn millis(index: usize, field: &str, raw: Option<f64>) -> Result<Option<u64>, PlanError> {
    match raw {
        None => Ok(None),
        Some(value) if value.is_finite() && value >= 0.0 => Ok(Some(value.round() as u64)),
        Some(value) => Err(PlanError::invalid_step(
            index,
            format!("{} must be a non-negative number, got {}", field, value),
        )),
    }
}

fn encode_entry(entry: &PlanEntry) -> WireAction {
    let step = match entry {
        PlanEntry::Unsupported { action } => {
            return WireAction::new(action.clone(), WireDetails::default())
        }
        PlanEntry::Step(step) => step,
    };

    let mut details = WireDetails::default();
    if let Some(target) = step.target() {
        let expressions: Vec<String> = target
            .candidates()
            .iter()
            .map(|candidate| candidate.expression.clone())
            .collect();
        details.selector = Some(if expressions.len() == 1 {
            WireSelector::One(expressions[0].clone())
        } else {
            WireSelector::Many(expressions)
        });
    }
    if let Some(timeout) = step.timeout() {
        details.timeout = Some(timeout.as_millis() as f64);
    }
    match step {
        Step::Type { text, .. } => details.text = Some(text.clone()),
        Step::SelectByValue { value, .. } => details.value = Some(value.clone()),
        Step::Pause { duration_ms } => details.ms = Some(*duration_ms as f64),
        Step::LaunchObjectWorkflow { object, .. } => details.object_name = Some(object.clone()),
        _ => {}
    }

    WireAction::new(step.kind().wire_name(), details)
}
