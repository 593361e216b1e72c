//! Typed step model

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::locator::Target;

/// Default element timeout when a step does not carry one.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default pause duration when a `sleep` action does not carry one.
pub const DEFAULT_PAUSE_MS: u64 = 1_000;

/// Step kind enumeration, mirroring the wire `action` names.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Click,
    Type,
    SelectByValue,
    WaitForPresent,
    WaitForVisible,
    Pause,
    LaunchObjectWorkflow,
}

impl StepKind {
    /// Wire name used by plan generators.
    pub fn wire_name(&self) -> &'static str {
        match self {
            StepKind::Click => "click",
            StepKind::Type => "type",
            StepKind::SelectByValue => "selectByValue",
            StepKind::WaitForPresent => "waitFor",
            StepKind::WaitForVisible => "waitForVisible",
            StepKind::Pause => "sleep",
            StepKind::LaunchObjectWorkflow => "app_launcher",
        }
    }

    pub fn from_wire(action: &str) -> Option<Self> {
        match action {
            "click" => Some(StepKind::Click),
            "type" => Some(StepKind::Type),
            "selectByValue" => Some(StepKind::SelectByValue),
            "waitFor" => Some(StepKind::WaitForPresent),
            "waitForVisible" => Some(StepKind::WaitForVisible),
            "sleep" => Some(StepKind::Pause),
            "app_launcher" => Some(StepKind::LaunchObjectWorkflow),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One action to perform.
///
/// Each variant carries exactly the payload its kind requires, so a `Type`
/// step always has text and a `Pause` never has a target.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Click {
        target: Target,
        timeout_ms: u64,
    },
    Type {
        target: Target,
        text: String,
        timeout_ms: u64,
    },
    SelectByValue {
        target: Target,
        value: String,
        timeout_ms: u64,
    },
    WaitForPresent {
        target: Target,
        timeout_ms: u64,
    },
    WaitForVisible {
        target: Target,
        timeout_ms: u64,
    },
    Pause {
        duration_ms: u64,
    },
    LaunchObjectWorkflow {
        object: String,
        timeout_ms: u64,
    },
}

impl Step {
    pub fn click(target: Target) -> Self {
        Step::Click {
            target,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn type_text(target: Target, text: impl Into<String>) -> Self {
        Step::Type {
            target,
            text: text.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn select_by_value(target: Target, value: impl Into<String>) -> Self {
        Step::SelectByValue {
            target,
            value: value.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn wait_for_present(target: Target) -> Self {
        Step::WaitForPresent {
            target,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn wait_for_visible(target: Target) -> Self {
        Step::WaitForVisible {
            target,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn pause(duration_ms: u64) -> Self {
        Step::Pause { duration_ms }
    }

    pub fn launch_object(object: impl Into<String>) -> Self {
        Step::LaunchObjectWorkflow {
            object: object.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Override the element timeout. No-op for `Pause`.
    pub fn with_timeout_ms(mut self, value: u64) -> Self {
        match &mut self {
            Step::Click { timeout_ms, .. }
            | Step::Type { timeout_ms, .. }
            | Step::SelectByValue { timeout_ms, .. }
            | Step::WaitForPresent { timeout_ms, .. }
            | Step::WaitForVisible { timeout_ms, .. }
            | Step::LaunchObjectWorkflow { timeout_ms, .. } => *timeout_ms = value,
            Step::Pause { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Click { .. } => StepKind::Click,
            Step::Type { .. } => StepKind::Type,
            Step::SelectByValue { .. } => StepKind::SelectByValue,
            Step::WaitForPresent { .. } => StepKind::WaitForPresent,
            Step::WaitForVisible { .. } => StepKind::WaitForVisible,
            Step::Pause { .. } => StepKind::Pause,
            Step::LaunchObjectWorkflow { .. } => StepKind::LaunchObjectWorkflow,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            Step::Click { target, .. }
            | Step::Type { target, .. }
            | Step::SelectByValue { target, .. }
            | Step::WaitForPresent { target, .. }
            | Step::WaitForVisible { target, .. } => Some(target),
            Step::Pause { .. } | Step::LaunchObjectWorkflow { .. } => None,
        }
    }

    /// Element timeout budget; `None` for `Pause`.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Step::Click { timeout_ms, .. }
            | Step::Type { timeout_ms, .. }
            | Step::SelectByValue { timeout_ms, .. }
            | Step::WaitForPresent { timeout_ms, .. }
            | Step::WaitForVisible { timeout_ms, .. }
            | Step::LaunchObjectWorkflow { timeout_ms, .. } => {
                Some(Duration::from_millis(*timeout_ms))
            }
            Step::Pause { .. } => None,
        }
    }

    /// Human-readable description used in logs and failure messages.
    pub fn describe(&self) -> String {
        match self {
            Step::Click { target, .. } => format!("click '{}'", target),
            Step::Type { target, text, .. } => {
                format!("type {} chars into '{}'", text.chars().count(), target)
            }
            Step::SelectByValue { target, value, .. } => {
                format!("select value '{}' in '{}'", value, target)
            }
            Step::WaitForPresent { target, .. } => format!("wait for '{}'", target),
            Step::WaitForVisible { target, .. } => format!("wait for visible '{}'", target),
            Step::Pause { duration_ms } => format!("pause {}ms", duration_ms),
            Step::LaunchObjectWorkflow { object, .. } => {
                format!("open creation form for '{}'", object)
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_kind() {
        for kind in [
            StepKind::Click,
            StepKind::Type,
            StepKind::SelectByValue,
            StepKind::WaitForPresent,
            StepKind::WaitForVisible,
            StepKind::Pause,
            StepKind::LaunchObjectWorkflow,
        ] {
            assert_eq!(StepKind::from_wire(kind.wire_name()), Some(kind));
        }
        assert_eq!(StepKind::from_wire("hover"), None);
    }

    #[test]
    fn pause_has_no_target_or_timeout() {
        let step = Step::pause(250).with_timeout_ms(5);
        assert!(step.target().is_none());
        assert!(step.timeout().is_none());
        assert_eq!(step, Step::Pause { duration_ms: 250 });
    }

    #[test]
    fn type_description_does_not_leak_text() {
        let step = Step::type_text(Target::single("#name").unwrap(), "secret");
        let description = step.describe();
        assert!(description.contains("#name"));
        assert!(!description.contains("secret"));
    }
}
