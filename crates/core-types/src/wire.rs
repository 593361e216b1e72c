//! ActionPlan JSON wire format.
//!
//! Generators emit `[{ "action": "...", "details": { ... } }, ...]`. The flat
//! shorthand `{ "type": "click", "selector": "#btn" }` is accepted as well;
//! when both a `details` object and inline fields are present, `details` wins
//! field by field.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Selector field: one expression or an ordered list of fallbacks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireSelector {
    One(String),
    Many(Vec<String>),
}

impl WireSelector {
    pub fn expressions(&self) -> Vec<String> {
        match self {
            WireSelector::One(expression) => vec![expression.clone()],
            WireSelector::Many(expressions) => expressions.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<WireSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
}

impl WireDetails {
    /// Typed view of a raw `details` object.
    pub fn from_value(value: &Value) -> Result<WireDetails, serde_json::Error> {
        WireDetails::deserialize(value)
    }

    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        if let Some(selector) = self.selector {
            let selector = match selector {
                WireSelector::One(expression) => Value::String(expression),
                WireSelector::Many(expressions) => {
                    Value::Array(expressions.into_iter().map(Value::String).collect())
                }
            };
            map.insert("selector".into(), selector);
        }
        if let Some(text) = self.text {
            map.insert("text".into(), Value::String(text));
        }
        if let Some(value) = self.value {
            map.insert("value".into(), Value::String(value));
        }
        if let Some(timeout) = self.timeout {
            map.insert("timeout".into(), Value::from(timeout));
        }
        if let Some(ms) = self.ms {
            map.insert("ms".into(), Value::from(ms));
        }
        if let Some(object_name) = self.object_name {
            map.insert("objectName".into(), Value::String(object_name));
        }
        Value::Object(map)
    }
}

/// One entry of the wire array.
///
/// `details` is kept as raw JSON; it is only read as [`WireDetails`] once
/// the action is known to be supported.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WireAction {
    pub action: String,
    pub details: Value,
}

impl WireAction {
    pub fn new(action: impl Into<String>, details: WireDetails) -> Self {
        Self {
            action: action.into(),
            details: details.into_value(),
        }
    }

    pub fn typed_details(&self) -> Result<WireDetails, serde_json::Error> {
        WireDetails::from_value(&self.details)
    }
}

#[derive(Deserialize)]
struct RawWireAction {
    #[serde(alias = "type")]
    action: String,
    #[serde(default)]
    details: Option<Value>,
    #[serde(flatten)]
    inline: Map<String, Value>,
}

impl<'de> Deserialize<'de> for WireAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawWireAction::deserialize(deserializer)?;
        let mut merged = raw.inline;
        let details = match raw.details {
            Some(Value::Object(details)) => {
                merged.extend(details);
                Value::Object(merged)
            }
            None | Some(Value::Null) => Value::Object(merged),
            Some(other) => other,
        };
        Ok(WireAction {
            action: raw.action,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_details() {
        let action: WireAction = serde_json::from_str(
            r##"{"action":"type","details":{"selector":"#name","text":"Acme","timeout":2500}}"##,
        )
        .unwrap();
        assert_eq!(action.action, "type");
        let details = action.typed_details().unwrap();
        assert_eq!(details.selector, Some(WireSelector::One("#name".into())));
        assert_eq!(details.text.as_deref(), Some("Acme"));
        assert_eq!(details.timeout, Some(2500.0));
    }

    #[test]
    fn decodes_flat_shorthand_and_selector_lists() {
        let action: WireAction =
            serde_json::from_str(r##"{"type":"click","selector":["#a","//b"]}"##).unwrap();
        assert_eq!(action.action, "click");
        assert_eq!(
            action.typed_details().unwrap().selector.unwrap().expressions(),
            vec!["#a".to_string(), "//b".to_string()]
        );
    }

    #[test]
    fn object_name_uses_camel_case() {
        let action: WireAction =
            serde_json::from_str(r#"{"action":"app_launcher","details":{"objectName":"Account"}}"#)
                .unwrap();
        assert_eq!(
            action.typed_details().unwrap().object_name.as_deref(),
            Some("Account")
        );
    }

    #[test]
    fn details_override_inline_fields() {
        let action: WireAction = serde_json::from_str(
            r##"{"type":"click","selector":"#inline","details":{"selector":"#nested"}}"##,
        )
        .unwrap();
        assert_eq!(
            action.typed_details().unwrap().selector,
            Some(WireSelector::One("#nested".into()))
        );
    }

    #[test]
    fn foreign_detail_shapes_survive_decoding() {
        let action: WireAction = serde_json::from_str(
            r#"{"action":"scroll","details":{"selector":300,"text":13}}"#,
        )
        .unwrap();
        assert_eq!(action.action, "scroll");
        assert!(action.typed_details().is_err());
    }
}
