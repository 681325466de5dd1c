use serde::{Deserialize, Serialize};
use serde_json::Value;

/// AX property key/value pair as returned by Chromium accessibility snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxProperty {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AxValue>,
}

/// AX value wrapper that exposes both the primitive type and the value itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxValue {
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl AxValue {
    /// Render the wrapped value as text, unquoting JSON strings.
    pub fn as_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Raw accessibility node shape returned by `Accessibility.getFullAXTree`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AxNode {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(default)]
    pub ignored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AxValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<AxValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<AxValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AxValue>,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(rename = "childIds", skip_serializing_if = "Option::is_none")]
    pub child_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<AxProperty>>,
}

impl AxNode {
    pub fn role_text(&self) -> String {
        self.role
            .as_ref()
            .and_then(AxValue::as_text)
            .unwrap_or_default()
    }

    pub fn name_text(&self) -> Option<String> {
        self.name
            .as_ref()
            .and_then(AxValue::as_text)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }

    /// Whether a boolean AX property such as `focusable` is set.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.properties
            .iter()
            .flatten()
            .filter(|prop| prop.name == flag)
            .filter_map(|prop| prop.value.as_ref()?.value.as_ref())
            .any(|value| value.as_bool().unwrap_or(false))
    }
}

/// Node of the pruned, interesting-only accessibility snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AccessibilityNode {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AccessibilityNode>,
}

impl AccessibilityNode {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<AccessibilityNode>) -> Self {
        self.children = children;
        self
    }
}
