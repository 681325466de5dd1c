//! Interesting-only accessibility snapshots and their compact text rendering.
//!
//! The raw `Accessibility.getFullAXTree` payload is flattened into a tree that
//! keeps only nodes a user could perceive or act on: focusable nodes, form
//! controls, and named leaves. Anything else is dropped and its interesting
//! descendants are hoisted to the nearest kept ancestor.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;

use crate::types::{AccessibilityNode, AxNode};

#[derive(Debug, Error)]
pub enum AccessibilityError {
    #[error("unexpected response: {0}")]
    Unexpected(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

const CONTROL_ROLES: &[&str] = &[
    "button",
    "checkbox",
    "ColorWell",
    "combobox",
    "DisclosureTriangle",
    "listbox",
    "menu",
    "menubar",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "radio",
    "scrollbar",
    "searchbox",
    "slider",
    "spinbutton",
    "switch",
    "tab",
    "textbox",
    "tree",
    "treeitem",
];

const TEXT_ONLY_ROLES: &[&str] = &["LineBreak", "text", "InlineTextBox", "StaticText"];

const ATOMIC_ROLES: &[&str] = &[
    "doc-cover",
    "graphics-symbol",
    "img",
    "image",
    "Meter",
    "meter",
    "scrollbar",
    "slider",
    "separator",
    "progressbar",
];

/// Decode the `nodes` array of a `getFullAXTree` response.
pub fn parse_ax_nodes(payload: Value) -> Result<Vec<AxNode>, AccessibilityError> {
    let nodes = match payload {
        Value::Array(_) => payload,
        Value::Object(mut map) => map
            .remove("nodes")
            .ok_or_else(|| AccessibilityError::Unexpected("missing `nodes` field".into()))?,
        other => {
            return Err(AccessibilityError::Unexpected(format!(
                "expected accessibility nodes, got {other}"
            )));
        }
    };
    Ok(serde_json::from_value(nodes)?)
}

struct AxIndex<'a> {
    nodes: HashMap<&'a str, &'a AxNode>,
}

impl<'a> AxIndex<'a> {
    fn new(nodes: &'a [AxNode]) -> Self {
        Self {
            nodes: nodes
                .iter()
                .map(|node| (node.node_id.as_str(), node))
                .collect(),
        }
    }

    fn get(&self, id: &str) -> Option<&'a AxNode> {
        self.nodes.get(id).copied()
    }

    fn children(&self, node: &AxNode) -> Vec<&'a AxNode> {
        node.child_ids
            .iter()
            .flatten()
            .filter_map(|id| self.get(id))
            .collect()
    }

    fn is_control(node: &AxNode) -> bool {
        CONTROL_ROLES.contains(&node.role_text().as_str())
    }

    fn is_leaf(&self, node: &AxNode) -> bool {
        let children = self.children(node);
        if children.is_empty() {
            return true;
        }
        let role = node.role_text();
        if TEXT_ONLY_ROLES.contains(&role.as_str()) || ATOMIC_ROLES.contains(&role.as_str()) {
            return true;
        }
        if role == "textbox" && !node.has_flag("editable") {
            return true;
        }
        if children.iter().any(|child| self.has_focusable_descendant(child)) {
            return false;
        }
        let named = node.name_text().is_some();
        (node.has_flag("focusable") && named) || (role == "heading" && named)
    }

    fn has_focusable_descendant(&self, node: &AxNode) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.node_id.as_str()) {
                continue;
            }
            if current.has_flag("focusable") {
                return true;
            }
            stack.extend(self.children(current));
        }
        false
    }

    fn is_interesting(&self, node: &AxNode, inside_control: bool) -> bool {
        if node.ignored || node.role_text() == "Ignored" {
            return false;
        }
        if node.has_flag("focusable") || node.has_flag("editable") {
            return true;
        }
        if Self::is_control(node) {
            return true;
        }
        if inside_control {
            return false;
        }
        self.is_leaf(node) && node.name_text().is_some()
    }

    fn collect(
        &self,
        node: &AxNode,
        inside_control: bool,
        visiting: &mut HashSet<String>,
    ) -> Vec<AccessibilityNode> {
        if !visiting.insert(node.node_id.clone()) {
            return Vec::new();
        }

        let children = if self.is_leaf(node) {
            Vec::new()
        } else {
            let inside = inside_control || Self::is_control(node);
            self.children(node)
                .into_iter()
                .flat_map(|child| self.collect(child, inside, visiting))
                .collect()
        };

        let collected = if self.is_interesting(node, inside_control) {
            vec![snapshot_node(node, children)]
        } else {
            children
        };

        visiting.remove(&node.node_id);
        collected
    }
}

fn snapshot_node(node: &AxNode, children: Vec<AccessibilityNode>) -> AccessibilityNode {
    let text = |value: Option<&crate::types::AxValue>| {
        value
            .and_then(|value| value.as_text())
            .map(|text| normalize_whitespace(&text))
            .filter(|text| !text.is_empty())
    };

    AccessibilityNode {
        role: node.role_text(),
        name: node.name_text().map(|name| normalize_whitespace(&name)),
        value: text(node.value.as_ref()),
        description: text(node.description.as_ref()),
        children,
    }
}

/// Build the interesting-only snapshot from raw CDP nodes. The root document
/// node is always kept; `None` means the payload had no root.
pub fn build_interesting_tree(nodes: &[AxNode]) -> Option<AccessibilityNode> {
    let index = AxIndex::new(nodes);
    let root = nodes.iter().find(|node| node.parent_id.is_none())?;

    let mut visiting = HashSet::from([root.node_id.clone()]);
    let children = index
        .children(root)
        .into_iter()
        .flat_map(|child| index.collect(child, false, &mut visiting))
        .collect();

    Some(snapshot_node(root, children))
}

/// Render a snapshot as indented `role: name` lines, one node per line.
pub fn render_minimal_tree(root: &AccessibilityNode) -> String {
    let mut lines = Vec::new();
    render_node(root, 0, &mut lines);
    lines.join("\n")
}

fn render_node(node: &AccessibilityNode, level: usize, lines: &mut Vec<String>) {
    let mut line = format!("{}{}", "  ".repeat(level), node.role);
    if let Some(name) = node.name.as_deref().filter(|name| !name.is_empty()) {
        line.push_str(": ");
        line.push_str(name);
    }
    if let Some(value) = node.value.as_deref().filter(|value| !value.is_empty()) {
        line.push_str(&format!(" [value: {value}]"));
    }
    lines.push(line);

    for child in &node.children {
        render_node(child, level + 1, lines);
    }
}

fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AxProperty, AxValue};
    use serde_json::json;

    fn ax_value(value: &str) -> AxValue {
        AxValue {
            value_type: "string".to_string(),
            value: Some(Value::String(value.to_string())),
        }
    }

    fn flag(name: &str) -> AxProperty {
        AxProperty {
            name: name.to_string(),
            value: Some(AxValue {
                value_type: "boolean".to_string(),
                value: Some(Value::Bool(true)),
            }),
        }
    }

    fn node(id: &str, role: &str, name: Option<&str>, parent: Option<&str>, children: &[&str]) -> AxNode {
        AxNode {
            node_id: id.to_string(),
            role: Some(ax_value(role)),
            name: name.map(ax_value),
            parent_id: parent.map(str::to_string),
            child_ids: Some(children.iter().map(|c| c.to_string()).collect()),
            ..AxNode::default()
        }
    }

    fn sample_page() -> Vec<AxNode> {
        let mut link = node("6", "link", Some("More information..."), Some("5"), &["7"]);
        link.properties = Some(vec![flag("focusable")]);
        let mut input = node("8", "textbox", Some("Search"), Some("2"), &[]);
        input.value = Some(ax_value("rust"));
        input.properties = Some(vec![flag("focusable"), flag("editable")]);

        vec![
            node("1", "RootWebArea", Some("Example Domain"), None, &["2"]),
            node("2", "generic", None, Some("1"), &["3", "5", "8", "9"]),
            node("3", "heading", Some("Example Domain"), Some("2"), &["4"]),
            node("4", "StaticText", Some("Example Domain"), Some("3"), &[]),
            node("5", "paragraph", None, Some("2"), &["6"]),
            link,
            node("7", "StaticText", Some("More information..."), Some("6"), &[]),
            input,
            AxNode {
                ignored: true,
                ..node("9", "generic", None, Some("2"), &["10"])
            },
            node("10", "StaticText", Some("  hoisted\n text "), Some("9"), &[]),
        ]
    }

    #[test]
    fn prunes_uninteresting_nodes_and_hoists_children() {
        let tree = build_interesting_tree(&sample_page()).expect("root");

        assert_eq!(tree.role, "RootWebArea");
        let roles: Vec<_> = tree.children.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, ["heading", "link", "textbox", "StaticText"]);

        let heading = &tree.children[0];
        assert_eq!(heading.name.as_deref(), Some("Example Domain"));
        assert!(heading.children.is_empty());

        let textbox = &tree.children[2];
        assert_eq!(textbox.value.as_deref(), Some("rust"));

        assert_eq!(tree.children[3].name.as_deref(), Some("hoisted text"));
    }

    #[test]
    fn renders_role_name_value_with_indentation() {
        let tree = build_interesting_tree(&sample_page()).expect("root");
        let rendered = render_minimal_tree(&tree);

        assert_eq!(
            rendered,
            "RootWebArea: Example Domain\n  heading: Example Domain\n  link: More information...\n  textbox: Search [value: rust]\n  StaticText: hoisted text"
        );
    }

    #[test]
    fn controls_swallow_their_unfocusable_descendants() {
        let mut menu = node("2", "menu", Some("Options"), Some("1"), &["3"]);
        menu.properties = Some(vec![flag("focusable")]);
        let nodes = vec![
            node("1", "RootWebArea", None, None, &["2"]),
            menu,
            node("3", "group", None, Some("2"), &["4"]),
            node("4", "StaticText", Some("label"), Some("3"), &[]),
        ];

        let tree = build_interesting_tree(&nodes).expect("root");
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].role, "menu");
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn nested_rendering_indents_children() {
        let tree = AccessibilityNode::new("RootWebArea").with_children(vec![
            AccessibilityNode::new("list").with_children(vec![
                AccessibilityNode::new("listitem").with_name("first"),
                AccessibilityNode::new("spinbutton")
                    .with_name("Quantity")
                    .with_value("3"),
            ]),
        ]);

        assert_eq!(
            render_minimal_tree(&tree),
            "RootWebArea\n  list\n    listitem: first\n    spinbutton: Quantity [value: 3]"
        );
    }

    #[test]
    fn cyclic_payloads_terminate() {
        let nodes = vec![
            node("1", "RootWebArea", None, None, &["2"]),
            node("2", "button", Some("Loop"), Some("1"), &["3"]),
            node("3", "group", None, Some("2"), &["2"]),
        ];

        let tree = build_interesting_tree(&nodes).expect("root");
        assert_eq!(tree.children.len(), 1);
    }

    #[test]
    fn parse_ax_nodes_accepts_response_object() {
        let payload = json!({
            "nodes": [
                { "nodeId": "1", "ignored": false, "role": { "type": "role", "value": "RootWebArea" } }
            ]
        });
        let nodes = parse_ax_nodes(payload).expect("nodes");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].role_text(), "RootWebArea");

        let err = parse_ax_nodes(json!("nope")).expect_err("string payload");
        assert!(matches!(err, AccessibilityError::Unexpected(_)));
    }

    #[test]
    fn empty_payload_has_no_root() {
        assert!(build_interesting_tree(&[]).is_none());
    }
}
