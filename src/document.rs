use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Text,
    File,
    Link,
    Group,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Link => "link",
            Self::Group => "group",
        }
    }
}

/// One node of the persisted canvas document.
///
/// `collapsed`, `alias` and `thumbnail` are the additive metadata fields this
/// crate owns. Anything else the host stores round-trips through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeData {
    pub fn new(id: impl Into<String>, kind: NodeKind, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            kind,
            x: bounds.min_x,
            y: bounds.min_y,
            width: bounds.width(),
            height: bounds.height(),
            text: None,
            file: None,
            url: None,
            label: None,
            collapsed: None,
            alias: None,
            thumbnail: None,
            extra: Map::new(),
        }
    }

    pub fn text(id: impl Into<String>, bounds: Rect, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(id, NodeKind::Text, bounds)
        }
    }

    pub fn file(id: impl Into<String>, bounds: Rect, path: impl Into<String>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::new(id, NodeKind::File, bounds)
        }
    }

    pub fn link(id: impl Into<String>, bounds: Rect, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(id, NodeKind::Link, bounds)
        }
    }

    pub fn group(id: impl Into<String>, bounds: Rect, label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_owned),
            ..Self::new(id, NodeKind::Group, bounds)
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.unwrap_or(false)
    }

    /// Groups are recognised by kind, or by carrying a label like the host's
    /// group nodes always do.
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group || self.label.is_some()
    }

    pub fn file_extension(&self) -> Option<&str> {
        let file = self.file.as_deref()?;
        let name = file.rsplit('/').next().unwrap_or(file);
        name.rsplit_once('.').map(|(_, extension)| extension)
    }

    pub fn is_markdown_file(&self) -> bool {
        self.kind == NodeKind::File
            && self
                .file_extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("md"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeData {
    pub fn new(
        id: impl Into<String>,
        from_node: impl Into<String>,
        to_node: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from_node: from_node.into(),
            to_node: to_node.into(),
            label: None,
            extra: Map::new(),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}

/// Full document snapshot, as returned by `get_data` and accepted by `set_data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasData {
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub edges: Vec<EdgeData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasData {
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeData> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Writes `collapsed` into the snapshot entry for `id`. Returns false when
    /// the snapshot has no such node.
    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.collapsed = Some(collapsed);
                true
            }
            None => false,
        }
    }
}

pub fn parse_canvas(raw: &str) -> Result<CanvasData> {
    serde_json::from_str(raw).context("failed to parse canvas document")
}

pub fn load_canvas(path: &Path) -> Result<CanvasData> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read canvas file `{}`", path.display()))?;
    parse_canvas(&raw).with_context(|| format!("invalid canvas file `{}`", path.display()))
}

pub fn save_canvas(path: &Path, data: &CanvasData) -> Result<()> {
    let raw = serde_json::to_string_pretty(data).context("failed to serialize canvas document")?;
    fs::write(path, raw)
        .with_context(|| format!("failed to write canvas file `{}`", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CanvasData, NodeData, NodeKind, parse_canvas};
    use crate::geometry::Rect;

    #[test]
    fn parses_host_document_and_keeps_unknown_fields() {
        let data = parse_canvas(
            &json!({
                "nodes": [
                    {"id": "n1", "type": "text", "x": 0, "y": 0, "width": 250, "height": 140, "text": "# Hello", "color": "4"},
                    {"id": "g1", "type": "group", "x": -20, "y": -60, "width": 400, "height": 300, "label": "Ideas", "collapsed": true}
                ],
                "edges": [
                    {"id": "e1", "fromNode": "n1", "toNode": "g1", "fromSide": "right"}
                ]
            })
            .to_string(),
        )
        .expect("document should parse");

        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[0].kind, NodeKind::Text);
        assert_eq!(data.nodes[0].extra.get("color"), Some(&json!("4")));
        assert!(data.nodes[1].is_collapsed());
        assert!(data.nodes[1].is_group());
        assert_eq!(data.edges[0].extra.get("fromSide"), Some(&json!("right")));

        let round_trip = serde_json::to_value(&data).expect("document should serialize");
        assert_eq!(round_trip["nodes"][0]["color"], json!("4"));
        assert_eq!(round_trip["edges"][0]["fromNode"], json!("n1"));
    }

    #[test]
    fn unset_metadata_is_absent_from_serialized_node() {
        let node = NodeData::file("f1", Rect::from_xywh(0.0, 0.0, 10.0, 10.0), "notes/a.md");
        let value = serde_json::to_value(&node).expect("node should serialize");

        assert!(value.get("alias").is_none());
        assert!(value.get("thumbnail").is_none());
        assert!(value.get("collapsed").is_none());
        assert_eq!(value["type"], "file");
    }

    #[test]
    fn file_extension_handles_nested_paths_and_dots_in_directories() {
        let node = NodeData::file("f1", Rect::default(), "my.notes/Plan.MD");
        assert_eq!(node.file_extension(), Some("MD"));
        assert!(node.is_markdown_file());

        let image = NodeData::file("f2", Rect::default(), "assets.v2/cover");
        assert_eq!(image.file_extension(), None);
        assert!(!image.is_markdown_file());
    }

    #[test]
    fn set_collapsed_reports_missing_nodes() {
        let mut data = CanvasData {
            nodes: vec![NodeData::text("n1", Rect::default(), "hi")],
            ..CanvasData::default()
        };

        assert!(data.set_collapsed("n1", true));
        assert!(!data.set_collapsed("missing", true));
        assert_eq!(data.node("n1").and_then(|node| node.collapsed), Some(true));
    }
}
