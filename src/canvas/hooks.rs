use crate::document::{CanvasData, NodeData, NodeKind};
use crate::geometry::Rect;

use super::{Canvas, CanvasNode};

/// Which box a bounding-box query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsVariant {
    /// What the node occupies on screen.
    Rendered,
    /// The true stored box, used when measuring group membership.
    Containing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveRequest {
    pub history: Option<bool>,
    pub triggered_by_plugin: bool,
}

impl SaveRequest {
    pub fn native(history: bool) -> Self {
        Self {
            history: Some(history),
            triggered_by_plugin: false,
        }
    }

    pub fn plugin(history: bool) -> Self {
        Self {
            history: Some(history),
            triggered_by_plugin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDecision {
    Record,
    Suppress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectAll {
    Select(Vec<String>),
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateNodeRequest {
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub size: Option<Size>,
    pub text: Option<String>,
    pub label: Option<String>,
}

impl CreateNodeRequest {
    pub fn text(x: f64, y: f64, text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            x,
            y,
            size: None,
            text: Some(text.into()),
            label: None,
        }
    }

    pub fn group(x: f64, y: f64, size: Size) -> Self {
        Self {
            kind: NodeKind::Group,
            x,
            y,
            size: Some(size),
            text: None,
            label: None,
        }
    }
}

/// Host objects an extension needs before it can hook in. The host may not
/// have created them yet when the extension loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatchTarget {
    Canvas,
    Menu,
    Interaction,
    Node,
}

impl PatchTarget {
    pub const ALL: [PatchTarget; 4] = [Self::Canvas, Self::Menu, Self::Interaction, Self::Node];

    pub fn label(self) -> &'static str {
        match self {
            Self::Canvas => "canvas",
            Self::Menu => "menu",
            Self::Interaction => "interaction",
            Self::Node => "node",
        }
    }
}

/// Per-node extension points, called by the host at render, bounding-box
/// query and data-apply time.
pub trait NodeLifecycleObserver {
    fn node_hooks_installed(&self) -> bool {
        true
    }

    fn on_render(&mut self, canvas: &mut Canvas, node_id: &str);

    fn on_bounds_query(&self, node: &CanvasNode, native: Rect, variant: BoundsVariant) -> Rect;

    /// Runs before the host applies `incoming` to the node.
    fn on_apply_data(&mut self, canvas: &mut Canvas, node_id: &str, incoming: &NodeData);
}

/// Canvas-level extension points.
pub trait CanvasLifecycleObserver {
    fn canvas_hooks_installed(&self, target: PatchTarget) -> bool {
        let _ = target;
        true
    }

    fn on_containment_query(&self, canvas: &Canvas, region: Rect, native: Vec<String>)
    -> Vec<String>;

    /// Runs after the host's own save bookkeeping.
    fn on_save(&mut self, canvas: &mut Canvas, request: SaveRequest);

    fn on_history_push(&mut self, canvas: &Canvas, snapshot: &CanvasData) -> HistoryDecision;

    fn on_select_all(&self, canvas: &Canvas, candidates: Vec<String>) -> SelectAll;

    fn on_create_node(&self, request: CreateNodeRequest) -> CreateNodeRequest;

    /// Runs after the host re-rendered the node interaction layer.
    fn on_interaction_render(&self, canvas: &mut Canvas);
}

/// Host behaviour with nothing layered on top.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl NodeLifecycleObserver for NativeHost {
    fn on_render(&mut self, _canvas: &mut Canvas, _node_id: &str) {}

    fn on_bounds_query(&self, _node: &CanvasNode, native: Rect, _variant: BoundsVariant) -> Rect {
        native
    }

    fn on_apply_data(&mut self, _canvas: &mut Canvas, _node_id: &str, _incoming: &NodeData) {}
}

impl CanvasLifecycleObserver for NativeHost {
    fn on_containment_query(
        &self,
        _canvas: &Canvas,
        _region: Rect,
        native: Vec<String>,
    ) -> Vec<String> {
        native
    }

    fn on_save(&mut self, _canvas: &mut Canvas, _request: SaveRequest) {}

    fn on_history_push(&mut self, _canvas: &Canvas, _snapshot: &CanvasData) -> HistoryDecision {
        HistoryDecision::Record
    }

    fn on_select_all(&self, _canvas: &Canvas, candidates: Vec<String>) -> SelectAll {
        SelectAll::Select(candidates)
    }

    fn on_create_node(&self, request: CreateNodeRequest) -> CreateNodeRequest {
        request
    }

    fn on_interaction_render(&self, _canvas: &mut Canvas) {}
}
