//! In-memory stand-in for the host canvas.
//!
//! Holds what the host owns (node and edge collections, views, selection,
//! history stack, save log). Behaviour the fold layer layers on top is reached
//! through the observer traits in [`hooks`] and the dispatch functions in
//! [`session`].

use std::collections::BTreeSet;

use crate::document::{CanvasData, EdgeData, NodeData};
use crate::geometry::{Rect, contains};

pub mod hooks;
pub mod session;

pub use self::hooks::{
    BoundsVariant, CanvasLifecycleObserver, CreateNodeRequest, HistoryDecision, NativeHost,
    NodeLifecycleObserver, PatchTarget, SaveRequest, SelectAll, Size,
};
pub use self::session::CanvasSession;

/// Visual state the host keeps per node view. `collapsed` and
/// `group_nodes_collapsed` mirror the two classes the fold layer toggles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeView {
    pub generation: u64,
    pub collapsed: bool,
    pub group_nodes_collapsed: bool,
    pub header_attached: bool,
    pub render_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasNode {
    pub data: NodeData,
    pub view: NodeView,
}

impl CanvasNode {
    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn native_bounds(&self) -> Rect {
        self.data.bounds()
    }

    pub fn is_hidden_by_group(&self) -> bool {
        self.view.group_nodes_collapsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeView {
    pub group_edges_collapsed: bool,
    pub render_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasEdge {
    pub data: EdgeData,
    pub view: EdgeView,
}

/// Overlay the host draws over the hovered/selected node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionLayer {
    pub target: Option<String>,
    pub attached: bool,
    pub collapsed_interaction: bool,
    pub group_nodes_collapsed: bool,
    pub render_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Canvas {
    nodes: Vec<CanvasNode>,
    edges: Vec<CanvasEdge>,
    selection: BTreeSet<String>,
    read_only: bool,
    data: CanvasData,
    history: Vec<CanvasData>,
    saves: Vec<SaveRequest>,
    interaction: InteractionLayer,
    selection_overlay: Option<String>,
    menu_selection: Option<Rect>,
    next_generation: u64,
    next_node_seq: u64,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: CanvasData) -> Self {
        let mut canvas = Self::new();
        canvas.import_data(data);
        canvas.data = canvas.get_data();
        canvas
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.nodes.iter().find(|node| node.data.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut CanvasNode> {
        self.nodes.iter_mut().find(|node| node.data.id == id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CanvasNode> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.data.id.clone()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge(&self, id: &str) -> Option<&CanvasEdge> {
        self.edges.iter().find(|edge| edge.data.id == id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &CanvasEdge> {
        self.edges.iter()
    }

    pub fn edges_for_node(&self, node_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|edge| edge.data.touches(node_id))
            .map(|edge| edge.data.id.clone())
            .collect()
    }

    pub fn set_edge_group_collapsed(&mut self, edge_id: &str, collapsed: bool) {
        if let Some(edge) = self.edges.iter_mut().find(|edge| edge.data.id == edge_id) {
            edge.view.group_edges_collapsed = collapsed;
        }
    }

    pub fn render_edge(&mut self, edge_id: &str) {
        if let Some(edge) = self.edges.iter_mut().find(|edge| edge.data.id == edge_id) {
            edge.view.render_count += 1;
        }
    }

    /// Adds a node with a fresh view. Used by host-side creation paths; the
    /// fold layer never adds nodes itself.
    pub fn insert_node(&mut self, data: NodeData) -> &CanvasNode {
        let view = self.fresh_view();
        self.nodes.retain(|node| node.data.id != data.id);
        self.nodes.push(CanvasNode { data, view });
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn insert_edge(&mut self, data: EdgeData) {
        self.edges.retain(|edge| edge.data.id != data.id);
        self.edges.push(CanvasEdge {
            data,
            view: EdgeView::default(),
        });
    }

    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.data.x = x;
                node.data.y = y;
                true
            }
            None => false,
        }
    }

    /// Throws away the node's view the way the host does when it rebuilds a
    /// card. Data survives, view classes and the header do not.
    pub fn recreate_view(&mut self, id: &str) -> bool {
        let view = self.fresh_view();
        match self.node_mut(id) {
            Some(node) => {
                node.view = view;
                true
            }
            None => false,
        }
    }

    pub fn next_node_id(&mut self) -> String {
        loop {
            self.next_node_seq += 1;
            let candidate = format!("node-{}", self.next_node_seq);
            if self.node(&candidate).is_none() {
                return candidate;
            }
        }
    }

    pub fn get_data(&self) -> CanvasData {
        CanvasData {
            nodes: self.nodes.iter().map(|node| node.data.clone()).collect(),
            edges: self.edges.iter().map(|edge| edge.data.clone()).collect(),
            extra: self.data.extra.clone(),
        }
    }

    /// Native half of `set_data`: updates nodes in place (views survive),
    /// adds new nodes, drops nodes and edges the snapshot no longer has.
    pub fn import_data(&mut self, data: CanvasData) {
        let CanvasData { nodes, edges, extra } = data;

        let incoming_ids = nodes
            .iter()
            .map(|node| node.id.clone())
            .collect::<BTreeSet<_>>();
        self.nodes
            .retain(|node| incoming_ids.contains(node.data.id.as_str()));
        for node_data in nodes {
            match self.node_mut(&node_data.id) {
                Some(node) => node.data = node_data,
                None => {
                    self.insert_node(node_data);
                }
            }
        }

        let mut next_edges = Vec::with_capacity(edges.len());
        for edge_data in edges {
            let view = self
                .edge(&edge_data.id)
                .map(|edge| edge.view.clone())
                .unwrap_or_default();
            next_edges.push(CanvasEdge {
                data: edge_data,
                view,
            });
        }
        self.edges = next_edges;
        self.data.extra = extra;
        self.selection
            .retain(|id| incoming_ids.contains(id.as_str()));
    }

    pub fn apply_node_data(&mut self, id: &str, data: NodeData) {
        if let Some(node) = self.node_mut(id) {
            node.data = NodeData {
                id: node.data.id.clone(),
                ..data
            };
        }
    }

    /// Last snapshot cached by a save.
    pub fn cached_data(&self) -> &CanvasData {
        &self.data
    }

    pub fn refresh_cached_data(&mut self) {
        self.data = self.get_data();
    }

    pub fn record_save(&mut self, request: SaveRequest) {
        self.saves.push(request);
    }

    pub fn saves(&self) -> &[SaveRequest] {
        &self.saves
    }

    pub fn push_history_entry(&mut self, snapshot: CanvasData) {
        self.history.push(snapshot);
    }

    pub fn history(&self) -> &[CanvasData] {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut [CanvasData] {
        &mut self.history
    }

    pub fn interaction_layer(&self) -> &InteractionLayer {
        &self.interaction
    }

    pub fn interaction_layer_mut(&mut self) -> &mut InteractionLayer {
        &mut self.interaction
    }

    pub fn set_interaction_target(&mut self, target: Option<&str>) {
        self.interaction.target = target.map(str::to_owned);
    }

    pub fn detach_interaction_layer(&mut self) {
        self.interaction.attached = false;
    }

    pub fn render_interaction_layer(&mut self) {
        self.interaction.attached = true;
        self.interaction.render_count += 1;
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn set_selection<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| self.nodes.iter().any(|node| &node.data.id == id))
            .collect();
    }

    pub fn selection_overlay(&self) -> Option<&str> {
        self.selection_overlay.as_deref()
    }

    pub fn set_selection_overlay(&mut self, markup: Option<String>) {
        self.selection_overlay = markup;
    }

    pub fn menu_selection_bbox(&self) -> Option<Rect> {
        self.menu_selection
    }

    pub fn set_menu_selection_bbox(&mut self, bbox: Option<Rect>) {
        self.menu_selection = bbox;
    }

    /// Spatial index lookup: every node whose box overlaps `region`.
    pub fn search(&self, region: Rect, bounds: &dyn Fn(&CanvasNode) -> Rect) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| bounds(node).intersects(&region))
            .map(|node| node.data.id.clone())
            .collect()
    }

    /// Native containment query: nodes whose box lies fully inside `region`.
    pub fn containing_nodes(
        &self,
        region: Rect,
        bounds: &dyn Fn(&CanvasNode) -> Rect,
    ) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| contains(&region, &bounds(node)))
            .map(|node| node.data.id.clone())
            .collect()
    }

    fn fresh_view(&mut self) -> NodeView {
        self.next_generation += 1;
        NodeView {
            generation: self.next_generation,
            ..NodeView::default()
        }
    }
}
