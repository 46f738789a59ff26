//! Host-side dispatch: each function runs the host's own behaviour and calls
//! the installed observers at the same logical point the host would.

use tracing::debug;

use crate::document::{CanvasData, NodeData, NodeKind};
use crate::geometry::Rect;

use super::Canvas;
use super::hooks::{
    BoundsVariant, CanvasLifecycleObserver, CreateNodeRequest, HistoryDecision,
    NodeLifecycleObserver, PatchTarget, SaveRequest, SelectAll, Size,
};
use super::CanvasNode;

const NATIVE_NODE_SIZE: Size = Size {
    width: 250.0,
    height: 60.0,
};

pub fn node_bounds<O>(observer: &O, node: &CanvasNode, variant: BoundsVariant) -> Rect
where
    O: NodeLifecycleObserver + ?Sized,
{
    let native = node.native_bounds();
    if observer.node_hooks_installed() {
        observer.on_bounds_query(node, native, variant)
    } else {
        native
    }
}

pub fn bbox<O>(canvas: &Canvas, observer: &O, node_id: &str, variant: BoundsVariant) -> Option<Rect>
where
    O: NodeLifecycleObserver + ?Sized,
{
    canvas
        .node(node_id)
        .map(|node| node_bounds(observer, node, variant))
}

pub fn containing_nodes<O>(canvas: &Canvas, observer: &O, region: Rect) -> Vec<String>
where
    O: NodeLifecycleObserver + CanvasLifecycleObserver + ?Sized,
{
    let native = canvas.containing_nodes(region, &|node| {
        node_bounds(observer, node, BoundsVariant::Rendered)
    });
    if observer.canvas_hooks_installed(PatchTarget::Canvas) {
        observer.on_containment_query(canvas, region, native)
    } else {
        native
    }
}

pub fn render_node<O>(canvas: &mut Canvas, observer: &mut O, node_id: &str)
where
    O: NodeLifecycleObserver + ?Sized,
{
    let Some(node) = canvas.node_mut(node_id) else {
        return;
    };
    node.view.render_count += 1;

    if observer.node_hooks_installed() {
        observer.on_render(canvas, node_id);
    }
}

pub fn render_all<O>(canvas: &mut Canvas, observer: &mut O)
where
    O: NodeLifecycleObserver + ?Sized,
{
    for node_id in canvas.node_ids() {
        render_node(canvas, observer, &node_id);
    }
}

pub fn apply_node_data<O>(canvas: &mut Canvas, observer: &mut O, node_id: &str, data: NodeData)
where
    O: NodeLifecycleObserver + ?Sized,
{
    if canvas.node(node_id).is_none() {
        return;
    }
    if observer.node_hooks_installed() {
        observer.on_apply_data(canvas, node_id, &data);
    }
    canvas.apply_node_data(node_id, data);
}

/// Replaces the document with `data`. Every surviving node sees its incoming
/// data before it is applied, and the host records the result in history.
pub fn set_data<O>(canvas: &mut Canvas, observer: &mut O, data: CanvasData)
where
    O: NodeLifecycleObserver + CanvasLifecycleObserver + ?Sized,
{
    if observer.node_hooks_installed() {
        for node in &data.nodes {
            if canvas.node(&node.id).is_some() {
                observer.on_apply_data(canvas, &node.id, node);
            }
        }
    }
    canvas.import_data(data);

    let snapshot = canvas.get_data();
    push_history(canvas, observer, snapshot);
}

/// Returns whether an entry was recorded.
pub fn push_history<O>(canvas: &mut Canvas, observer: &mut O, snapshot: CanvasData) -> bool
where
    O: CanvasLifecycleObserver + ?Sized,
{
    if observer.canvas_hooks_installed(PatchTarget::Canvas)
        && observer.on_history_push(canvas, &snapshot) == HistoryDecision::Suppress
    {
        debug!(entries = canvas.history().len(), "history push suppressed");
        return false;
    }
    canvas.push_history_entry(snapshot);
    true
}

pub fn request_save<O>(canvas: &mut Canvas, observer: &mut O, request: SaveRequest)
where
    O: CanvasLifecycleObserver + ?Sized,
{
    canvas.record_save(request);
    if observer.canvas_hooks_installed(PatchTarget::Canvas) {
        observer.on_save(canvas, request);
    }
}

/// Returns whether the selection changed hands to the candidates (possibly
/// filtered).
pub fn select_all<O>(canvas: &mut Canvas, observer: &O, candidates: Vec<String>) -> bool
where
    O: CanvasLifecycleObserver + ?Sized,
{
    let decision = if observer.canvas_hooks_installed(PatchTarget::Canvas) {
        observer.on_select_all(canvas, candidates)
    } else {
        SelectAll::Select(candidates)
    };

    match decision {
        SelectAll::Select(ids) => {
            canvas.set_selection(ids);
            true
        }
        SelectAll::Skip => false,
    }
}

pub fn create_node<O>(canvas: &mut Canvas, observer: &mut O, request: CreateNodeRequest) -> String
where
    O: NodeLifecycleObserver + CanvasLifecycleObserver + ?Sized,
{
    let request = if observer.canvas_hooks_installed(PatchTarget::Canvas) {
        observer.on_create_node(request)
    } else {
        request
    };

    let id = canvas.next_node_id();
    let size = request.size.unwrap_or(NATIVE_NODE_SIZE);
    let bounds = Rect::from_xywh(request.x, request.y, size.width, size.height);
    let data = match request.kind {
        NodeKind::Text => NodeData::text(id.clone(), bounds, request.text.unwrap_or_default()),
        NodeKind::Group => NodeData::group(id.clone(), bounds, request.label.as_deref()),
        kind => NodeData::new(id.clone(), kind, bounds),
    };
    canvas.insert_node(data);
    render_node(canvas, observer, &id);
    id
}

pub fn render_interaction_layer<O>(canvas: &mut Canvas, observer: &O, target: Option<&str>)
where
    O: CanvasLifecycleObserver + ?Sized,
{
    canvas.set_interaction_target(target);
    canvas.detach_interaction_layer();
    canvas.render_interaction_layer();
    if observer.canvas_hooks_installed(PatchTarget::Interaction) {
        observer.on_interaction_render(canvas);
    }
}

/// A canvas together with the extension observing it. Stands in for the host
/// application driving one open canvas view.
#[derive(Debug)]
pub struct CanvasSession<O> {
    canvas: Canvas,
    observer: O,
    view_open: bool,
}

impl<O> CanvasSession<O>
where
    O: NodeLifecycleObserver + CanvasLifecycleObserver,
{
    pub fn new(canvas: Canvas, observer: O) -> Self {
        Self {
            canvas,
            observer,
            view_open: true,
        }
    }

    /// A session whose canvas view has not been opened yet.
    pub fn closed(canvas: Canvas, observer: O) -> Self {
        Self {
            canvas,
            observer,
            view_open: false,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn parts_mut(&mut self) -> (&mut Canvas, &mut O) {
        (&mut self.canvas, &mut self.observer)
    }

    pub fn into_parts(self) -> (Canvas, O) {
        (self.canvas, self.observer)
    }

    pub fn is_view_open(&self) -> bool {
        self.view_open
    }

    pub fn set_view_open(&mut self, open: bool) {
        self.view_open = open;
    }

    pub fn bbox(&self, node_id: &str, variant: BoundsVariant) -> Option<Rect> {
        bbox(&self.canvas, &self.observer, node_id, variant)
    }

    pub fn containing_nodes(&self, region: Rect) -> Vec<String> {
        containing_nodes(&self.canvas, &self.observer, region)
    }

    pub fn render_node(&mut self, node_id: &str) {
        render_node(&mut self.canvas, &mut self.observer, node_id);
    }

    pub fn render_all(&mut self) {
        render_all(&mut self.canvas, &mut self.observer);
    }

    pub fn apply_node_data(&mut self, node_id: &str, data: NodeData) {
        apply_node_data(&mut self.canvas, &mut self.observer, node_id, data);
    }

    pub fn set_data(&mut self, data: CanvasData) {
        set_data(&mut self.canvas, &mut self.observer, data);
    }

    pub fn request_save(&mut self, request: SaveRequest) {
        request_save(&mut self.canvas, &mut self.observer, request);
    }

    pub fn select_all(&mut self, candidates: Vec<String>) -> bool {
        select_all(&mut self.canvas, &self.observer, candidates)
    }

    pub fn create_node(&mut self, request: CreateNodeRequest) -> String {
        create_node(&mut self.canvas, &mut self.observer, request)
    }

    pub fn render_interaction_layer(&mut self, target: Option<&str>) {
        render_interaction_layer(&mut self.canvas, &self.observer, target);
    }
}
