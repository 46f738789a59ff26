//! The fold layer: per-node collapse controllers, collapse-aware geometry and
//! the observer implementations the host calls into.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{debug, info};

use crate::canvas::session;
use crate::canvas::{
    BoundsVariant, Canvas, CanvasLifecycleObserver, CanvasNode, CanvasSession, CreateNodeRequest,
    HistoryDecision, NodeLifecycleObserver, PatchTarget, SaveRequest, SelectAll,
};
use crate::config::FoldSettings;
use crate::document::{CanvasData, NodeData, NodeKind};
use crate::geometry::{Rect, union};
use crate::vault::Vault;

pub mod controller;
pub mod header;
pub mod history;
pub mod layout;
pub mod schedule;

pub use self::controller::CollapseController;
pub use self::header::HeaderView;
pub use self::history::{HistoryGuard, HistoryToken};
pub use self::layout::{FoldLayout, HEADER_HEIGHT};
pub use self::schedule::{DeferredStep, Scheduler, SequenceToken, ToggleStage};

#[derive(Debug, thiserror::Error)]
pub enum FoldError {
    #[error("node `{node_id}` does not exist on this canvas")]
    UnknownNode { node_id: String },

    #[error("node `{node_id}` has no collapse header")]
    NoHeader { node_id: String },

    #[error("unknown command `{command}`")]
    UnknownCommand { command: String },

    #[error("canvas is not ready: {target} hooks are not installed")]
    NotReady { target: &'static str },
}

/// Everything a controller reads but never owns.
#[derive(Debug, Clone, Default)]
pub struct FoldContext {
    pub layout: FoldLayout,
    pub settings: FoldSettings,
    pub vault: Option<Vault>,
}

/// Which host hooks are in place. Targets the host could not provide yet are
/// retried on the next layout change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    installed: BTreeSet<PatchTarget>,
}

impl PatchSet {
    pub fn is_installed(&self, target: PatchTarget) -> bool {
        self.installed.contains(&target)
    }

    pub fn mark_installed(&mut self, target: PatchTarget) -> bool {
        self.installed.insert(target)
    }

    pub fn missing(&self) -> Vec<PatchTarget> {
        PatchTarget::ALL
            .into_iter()
            .filter(|target| !self.installed.contains(target))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

#[derive(Debug)]
pub struct FoldPlugin {
    ctx: FoldContext,
    controllers: BTreeMap<String, CollapseController>,
    scheduler: Scheduler,
    pending_commits: BTreeMap<String, (SequenceToken, CanvasData)>,
    history: HistoryGuard,
    patches: PatchSet,
}

impl FoldPlugin {
    pub fn new(settings: FoldSettings, vault: Option<Vault>) -> Self {
        Self {
            ctx: FoldContext {
                layout: FoldLayout::default(),
                settings,
                vault,
            },
            controllers: BTreeMap::new(),
            scheduler: Scheduler::new(),
            pending_commits: BTreeMap::new(),
            history: HistoryGuard::default(),
            patches: PatchSet::default(),
        }
    }

    pub fn context(&self) -> &FoldContext {
        &self.ctx
    }

    pub fn settings(&self) -> &FoldSettings {
        &self.ctx.settings
    }

    pub fn controller(&self, node_id: &str) -> Option<&CollapseController> {
        self.controllers.get(node_id)
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn history_guard(&self) -> &HistoryGuard {
        &self.history
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn patches(&self) -> &PatchSet {
        &self.patches
    }

    pub fn displayed_label(&self, node_id: &str) -> Option<&str> {
        self.controllers
            .get(node_id)
            .map(|controller| controller.header().displayed_label())
    }

    /// Installs every hook whose host object is available now and returns the
    /// targets installed by this call.
    pub fn on_layout_change(&mut self, canvas: &mut Canvas, view_open: bool) -> Vec<PatchTarget> {
        let mut installed = Vec::new();
        for target in self.patches.missing() {
            let ready = view_open && (target != PatchTarget::Node || canvas.node_count() > 0);
            if !ready {
                debug!(target = target.label(), "host not ready; retrying on next layout change");
                continue;
            }

            self.patches.mark_installed(target);
            info!(target = target.label(), "canvas fold hooks installed");
            if target == PatchTarget::Node {
                for node_id in canvas.node_ids() {
                    self.render_header(canvas, &node_id);
                }
            }
            installed.push(target);
        }
        installed
    }

    /// Attaches a controller to the node's current view unless one is already
    /// there or the settings exclude the node.
    pub fn render_header(&mut self, canvas: &mut Canvas, node_id: &str) {
        let Some(node) = canvas.node(node_id) else {
            return;
        };
        let current = self
            .controllers
            .get(node_id)
            .is_some_and(|controller| controller.generation() == node.view.generation);
        if current && node.view.header_attached {
            return;
        }
        if !self.allows_header(&node.data) {
            debug!(node_id, kind = node.data.kind.as_str(), "node excluded from folding");
            return;
        }

        if let Some(controller) = CollapseController::attach(canvas, &self.ctx, node_id) {
            self.controllers.insert(node_id.to_owned(), controller);
        }
    }

    fn allows_header(&self, node: &NodeData) -> bool {
        if !self.ctx.settings.allows_kind(node) {
            return false;
        }
        let min_lines = self.ctx.settings.min_line_amount as usize;
        if min_lines == 0 || !matches!(node.kind, NodeKind::Text | NodeKind::File) {
            return true;
        }
        line_count(node, self.ctx.vault.as_ref()) >= min_lines
    }

    /// Header click. The node flips now; members follow after
    /// [`schedule::PROPAGATE_DELAY`] and the document is committed after
    /// [`schedule::COMMIT_DELAY`], both driven by [`FoldPlugin::advance`].
    pub fn toggle_collapsed(&mut self, canvas: &mut Canvas, node_id: &str) -> Result<bool, FoldError> {
        let controller = self
            .controllers
            .get_mut(node_id)
            .ok_or_else(|| FoldError::NoHeader {
                node_id: node_id.to_owned(),
            })?;
        if !controller.toggle_visual(canvas, &self.ctx) {
            return Ok(false);
        }

        session::request_save(canvas, self, SaveRequest::plugin(false));

        let Some(controller) = self.controllers.get_mut(node_id) else {
            return Ok(false);
        };
        let snapshot = controller.commit_snapshot(canvas);
        let token = self.scheduler.begin(node_id);
        self.pending_commits
            .insert(node_id.to_owned(), (token, snapshot));
        debug!(node_id, token = token.value(), "toggle started");
        Ok(true)
    }

    /// Runs every deferred toggle step that became due.
    pub fn advance(&mut self, canvas: &mut Canvas, elapsed: Duration) -> Vec<DeferredStep> {
        let steps = self.scheduler.advance(elapsed);
        for step in &steps {
            match step.stage {
                ToggleStage::VisualToggled => {}
                ToggleStage::Propagated => {
                    if let Some(controller) = self.controllers.get_mut(&step.node_id) {
                        controller.update_nodes_in_group(canvas, &self.ctx, false);
                        controller.update_edges(canvas, &self.ctx);
                    }
                }
                ToggleStage::Committed => {
                    let Some((token, snapshot)) = self.pending_commits.remove(&step.node_id) else {
                        continue;
                    };
                    if token != step.token {
                        debug!(node_id = %step.node_id, "dropping superseded commit");
                        continue;
                    }
                    session::set_data(canvas, self, snapshot);
                    session::request_save(canvas, self, SaveRequest::native(true));
                    debug!(node_id = %step.node_id, token = token.value(), "toggle committed");
                }
            }
        }
        steps
    }

    /// Batch fold or expand of the given nodes, recorded as a single history
    /// entry.
    pub fn fold_nodes(&mut self, canvas: &mut Canvas, node_ids: &[String], collapse: bool) {
        if canvas.is_read_only() {
            debug!(count = node_ids.len(), "canvas is read-only; batch fold ignored");
            return;
        }

        self.history.arm();
        let mut snapshot = canvas.get_data();
        if !node_ids.is_empty() {
            for node_id in node_ids {
                if let Some(controller) = self.controllers.get_mut(node_id) {
                    let is_group = canvas.node(node_id).is_some_and(|node| node.data.is_group());
                    if collapse && is_group {
                        controller.update_nodes_in_group(canvas, &self.ctx, true);
                    }
                    controller.set_collapsed(canvas, &self.ctx, collapse);
                }
                snapshot.set_collapsed(node_id, collapse);
            }
            session::set_data(canvas, self, snapshot);
        }
        session::request_save(canvas, self, SaveRequest::plugin(true));
        self.update_selection(canvas);
        info!(count = node_ids.len(), collapse, "batch fold applied");
    }

    /// Batch over every node, or over the current selection.
    pub fn handle_multi_nodes(&mut self, canvas: &mut Canvas, all_nodes: bool, collapse: bool) {
        let node_ids = if all_nodes {
            canvas.node_ids()
        } else {
            canvas.selection().iter().cloned().collect()
        };
        self.fold_nodes(canvas, &node_ids, collapse);
    }

    /// Folds one node through a snapshot round-trip; the controller picks the
    /// change up while the host applies the data.
    pub fn handle_single_node(&mut self, canvas: &mut Canvas, node_id: &str, collapse: bool) -> Result<(), FoldError> {
        if canvas.node(node_id).is_none() {
            return Err(FoldError::UnknownNode {
                node_id: node_id.to_owned(),
            });
        }
        if canvas.is_read_only() {
            debug!(node_id, "canvas is read-only; fold ignored");
            return Ok(());
        }

        self.history.arm();
        let mut snapshot = canvas.get_data();
        snapshot.set_collapsed(node_id, collapse);
        session::set_data(canvas, self, snapshot);
        session::request_save(canvas, self, SaveRequest::plugin(true));
        self.update_selection(canvas);
        Ok(())
    }

    /// Refits the selection box to the larger of the selection and the nodes
    /// the box now contains.
    pub fn update_selection(&mut self, canvas: &mut Canvas) {
        let Some(bbox) = canvas.menu_selection_bbox() else {
            return;
        };
        let contained = session::containing_nodes(canvas, &*self, bbox);
        if contained.is_empty() {
            return;
        }

        let selection = canvas.selection().iter().cloned().collect::<Vec<_>>();
        let basis = if selection.len() > contained.len() {
            selection
        } else {
            contained
        };
        let boxes = basis
            .iter()
            .filter_map(|node_id| session::bbox(canvas, &*self, node_id, BoundsVariant::Rendered))
            .collect::<Vec<_>>();
        if let Some(rect) = union(boxes) {
            canvas.set_menu_selection_bbox(Some(rect));
        }
    }

    /// An empty alias clears it.
    pub fn set_alias(&mut self, canvas: &mut Canvas, node_id: &str, alias: &str) -> Result<bool, FoldError> {
        let alias = non_empty(alias);
        self.customize(canvas, node_id, |data, header, ctx| {
            data.alias = alias.clone();
            if let Some(header) = header {
                header.set_alias(alias, &ctx.settings);
            }
        })
    }

    /// `thumbnail` is an `http` URL or a vault path; an empty value clears it.
    pub fn set_thumbnail(&mut self, canvas: &mut Canvas, node_id: &str, thumbnail: &str) -> Result<bool, FoldError> {
        let thumbnail = non_empty(thumbnail);
        self.customize(canvas, node_id, |data, header, ctx| {
            data.thumbnail = thumbnail.clone();
            if let Some(header) = header {
                header.set_thumbnail(thumbnail, &ctx.settings, ctx.vault.as_ref());
            }
        })
    }

    pub fn remove_customizations(&mut self, canvas: &mut Canvas, node_id: &str) -> Result<bool, FoldError> {
        self.customize(canvas, node_id, |data, header, ctx| {
            data.alias = None;
            data.thumbnail = None;
            if let Some(header) = header {
                header.set_alias(None, &ctx.settings);
                header.set_thumbnail(None, &ctx.settings, ctx.vault.as_ref());
            }
        })
    }

    fn customize<F>(&mut self, canvas: &mut Canvas, node_id: &str, apply: F) -> Result<bool, FoldError>
    where
        F: FnOnce(&mut NodeData, Option<&mut HeaderView>, &FoldContext),
    {
        if canvas.is_read_only() {
            debug!(node_id, "canvas is read-only; customization ignored");
            return Ok(false);
        }
        let node = canvas
            .node_mut(node_id)
            .ok_or_else(|| FoldError::UnknownNode {
                node_id: node_id.to_owned(),
            })?;

        let controller = self.controllers.get_mut(node_id);
        match controller {
            Some(controller) => {
                apply(&mut node.data, Some(controller.header_mut()), &self.ctx);
                controller.update_node(canvas, &self.ctx);
            }
            None => apply(&mut node.data, None, &self.ctx),
        }

        session::request_save(canvas, self, SaveRequest::plugin(false));
        Ok(true)
    }

    /// Returns how many headers followed the rename.
    pub fn on_file_renamed(&mut self, old_path: &str, new_path: &str) -> usize {
        self.controllers
            .values_mut()
            .map(|controller| controller.header_mut().on_file_renamed(old_path, new_path))
            .filter(|renamed| *renamed)
            .count()
    }
}

impl NodeLifecycleObserver for FoldPlugin {
    fn node_hooks_installed(&self) -> bool {
        self.patches.is_installed(PatchTarget::Node)
    }

    fn on_render(&mut self, canvas: &mut Canvas, node_id: &str) {
        self.render_header(canvas, node_id);
    }

    fn on_bounds_query(&self, node: &CanvasNode, native: Rect, variant: BoundsVariant) -> Rect {
        self.ctx.layout.override_bounds(node, native, variant)
    }

    fn on_apply_data(&mut self, canvas: &mut Canvas, node_id: &str, incoming: &NodeData) {
        let Some(collapsed) = incoming.collapsed else {
            return;
        };
        if let Some(controller) = self.controllers.get_mut(node_id) {
            controller.set_collapsed(canvas, &self.ctx, collapsed);
        }
    }
}

impl CanvasLifecycleObserver for FoldPlugin {
    fn canvas_hooks_installed(&self, target: PatchTarget) -> bool {
        self.patches.is_installed(target)
    }

    fn on_containment_query(&self, canvas: &Canvas, region: Rect, native: Vec<String>) -> Vec<String> {
        self.ctx.layout.refine_containment(canvas, region, native)
    }

    fn on_save(&mut self, canvas: &mut Canvas, request: SaveRequest) {
        if !request.triggered_by_plugin {
            return;
        }
        let Some(history) = request.history else {
            return;
        };

        canvas.refresh_cached_data();
        if history {
            let data = canvas.cached_data().clone();
            session::push_history(canvas, self, data);
        }
    }

    fn on_history_push(&mut self, _canvas: &Canvas, _snapshot: &CanvasData) -> HistoryDecision {
        match self.history.consume() {
            Some(_) => HistoryDecision::Suppress,
            None => HistoryDecision::Record,
        }
    }

    fn on_select_all(&self, canvas: &Canvas, candidates: Vec<String>) -> SelectAll {
        self.ctx.layout.filter_select_all(canvas, candidates)
    }

    fn on_create_node(&self, request: CreateNodeRequest) -> CreateNodeRequest {
        self.ctx.layout.create_node_defaults(request)
    }

    fn on_interaction_render(&self, canvas: &mut Canvas) {
        self.ctx.layout.mirror_interaction_classes(canvas);
    }
}

impl CanvasSession<FoldPlugin> {
    pub fn layout_change(&mut self) -> Vec<PatchTarget> {
        let view_open = self.is_view_open();
        let (canvas, plugin) = self.parts_mut();
        plugin.on_layout_change(canvas, view_open)
    }

    pub fn click_header(&mut self, node_id: &str) -> Result<bool, FoldError> {
        let (canvas, plugin) = self.parts_mut();
        plugin.toggle_collapsed(canvas, node_id)
    }

    pub fn advance(&mut self, elapsed: Duration) -> Vec<DeferredStep> {
        let (canvas, plugin) = self.parts_mut();
        plugin.advance(canvas, elapsed)
    }

    /// Runs every pending deferred step. Returns how many ran.
    pub fn settle(&mut self) -> usize {
        let mut ran = 0;
        loop {
            let Some(wait) = self.observer().scheduler().next_due_in() else {
                break;
            };
            ran += self.advance(wait).len();
        }
        ran
    }

    pub fn set_alias(&mut self, node_id: &str, alias: &str) -> Result<bool, FoldError> {
        let (canvas, plugin) = self.parts_mut();
        plugin.set_alias(canvas, node_id, alias)
    }

    pub fn set_thumbnail(&mut self, node_id: &str, thumbnail: &str) -> Result<bool, FoldError> {
        let (canvas, plugin) = self.parts_mut();
        plugin.set_thumbnail(canvas, node_id, thumbnail)
    }

    pub fn remove_customizations(&mut self, node_id: &str) -> Result<bool, FoldError> {
        let (canvas, plugin) = self.parts_mut();
        plugin.remove_customizations(canvas, node_id)
    }

    /// Host-side rename: rewrites file references, then notifies the headers.
    pub fn rename_file(&mut self, old_path: &str, new_path: &str) -> usize {
        let (canvas, plugin) = self.parts_mut();
        for node_id in canvas.node_ids() {
            let Some(node) = canvas.node_mut(&node_id) else {
                continue;
            };
            if node.data.file.as_deref() == Some(old_path) {
                node.data.file = Some(new_path.to_owned());
            }
        }
        plugin.on_file_renamed(old_path, new_path)
    }

    pub fn displayed_label(&self, node_id: &str) -> Option<&str> {
        self.observer().displayed_label(node_id)
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

fn line_count(node: &NodeData, vault: Option<&Vault>) -> usize {
    match node.kind {
        NodeKind::Text => node
            .text
            .as_deref()
            .map_or(0, |text| text.split('\n').count()),
        NodeKind::File if node.is_markdown_file() => {
            let (Some(path), Some(vault)) = (node.file.as_deref(), vault) else {
                return 0;
            };
            match vault.read_text(path) {
                Ok(content) => content.split('\n').count(),
                Err(error) => {
                    debug!(node_id = %node.id, path, error = %error, "could not read note for line count");
                    0
                }
            }
        }
        _ => 0,
    }
}
