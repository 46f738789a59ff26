use std::collections::BTreeSet;

use tracing::debug;

use crate::canvas::{BoundsVariant, Canvas};
use crate::document::CanvasData;
use crate::geometry::contains;

use super::FoldContext;
use super::header::HeaderView;

/// Owns the collapsed state of one node view and, for groups, hides and
/// reveals the nodes the group geometrically contains.
#[derive(Debug, Clone, PartialEq)]
pub struct CollapseController {
    node_id: String,
    generation: u64,
    collapsed: bool,
    containing_nodes_cache: Vec<String>,
    history_refreshed: bool,
    header: HeaderView,
}

impl CollapseController {
    /// Builds the controller and header for a freshly rendered node view and
    /// brings the view in line with the persisted `collapsed` flag.
    pub fn attach(canvas: &mut Canvas, ctx: &FoldContext, node_id: &str) -> Option<Self> {
        let node = canvas.node(node_id)?;
        let mut controller = Self {
            node_id: node_id.to_owned(),
            generation: node.view.generation,
            collapsed: node.data.is_collapsed(),
            containing_nodes_cache: Vec::new(),
            history_refreshed: false,
            header: HeaderView::new(&node.data, &ctx.settings, ctx.vault.as_ref()),
        };

        if let Some(node) = canvas.node_mut(node_id) {
            node.view.header_attached = true;
        }
        controller.update_nodes_in_group(canvas, ctx, false);
        controller.update_node(canvas, ctx);
        if controller.collapsed {
            controller.update_edges(canvas, ctx);
        }
        Some(controller)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn header(&self) -> &HeaderView {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut HeaderView {
        &mut self.header
    }

    /// Members this controller hid and will reveal again on expand.
    pub fn cached_members(&self) -> &[String] {
        &self.containing_nodes_cache
    }

    pub fn history_refreshed(&self) -> bool {
        self.history_refreshed
    }

    /// Returns whether anything changed. Read-only canvases and requests for
    /// the current state are ignored.
    pub fn set_collapsed(&mut self, canvas: &mut Canvas, ctx: &FoldContext, collapsed: bool) -> bool {
        if canvas.is_read_only() || self.collapsed == collapsed {
            return false;
        }

        self.collapsed = collapsed;
        self.write_metadata(canvas);
        self.update_nodes_in_group(canvas, ctx, false);
        self.update_node(canvas, ctx);
        self.update_edges(canvas, ctx);
        debug!(node_id = %self.node_id, collapsed, "node collapse state set");
        true
    }

    /// Immediate half of a header click: flips the flag, the persisted field
    /// and the node's own class. Members and edges follow later.
    pub fn toggle_visual(&mut self, canvas: &mut Canvas, ctx: &FoldContext) -> bool {
        if canvas.is_read_only() {
            return false;
        }

        self.collapsed = !self.collapsed;
        self.write_metadata(canvas);
        self.update_node(canvas, ctx);
        true
    }

    /// Snapshot to commit once the toggle transition is over.
    pub fn commit_snapshot(&mut self, canvas: &mut Canvas) -> CanvasData {
        let mut snapshot = canvas.get_data();
        if snapshot.set_collapsed(&self.node_id, self.collapsed) {
            self.refresh_history(canvas);
        }
        snapshot
    }

    /// Older history entries predate the `collapsed` field. Fill it in once so
    /// undoing back to them expands the node instead of leaving it as is.
    pub fn refresh_history(&mut self, canvas: &mut Canvas) {
        if self.history_refreshed || canvas.history().is_empty() {
            return;
        }

        for entry in canvas.history_mut() {
            for node in entry.nodes.iter_mut() {
                if node.id == self.node_id && node.collapsed.is_none() {
                    node.collapsed = Some(false);
                }
            }
        }
        self.history_refreshed = true;
    }

    /// Re-derives group membership from geometry and hides or reveals the
    /// members. `force_expand` resets this controller to expanded first.
    pub fn update_nodes_in_group(&mut self, canvas: &mut Canvas, ctx: &FoldContext, force_expand: bool) {
        let Some(node) = canvas.node(&self.node_id) else {
            return;
        };
        if !node.data.is_group() {
            return;
        }

        let region = ctx.layout.bounds(node, BoundsVariant::Containing);
        let members = ctx.layout.containing_nodes(canvas, region);

        if force_expand && self.collapsed {
            self.collapsed = false;
            self.write_metadata(canvas);
        }

        if self.collapsed {
            for member in members.iter().filter(|id| **id != self.node_id) {
                set_group_hidden(canvas, member, true);
                if !self.containing_nodes_cache.contains(member) {
                    self.containing_nodes_cache.push(member.clone());
                }
                update_edges_in_group(canvas, member, true);
            }
            debug!(
                node_id = %self.node_id,
                hidden = self.containing_nodes_cache.len(),
                "group members hidden"
            );
        } else {
            let suppressed = self.suppressed_members(canvas, ctx, &members);
            let revealed = self
                .containing_nodes_cache
                .iter()
                .filter(|id| !suppressed.contains(*id))
                .cloned()
                .collect::<Vec<_>>();

            for member in &revealed {
                set_group_hidden(canvas, member, false);
                update_edges_in_group(canvas, member, false);
            }
            for member in &suppressed {
                set_group_hidden(canvas, member, true);
                update_edges_in_group(canvas, member, true);
            }
            debug!(
                node_id = %self.node_id,
                revealed = revealed.len(),
                kept_hidden = suppressed.len(),
                "group members revealed"
            );
            self.containing_nodes_cache.clear();
        }

        self.update_edges(canvas, ctx);
    }

    /// Nodes that must stay hidden although this group expands: everything a
    /// nested collapsed group holds, and any cached member some other
    /// collapsed group still encloses.
    fn suppressed_members(&self, canvas: &Canvas, ctx: &FoldContext, members: &[String]) -> BTreeSet<String> {
        let mut suppressed = BTreeSet::new();

        let nested_collapsed = members
            .iter()
            .filter(|id| **id != self.node_id)
            .filter_map(|id| canvas.node(id))
            .filter(|node| node.data.is_group() && node.data.is_collapsed());
        for group in nested_collapsed {
            let region = ctx.layout.bounds(group, BoundsVariant::Containing);
            suppressed.extend(
                ctx.layout
                    .containing_nodes(canvas, region)
                    .into_iter()
                    .filter(|id| id != group.id()),
            );
        }

        for member_id in &self.containing_nodes_cache {
            let Some(member) = canvas.node(member_id) else {
                continue;
            };
            let member_box = ctx.layout.bounds(member, BoundsVariant::Rendered);
            let enclosed = canvas.nodes().any(|other| {
                other.id() != self.node_id
                    && other.id() != member_id
                    && other.data.is_group()
                    && other.data.is_collapsed()
                    && contains(&ctx.layout.bounds(other, BoundsVariant::Containing), &member_box)
            });
            if enclosed {
                suppressed.insert(member_id.clone());
            }
        }

        suppressed
    }

    /// Applies the collapsed class and refreshes the header.
    pub fn update_node(&mut self, canvas: &mut Canvas, ctx: &FoldContext) {
        if let Some(node) = canvas.node_mut(&self.node_id) {
            node.view.collapsed = self.collapsed;
        }
        self.header.set_collapsed(self.collapsed, &ctx.settings);
    }

    /// Rebuilds the interaction overlay and re-renders this node's edges.
    pub fn update_edges(&self, canvas: &mut Canvas, ctx: &FoldContext) {
        canvas.detach_interaction_layer();
        canvas.render_interaction_layer();
        ctx.layout.mirror_interaction_classes(canvas);

        for edge_id in canvas.edges_for_node(&self.node_id) {
            canvas.render_edge(&edge_id);
        }
    }

    fn write_metadata(&self, canvas: &mut Canvas) {
        if let Some(node) = canvas.node_mut(&self.node_id) {
            node.data.collapsed = Some(self.collapsed);
        }
    }
}

fn set_group_hidden(canvas: &mut Canvas, node_id: &str, hidden: bool) {
    if let Some(node) = canvas.node_mut(node_id) {
        node.view.group_nodes_collapsed = hidden;
    }
}

pub fn update_edges_in_group(canvas: &mut Canvas, node_id: &str, collapsed: bool) {
    for edge_id in canvas.edges_for_node(node_id) {
        canvas.set_edge_group_collapsed(&edge_id, collapsed);
        canvas.render_edge(&edge_id);
    }
}
