//! Collapse-aware geometry: the bounding-box override, containment
//! refinement, select-all filtering and new-node defaults.

use crate::canvas::{BoundsVariant, Canvas, CanvasNode, CreateNodeRequest, SelectAll, Size};
use crate::document::NodeKind;
use crate::geometry::{Rect, contains, parse_selection_rect};

pub const HEADER_HEIGHT: f64 = 40.0;
pub const GROUP_HEADER_BAND: f64 = 30.0;
pub const DEFAULT_TEXT_SIZE: Size = Size {
    width: 250.0,
    height: 140.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldLayout {
    header_height: f64,
}

impl Default for FoldLayout {
    fn default() -> Self {
        Self {
            header_height: HEADER_HEIGHT,
        }
    }
}

impl FoldLayout {
    pub fn header_height(&self) -> f64 {
        self.header_height
    }

    /// A node carrying the `collapsed` class renders as its header only. The
    /// containing variant always reports the stored box.
    pub fn bounds(&self, node: &CanvasNode, variant: BoundsVariant) -> Rect {
        self.override_bounds(node, node.native_bounds(), variant)
    }

    pub fn override_bounds(&self, node: &CanvasNode, native: Rect, variant: BoundsVariant) -> Rect {
        match variant {
            BoundsVariant::Rendered if node.view.collapsed => native.with_height(self.header_height),
            _ => native,
        }
    }

    pub fn bbox(&self, canvas: &Canvas, node_id: &str, variant: BoundsVariant) -> Option<Rect> {
        canvas.node(node_id).map(|node| self.bounds(node, variant))
    }

    /// The containment query as the host answers it once the fold layer is
    /// installed: native lookup on rendered boxes, then refinement.
    pub fn containing_nodes(&self, canvas: &Canvas, region: Rect) -> Vec<String> {
        let native = canvas.containing_nodes(region, &|node| {
            self.bounds(node, BoundsVariant::Rendered)
        });
        self.refine_containment(canvas, region, native)
    }

    /// A probe exactly one header tall usually comes from a collapsed group
    /// measuring itself. Re-ask with that group's stored box and keep the
    /// larger answer.
    pub fn refine_containment(&self, canvas: &Canvas, region: Rect, native: Vec<String>) -> Vec<String> {
        let rendered = |node: &CanvasNode| self.bounds(node, BoundsVariant::Rendered);
        let groups = canvas
            .search(region, &rendered)
            .into_iter()
            .filter_map(|id| canvas.node(&id))
            .filter(|node| node.data.is_group())
            .collect::<Vec<_>>();

        let Some(group) = groups
            .iter()
            .find(|node| rendered(*node) == region)
            .or_else(|| groups.first())
        else {
            return native;
        };

        let containing = self.bounds(group, BoundsVariant::Containing);
        if containing == region || region.height() != self.header_height {
            return native;
        }

        let refined = canvas.containing_nodes(containing, &|node| {
            self.bounds(node, BoundsVariant::Containing)
        });
        if refined.len() > native.len() {
            refined
        } else {
            native
        }
    }

    /// Trims a select-all / rubber-band candidate set to what the drawn
    /// selection rectangle actually covers. Without a parsable overlay the
    /// candidates pass through untouched.
    pub fn filter_select_all(&self, canvas: &Canvas, candidates: Vec<String>) -> SelectAll {
        let Some(selection) = canvas.selection_overlay().and_then(parse_selection_rect) else {
            return SelectAll::Select(candidates);
        };

        let kept = candidates
            .into_iter()
            .filter(|id| {
                let Some(node) = canvas.node(id) else {
                    return false;
                };
                if node.is_hidden_by_group() {
                    return contains(&selection, &self.bounds(node, BoundsVariant::Containing));
                }
                if !node.data.is_collapsed() {
                    return true;
                }
                contains(&selection, &self.bounds(node, BoundsVariant::Rendered))
            })
            .collect::<Vec<_>>();

        if kept.is_empty() {
            SelectAll::Skip
        } else {
            SelectAll::Select(kept)
        }
    }

    pub fn create_node_defaults(&self, request: CreateNodeRequest) -> CreateNodeRequest {
        match (request.kind, request.size) {
            (NodeKind::Text, None) => CreateNodeRequest {
                size: Some(DEFAULT_TEXT_SIZE),
                ..request
            },
            (NodeKind::Group, Some(size)) => CreateNodeRequest {
                y: request.y - GROUP_HEADER_BAND,
                size: Some(Size {
                    width: size.width,
                    height: size.height + GROUP_HEADER_BAND,
                }),
                ..request
            },
            _ => request,
        }
    }

    /// Copies the target node's fold classes onto the interaction overlay.
    pub fn mirror_interaction_classes(&self, canvas: &mut Canvas) {
        let Some(target) = canvas.interaction_layer().target.clone() else {
            return;
        };
        let Some((collapsed, group_nodes_collapsed)) = canvas
            .node(&target)
            .map(|node| (node.view.collapsed, node.view.group_nodes_collapsed))
        else {
            return;
        };

        let layer = canvas.interaction_layer_mut();
        layer.collapsed_interaction = collapsed;
        layer.group_nodes_collapsed = group_nodes_collapsed;
    }
}
