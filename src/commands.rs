//! Commands, context menus and the selection toolbar button. Everything here
//! only routes into the batch helpers on [`FoldPlugin`].

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::canvas::{CanvasLifecycleObserver, CanvasSession, PatchTarget};
use crate::document::NodeData;
use crate::fold::{FoldError, FoldPlugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldCommand {
    FoldAll,
    ExpandAll,
    FoldSelected,
    ExpandSelected,
}

impl FoldCommand {
    pub const ALL: [FoldCommand; 4] = [
        Self::FoldAll,
        Self::ExpandAll,
        Self::FoldSelected,
        Self::ExpandSelected,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::FoldAll => "fold-all-nodes",
            Self::ExpandAll => "expand-all-nodes",
            Self::FoldSelected => "fold-selected-nodes",
            Self::ExpandSelected => "expand-selected-nodes",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FoldAll => "Fold all nodes",
            Self::ExpandAll => "Expand all nodes",
            Self::FoldSelected => "Fold selected nodes",
            Self::ExpandSelected => "Expand selected nodes",
        }
    }

    pub fn collapses(self) -> bool {
        matches!(self, Self::FoldAll | Self::FoldSelected)
    }

    pub fn targets_all_nodes(self) -> bool {
        matches!(self, Self::FoldAll | Self::ExpandAll)
    }
}

impl fmt::Display for FoldCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FoldCommand {
    type Err = FoldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.id() == raw)
            .ok_or_else(|| FoldError::UnknownCommand {
                command: raw.to_owned(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Fold,
    Expand,
    SetAlias,
    SetThumbnail,
    RemoveCustomizations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub section: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub action: Option<MenuAction>,
    pub submenu: Vec<MenuEntry>,
}

impl MenuEntry {
    fn item(section: &'static str, title: &'static str, icon: &'static str, action: MenuAction) -> Self {
        Self {
            section,
            title,
            icon,
            action: Some(action),
            submenu: Vec::new(),
        }
    }

    /// Depth-first search by title, submenus included.
    pub fn find<'a>(entries: &'a [MenuEntry], title: &str) -> Option<&'a MenuEntry> {
        entries.iter().find_map(|entry| {
            if entry.title == title {
                Some(entry)
            } else {
                Self::find(&entry.submenu, title)
            }
        })
    }
}

/// Fold/expand pair shared by both context menus and the toolbar button.
pub fn collapse_submenu(section: &'static str) -> Vec<MenuEntry> {
    vec![
        MenuEntry::item(section, "Fold selected nodes", "fold-vertical", MenuAction::Fold),
        MenuEntry::item(section, "Expand selected nodes", "unfold-vertical", MenuAction::Expand),
    ]
}

fn collapse_entry(section: &'static str) -> MenuEntry {
    MenuEntry {
        section,
        title: "Collapse node",
        icon: "chevrons-left-right",
        action: None,
        submenu: collapse_submenu(section),
    }
}

pub fn selection_menu() -> Vec<MenuEntry> {
    vec![collapse_entry("action")]
}

pub fn node_menu(node: &NodeData) -> Vec<MenuEntry> {
    let mut entries = vec![
        collapse_entry("canvas"),
        MenuEntry::item("canvas", "Set Node Alias", "text-cursor-input", MenuAction::SetAlias),
        MenuEntry::item("canvas", "Set Node Thumbnail", "image", MenuAction::SetThumbnail),
    ];
    if node.alias.is_some() || node.thumbnail.is_some() {
        entries.push(MenuEntry::item(
            "canvas",
            "Remove Node Customizations",
            "trash",
            MenuAction::RemoveCustomizations,
        ));
    }
    entries
}

impl CanvasSession<FoldPlugin> {
    /// Whether the command can run right now.
    pub fn check_command(&self, _command: FoldCommand) -> bool {
        self.is_view_open() && self.observer().canvas_hooks_installed(PatchTarget::Canvas)
    }

    pub fn run_command(&mut self, command: FoldCommand) -> Result<(), FoldError> {
        if !self.check_command(command) {
            return Err(FoldError::NotReady {
                target: PatchTarget::Canvas.label(),
            });
        }
        debug!(command = command.id(), "running command");

        let (canvas, plugin) = self.parts_mut();
        plugin.handle_multi_nodes(canvas, command.targets_all_nodes(), command.collapses());
        Ok(())
    }

    /// Selection context menu. Only the fold/expand pair applies there.
    pub fn invoke_selection_menu(&mut self, action: MenuAction) -> Result<(), FoldError> {
        let collapse = match action {
            MenuAction::Fold => true,
            MenuAction::Expand => false,
            _ => return Ok(()),
        };
        let (canvas, plugin) = self.parts_mut();
        plugin.handle_multi_nodes(canvas, false, collapse);
        Ok(())
    }

    /// Node context menu. `input` carries what the user typed into the alias
    /// or thumbnail prompt; `None` means the prompt was cancelled.
    pub fn invoke_node_menu(
        &mut self,
        node_id: &str,
        action: MenuAction,
        input: Option<&str>,
    ) -> Result<(), FoldError> {
        let (canvas, plugin) = self.parts_mut();
        match action {
            MenuAction::Fold => plugin.handle_single_node(canvas, node_id, true),
            MenuAction::Expand => plugin.handle_single_node(canvas, node_id, false),
            MenuAction::SetAlias => match input {
                Some(alias) => plugin.set_alias(canvas, node_id, alias).map(|_| ()),
                None => Ok(()),
            },
            MenuAction::SetThumbnail => match input {
                Some(thumbnail) => plugin.set_thumbnail(canvas, node_id, thumbnail).map(|_| ()),
                None => Ok(()),
            },
            MenuAction::RemoveCustomizations => {
                plugin.remove_customizations(canvas, node_id).map(|_| ())
            }
        }
    }

    /// Toolbar button over a selection. A selection box spanning several nodes
    /// folds everything it geometrically holds; otherwise the first selected
    /// node is folded on its own.
    pub fn toolbar_fold(&mut self, collapse: bool) -> Result<(), FoldError> {
        if !self.observer().canvas_hooks_installed(PatchTarget::Menu) {
            return Err(FoldError::NotReady {
                target: PatchTarget::Menu.label(),
            });
        }

        let contained = self
            .canvas()
            .menu_selection_bbox()
            .map(|bbox| self.containing_nodes(bbox))
            .unwrap_or_default();
        let first_selected = self.canvas().selection().iter().next().cloned();

        let (canvas, plugin) = self.parts_mut();
        if contained.len() > 1 {
            plugin.fold_nodes(canvas, &contained, collapse);
            Ok(())
        } else if let Some(node_id) = first_selected {
            plugin.handle_single_node(canvas, &node_id, collapse)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FoldCommand, MenuAction, MenuEntry, node_menu, selection_menu};
    use crate::canvas::{Canvas, CanvasSession};
    use crate::config::FoldSettings;
    use crate::document::{CanvasData, NodeData};
    use crate::fold::{FoldError, FoldPlugin};
    use crate::geometry::Rect;

    fn session() -> CanvasSession<FoldPlugin> {
        let data = CanvasData {
            nodes: vec![
                NodeData::group("g1", Rect::from_xywh(0.0, 0.0, 500.0, 500.0), Some("G")),
                NodeData::text("a", Rect::from_xywh(50.0, 50.0, 100.0, 100.0), "a"),
                NodeData::text("b", Rect::from_xywh(200.0, 200.0, 100.0, 100.0), "b"),
            ],
            ..CanvasData::default()
        };
        let mut session = CanvasSession::new(
            Canvas::from_data(data),
            FoldPlugin::new(FoldSettings::default(), None),
        );
        session.layout_change();
        session
    }

    fn collapsed(session: &CanvasSession<FoldPlugin>, id: &str) -> Option<bool> {
        session
            .canvas()
            .node(id)
            .and_then(|node| node.data.collapsed)
    }

    #[test]
    fn command_ids_parse_back() {
        for command in FoldCommand::ALL {
            assert_eq!(command.id().parse::<FoldCommand>().ok(), Some(command));
        }
        assert!(matches!(
            "fold-everything".parse::<FoldCommand>(),
            Err(FoldError::UnknownCommand { .. })
        ));
        assert_eq!(FoldCommand::ExpandSelected.to_string(), "expand-selected-nodes");
    }

    #[test]
    fn commands_are_unavailable_before_hooks_install() {
        let mut session = CanvasSession::closed(
            Canvas::new(),
            FoldPlugin::new(FoldSettings::default(), None),
        );

        assert!(!session.check_command(FoldCommand::FoldAll));
        assert!(matches!(
            session.run_command(FoldCommand::FoldAll),
            Err(FoldError::NotReady { .. })
        ));
    }

    #[test]
    fn fold_selected_touches_only_the_selection() {
        let mut session = session();
        session.canvas_mut().set_selection(["a"]);

        session
            .run_command(FoldCommand::FoldSelected)
            .expect("command runs");

        assert_eq!(collapsed(&session, "a"), Some(true));
        assert_eq!(collapsed(&session, "b"), None);
    }

    #[test]
    fn node_menu_offers_removal_only_with_customizations() {
        let mut node = NodeData::text("a", Rect::default(), "a");
        assert!(MenuEntry::find(&node_menu(&node), "Remove Node Customizations").is_none());

        node.thumbnail = Some("cover.png".to_owned());
        let entries = node_menu(&node);
        assert!(MenuEntry::find(&entries, "Remove Node Customizations").is_some());
        assert_eq!(
            MenuEntry::find(&entries, "Fold selected nodes").and_then(|entry| entry.action),
            Some(MenuAction::Fold)
        );
    }

    #[test]
    fn selection_menu_nests_fold_and_expand() {
        let entries = selection_menu();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Collapse node");
        assert_eq!(entries[0].section, "action");
        assert_eq!(entries[0].submenu.len(), 2);
    }

    #[test]
    fn node_menu_alias_prompt_cancel_changes_nothing() {
        let mut session = session();

        session
            .invoke_node_menu("a", MenuAction::SetAlias, None)
            .expect("cancel is fine");
        assert!(session.canvas().saves().is_empty());

        session
            .invoke_node_menu("a", MenuAction::SetAlias, Some("Alpha"))
            .expect("alias set");
        assert_eq!(
            session.canvas().node("a").and_then(|node| node.data.alias.clone()),
            Some("Alpha".to_owned())
        );
    }

    #[test]
    fn toolbar_folds_everything_the_selection_box_holds() {
        let mut session = session();
        session.canvas_mut().set_selection(["a"]);
        session
            .canvas_mut()
            .set_menu_selection_bbox(Some(Rect::from_xywh(0.0, 0.0, 500.0, 500.0)));

        session.toolbar_fold(true).expect("toolbar runs");

        for id in ["g1", "a", "b"] {
            assert_eq!(collapsed(&session, id), Some(true), "{id}");
        }
    }

    #[test]
    fn toolbar_falls_back_to_first_selected_node() {
        let mut session = session();
        session.canvas_mut().set_selection(["b"]);
        session
            .canvas_mut()
            .set_menu_selection_bbox(Some(Rect::from_xywh(190.0, 190.0, 120.0, 120.0)));

        session.toolbar_fold(true).expect("toolbar runs");

        assert_eq!(collapsed(&session, "b"), Some(true));
        assert_eq!(collapsed(&session, "a"), None);
    }
}
