use canvas_fold::canvas::{BoundsVariant, Canvas, CanvasSession};
use canvas_fold::commands::{FoldCommand, MenuAction};
use canvas_fold::config::FoldSettings;
use canvas_fold::document::{CanvasData, EdgeData, NodeData};
use canvas_fold::fold::FoldPlugin;
use canvas_fold::geometry::Rect;

fn open(data: CanvasData, settings: FoldSettings) -> CanvasSession<FoldPlugin> {
    let mut session = CanvasSession::new(Canvas::from_data(data), FoldPlugin::new(settings, None));
    session.layout_change();
    session
}

fn grouped_canvas() -> CanvasData {
    CanvasData {
        nodes: vec![
            NodeData::group("g1", Rect::from_xywh(0.0, 0.0, 600.0, 400.0), Some("Sprint")),
            NodeData::text(
                "n1",
                Rect::from_xywh(40.0, 80.0, 250.0, 200.0),
                "# Planning notes\nline two\nline three",
            ),
            NodeData::text("outside", Rect::from_xywh(900.0, 0.0, 250.0, 140.0), "elsewhere"),
        ],
        edges: vec![EdgeData::new("e1", "n1", "outside")],
        ..CanvasData::default()
    }
}

fn collapsed(session: &CanvasSession<FoldPlugin>, id: &str) -> Option<bool> {
    session
        .canvas()
        .node(id)
        .and_then(|node| node.data.collapsed)
}

fn hidden_by_group(session: &CanvasSession<FoldPlugin>, id: &str) -> bool {
    session
        .canvas()
        .node(id)
        .is_some_and(|node| node.is_hidden_by_group())
}

#[test]
fn fold_all_then_expand_all_round_trips_every_node() {
    let mut session = open(grouped_canvas(), FoldSettings::default());

    session
        .run_command(FoldCommand::FoldAll)
        .expect("fold all should run");

    for id in ["g1", "n1", "outside"] {
        assert_eq!(collapsed(&session, id), Some(true), "{id} should be folded");
    }
    assert!(hidden_by_group(&session, "n1"));
    assert!(!hidden_by_group(&session, "outside"));
    assert!(
        session
            .canvas()
            .edge("e1")
            .is_some_and(|edge| edge.view.group_edges_collapsed)
    );

    session
        .run_command(FoldCommand::ExpandAll)
        .expect("expand all should run");

    for id in ["g1", "n1", "outside"] {
        assert_eq!(collapsed(&session, id), Some(false), "{id} should be expanded");
    }
    assert!(!hidden_by_group(&session, "n1"));
    assert!(
        session
            .canvas()
            .edge("e1")
            .is_some_and(|edge| !edge.view.group_edges_collapsed)
    );
}

#[test]
fn each_batch_leaves_exactly_one_history_entry() {
    let mut session = open(grouped_canvas(), FoldSettings::default());
    let before = session.canvas().history().len();

    session
        .run_command(FoldCommand::FoldAll)
        .expect("fold all should run");
    assert_eq!(session.canvas().history().len(), before + 1);

    session
        .run_command(FoldCommand::ExpandAll)
        .expect("expand all should run");
    assert_eq!(session.canvas().history().len(), before + 2);
    assert_eq!(session.observer().history_guard().consumed(), 2);
    assert!(!session.observer().history_guard().is_armed());
}

#[test]
fn header_click_settles_into_one_committed_snapshot() {
    let mut session = open(grouped_canvas(), FoldSettings::default());

    assert!(session.click_header("g1").expect("g1 has a header"));
    assert_eq!(
        session
            .bbox("g1", BoundsVariant::Rendered)
            .map(|rect| rect.height()),
        Some(40.0)
    );
    assert!(!hidden_by_group(&session, "n1"), "members follow after a delay");

    session.settle();

    assert!(hidden_by_group(&session, "n1"));
    assert_eq!(collapsed(&session, "g1"), Some(true));
    assert!(session.observer().scheduler().is_idle());
}

#[test]
fn alias_shows_in_place_of_file_name_until_removed() {
    let settings = FoldSettings {
        show_aliases_always: true,
        ..FoldSettings::default()
    };
    let data = CanvasData {
        nodes: vec![NodeData::file(
            "f1",
            Rect::from_xywh(0.0, 0.0, 400.0, 300.0),
            "projects/Phoenix.md",
        )],
        ..CanvasData::default()
    };
    let mut session = open(data, settings);
    assert_eq!(session.displayed_label("f1"), Some("Phoenix"));

    session
        .invoke_node_menu("f1", MenuAction::SetAlias, Some("Project Phoenix"))
        .expect("alias should apply");
    assert_eq!(session.displayed_label("f1"), Some("Project Phoenix"));

    session
        .invoke_node_menu("f1", MenuAction::RemoveCustomizations, None)
        .expect("customizations should clear");
    assert_eq!(session.displayed_label("f1"), Some("Phoenix"));

    let snapshot = session.canvas().get_data();
    let node = snapshot.node("f1").expect("node persists");
    assert!(node.alias.is_none());
    assert!(node.thumbnail.is_none());
}

#[test]
fn read_only_canvas_ignores_batch_commands() {
    let mut canvas = Canvas::from_data(grouped_canvas());
    canvas.set_read_only(true);
    let mut session = CanvasSession::new(canvas, FoldPlugin::new(FoldSettings::default(), None));
    session.layout_change();

    session
        .run_command(FoldCommand::FoldAll)
        .expect("command is accepted");

    assert_eq!(collapsed(&session, "g1"), None);
    assert!(session.canvas().saves().is_empty());
}
