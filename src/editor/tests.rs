//! Unit tests for the controller and session

use crate::document::Document;
use crate::editor::{
    EditorSession, Gesture, InputEvent, InputRequest, Key, KeyPress, NoticeLevel, Outcome, Tool,
};
use crate::generation::{GenerationError, GenerationResult, GraphGenerator};
use crate::geometry::Point;
use crate::graph::{NodeId, NodeKind, Position};
use crate::store::{
    DocumentFilter, DocumentPatch, DocumentStore, StoreError, StoreResult, StoredDocument,
    Visibility,
};

fn click(x: f64, y: f64) -> InputEvent {
    InputEvent::Click {
        at: Point::new(x, y),
        shift: false,
    }
}

fn key(c: char) -> InputEvent {
    InputEvent::Key(KeyPress::plain(Key::Char(c)))
}

fn drag(session: &mut EditorSession, from: Point, to: Point) -> Outcome {
    session.handle(InputEvent::PointerDown { at: from });
    session.handle(InputEvent::PointerMove {
        at: Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0),
    });
    session.handle(InputEvent::PointerMove { at: to });
    session.handle(InputEvent::PointerUp { at: to })
}

/// Place a process node centred on `(x, y)` and return its id
fn place(session: &mut EditorSession, x: f64, y: f64) -> NodeId {
    session.handle(InputEvent::SelectTool(Tool::Place(NodeKind::Process)));
    assert!(session.handle(click(x, y)).is_commit());
    session.graph().nodes.last().unwrap().id.clone()
}

struct Canned(&'static str);

impl GraphGenerator for Canned {
    fn generate_graph(&self, _prompt: &str) -> GenerationResult<String> {
        Ok(self.0.to_string())
    }
}

struct Unavailable;

impl DocumentStore for Unavailable {
    fn save(&self, _: &Document, _: Visibility) -> StoreResult<StoredDocument> {
        Err(StoreError::NotFound("offline".into()))
    }
    fn load(&self, _: &DocumentFilter) -> StoreResult<Vec<StoredDocument>> {
        Err(StoreError::NotFound("offline".into()))
    }
    fn get(&self, id: &str) -> StoreResult<StoredDocument> {
        Err(StoreError::NotFound(id.into()))
    }
    fn update(&self, id: &str, _: DocumentPatch) -> StoreResult<StoredDocument> {
        Err(StoreError::NotFound(id.into()))
    }
    fn delete(&self, id: &str) -> StoreResult<()> {
        Err(StoreError::NotFound(id.into()))
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_place_and_connect_by_gesture() {
    let mut session = EditorSession::new();
    let start = session.graph().nodes[0].id.clone();
    assert_eq!(session.graph().nodes[0].position, Position::new(250.0, 5.0));

    assert_eq!(session.handle(key('p')), Outcome::Redraw);
    assert_eq!(session.controller().tool(), Tool::Place(NodeKind::Process));
    assert!(session.handle(click(300.0, 200.0)).is_commit());
    assert_eq!(session.graph().nodes.len(), 2);
    let placed = session.graph().nodes[1].clone();
    assert_eq!(placed.kind, NodeKind::Process);
    assert_eq!(placed.position, Position::new(250.0, 180.0));
    assert_eq!(session.controller().tool(), Tool::Place(NodeKind::Process));

    // Drag from the start node's bottom handle onto the new node
    let outcome = drag(&mut session, Point::new(300.0, 105.0), Point::new(300.0, 200.0));
    assert!(outcome.is_commit());
    assert_eq!(session.graph().edges.len(), 1);
    assert_eq!(session.graph().edges[0].source, start);
    assert_eq!(session.graph().edges[0].target, placed.id);
}

#[test]
fn test_undo_redo_walks_snapshots() {
    let mut session = EditorSession::new();
    let n1 = place(&mut session, 100.0, 300.0);
    let n2 = place(&mut session, 400.0, 300.0);

    session.handle(InputEvent::SelectTool(Tool::Select));
    session.handle(InputEvent::SecondaryClick {
        at: Point::new(100.0, 300.0),
    });
    assert!(session.answer_prompt(Some(n2.to_string())).is_commit());
    assert_eq!(session.history().len(), 4);
    let full = session.graph().clone();

    assert_eq!(session.handle(InputEvent::Key(KeyPress::ctrl('z'))), Outcome::Undo);
    assert!(session.graph().edges.is_empty());
    assert!(session.graph().contains_node(&n2));

    assert!(session.undo());
    assert!(!session.graph().contains_node(&n2));
    assert!(session.graph().contains_node(&n1));

    assert_eq!(
        session.handle(InputEvent::Key(KeyPress::ctrl_shift('Z'))),
        Outcome::Redo
    );
    assert!(session.redo());
    assert_eq!(session.graph(), &full);
    assert!(!session.can_redo());
}

#[test]
fn test_import_replaces_graph() {
    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    let before = session.history().len();

    let json = r#"{"nodes":[{"id":"a","type":"process","position":{"x":0,"y":0},
        "data":{"label":"X"}}],"edges":[]}"#;
    session.import_json(json).unwrap();

    let graph = session.graph();
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.nodes[0].id, NodeId::new("a"));
    assert_eq!(graph.nodes[0].kind, NodeKind::Process);
    assert_eq!(graph.nodes[0].label(), "X");
    assert!(graph.edges.is_empty());
    assert_eq!(session.history().len(), before + 1);
    assert_eq!(session.take_notices()[0].level, NoticeLevel::Success);
}

#[test]
fn test_generation_applies_empty_graph() {
    let mut session = EditorSession::new();
    let before = session.history().len();
    let generator = Canned("Here you go:\n```json\n{\"nodes\":[],\"edges\":[]}\n```");

    session.generate_with(&generator, "login flow for admins").unwrap();

    assert!(session.graph().is_empty());
    assert_eq!(session.history().len(), before + 1);
    assert_eq!(session.metadata().title, "login flow for admins Flow");
    assert!(!session.generation_pending());
}

#[test]
fn test_generation_adjustments_raise_warning() {
    let mut session = EditorSession::new();
    let generator = Canned(
        r#"{"nodes": [{"id": "a"}, {"id": "b", "type": "blob"}],
            "edges": [{"source": "a", "target": "zz"}]}"#,
    );

    session.generate_with(&generator, "two steps").unwrap();

    assert_eq!(session.graph().nodes.len(), 2);
    assert!(session.graph().edges.is_empty());
    let notices = session.take_notices();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[1].level, NoticeLevel::Warning);
    assert!(notices[1].message.contains("a -> zz"));
    assert!(notices[1].message.contains("blob"));
}

#[test]
fn test_cancel_generation_notice() {
    let mut session = EditorSession::new();
    session.cancel_generation();
    assert!(session.take_notices().is_empty());

    session.begin_generation("pending").unwrap();
    session.cancel_generation();
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);
}

// ============================================================================
// GESTURES
// ============================================================================

#[test]
fn test_drag_commits_once() {
    let mut session = EditorSession::new();
    let before = session.history().len();

    session.handle(InputEvent::PointerDown {
        at: Point::new(270.0, 20.0),
    });
    for step in 1..=10 {
        let outcome = session.handle(InputEvent::PointerMove {
            at: Point::new(270.0 + step as f64 * 5.0, 20.0 + step as f64 * 10.0),
        });
        assert_eq!(outcome, Outcome::Redraw);
        assert_eq!(session.history().len(), before);
    }
    let outcome = session.handle(InputEvent::PointerUp {
        at: Point::new(320.0, 120.0),
    });

    assert!(outcome.is_commit());
    assert_eq!(session.history().len(), before + 1);
    assert_eq!(session.graph().nodes[0].position, Position::new(300.0, 105.0));
}

#[test]
fn test_click_without_movement_does_not_commit() {
    let mut session = EditorSession::new();
    let before = session.history().len();
    let at = Point::new(270.0, 20.0);

    session.handle(InputEvent::PointerDown { at });
    assert_eq!(session.handle(InputEvent::PointerUp { at }), Outcome::Redraw);
    assert_eq!(session.history().len(), before);
}

#[test]
fn test_escape_cancels_drag() {
    let mut session = EditorSession::new();
    session.handle(InputEvent::PointerDown {
        at: Point::new(270.0, 20.0),
    });
    session.handle(InputEvent::PointerMove {
        at: Point::new(500.0, 500.0),
    });
    session.handle(InputEvent::Key(KeyPress::plain(Key::Escape)));

    assert_eq!(session.graph().nodes[0].position, Position::new(250.0, 5.0));
    assert_eq!(session.controller().gesture(), &Gesture::Idle);
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_connect_released_on_canvas_is_cancelled() {
    let mut session = EditorSession::new();
    let outcome = drag(&mut session, Point::new(300.0, 105.0), Point::new(800.0, 800.0));
    assert_eq!(outcome, Outcome::Redraw);
    assert!(session.graph().edges.is_empty());
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_select_tool_click_selection() {
    let mut session = EditorSession::new();
    let a = place(&mut session, 100.0, 300.0);
    let b = place(&mut session, 400.0, 300.0);
    session.handle(key('v'));

    session.handle(click(100.0, 300.0));
    assert!(session.selection().nodes.contains(&a));

    session.handle(InputEvent::Click {
        at: Point::new(400.0, 300.0),
        shift: true,
    });
    assert_eq!(session.selection().nodes.len(), 2);
    assert!(session.selection().nodes.contains(&b));

    assert_eq!(session.handle(click(900.0, 900.0)), Outcome::Redraw);
    assert!(session.selection().is_empty());
    assert_eq!(session.handle(click(900.0, 900.0)), Outcome::Ignored);
}

// ============================================================================
// PROMPTS
// ============================================================================

#[test]
fn test_relabel_via_double_click() {
    let mut session = EditorSession::new();
    let outcome = session.handle(InputEvent::DoubleClick {
        at: Point::new(280.0, 35.0),
    });
    let Outcome::Prompt(request) = outcome else {
        panic!("expected a prompt, got {outcome:?}");
    };
    assert_eq!(request.initial_text(), "Start");
    assert!(matches!(request, InputRequest::Relabel { .. }));

    // Pointer input is suspended while the prompt is open
    assert_eq!(session.handle(click(900.0, 900.0)), Outcome::Ignored);

    assert!(session.answer_prompt(Some("  Begin  ".into())).is_commit());
    assert_eq!(session.graph().nodes[0].label(), "Begin");
}

#[test]
fn test_blank_or_cancelled_relabel_is_noop() {
    let mut session = EditorSession::new();
    session.handle(InputEvent::DoubleClick {
        at: Point::new(280.0, 35.0),
    });
    assert_eq!(session.answer_prompt(Some("   ".into())), Outcome::Redraw);

    session.handle(InputEvent::DoubleClick {
        at: Point::new(280.0, 35.0),
    });
    assert_eq!(session.answer_prompt(None), Outcome::Redraw);

    assert_eq!(session.graph().nodes[0].label(), "Start");
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_connect_to_unknown_target_is_noop() {
    let mut session = EditorSession::new();
    let outcome = session.handle(InputEvent::SecondaryClick {
        at: Point::new(280.0, 35.0),
    });
    assert!(matches!(
        outcome,
        Outcome::Prompt(InputRequest::ConnectTarget { .. })
    ));
    assert_eq!(session.answer_prompt(Some("nope".into())), Outcome::Redraw);
    assert!(session.graph().edges.is_empty());
    assert_eq!(session.history().len(), 1);
    assert!(session.notices().is_empty());
}

#[test]
fn test_edge_label_via_double_click() {
    let mut session = EditorSession::new();
    let target = place(&mut session, 300.0, 300.0);
    session.handle(InputEvent::SelectTool(Tool::Select));
    session.handle(InputEvent::SecondaryClick {
        at: Point::new(280.0, 35.0),
    });
    session.answer_prompt(Some(target.to_string()));

    // Start bottom port (300, 105) to target top port (300, 280)
    let outcome = session.handle(InputEvent::DoubleClick {
        at: Point::new(302.0, 190.0),
    });
    assert!(matches!(outcome, Outcome::Prompt(InputRequest::EdgeLabel { .. })));
    assert!(session.answer_prompt(Some("yes".into())).is_commit());
    assert_eq!(session.graph().edges[0].label.as_deref(), Some("yes"));
}

#[test]
fn test_escape_closes_prompt() {
    let mut session = EditorSession::new();
    session.handle(InputEvent::SecondaryClick {
        at: Point::new(280.0, 35.0),
    });
    assert!(session.controller().pending_request().is_some());
    session.handle(InputEvent::Key(KeyPress::plain(Key::Escape)));
    assert!(session.controller().pending_request().is_none());
}

// ============================================================================
// KEYBOARD
// ============================================================================

#[test]
fn test_delete_cascades_in_one_snapshot() {
    let mut session = EditorSession::new();
    let start = session.graph().nodes[0].id.clone();
    let hub = place(&mut session, 300.0, 300.0);
    let leaf = place(&mut session, 600.0, 300.0);
    for (a, b) in [(&start, &hub), (&hub, &leaf), (&hub, &hub)] {
        session.handle(InputEvent::SelectTool(Tool::Select));
        let at = session.graph().node(a).unwrap().position.offset(10.0, 10.0);
        session.handle(InputEvent::SecondaryClick { at });
        session.answer_prompt(Some(b.to_string()));
    }
    assert_eq!(session.graph().edges.len(), 3);
    let before = session.graph().clone();
    let history_len = session.history().len();

    session.handle(click(300.0, 300.0));
    let outcome = session.handle(InputEvent::Key(KeyPress::plain(Key::Delete)));
    assert!(outcome.is_commit());
    assert!(!session.graph().contains_node(&hub));
    assert!(session.graph().edges.is_empty());
    assert_eq!(session.history().len(), history_len + 1);
    assert!(session.selection().is_empty());

    session.undo();
    assert_eq!(session.graph(), &before);
}

#[test]
fn test_delete_with_empty_selection_is_noop() {
    let mut session = EditorSession::new();
    let outcome = session.handle(InputEvent::Key(KeyPress::plain(Key::Backspace)));
    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(session.graph().nodes.len(), 1);
}

#[test]
fn test_tool_shortcuts_and_escape() {
    let mut session = EditorSession::new();
    for (c, tool) in [
        ('s', Tool::Place(NodeKind::StartEnd)),
        ('D', Tool::Place(NodeKind::Decision)),
        ('i', Tool::Place(NodeKind::InputOutput)),
        ('t', Tool::Place(NodeKind::Text)),
        ('v', Tool::Select),
    ] {
        session.handle(key(c));
        assert_eq!(session.controller().tool(), tool);
    }

    session.handle(key('p'));
    session.handle(InputEvent::Key(KeyPress::plain(Key::Escape)));
    assert_eq!(session.controller().tool(), Tool::Select);
    assert_eq!(session.handle(key('x')), Outcome::Ignored);
}

#[test]
fn test_ctrl_s_requests_draft_save() {
    let mut session = EditorSession::new();
    let outcome = session.handle(InputEvent::Key(KeyPress::ctrl('s')));
    assert_eq!(outcome, Outcome::SaveDraft);
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_undo_prunes_selection() {
    let mut session = EditorSession::new();
    let id = place(&mut session, 300.0, 300.0);
    assert!(session.selection().nodes.contains(&id));
    session.undo();
    assert!(session.selection().is_empty());
}

// ============================================================================
// COLLABORATORS
// ============================================================================

#[test]
fn test_failed_import_leaves_graph() {
    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    let before = session.graph().clone();
    let history_len = session.history().len();

    assert!(session.import_json("{\"nodes\": 12}").is_err());
    assert!(session.import_json("not json").is_err());
    assert_eq!(session.graph(), &before);
    assert_eq!(session.history().len(), history_len);
    assert!(session
        .take_notices()
        .iter()
        .all(|n| n.level == NoticeLevel::Error));
}

#[test]
fn test_import_without_metadata_keeps_title() {
    let mut session = EditorSession::new();
    session.set_title("My Flow");
    session
        .import_json(
            r#"{"nodes": [{"id": "x", "type": "text", "position": {"x": 1, "y": 2},
                "data": {"label": "note"}}]}"#,
        )
        .unwrap();
    assert_eq!(session.metadata().title, "My Flow");
}

#[test]
fn test_export_import_round_trip() {
    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    let json = session.export_json().unwrap();

    let mut other = EditorSession::new();
    other.import_json(&json).unwrap();
    assert_eq!(other.document(), session.document());
}

#[test]
fn test_failed_save_keeps_graph() {
    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    let before = session.document().clone();

    assert!(session.save(&Unavailable, Visibility::Draft).is_err());
    assert_eq!(session.document(), &before);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[test]
fn test_save_and_reload_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = crate::store::FileStore::open(dir.path()).unwrap();

    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    let record = session.save(&store, Visibility::Public).unwrap();
    assert!(!session.metadata().is_draft);

    let mut other = EditorSession::new();
    other.load_stored(&record).unwrap();
    assert_eq!(other.graph(), session.graph());
    assert_eq!(other.metadata().title, session.metadata().title);
    assert_eq!(other.history().len(), 2);
}

#[test]
fn test_failed_generation_is_isolated() {
    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    let before = session.document().clone();
    let history_len = session.history().len();

    let err = session
        .generate_with(&Canned("I'd rather not."), "anything")
        .unwrap_err();
    assert!(matches!(err, GenerationError::Failed(_)));

    let (ticket, _) = session.begin_generation("again").unwrap();
    let err = session
        .finish_generation(
            ticket,
            Err(GenerationError::Api {
                status: 429,
                message: "API rate limit exceeded. Please try again later.".into(),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: 429, .. }));

    assert_eq!(session.document(), &before);
    assert_eq!(session.history().len(), history_len);
    assert!(!session.generation_pending());
}

#[test]
fn test_blank_prompt_rejected() {
    let mut session = EditorSession::new();
    assert!(matches!(
        session.begin_generation("   "),
        Err(GenerationError::EmptyPrompt)
    ));
    assert!(!session.generation_pending());
    assert_eq!(session.take_notices().len(), 1);
}

#[test]
fn test_stale_generation_is_discarded() {
    let mut session = EditorSession::new();
    let body = r#"{"nodes": [{"id": "g", "type": "process"}]}"#;
    let reply = || Ok::<_, GenerationError>(body.to_string());

    let (first, _) = session.begin_generation("first request").unwrap();
    let (second, _) = session.begin_generation("second request").unwrap();

    assert!(matches!(
        session.finish_generation(first, reply()),
        Err(GenerationError::Superseded)
    ));
    assert_eq!(session.graph().nodes[0].id, NodeId::new("1"));
    assert!(session.generation_pending());

    session.finish_generation(second, reply()).unwrap();
    assert_eq!(session.graph().nodes[0].id, NodeId::new("g"));
    assert_eq!(session.metadata().title, "second request Flow");
}

#[test]
fn test_reset_starts_over() {
    let mut session = EditorSession::new();
    place(&mut session, 300.0, 300.0);
    session.begin_generation("pending").unwrap();
    session.reset();

    assert_eq!(session.document().graph, Document::new().graph);
    assert_eq!(session.history().len(), 1);
    assert!(!session.generation_pending());
}
