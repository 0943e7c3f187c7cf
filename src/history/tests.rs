//! Unit tests for the history manager

use crate::graph::{Graph, NodeKind, Position};
use crate::history::History;

fn step(graph: &mut Graph, history: &mut History, x: f64) {
    graph.add_node(NodeKind::Process, Position::new(x, 0.0));
    history.commit(graph);
}

#[test]
fn test_new_history_has_initial_entry() {
    let history = History::new(&Graph::starter());
    assert_eq!(history.len(), 1);
    assert_eq!(history.index(), 0);
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(history.current(), &Graph::starter());
}

#[test]
fn test_undo_redo_are_inverse() {
    let mut graph = Graph::starter();
    let mut history = History::new(&graph);
    for i in 0..5 {
        step(&mut graph, &mut history, i as f64);
    }
    let final_state = graph.clone();

    for k in 1..=5 {
        let mut h = history.clone();
        for _ in 0..k {
            h.undo().unwrap();
        }
        let mut restored = None;
        for _ in 0..k {
            restored = h.redo().cloned();
        }
        assert_eq!(restored.as_ref(), Some(&final_state));
    }
}

#[test]
fn test_undo_and_redo_stop_at_ends() {
    let mut graph = Graph::starter();
    let mut history = History::new(&graph);
    step(&mut graph, &mut history, 0.0);

    assert!(history.redo().is_none());
    assert_eq!(history.undo(), Some(&Graph::starter()));
    assert!(history.undo().is_none());
    assert_eq!(history.index(), 0);
}

#[test]
fn test_commit_after_undo_truncates() {
    let mut graph = Graph::starter();
    let mut history = History::new(&graph);
    step(&mut graph, &mut history, 0.0);
    step(&mut graph, &mut history, 1.0);

    graph = history.undo().cloned().unwrap();
    step(&mut graph, &mut history, 99.0);

    assert!(history.redo().is_none());
    assert_eq!(history.len(), 3);
    assert_eq!(history.current().nodes.last().unwrap().position.x, 99.0);
}

#[test]
fn test_snapshots_are_values() {
    let mut graph = Graph::starter();
    let mut history = History::new(&graph);
    step(&mut graph, &mut history, 0.0);

    let id = graph.nodes[0].id.clone();
    graph.relabel_node(&id, "Changed").unwrap();
    graph.nodes.clear();

    assert_eq!(history.current().nodes.len(), 2);
    assert_eq!(history.current().nodes[0].label(), "Start");
}

#[test]
fn test_reset() {
    let mut graph = Graph::starter();
    let mut history = History::new(&graph);
    step(&mut graph, &mut history, 0.0);

    history.reset(&Graph::new());
    assert_eq!(history.len(), 1);
    assert!(history.current().is_empty());
}
