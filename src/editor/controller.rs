//! Interaction controller: tool modes, gestures and keyboard commands

use log::debug;
use std::collections::HashSet;

use super::{
    InputEvent, InputRequest, Key, KeyPress, Outcome, Tool, CONNECT_THRESHOLD, EDGE_TOLERANCE,
    PORT_PICK_RADIUS,
};
use crate::geometry::{self, Point, Side};
use crate::graph::{EdgeId, Graph, NodeId, Position, Selection};

/// Transient pointer state
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Idle,
    /// A node follows the pointer; nothing is committed until release
    Dragging {
        node: NodeId,
        /// Pointer position relative to the node's origin at grab time
        grab: (f64, f64),
        origin: Position,
    },
    /// Rubber band from a port handle to the pointer
    Connecting {
        source: NodeId,
        side: Side,
        from: Point,
        cursor: Point,
    },
    /// A prompt is open; pointer input is suspended until it is answered
    AwaitingInput(InputRequest),
}

/// Event-to-mutation state machine for one editor.
///
/// The controller mutates the graph it is handed but never snapshots it;
/// a returned [`Outcome::Committed`] tells the owner to do that.
#[derive(Debug, Clone)]
pub struct Controller {
    tool: Tool,
    selection: Selection,
    gesture: Gesture,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            tool: Tool::Select,
            selection: Selection::default(),
            gesture: Gesture::Idle,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn pending_request(&self) -> Option<&InputRequest> {
        match &self.gesture {
            Gesture::AwaitingInput(request) => Some(request),
            _ => None,
        }
    }

    /// Drop selection and any gesture, e.g. after the graph was replaced
    pub fn reset(&mut self) {
        self.selection.clear();
        self.gesture = Gesture::Idle;
    }

    /// Re-align transient state with a graph that changed underneath
    /// (undo/redo). Drags and prompts refer to the old graph, so they end.
    pub fn sync(&mut self, graph: &Graph) {
        self.selection.retain_existing(graph);
        self.gesture = Gesture::Idle;
    }

    pub fn handle(&mut self, event: InputEvent, graph: &mut Graph) -> Outcome {
        if let Gesture::AwaitingInput(_) = self.gesture {
            return match event {
                InputEvent::Key(KeyPress {
                    key: Key::Escape, ..
                }) => self.answer(None, graph),
                _ => Outcome::Ignored,
            };
        }

        match event {
            InputEvent::Click { at, shift } => self.click(at, shift, graph),
            InputEvent::PointerDown { at } => self.pointer_down(at, graph),
            InputEvent::PointerMove { at } => self.pointer_move(at, graph),
            InputEvent::PointerUp { at } => self.pointer_up(at, graph),
            InputEvent::SecondaryClick { at } => match geometry::hit_test(at, &graph.nodes) {
                Some(node) => self.request(InputRequest::ConnectTarget {
                    source: node.id.clone(),
                }),
                None => Outcome::Ignored,
            },
            InputEvent::DoubleClick { at } => self.double_click(at, graph),
            InputEvent::Key(press) => self.key(press, graph),
            InputEvent::SelectTool(tool) => self.set_tool(tool, graph),
        }
    }

    /// Answer the open prompt; `None` means the user cancelled
    pub fn answer(&mut self, answer: Option<String>, graph: &mut Graph) -> Outcome {
        let request = match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::AwaitingInput(request) => request,
            other => {
                self.gesture = other;
                return Outcome::Ignored;
            }
        };
        let Some(text) = answer else {
            debug!("prompt cancelled: {}", request.title());
            return Outcome::Redraw;
        };

        match request {
            InputRequest::Relabel { node, current } => {
                if text.trim() == current {
                    return Outcome::Redraw;
                }
                match graph.relabel_node(&node, &text) {
                    Ok(()) => Outcome::Committed("relabel node"),
                    Err(e) => {
                        debug!("relabel ignored: {e}");
                        Outcome::Redraw
                    }
                }
            }
            InputRequest::ConnectTarget { source } => {
                let Some(target) = graph.find_node(&text).map(|n| n.id.clone()) else {
                    debug!("connect ignored: no node '{}'", text.trim());
                    return Outcome::Redraw;
                };
                match graph.add_edge(&source, &target) {
                    Ok(edge) => {
                        self.selection = Selection::only_edge(edge.id);
                        Outcome::Committed("connect")
                    }
                    Err(e) => {
                        debug!("connect ignored: {e}");
                        Outcome::Redraw
                    }
                }
            }
            InputRequest::EdgeLabel { edge, current } => {
                if text.trim() == current {
                    return Outcome::Redraw;
                }
                match graph.relabel_edge(&edge, &text) {
                    Ok(()) => Outcome::Committed("label edge"),
                    Err(e) => {
                        debug!("edge label ignored: {e}");
                        Outcome::Redraw
                    }
                }
            }
        }
    }

    /// Escape: back to the select tool, abandoning any gesture
    pub fn cancel(&mut self, graph: &mut Graph) -> Outcome {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Dragging { node, origin, .. } => {
                // The node was never committed at its dragged position
                let _ = graph.move_node(&node, origin);
            }
            Gesture::AwaitingInput(request) => {
                self.gesture = Gesture::AwaitingInput(request);
                return self.answer(None, graph);
            }
            Gesture::Idle | Gesture::Connecting { .. } => {}
        }
        self.tool = Tool::Select;
        Outcome::Redraw
    }

    // ========================================================================
    // POINTER
    // ========================================================================

    fn request(&mut self, request: InputRequest) -> Outcome {
        debug!("requesting input: {}", request.title());
        self.gesture = Gesture::AwaitingInput(request.clone());
        Outcome::Prompt(request)
    }

    fn click(&mut self, at: Point, shift: bool, graph: &mut Graph) -> Outcome {
        if let Some(node) = geometry::hit_test(at, &graph.nodes) {
            let id = node.id.clone();
            if shift {
                if !self.selection.nodes.remove(&id) {
                    self.selection.nodes.insert(id);
                }
            } else {
                self.selection = Selection::only_node(id);
            }
            return Outcome::Redraw;
        }

        if let Tool::Place(kind) = self.tool {
            let position = geometry::placement_origin(kind, at);
            let node = graph.add_node(kind, position);
            debug!("placed {} '{}' at ({}, {})", kind, node.id, position.x, position.y);
            self.selection = Selection::only_node(node.id);
            return Outcome::Committed("place node");
        }

        if let Some(edge) = geometry::hit_edge(at, graph, EDGE_TOLERANCE) {
            let id = edge.id.clone();
            if shift {
                if !self.selection.edges.remove(&id) {
                    self.selection.edges.insert(id);
                }
            } else {
                self.selection = Selection::only_edge(id);
            }
            return Outcome::Redraw;
        }

        if self.selection.is_empty() || shift {
            Outcome::Ignored
        } else {
            self.selection.clear();
            Outcome::Redraw
        }
    }

    fn pointer_down(&mut self, at: Point, graph: &Graph) -> Outcome {
        if let Some(port) = geometry::hit_port(at, &graph.nodes, PORT_PICK_RADIUS) {
            let from = graph
                .node(&port.node)
                .and_then(|n| geometry::port_point(n, port.side))
                .unwrap_or(at);
            debug!("connect gesture from {} ({:?})", port.node, port.side);
            self.gesture = Gesture::Connecting {
                source: port.node,
                side: port.side,
                from,
                cursor: at,
            };
            return Outcome::Redraw;
        }

        if self.tool != Tool::Select {
            return Outcome::Ignored;
        }
        match geometry::hit_test(at, &graph.nodes) {
            Some(node) => {
                self.gesture = Gesture::Dragging {
                    node: node.id.clone(),
                    grab: (at.x - node.position.x, at.y - node.position.y),
                    origin: node.position,
                };
                Outcome::Redraw
            }
            None => Outcome::Ignored,
        }
    }

    fn pointer_move(&mut self, at: Point, graph: &mut Graph) -> Outcome {
        match &mut self.gesture {
            Gesture::Dragging { node, grab, .. } => {
                let position = Position::new(at.x - grab.0, at.y - grab.1);
                match graph.move_node(node, position) {
                    Ok(()) => Outcome::Redraw,
                    Err(e) => {
                        debug!("drag abandoned: {e}");
                        self.gesture = Gesture::Idle;
                        Outcome::Redraw
                    }
                }
            }
            Gesture::Connecting { cursor, .. } => {
                *cursor = at;
                Outcome::Redraw
            }
            Gesture::Idle | Gesture::AwaitingInput(_) => Outcome::Ignored,
        }
    }

    fn pointer_up(&mut self, at: Point, graph: &mut Graph) -> Outcome {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Dragging { node, grab, origin } => {
                let position = Position::new(at.x - grab.0, at.y - grab.1);
                if graph.move_node(&node, position).is_err() {
                    return Outcome::Redraw;
                }
                if position == origin {
                    Outcome::Redraw
                } else {
                    debug!("moved {node} to ({}, {})", position.x, position.y);
                    Outcome::Committed("move node")
                }
            }
            Gesture::Connecting { source, from, .. } => {
                if from.distance(at) < CONNECT_THRESHOLD {
                    return Outcome::Redraw;
                }
                let Some(target) = geometry::hit_test(at, &graph.nodes).map(|n| n.id.clone())
                else {
                    debug!("connect gesture released on empty canvas");
                    return Outcome::Redraw;
                };
                match graph.add_edge(&source, &target) {
                    Ok(edge) => {
                        debug!("connected {source} -> {target} ({})", edge.id);
                        Outcome::Committed("connect")
                    }
                    Err(e) => {
                        debug!("connect ignored: {e}");
                        Outcome::Redraw
                    }
                }
            }
            other => {
                self.gesture = other;
                Outcome::Ignored
            }
        }
    }

    fn double_click(&mut self, at: Point, graph: &Graph) -> Outcome {
        if let Some(node) = geometry::hit_test(at, &graph.nodes) {
            return self.request(InputRequest::Relabel {
                node: node.id.clone(),
                current: node.label().to_string(),
            });
        }
        if let Some(edge) = geometry::hit_edge(at, graph, EDGE_TOLERANCE) {
            return self.request(InputRequest::EdgeLabel {
                edge: edge.id.clone(),
                current: edge.label.clone().unwrap_or_default(),
            });
        }
        Outcome::Ignored
    }

    // ========================================================================
    // KEYBOARD
    // ========================================================================

    fn key(&mut self, press: KeyPress, graph: &mut Graph) -> Outcome {
        match press.key {
            Key::Escape => self.cancel(graph),
            Key::Delete | Key::Backspace => self.delete_selection(graph),
            Key::Char(c) if press.ctrl => match c.to_ascii_lowercase() {
                'z' if press.shift => Outcome::Redo,
                'z' => Outcome::Undo,
                's' => Outcome::SaveDraft,
                _ => Outcome::Ignored,
            },
            Key::Char(c) => match Tool::from_shortcut(c) {
                Some(tool) => self.set_tool(tool, graph),
                None => Outcome::Ignored,
            },
        }
    }

    fn set_tool(&mut self, tool: Tool, graph: &mut Graph) -> Outcome {
        if let Gesture::Dragging { node, origin, .. } = &self.gesture {
            let _ = graph.move_node(node, *origin);
        }
        self.gesture = Gesture::Idle;
        if self.tool == tool {
            return Outcome::Ignored;
        }
        debug!("tool: {} -> {}", self.tool, tool);
        self.tool = tool;
        Outcome::Redraw
    }

    fn delete_selection(&mut self, graph: &mut Graph) -> Outcome {
        if self.selection.is_empty() {
            return Outcome::Ignored;
        }
        let nodes: HashSet<NodeId> = self.selection.nodes.iter().cloned().collect();
        let edges: HashSet<EdgeId> = self.selection.edges.iter().cloned().collect();

        let removed = graph.remove_nodes(&nodes);
        let removed_edges = graph.remove_edges(&edges);
        self.selection.clear();

        if removed.is_empty() && removed_edges == 0 {
            return Outcome::Redraw;
        }
        debug!(
            "deleted {} nodes, {} edges",
            removed.nodes,
            removed.edges + removed_edges
        );
        Outcome::Committed("delete")
    }
}
