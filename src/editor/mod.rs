//! Editor
//!
//! The interaction layer between a host surface (the egui app, a test) and
//! the graph:
//! - [`Controller`] turns pointer and keyboard events into graph mutations
//! - [`EditorSession`] owns one document with its history and controller,
//!   applies commits, and collects user-visible notices
//!
//! Hosts feed [`InputEvent`]s in canvas coordinates and react to the returned
//! [`Outcome`]. Text prompts are never shown by the editor itself: it hands
//! back an [`InputRequest`] and waits for the host to answer it.

use std::fmt;

use crate::geometry::Point;
use crate::graph::{EdgeId, NodeId, NodeKind};

mod controller;
mod session;
#[cfg(test)]
mod tests;

pub use controller::{Controller, Gesture};
pub use session::EditorSession;

/// Edge hit tolerance in canvas units
pub const EDGE_TOLERANCE: f64 = 6.0;
/// Pointer distance within which a port handle is picked
pub const PORT_PICK_RADIUS: f64 = 8.0;
/// Minimum pointer travel before a connect gesture can complete
pub const CONNECT_THRESHOLD: f64 = 4.0;

// ============================================================================
// TOOLS
// ============================================================================

/// Active palette tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Select,
    Place(NodeKind),
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Select,
        Tool::Place(NodeKind::StartEnd),
        Tool::Place(NodeKind::Process),
        Tool::Place(NodeKind::Decision),
        Tool::Place(NodeKind::InputOutput),
        Tool::Place(NodeKind::Text),
    ];

    pub fn shortcut(self) -> char {
        match self {
            Tool::Select => 'V',
            Tool::Place(kind) => kind.shortcut(),
        }
    }

    pub fn from_shortcut(c: char) -> Option<Self> {
        if c.eq_ignore_ascii_case(&'v') {
            return Some(Tool::Select);
        }
        NodeKind::from_shortcut(c).map(Tool::Place)
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Place(kind) => kind.display_name(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Select => f.write_str("select"),
            Tool::Place(kind) => write!(f, "place:{kind}"),
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Char(char),
}

/// A key press; `ctrl` covers Cmd on macOS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            key: Key::Char(c),
            ctrl: true,
            shift: false,
        }
    }

    pub fn ctrl_shift(c: char) -> Self {
        Self {
            key: Key::Char(c),
            ctrl: true,
            shift: true,
        }
    }
}

/// Host input, in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Press and release without a drag
    Click { at: Point, shift: bool },
    PointerDown { at: Point },
    PointerMove { at: Point },
    PointerUp { at: Point },
    SecondaryClick { at: Point },
    DoubleClick { at: Point },
    Key(KeyPress),
    /// Palette selection
    SelectTool(Tool),
}

/// Text the editor needs from the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRequest {
    /// New label for a node, pre-filled with the current one
    Relabel { node: NodeId, current: String },
    /// Id of the node to connect `source` to
    ConnectTarget { source: NodeId },
    /// Label for an edge; blank clears it
    EdgeLabel { edge: EdgeId, current: String },
}

impl InputRequest {
    pub fn title(&self) -> &'static str {
        match self {
            InputRequest::Relabel { .. } => "Edit label",
            InputRequest::ConnectTarget { .. } => "Connect to node",
            InputRequest::EdgeLabel { .. } => "Edge label",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            InputRequest::Relabel { .. } => "Enter new label:".to_string(),
            InputRequest::ConnectTarget { source } => {
                format!("Enter target node ID to connect from '{source}':")
            }
            InputRequest::EdgeLabel { .. } => "Enter edge label (blank to clear):".to_string(),
        }
    }

    /// Text to pre-fill the prompt with
    pub fn initial_text(&self) -> &str {
        match self {
            InputRequest::Relabel { current, .. } | InputRequest::EdgeLabel { current, .. } => {
                current
            }
            InputRequest::ConnectTarget { .. } => "",
        }
    }
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed
    Ignored,
    /// Transient state changed (selection, tool, a gesture in progress)
    Redraw,
    /// The graph changed and one history snapshot was (or must be) taken
    Committed(&'static str),
    Undo,
    Redo,
    /// Save-as-draft shortcut; handled by the host through a store
    SaveDraft,
    /// The host must collect text and answer the request
    Prompt(InputRequest),
}

impl Outcome {
    pub fn is_commit(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }
}

// ============================================================================
// NOTICES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-visible message (rendered as a toast by the host)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }
}
