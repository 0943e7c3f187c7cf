//! Flowdraft - Flowchart Editor Core
//! Graph model, direct-manipulation editing, undo history, JSON exchange and
//! AI-assisted generation for node/edge flowcharts

pub mod config;
pub mod document;
pub mod editor;
pub mod export;
pub mod generation;
pub mod geometry;
pub mod graph;
pub mod history;
pub mod store;

pub use config::Config;
pub use document::{Document, ImportError, Metadata};
pub use editor::{EditorSession, InputEvent, InputRequest, Notice, NoticeLevel, Outcome, Tool};
pub use generation::{GenerationError, GraphGenerator, OpenRouterClient};
pub use graph::{Edge, EdgeId, Graph, GraphError, Node, NodeId, NodeKind, Position};
pub use history::History;
pub use store::{DocumentStore, FileStore, StoreError, Visibility};
