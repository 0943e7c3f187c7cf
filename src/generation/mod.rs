//! Generation Adapter
//!
//! Turns a natural-language prompt into a graph by way of an external text
//! generator. The generator is a black box returning free text; this module
//! finds the JSON object in that text, parses it leniently and normalizes it
//! into a graph that satisfies every structural invariant before anything
//! touches the editor.

use chrono::Utc;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::document::{export_file_name, Document, Metadata};
use crate::graph::{Edge, EdgeId, Graph, Node, NodeData, NodeId, NodeKind, Position};

mod client;
#[cfg(test)]
mod tests;

pub use client::OpenRouterClient;

/// Spacing of the fallback grid used for nodes without a position
pub const FALLBACK_SPACING: f64 = 150.0;
const FALLBACK_COLUMNS: usize = 4;

/// Instruction sent ahead of the user's prompt
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert at creating flowcharts and process diagrams. Based on the user's description, generate a flowchart structure.

Return a JSON object with "nodes" and "edges" arrays that represent a flowchart. Use this format:

{
  "nodes": [
    {
      "id": "unique_id",
      "type": "startEnd" | "process" | "decision" | "inputOutput",
      "position": { "x": number, "y": number },
      "data": { "label": "Node text" }
    }
  ],
  "edges": [
    {
      "id": "unique_id",
      "source": "source_node_id",
      "target": "target_node_id",
      "label": "optional_label"
    }
  ]
}

Node types:
- startEnd: For start/end points (circular)
- process: For process steps (rectangular)
- decision: For decision points (diamond)
- inputOutput: For input/output operations (parallelogram)

Position nodes logically with proper spacing (100-200px apart).
Respond with ONLY the JSON, no explanations."#;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Please enter a description for your flowchart")]
    EmptyPrompt,
    #[error("Failed to generate flowchart: {0}")]
    Failed(String),
    #[error("Failed to generate code from flowchart: {0}")]
    Code(String),
    #[error("A newer generation request replaced this one")]
    Superseded,
    #[error("Generator API key is not configured. Set FLOWDRAFT_API_KEY or OPENROUTER_API_KEY.")]
    NotConfigured,
    #[error("Generator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// External text generator
pub trait GraphGenerator: Send + Sync {
    /// Return free text that should contain a `{nodes, edges}` JSON object
    fn generate_graph(&self, prompt: &str) -> GenerationResult<String>;

    /// Return source code written from `prompt` under `instruction`
    fn generate_code(&self, instruction: &str, prompt: &str) -> GenerationResult<String> {
        let _ = (instruction, prompt);
        Err(GenerationError::Code("this generator cannot write code".into()))
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// The JSON object candidate inside generator output.
///
/// Prefers the first fenced code block (optionally tagged `json`) whose body
/// is an object; otherwise the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    fenced_object(text).or_else(|| outermost_object(text))
}

fn fenced_object(text: &str) -> Option<&str> {
    const FENCE: &str = "```";
    for (open, _) in text.match_indices(FENCE) {
        let after = &text[open + FENCE.len()..];
        let body = after.strip_prefix("json").unwrap_or(after).trim_start();
        if !body.starts_with('{') {
            continue;
        }
        for (close, _) in body.match_indices(FENCE) {
            let candidate = body[..close].trim_end();
            if candidate.ends_with('}') {
                return Some(candidate);
            }
        }
    }
    None
}

fn outermost_object(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}

// ============================================================================
// LENIENT WIRE TYPES
// ============================================================================

/// Generator output as parsed, before normalization
#[derive(Debug, Default, Deserialize)]
pub struct GeneratedGraph {
    #[serde(default)]
    pub nodes: Vec<GeneratedNode>,
    #[serde(default)]
    pub edges: Vec<GeneratedEdge>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedNode {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub position: Option<GeneratedPosition>,
    #[serde(default)]
    pub data: Option<GeneratedData>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeneratedPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedData {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedEdge {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, alias = "from")]
    pub source: Value,
    #[serde(default, alias = "to")]
    pub target: Value,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ids may come back as strings or numbers
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map a loosely spelled kind name to a node kind
pub fn lenient_kind(name: &str) -> Option<NodeKind> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let kind = match key.as_str() {
        "startend" | "start" | "end" | "terminal" | "terminator" | "input" | "output" => {
            NodeKind::StartEnd
        }
        "process" | "default" | "step" | "action" | "task" | "rectangle" => NodeKind::Process,
        "decision" | "condition" | "branch" | "choice" | "diamond" => NodeKind::Decision,
        "inputoutput" | "io" | "data" | "parallelogram" => NodeKind::InputOutput,
        "text" | "note" | "comment" | "annotation" => NodeKind::Text,
        _ => return None,
    };
    Some(kind)
}

fn fallback_position(index: usize) -> Position {
    let col = (index % FALLBACK_COLUMNS) as f64;
    let row = (index / FALLBACK_COLUMNS) as f64;
    Position::new(100.0 + col * FALLBACK_SPACING, 50.0 + row * FALLBACK_SPACING)
}

/// A normalized generated graph plus what had to be changed to get it
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub graph: Graph,
    /// User-facing descriptions of retyped nodes and dropped edges
    pub warnings: Vec<String>,
}

impl GeneratedGraph {
    /// Produce a graph that satisfies every structural invariant.
    ///
    /// Missing ids, kinds, labels and positions are filled in; edges naming
    /// unknown nodes are dropped. Duplicate node ids are ambiguous and fail.
    pub fn normalize(self) -> GenerationResult<Normalized> {
        let mut graph = Graph::new();
        let mut seen = HashSet::new();
        let mut warnings = Vec::new();

        for (index, raw) in self.nodes.into_iter().enumerate() {
            let id = match raw.id.as_ref().and_then(id_text) {
                Some(id) => NodeId::new(id),
                None => graph.fresh_node_id(),
            };
            if !seen.insert(id.clone()) {
                return Err(GenerationError::Failed(format!("duplicate node id '{id}'")));
            }

            let kind = match raw.kind.as_deref() {
                Some(name) => lenient_kind(name).unwrap_or_else(|| {
                    warn!("unknown node type '{name}' for '{id}', using process");
                    warnings.push(format!("node '{id}' had unknown type '{name}'"));
                    NodeKind::Process
                }),
                None => NodeKind::Process,
            };

            let (label, extra) = match raw.data {
                Some(data) => (data.label, data.extra),
                None => (None, Map::new()),
            };
            let label = label
                .or(raw.label)
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| kind.default_label().to_string());

            let position = raw
                .position
                .filter(|p| p.x.is_finite() && p.y.is_finite())
                .map(|p| Position::new(p.x, p.y))
                .unwrap_or_else(|| fallback_position(index));

            graph.nodes.push(Node {
                id,
                kind,
                position,
                data: NodeData { label, extra },
                extra: Map::new(),
            });
        }

        let mut edge_ids = HashSet::new();
        for raw in self.edges {
            let (Some(source), Some(target)) = (id_text(&raw.source), id_text(&raw.target)) else {
                warn!("dropping generated edge with unusable endpoints");
                warnings.push("dropped an edge without endpoints".to_string());
                continue;
            };
            let (source, target) = (NodeId::new(source), NodeId::new(target));
            if !seen.contains(&source) || !seen.contains(&target) {
                warn!("dropping generated edge {source} -> {target}: unknown node");
                warnings.push(format!("dropped edge {source} -> {target}"));
                continue;
            }

            let id = raw
                .id
                .as_ref()
                .and_then(id_text)
                .map(EdgeId::new)
                .filter(|id| !edge_ids.contains(id))
                .unwrap_or_else(|| graph.fresh_edge_id());
            edge_ids.insert(id.clone());

            graph.edges.push(Edge {
                id,
                source,
                target,
                label: raw
                    .label
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty()),
                extra: raw.extra,
            });
        }

        debug!(
            "normalized generated graph: {} nodes, {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(Normalized { graph, warnings })
    }
}

/// Extract, parse and normalize raw generator output, keeping the warnings
pub fn interpret_generated(text: &str) -> GenerationResult<Normalized> {
    let json = extract_json(text)
        .ok_or_else(|| GenerationError::Failed("no JSON object in the response".into()))?;
    let raw: GeneratedGraph = serde_json::from_str(json)
        .map_err(|e| GenerationError::Failed(format!("invalid flowchart data generated ({e})")))?;
    raw.normalize()
}

/// Extract, parse and normalize raw generator output
pub fn parse_generated(text: &str) -> GenerationResult<Graph> {
    interpret_generated(text).map(|normalized| normalized.graph)
}

/// Trimmed prompt, or `EmptyPrompt`
pub fn check_prompt(prompt: &str) -> GenerationResult<&str> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        Err(GenerationError::EmptyPrompt)
    } else {
        Ok(prompt)
    }
}

/// Metadata for a freshly generated document.
///
/// Title is the prompt's first four words plus " Flow"; the version and
/// draft flag carry over from `base`.
pub fn generated_metadata(prompt: &str, base: &Metadata) -> Metadata {
    let words: Vec<&str> = prompt.split_whitespace().take(4).collect();
    Metadata {
        title: format!("{} Flow", words.join(" ")),
        description: format!("AI-generated flowchart based on: {}", prompt.trim()),
        last_modified: Utc::now(),
        ..base.clone()
    }
}

/// Blocking one-shot generation
pub fn generate(generator: &dyn GraphGenerator, prompt: &str) -> GenerationResult<Graph> {
    let prompt = check_prompt(prompt)?;
    let text = generator.generate_graph(prompt)?;
    parse_generated(&text)
}

// ============================================================================
// CODE FROM FLOWCHART
// ============================================================================

pub const CODE_LANGUAGE: &str = "javascript";
pub const CODE_FRAMEWORK: &str = "node.js";

/// Instruction sent ahead of a code request
pub fn code_instruction(language: &str, framework: Option<&str>) -> String {
    let framework = framework
        .map(|f| format!("- Framework/Library: {f}\n"))
        .unwrap_or_default();
    format!(
        "You are an expert software engineer and code generator. \
         Generate clean, production-ready code based on the user's requirements.\n\n\
         Requirements:\n\
         - Programming Language: {language}\n\
         {framework}\
         - Write complete, functional code\n\
         - Include proper error handling\n\
         - Add helpful comments\n\
         - Follow best practices and conventions\n\
         - Make the code production-ready\n\n\
         Respond with ONLY the code, no explanations or markdown formatting."
    )
}

/// Describe a document for the code generator.
///
/// Lists the title, the description, every node as `label (type)` and every
/// edge by the labels of its endpoints.
pub fn code_prompt(doc: &Document) -> String {
    let graph = &doc.graph;
    let label_of = |id: &NodeId| {
        graph
            .node(id)
            .map(|n| n.label().to_string())
            .unwrap_or_else(|| id.to_string())
    };

    let nodes = graph
        .nodes
        .iter()
        .map(|n| format!("- {} ({})", n.label(), n.kind.wire_name()))
        .collect::<Vec<_>>()
        .join("\n");
    let connections = graph
        .edges
        .iter()
        .map(|e| format!("- From {} to {}", label_of(&e.source), label_of(&e.target)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate code based on this flowchart:\n\
         Title: {}\n\
         Description: {}\n\n\
         Nodes:\n{nodes}\n\n\
         Connections:\n{connections}\n\n\
         Please generate appropriate code that implements this flowchart logic.",
        doc.metadata.title, doc.metadata.description
    )
}

/// Where generated code for `doc` is saved by default
pub fn code_file_name(doc: &Document) -> String {
    export_file_name(&format!("{} generated", doc.metadata.title), "js")
}

/// Drop a surrounding markdown fence the generator added anyway
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body_start) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[body_start + 1..];
    body.trim_end().strip_suffix("```").unwrap_or(body).trim_end()
}

/// Ask `generator` for JavaScript implementing `doc`
pub fn generate_code(generator: &dyn GraphGenerator, doc: &Document) -> GenerationResult<String> {
    if doc.graph.nodes.is_empty() {
        return Err(GenerationError::Code("the flowchart has no nodes".into()));
    }
    let instruction = code_instruction(CODE_LANGUAGE, Some(CODE_FRAMEWORK));
    let text = generator.generate_code(&instruction, &code_prompt(doc))?;
    let code = strip_code_fence(&text);
    if code.is_empty() {
        return Err(GenerationError::Code("no code generated".into()));
    }
    debug!("generated {} characters of {CODE_LANGUAGE}", code.len());
    Ok(code.to_string())
}

// ============================================================================
// REQUEST TICKETS
// ============================================================================

/// Identifies one generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationTicket(u64);

impl GenerationTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Issues tickets and tracks which one may still apply its result.
///
/// Only the newest outstanding ticket is current; anything older resolves
/// as stale.
#[derive(Debug, Default, Clone)]
pub struct TicketBook {
    issued: u64,
    outstanding: Option<GenerationTicket>,
}

impl TicketBook {
    pub fn issue(&mut self) -> GenerationTicket {
        self.issued += 1;
        let ticket = GenerationTicket(self.issued);
        self.outstanding = Some(ticket);
        ticket
    }

    pub fn is_current(&self, ticket: GenerationTicket) -> bool {
        self.outstanding == Some(ticket)
    }

    /// Close `ticket`; true if it was the current one
    pub fn resolve(&mut self, ticket: GenerationTicket) -> bool {
        if self.is_current(ticket) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }

    /// Invalidate whatever is outstanding
    pub fn cancel(&mut self) {
        self.outstanding = None;
    }

    pub fn pending(&self) -> bool {
        self.outstanding.is_some()
    }
}
