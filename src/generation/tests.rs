//! Unit tests for extraction, normalization and request tickets

use crate::document::{Document, Metadata};
use crate::generation::client::status_message;
use crate::generation::{
    check_prompt, code_file_name, code_instruction, code_prompt, extract_json, generate,
    generate_code, generated_metadata, interpret_generated, lenient_kind, parse_generated,
    strip_code_fence, GenerationError, GenerationResult, GraphGenerator, TicketBook,
};
use crate::graph::{Edge, EdgeId, Graph, Node, NodeId, NodeKind, Position};

struct Canned(&'static str);

impl GraphGenerator for Canned {
    fn generate_graph(&self, _prompt: &str) -> GenerationResult<String> {
        Ok(self.0.to_string())
    }
}

/// Replies with fixed code and records what it was asked
#[derive(Default)]
struct Coder {
    reply: &'static str,
    asked: std::sync::Mutex<Vec<(String, String)>>,
}

impl GraphGenerator for Coder {
    fn generate_graph(&self, _prompt: &str) -> GenerationResult<String> {
        Ok(String::new())
    }

    fn generate_code(&self, instruction: &str, prompt: &str) -> GenerationResult<String> {
        self.asked
            .lock()
            .unwrap()
            .push((instruction.to_string(), prompt.to_string()));
        Ok(self.reply.to_string())
    }
}

fn login_document() -> Document {
    let mut graph = Graph::new();
    graph.nodes = vec![
        Node::new(NodeId::new("s"), NodeKind::StartEnd, Position::new(0.0, 0.0), "Start"),
        Node::new(NodeId::new("c"), NodeKind::Decision, Position::new(0.0, 150.0), "Valid?"),
        Node::new(NodeId::new("p"), NodeKind::Process, Position::new(0.0, 300.0), "Log in"),
    ];
    graph.edges = vec![
        Edge::new(EdgeId::new("e1"), NodeId::new("s"), NodeId::new("c")),
        Edge::new(EdgeId::new("e2"), NodeId::new("c"), NodeId::new("p")),
    ];
    let metadata = Metadata {
        title: "Login Flow".into(),
        description: "Checks credentials".into(),
        ..Metadata::default()
    };
    Document::with_graph(graph, metadata)
}

#[test]
fn test_extract_fenced_json() {
    let text = "Here you go:\n```json\n{\"nodes\":[],\"edges\":[]}\n```";
    assert_eq!(extract_json(text), Some(r#"{"nodes":[],"edges":[]}"#));
}

#[test]
fn test_extract_untagged_fence() {
    let text = "```\n{\"a\": 1}\n```\ntrailing {junk}";
    assert_eq!(extract_json(text), Some(r#"{"a": 1}"#));
}

#[test]
fn test_extract_skips_non_object_fence() {
    let text = "```python\nprint('hi')\n```\nthen ```json\n{\"b\": 2}\n``` done";
    assert_eq!(extract_json(text), Some(r#"{"b": 2}"#));
}

#[test]
fn test_extract_outermost_braces() {
    let text = "Sure! {\"nodes\": [{\"id\": \"1\"}]} Hope that helps.";
    assert_eq!(extract_json(text), Some(r#"{"nodes": [{"id": "1"}]}"#));
    assert_eq!(extract_json("no json here"), None);
    assert_eq!(extract_json("} backwards {"), None);
}

#[test]
fn test_empty_graph_from_fenced_reply() {
    let graph = parse_generated("Here you go:\n```json\n{\"nodes\":[],\"edges\":[]}\n```").unwrap();
    assert!(graph.is_empty());
}

#[test]
fn test_parse_failure_is_generation_failed() {
    let err = parse_generated("I cannot draw that, sorry.").unwrap_err();
    assert!(matches!(err, GenerationError::Failed(_)));

    let err = parse_generated("{\"nodes\": [oops]}").unwrap_err();
    assert!(matches!(err, GenerationError::Failed(_)));
}

#[test]
fn test_normalization_fills_gaps() {
    let text = r#"{
        "nodes": [
            {"id": 1, "type": "start", "position": {"x": 10, "y": 20}, "data": {"label": "Begin"}},
            {"id": "2", "type": "Input/Output"},
            {"type": "mystery", "label": "  Loose label  "},
            {"id": "4", "type": "condition", "data": {"label": "   "}}
        ],
        "edges": [
            {"source": 1, "target": "2", "label": "go", "type": "smoothstep"},
            {"id": "e2", "source": "2", "target": "99"},
            {"id": "e3", "from": "2", "to": "4", "label": " "}
        ]
    }"#;
    let graph = parse_generated(text).unwrap();
    assert!(graph.validate().is_ok());

    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.nodes[0].id, NodeId::new("1"));
    assert_eq!(graph.nodes[0].kind, NodeKind::StartEnd);
    assert_eq!(graph.nodes[0].position, Position::new(10.0, 20.0));

    assert_eq!(graph.nodes[1].kind, NodeKind::InputOutput);
    assert_eq!(graph.nodes[1].label(), "Input/Output");
    assert_eq!(graph.nodes[1].position, Position::new(250.0, 50.0));

    assert_eq!(graph.nodes[2].kind, NodeKind::Process);
    assert_eq!(graph.nodes[2].label(), "Loose label");
    assert!(!graph.nodes[2].id.as_str().is_empty());

    assert_eq!(graph.nodes[3].kind, NodeKind::Decision);
    assert_eq!(graph.nodes[3].label(), "Decision?");

    assert_eq!(graph.edges.len(), 2);
    assert_eq!(graph.edges[0].label.as_deref(), Some("go"));
    assert_eq!(graph.edges[0].extra["type"], "smoothstep");
    assert_eq!(graph.edges[1].id.as_str(), "e3");
    assert_eq!(graph.edges[1].label, None);
}

#[test]
fn test_normalization_reports_adjustments() {
    let text = r#"{
        "nodes": [{"id": "a", "type": "hexagon"}, {"id": "b", "type": "process"}],
        "edges": [
            {"source": "a", "target": "b"},
            {"source": "a", "target": "ghost"},
            {"label": "nowhere"}
        ]
    }"#;
    let normalized = interpret_generated(text).unwrap();
    assert_eq!(normalized.graph.nodes[0].kind, NodeKind::Process);
    assert_eq!(normalized.graph.edges.len(), 1);
    assert_eq!(normalized.warnings.len(), 3);
    assert!(normalized.warnings[0].contains("hexagon"));
    assert!(normalized.warnings[1].contains("a -> ghost"));
}

#[test]
fn test_clean_generation_has_no_warnings() {
    let text = r#"{"nodes": [{"id": "a", "type": "startEnd"}], "edges": []}"#;
    assert!(interpret_generated(text).unwrap().warnings.is_empty());
}

#[test]
fn test_duplicate_generated_ids_fail() {
    let text = r#"{"nodes": [{"id": "a"}, {"id": "a"}]}"#;
    assert!(matches!(parse_generated(text), Err(GenerationError::Failed(_))));
}

#[test]
fn test_duplicate_edge_ids_are_replaced() {
    let text = r#"{"nodes": [{"id": "a"}, {"id": "b"}],
        "edges": [{"id": "e", "source": "a", "target": "b"},
                  {"id": "e", "source": "b", "target": "a"}]}"#;
    let graph = parse_generated(text).unwrap();
    assert_eq!(graph.edges.len(), 2);
    assert_ne!(graph.edges[0].id, graph.edges[1].id);
}

#[test]
fn test_lenient_kind_names() {
    assert_eq!(lenient_kind("startEnd"), Some(NodeKind::StartEnd));
    assert_eq!(lenient_kind("start_end"), Some(NodeKind::StartEnd));
    assert_eq!(lenient_kind("END"), Some(NodeKind::StartEnd));
    assert_eq!(lenient_kind("inputOutput"), Some(NodeKind::InputOutput));
    assert_eq!(lenient_kind("I/O"), Some(NodeKind::InputOutput));
    assert_eq!(lenient_kind("Decision"), Some(NodeKind::Decision));
    assert_eq!(lenient_kind("note"), Some(NodeKind::Text));
    assert_eq!(lenient_kind("hexagon"), None);
}

#[test]
fn test_prompt_must_not_be_blank() {
    assert!(matches!(check_prompt("  \n"), Err(GenerationError::EmptyPrompt)));
    assert_eq!(check_prompt("  user login  ").unwrap(), "user login");
}

#[test]
fn test_generate_runs_the_pipeline() {
    let generator = Canned("```json\n{\"nodes\": [{\"id\": \"s\", \"type\": \"startEnd\"}]}\n```");
    let graph = generate(&generator, "a start").unwrap();
    assert_eq!(graph.nodes.len(), 1);

    assert!(matches!(generate(&generator, ""), Err(GenerationError::EmptyPrompt)));
}

#[test]
fn test_generated_metadata() {
    let base = Metadata {
        version: 7,
        ..Metadata::default()
    };
    let meta = generated_metadata("user signs up and verifies email address", &base);
    assert_eq!(meta.title, "user signs up and Flow");
    assert_eq!(
        meta.description,
        "AI-generated flowchart based on: user signs up and verifies email address"
    );
    assert_eq!(meta.version, 7);
    assert!(meta.last_modified >= base.last_modified);
}

#[test]
fn test_latest_ticket_wins() {
    let mut book = TicketBook::default();
    let first = book.issue();
    let second = book.issue();
    assert!(book.pending());
    assert!(!book.is_current(first));

    assert!(!book.resolve(first));
    assert!(book.pending());
    assert!(book.resolve(second));
    assert!(!book.pending());
    assert!(!book.resolve(second));
}

#[test]
fn test_cancelled_ticket_is_stale() {
    let mut book = TicketBook::default();
    let ticket = book.issue();
    book.cancel();
    assert!(!book.resolve(ticket));
}

#[test]
fn test_status_messages() {
    assert!(status_message(401, "").contains("API key"));
    assert!(status_message(429, "").contains("rate limit"));
    assert!(status_message(403, "").contains("forbidden"));
    assert_eq!(
        status_message(500, r#"{"error": {"message": "upstream down"}}"#),
        "Generator API error: 500 - upstream down"
    );
    assert_eq!(status_message(502, "bad gateway"), "Generator API error: 502 - bad gateway");
    assert_eq!(status_message(503, ""), "Generator API error: 503");
}

// ============================================================================
// CODE FROM FLOWCHART
// ============================================================================

#[test]
fn test_code_prompt_lists_nodes_and_connections() {
    let prompt = code_prompt(&login_document());
    assert_eq!(
        prompt,
        "Generate code based on this flowchart:\n\
         Title: Login Flow\n\
         Description: Checks credentials\n\n\
         Nodes:\n\
         - Start (startEnd)\n\
         - Valid? (decision)\n\
         - Log in (process)\n\n\
         Connections:\n\
         - From Start to Valid?\n\
         - From Valid? to Log in\n\n\
         Please generate appropriate code that implements this flowchart logic."
    );
}

#[test]
fn test_code_instruction_names_language() {
    let with = code_instruction("javascript", Some("node.js"));
    assert!(with.contains("- Programming Language: javascript\n- Framework/Library: node.js\n"));
    assert!(with.ends_with("Respond with ONLY the code, no explanations or markdown formatting."));

    let without = code_instruction("rust", None);
    assert!(without.contains("- Programming Language: rust\n- Write complete"));
    assert!(!without.contains("Framework"));
}

#[test]
fn test_code_file_name() {
    assert_eq!(code_file_name(&login_document()), "Login_Flow_generated.js");
}

#[test]
fn test_strip_code_fence() {
    assert_eq!(strip_code_fence("```javascript\nconsole.log(1);\n```\n"), "console.log(1);");
    assert_eq!(strip_code_fence("  let x = 1;\n"), "let x = 1;");
    assert_eq!(strip_code_fence("```\nno closing fence\n"), "no closing fence");
}

#[test]
fn test_generate_code_sends_prompt() {
    let coder = Coder {
        reply: "```js\nfunction login() {}\n```",
        ..Coder::default()
    };
    let code = generate_code(&coder, &login_document()).unwrap();
    assert_eq!(code, "function login() {}");

    let asked = coder.asked.lock().unwrap();
    assert_eq!(asked.len(), 1);
    assert!(asked[0].0.contains("node.js"));
    assert!(asked[0].1.starts_with("Generate code based on this flowchart:"));
}

#[test]
fn test_generate_code_needs_nodes_and_output() {
    let coder = Coder::default();
    assert!(matches!(
        generate_code(&coder, &Document::with_graph(Graph::new(), Metadata::default())),
        Err(GenerationError::Code(_))
    ));
    assert!(matches!(
        generate_code(&coder, &login_document()),
        Err(GenerationError::Code(_))
    ));
    assert!(matches!(
        generate_code(&Canned("{}"), &login_document()),
        Err(GenerationError::Code(_))
    ));
}
