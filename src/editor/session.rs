//! Editor session: the context object behind one open editor

use log::{debug, info, warn};
use std::path::Path;

use super::{Controller, InputEvent, Notice, Outcome};
use crate::document::{self, Document, ImportResult, ImportedDocument, Metadata};
use crate::generation::{
    self, GenerationError, GenerationResult, GenerationTicket, GraphGenerator, Normalized,
    TicketBook,
};
use crate::graph::{Graph, Selection};
use crate::history::History;
use crate::store::{DocumentStore, StoreResult, StoredDocument, Visibility};

/// Everything one editor needs: the document, its undo history, the
/// interaction controller, outstanding generation requests and notices.
///
/// Create one when an editor opens and drop it when the editor closes.
/// Errors from collaborators are turned into [`Notice`]s here and never
/// roll back the graph.
#[derive(Debug)]
pub struct EditorSession {
    document: Document,
    history: History,
    controller: Controller,
    notices: Vec<Notice>,
    tickets: TicketBook,
    pending_prompt: String,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// A session on a fresh document with a single start node
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(document: Document) -> Self {
        let history = History::new(&document.graph);
        Self {
            document,
            history,
            controller: Controller::new(),
            notices: Vec::new(),
            tickets: TicketBook::default(),
            pending_prompt: String::new(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn graph(&self) -> &Graph {
        &self.document.graph
    }

    pub fn metadata(&self) -> &Metadata {
        &self.document.metadata
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn selection(&self) -> &Selection {
        self.controller.selection()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ========================================================================
    // NOTICES
    // ========================================================================

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Hand pending notices to the host
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    fn commit(&mut self, what: &str) {
        self.document.touch();
        self.history.commit(&self.document.graph);
        debug!("committed: {what}");
    }

    fn apply(&mut self, outcome: Outcome) -> Outcome {
        match outcome {
            Outcome::Committed(what) => self.commit(what),
            Outcome::Undo => {
                self.undo();
            }
            Outcome::Redo => {
                self.redo();
            }
            _ => {}
        }
        outcome
    }

    /// Feed one input event through the controller and apply the result
    pub fn handle(&mut self, event: InputEvent) -> Outcome {
        let outcome = self.controller.handle(event, &mut self.document.graph);
        self.apply(outcome)
    }

    /// Answer the controller's open prompt
    pub fn answer_prompt(&mut self, answer: Option<String>) -> Outcome {
        let outcome = self.controller.answer(answer, &mut self.document.graph);
        self.apply(outcome)
    }

    pub fn undo(&mut self) -> bool {
        let Some(graph) = self.history.undo() else {
            return false;
        };
        self.document.graph = graph.clone();
        self.controller.sync(&self.document.graph);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(graph) = self.history.redo() else {
            return false;
        };
        self.document.graph = graph.clone();
        self.controller.sync(&self.document.graph);
        true
    }

    pub fn set_title(&mut self, title: &str) {
        self.document.metadata.title = title.to_string();
        self.document.touch();
    }

    pub fn set_description(&mut self, description: &str) {
        self.document.metadata.description = description.to_string();
        self.document.touch();
    }

    /// Replace the whole document and record one snapshot
    fn replace(&mut self, document: Document) {
        self.document = document;
        self.controller.reset();
        self.history.commit(&self.document.graph);
    }

    /// Discard everything and start over with a fresh document
    pub fn reset(&mut self) {
        self.document = Document::new();
        self.controller.reset();
        self.history.reset(&self.document.graph);
        self.tickets.cancel();
    }

    // ========================================================================
    // EXCHANGE
    // ========================================================================

    fn apply_import(&mut self, imported: ImportedDocument) {
        let document = imported.into_document(&self.document.metadata);
        info!(
            "imported '{}' ({} nodes, {} edges)",
            document.metadata.title,
            document.graph.nodes.len(),
            document.graph.edges.len()
        );
        self.replace(document);
        self.notify(Notice::success("Flowchart imported successfully!"));
    }

    /// Import exchange JSON. On failure the current graph is untouched.
    pub fn import_json(&mut self, json: &str) -> ImportResult<()> {
        match document::parse_import(json) {
            Ok(imported) => {
                self.apply_import(imported);
                Ok(())
            }
            Err(e) => {
                warn!("import rejected: {e}");
                self.notify(Notice::error(format!("Invalid flowchart file: {e}")));
                Err(e)
            }
        }
    }

    pub fn import_file(&mut self, path: &Path) -> ImportResult<()> {
        match document::read_import(path) {
            Ok(imported) => {
                self.apply_import(imported);
                Ok(())
            }
            Err(e) => {
                warn!("import rejected: {e}");
                self.notify(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        self.document.to_json()
    }

    /// Open a saved flowchart; same contract as import
    pub fn load_stored(&mut self, record: &StoredDocument) -> ImportResult<()> {
        match record.import() {
            Ok(imported) => {
                let document = imported.into_document(&record.fallback_metadata());
                info!("loaded '{}' ({})", record.title, record.id);
                self.replace(document);
                self.notify(Notice::success("Flowchart loaded successfully!"));
                Ok(())
            }
            Err(e) => {
                warn!("stored flowchart {} rejected: {e}", record.id);
                self.notify(Notice::error("Failed to load flowchart"));
                Err(e)
            }
        }
    }

    /// Save through `store`. The canvas is never rolled back on failure.
    pub fn save(
        &mut self,
        store: &dyn DocumentStore,
        visibility: Visibility,
    ) -> StoreResult<StoredDocument> {
        match store.save(&self.document, visibility) {
            Ok(record) => {
                self.document.metadata.is_draft = visibility.is_draft();
                self.document.metadata.last_modified = record.updated_at;
                self.notify(Notice::success(format!(
                    "Flowchart saved as {}!",
                    visibility.noun()
                )));
                Ok(record)
            }
            Err(e) => {
                warn!("save failed: {e}");
                self.notify(Notice::error(format!("Failed to save flowchart: {e}")));
                Err(e)
            }
        }
    }

    // ========================================================================
    // GENERATION
    // ========================================================================

    pub fn generation_pending(&self) -> bool {
        self.tickets.pending()
    }

    /// Validate `prompt` and open a request for it.
    ///
    /// Any earlier outstanding request becomes stale. The returned prompt is
    /// trimmed and is what should be sent to the generator.
    pub fn begin_generation(
        &mut self,
        prompt: &str,
    ) -> GenerationResult<(GenerationTicket, String)> {
        let prompt = match generation::check_prompt(prompt) {
            Ok(prompt) => prompt.to_string(),
            Err(e) => {
                self.notify(Notice::error(e.to_string()));
                return Err(e);
            }
        };
        let ticket = self.tickets.issue();
        self.pending_prompt = prompt.clone();
        debug!("generation request #{} issued", ticket.value());
        Ok((ticket, prompt))
    }

    /// Apply the generator's reply for `ticket`.
    ///
    /// Stale tickets are discarded with `Superseded` and leave everything
    /// untouched, as do failures.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        reply: GenerationResult<String>,
    ) -> GenerationResult<()> {
        if !self.tickets.resolve(ticket) {
            debug!("generation request #{} superseded", ticket.value());
            return Err(GenerationError::Superseded);
        }

        let Normalized { graph, warnings } =
            match reply.and_then(|text| generation::interpret_generated(&text)) {
                Ok(normalized) => normalized,
                Err(e) => {
                    warn!("generation failed: {e}");
                    self.notify(Notice::error(e.to_string()));
                    return Err(e);
                }
            };

        let prompt = std::mem::take(&mut self.pending_prompt);
        let metadata = generation::generated_metadata(&prompt, &self.document.metadata);
        info!(
            "generated '{}' ({} nodes, {} edges)",
            metadata.title,
            graph.nodes.len(),
            graph.edges.len()
        );
        let extra = std::mem::take(&mut self.document.extra);
        self.replace(Document {
            graph,
            metadata,
            extra,
        });
        self.notify(Notice::success("Flowchart generated successfully!"));
        if !warnings.is_empty() {
            self.notify(Notice::warning(format!(
                "Generated flowchart was adjusted: {}",
                warnings.join("; ")
            )));
        }
        Ok(())
    }

    /// Drop the outstanding request, if any
    pub fn cancel_generation(&mut self) {
        if self.tickets.pending() {
            self.notify(Notice::info("Generation cancelled"));
        }
        self.tickets.cancel();
        self.pending_prompt.clear();
    }

    /// Blocking request/apply round trip against `generator`
    pub fn generate_with(
        &mut self,
        generator: &dyn GraphGenerator,
        prompt: &str,
    ) -> GenerationResult<()> {
        let (ticket, prompt) = self.begin_generation(prompt)?;
        let reply = generator.generate_graph(&prompt);
        self.finish_generation(ticket, reply)
    }
}
