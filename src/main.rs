//! Flowdraft GUI - Flowchart Editor
//! Interactive canvas for drawing, editing and generating flowcharts

use eframe::egui;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flowdraft::config::Config;
use flowdraft::document::Document;
use flowdraft::editor::{
    Gesture, InputEvent, InputRequest, Key, KeyPress, Notice, NoticeLevel, Outcome, Tool,
};
use flowdraft::export;
use flowdraft::generation::{
    self, GenerationError, GenerationResult, GenerationTicket, GraphGenerator, OpenRouterClient,
};
use flowdraft::geometry::{self, DrawCommand, Outline, Point};
use flowdraft::graph::NodeKind;
use flowdraft::store::{DocumentFilter, DocumentStore, FileStore, StoredDocument, Visibility};
use flowdraft::EditorSession;

/// How many saved flowcharts the sidebar lists
const RECENT_LIMIT: usize = 4;
/// How long a toast stays on screen
const TOAST_TTL: Duration = Duration::from_secs(4);

fn flowdraft_icon() -> egui::IconData {
    // 64x64: slate background with a blue diamond outline and a small start dot.
    let w: u32 = 64;
    let h: u32 = 64;
    let mut rgba = vec![0u8; (w * h * 4) as usize];
    let c = (w as f32 - 1.0) * 0.5;

    for y in 0..h {
        for x in 0..w {
            let dx = (x as f32 - c).abs();
            let dy = (y as f32 - c).abs();
            // Manhattan distance gives the diamond.
            let m = dx + dy;
            let dot = ((x as f32 - c).powi(2) + (y as f32 - 10.0).powi(2)).sqrt();

            let (r, g, b) = if (22.0..=27.0).contains(&m) {
                (59, 130, 246)
            } else if dot <= 4.0 {
                (34, 197, 94)
            } else if m < 22.0 {
                (30, 41, 59)
            } else {
                (15, 23, 42)
            };

            let idx = ((y * w + x) * 4) as usize;
            rgba[idx] = r;
            rgba[idx + 1] = g;
            rgba[idx + 2] = b;
            rgba[idx + 3] = 255;
        }
    }

    egui::IconData {
        rgba,
        width: w,
        height: h,
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("Flowdraft - Flowchart Editor")
            .with_icon(flowdraft_icon()),
        ..Default::default()
    };

    eframe::run_native(
        "Flowdraft",
        options,
        Box::new(|cc| Ok(Box::new(FlowdraftApp::new(cc)))),
    )
}

/// A generator request running on a worker thread
struct PendingGeneration {
    ticket: GenerationTicket,
    reply: Receiver<GenerationResult<String>>,
}

/// Code being written for a snapshot of the document
struct PendingCode {
    file_name: String,
    reply: Receiver<GenerationResult<String>>,
}

struct Toast {
    notice: Notice,
    shown_at: Instant,
}

struct FlowdraftApp {
    /// The open document with its history and interaction state
    session: EditorSession,
    config: Config,
    /// Local persistence; `None` when the store directory is unusable
    store: Option<FileStore>,
    /// `None` until an API key is configured
    generator: Option<Arc<dyn GraphGenerator>>,
    /// Requests in flight; only the newest ticket is applied
    generations: Vec<PendingGeneration>,
    code: Option<PendingCode>,
    /// AI prompt input
    ai_prompt: String,
    /// Text typed into the open editor prompt
    prompt_answer: String,
    /// Saved flowcharts shown in the sidebar
    recent: Vec<StoredDocument>,
    toasts: Vec<Toast>,
    /// Zoom level
    zoom: f32,
    /// Pan offset
    pan_offset: egui::Vec2,
    /// A primary drag that grabbed nothing pans the view
    panning: bool,
}

impl FlowdraftApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let config = Config::load();

        let store = match FileStore::open(config.store_dir()) {
            Ok(store) => Some(store),
            Err(e) => {
                log::warn!("saving disabled: {e}");
                None
            }
        };

        let generator: Option<Arc<dyn GraphGenerator>> = if config.generator_configured() {
            match OpenRouterClient::new(config.generator.clone()) {
                Ok(client) => {
                    log::info!("generator ready ({})", client.model());
                    Some(Arc::new(client) as Arc<dyn GraphGenerator>)
                }
                Err(e) => {
                    log::warn!("generator unavailable: {e}");
                    None
                }
            }
        } else {
            log::info!("no generator API key configured");
            None
        };

        let mut app = Self {
            session: EditorSession::new(),
            config,
            store,
            generator,
            generations: Vec::new(),
            code: None,
            ai_prompt: String::new(),
            prompt_answer: String::new(),
            recent: Vec::new(),
            toasts: Vec::new(),
            zoom: 1.0,
            pan_offset: egui::vec2(40.0, 40.0),
            panning: false,
        };
        app.refresh_recent();
        app
    }

    // ========================================================================
    // SESSION GLUE
    // ========================================================================

    fn handle(&mut self, event: InputEvent) {
        let outcome = self.session.handle(event);
        self.react(outcome);
    }

    fn react(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Prompt(request) => {
                self.prompt_answer = request.initial_text().to_string();
            }
            Outcome::SaveDraft => self.save(Visibility::Draft),
            _ => {}
        }
    }

    fn save(&mut self, visibility: Visibility) {
        match self.store.as_ref() {
            Some(store) => {
                if self.session.save(store, visibility).is_ok() {
                    self.refresh_recent();
                }
            }
            None => self
                .session
                .notify(Notice::error("Failed to save flowchart: no storage directory available")),
        }
    }

    fn refresh_recent(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match store.load(&DocumentFilter::recent(RECENT_LIMIT)) {
            Ok(records) => self.recent = records,
            Err(e) => {
                log::warn!("could not list saved flowcharts: {e}");
                self.recent.clear();
            }
        }
    }

    fn delete_saved(&mut self, id: &str) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match store.delete(id) {
            Ok(()) => self.session.notify(Notice::success("Flowchart deleted")),
            Err(e) => self
                .session
                .notify(Notice::error(format!("Failed to delete flowchart: {e}"))),
        }
        self.refresh_recent();
    }

    fn start_generation(&mut self, ctx: &egui::Context) {
        let Some(generator) = self.generator.clone() else {
            self.session
                .notify(Notice::error(GenerationError::NotConfigured.to_string()));
            return;
        };
        let Ok((ticket, prompt)) = self.session.begin_generation(&self.ai_prompt) else {
            return;
        };

        let (tx, rx) = mpsc::channel();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let reply = generator.generate_graph(&prompt);
            // The receiver is gone if the app closed meanwhile.
            let _ = tx.send(reply);
            ctx.request_repaint();
        });
        self.generations.push(PendingGeneration { ticket, reply: rx });
    }

    fn poll_generations(&mut self) {
        let mut finished = Vec::new();
        self.generations.retain(|pending| match pending.reply.try_recv() {
            Ok(reply) => {
                finished.push((pending.ticket, reply));
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                finished.push((
                    pending.ticket,
                    Err(GenerationError::Failed("generator thread stopped".to_string())),
                ));
                false
            }
        });

        for (ticket, reply) in finished {
            let _ = self.session.finish_generation(ticket, reply);
        }
    }

    fn start_code_generation(&mut self, ctx: &egui::Context) {
        let Some(generator) = self.generator.clone() else {
            self.session
                .notify(Notice::error("AI features require API configuration."));
            return;
        };
        let doc: Document = self.session.document().clone();
        let file_name = generation::code_file_name(&doc);

        let (tx, rx) = mpsc::channel();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(generation::generate_code(generator.as_ref(), &doc));
            ctx.request_repaint();
        });
        self.code = Some(PendingCode { file_name, reply: rx });
    }

    fn poll_code(&mut self) {
        let Some(pending) = &self.code else {
            return;
        };
        let reply = match pending.reply.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                Err(GenerationError::Code("generator thread stopped".to_string()))
            }
        };
        let Some(pending) = self.code.take() else {
            return;
        };

        let code = match reply {
            Ok(code) => code,
            Err(e) => {
                log::warn!("code generation failed: {e}");
                self.session
                    .notify(Notice::error("Failed to generate code from flowchart"));
                return;
            }
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JavaScript", &["js"])
            .set_file_name(pending.file_name)
            .save_file()
        else {
            return;
        };
        match std::fs::write(&path, code) {
            Ok(()) => {
                log::info!("saved generated code to {:?}", path);
                self.session
                    .notify(Notice::success("Code generated and downloaded!"));
            }
            Err(e) => self
                .session
                .notify(Notice::error(format!("Failed to write {}: {e}", path.display()))),
        }
    }

    fn collect_toasts(&mut self) {
        let now = Instant::now();
        for notice in self.session.take_notices() {
            self.toasts.push(Toast {
                notice,
                shown_at: now,
            });
        }
        self.toasts.retain(|t| now.duration_since(t.shown_at) < TOAST_TTL);
    }

    // ========================================================================
    // FILES
    // ========================================================================

    fn import_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Flowchart", &["json"])
            .pick_file()
        {
            let _ = self.session.import_file(&path);
        }
    }

    fn export_json_dialog(&mut self) {
        let json = match self.session.export_json() {
            Ok(json) => json,
            Err(e) => {
                self.session
                    .notify(Notice::error(format!("Failed to export flowchart: {e}")));
                return;
            }
        };
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Flowchart", &["json"])
            .set_file_name(self.session.document().file_name("json"))
            .save_file()
        {
            self.write_export(&path, json.as_bytes());
        }
    }

    fn export_image_dialog(&mut self, kind: ImageExport) {
        let (filter, ext) = match kind {
            ImageExport::OverviewPng | ImageExport::CanvasPng => ("PNG", "png"),
            ImageExport::CanvasSvg => ("SVG", "svg"),
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter(filter, &[ext])
            .set_file_name(self.session.document().file_name(ext))
            .save_file()
        else {
            return;
        };

        let bytes = match kind {
            ImageExport::OverviewPng => export::overview_png(self.session.document()),
            ImageExport::CanvasPng => export::canvas_png(self.session.graph()),
            ImageExport::CanvasSvg => Ok(export::canvas_svg(self.session.graph()).into_bytes()),
        };
        match bytes {
            Ok(bytes) => self.write_export(&path, &bytes),
            Err(e) => self
                .session
                .notify(Notice::error(format!("Failed to export image: {e}"))),
        }
    }

    fn write_export(&mut self, path: &std::path::Path, bytes: &[u8]) {
        match std::fs::write(path, bytes) {
            Ok(()) => {
                log::info!("exported {:?}", path);
                self.session
                    .notify(Notice::success("Flowchart exported successfully!"));
            }
            Err(e) => self
                .session
                .notify(Notice::error(format!("Failed to write {}: {e}", path.display()))),
        }
    }

    // ========================================================================
    // CANVAS
    // ========================================================================

    fn to_screen(&self, origin: egui::Pos2, p: Point) -> egui::Pos2 {
        // The canvas model is f64; egui paints in f32.
        origin + self.pan_offset + egui::vec2(p.x as f32, p.y as f32) * self.zoom
    }

    fn to_canvas(&self, origin: egui::Pos2, p: egui::Pos2) -> Point {
        let v = (p - origin - self.pan_offset) / self.zoom;
        Point::new(f64::from(v.x), f64::from(v.y))
    }

    /// Translate egui pointer activity on the canvas into editor events
    fn canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let origin = response.rect.min;
        let shift = ctx.input(|i| i.modifiers.shift);
        let pointer = response
            .interact_pointer_pos()
            .or_else(|| ctx.input(|i| i.pointer.latest_pos()));

        if response.drag_started_by(egui::PointerButton::Primary) {
            let press = ctx.input(|i| i.pointer.press_origin());
            if let Some(press) = press.or(pointer) {
                let at = self.to_canvas(origin, press);
                let outcome = self.session.handle(InputEvent::PointerDown { at });
                self.panning = outcome == Outcome::Ignored;
                self.react(outcome);
            }
        }

        if response.dragged_by(egui::PointerButton::Middle) {
            self.pan_offset += response.drag_delta();
        } else if response.dragged_by(egui::PointerButton::Primary) {
            if self.panning {
                self.pan_offset += response.drag_delta();
            } else if let Some(pos) = pointer {
                let at = self.to_canvas(origin, pos);
                self.handle(InputEvent::PointerMove { at });
            }
        }

        if response.drag_stopped() {
            if !self.panning {
                if let Some(pos) = pointer {
                    let at = self.to_canvas(origin, pos);
                    self.handle(InputEvent::PointerUp { at });
                }
            }
            self.panning = false;
        }

        if let Some(pos) = pointer {
            let at = self.to_canvas(origin, pos);
            if response.clicked() {
                self.handle(InputEvent::Click { at, shift });
            }
            if response.double_clicked() {
                self.handle(InputEvent::DoubleClick { at });
            }
            if response.secondary_clicked() {
                self.handle(InputEvent::SecondaryClick { at });
            }
        }

        // Zoom with scroll
        let scroll_delta = ctx.input(|i| i.raw_scroll_delta);
        if response.hovered() && scroll_delta.y != 0.0 {
            self.zoom = (self.zoom + scroll_delta.y * 0.001).clamp(0.3, 3.0);
        }
    }

    fn keyboard_input(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let presses: Vec<KeyPress> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed: true,
                        modifiers,
                        ..
                    } => editor_key(*key).map(|key| KeyPress {
                        key,
                        ctrl: modifiers.command,
                        shift: modifiers.shift,
                    }),
                    _ => None,
                })
                .collect()
        });
        for press in presses {
            self.handle(InputEvent::Key(press));
        }
    }

    fn paint_canvas(&self, painter: &egui::Painter, rect: egui::Rect) {
        painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(15, 23, 42));
        draw_grid(painter, rect, self.zoom, self.pan_offset);

        let origin = rect.min;
        let zoom = self.zoom;
        let selected_stroke = egui::Stroke::new(2.5, egui::Color32::from_rgb(250, 204, 21));

        for command in geometry::render(self.session.graph(), self.session.selection()) {
            match command {
                DrawCommand::Connector {
                    points,
                    arrow,
                    selected,
                    ..
                } => {
                    let stroke = if selected {
                        selected_stroke
                    } else {
                        egui::Stroke::new(1.5, egui::Color32::from_rgb(148, 163, 184))
                    };
                    let route: Vec<egui::Pos2> =
                        points.iter().map(|p| self.to_screen(origin, *p)).collect();
                    painter.add(egui::Shape::line(route, stroke));
                    if let Some(head) = arrow {
                        let head: Vec<egui::Pos2> =
                            head.iter().map(|p| self.to_screen(origin, *p)).collect();
                        painter.add(egui::Shape::convex_polygon(
                            head,
                            stroke.color,
                            egui::Stroke::NONE,
                        ));
                    }
                }
                DrawCommand::EdgeLabel { at, text, .. } => {
                    draw_edge_label(painter, self.to_screen(origin, at), &text, zoom);
                }
                DrawCommand::Shape {
                    kind,
                    outline,
                    selected,
                    ..
                } => {
                    let (fill, border) = kind_colors(kind);
                    let stroke = if selected {
                        selected_stroke
                    } else {
                        egui::Stroke::new(1.5, border)
                    };
                    match outline {
                        Outline::Circle { center, radius } => {
                            let radius = radius as f32 * zoom;
                            painter.circle(self.to_screen(origin, center), radius, fill, stroke);
                        }
                        Outline::RoundedRect { rect: r, radius } => {
                            let screen = egui::Rect::from_min_max(
                                self.to_screen(origin, r.min),
                                self.to_screen(origin, r.max),
                            );
                            let rounding = radius as f32 * zoom;
                            painter.rect_filled(screen, rounding, fill);
                            painter.rect_stroke(screen, rounding, stroke);
                        }
                        Outline::Polygon(points) => {
                            let poly: Vec<egui::Pos2> =
                                points.iter().map(|p| self.to_screen(origin, *p)).collect();
                            painter.add(egui::Shape::convex_polygon(poly, fill, stroke));
                        }
                        Outline::DashedRect { rect: r } => {
                            let a = self.to_screen(origin, r.min);
                            let b = self.to_screen(origin, r.max);
                            let corners = [
                                a,
                                egui::pos2(b.x, a.y),
                                b,
                                egui::pos2(a.x, b.y),
                                a,
                            ];
                            painter.extend(egui::Shape::dashed_line(&corners, stroke, 4.0, 3.0));
                        }
                    }
                }
                DrawCommand::Label { at, text, .. } => {
                    painter.text(
                        self.to_screen(origin, at),
                        egui::Align2::CENTER_CENTER,
                        text,
                        egui::FontId::proportional(13.0 * zoom),
                        egui::Color32::WHITE,
                    );
                }
                DrawCommand::Handle { at, .. } => {
                    painter.circle(
                        self.to_screen(origin, at),
                        geometry::HANDLE_RADIUS as f32 * zoom,
                        egui::Color32::from_rgb(226, 232, 240),
                        egui::Stroke::new(1.0, egui::Color32::from_rgb(71, 85, 105)),
                    );
                }
            }
        }

        // Rubber band for a connect gesture in progress
        if let Gesture::Connecting { from, cursor, .. } = self.session.controller().gesture() {
            let line = [self.to_screen(origin, *from), self.to_screen(origin, *cursor)];
            painter.extend(egui::Shape::dashed_line(
                &line,
                egui::Stroke::new(1.5, egui::Color32::from_rgb(96, 165, 250)),
                6.0,
                4.0,
            ));
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("➕ New Flowchart").clicked() {
                        self.session.reset();
                        self.generations.clear();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("📂 Import JSON...").clicked() {
                        self.import_dialog();
                        ui.close_menu();
                    }
                    if ui.button("📄 Export JSON...").clicked() {
                        self.export_json_dialog();
                        ui.close_menu();
                    }
                    ui.menu_button("🖼 Export Image", |ui| {
                        if ui.button("Overview PNG...").clicked() {
                            self.export_image_dialog(ImageExport::OverviewPng);
                            ui.close_menu();
                        }
                        if ui.button("Canvas PNG...").clicked() {
                            self.export_image_dialog(ImageExport::CanvasPng);
                            ui.close_menu();
                        }
                        if ui.button("Canvas SVG...").clicked() {
                            self.export_image_dialog(ImageExport::CanvasSvg);
                            ui.close_menu();
                        }
                    });
                    let code = egui::Button::new("🧩 Generate Code...");
                    if ui.add_enabled(self.code.is_none(), code).clicked()
                    {
                        self.start_code_generation(ctx);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("💾 Save Draft").clicked() {
                        self.save(Visibility::Draft);
                        ui.close_menu();
                    }
                    if ui.button("🌐 Save Project").clicked() {
                        self.save(Visibility::Public);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    if ui
                        .add_enabled(self.session.can_undo(), egui::Button::new("↶ Undo  Ctrl+Z"))
                        .clicked()
                    {
                        self.session.undo();
                        ui.close_menu();
                    }
                    let redo = egui::Button::new("↷ Redo  Ctrl+Shift+Z");
                    if ui.add_enabled(self.session.can_redo(), redo).clicked()
                    {
                        self.session.redo();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("🗑 Delete Selection").clicked() {
                        self.handle(InputEvent::Key(KeyPress::plain(Key::Delete)));
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Reset Zoom").clicked() {
                        self.zoom = 1.0;
                        self.pan_offset = egui::vec2(40.0, 40.0);
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("tools_panel")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("Flowchart");
                    let mut title = self.session.metadata().title.clone();
                    ui.label("Title");
                    if ui.text_edit_singleline(&mut title).changed() {
                        self.session.set_title(&title);
                    }
                    let mut description = self.session.metadata().description.clone();
                    ui.label("Description");
                    if ui
                        .add(egui::TextEdit::multiline(&mut description).desired_rows(2))
                        .changed()
                    {
                        self.session.set_description(&description);
                    }

                    ui.separator();
                    ui.heading("Tools");
                    let current = self.session.controller().tool();
                    for tool in Tool::ALL {
                        let text = format!("{}  ({})", tool.name(), tool.shortcut());
                        if ui.selectable_label(current == tool, text).clicked() {
                            self.handle(InputEvent::SelectTool(tool));
                        }
                    }
                    ui.small(
                        "Drag from a handle to connect, double-click to rename, \
                         right-click a node to connect by id.",
                    );

                    ui.separator();
                    ui.heading("🤖 Generate");
                    ui.add(
                        egui::TextEdit::multiline(&mut self.ai_prompt)
                            .desired_rows(4)
                            .hint_text("Describe the process you want to chart"),
                    );
                    ui.horizontal(|ui| {
                        let ready = self.generator.is_some();
                        if ui
                            .add_enabled(ready, egui::Button::new("✨ Generate"))
                            .clicked()
                        {
                            self.start_generation(ctx);
                        }
                        if self.session.generation_pending() {
                            ui.spinner();
                            if ui.button("Cancel").clicked() {
                                self.session.cancel_generation();
                            }
                        }
                    });
                    if self.generator.is_none() {
                        ui.colored_label(
                            egui::Color32::GRAY,
                            "Set FLOWDRAFT_API_KEY to enable generation",
                        );
                    } else {
                        ui.small(format!("Model: {}", self.config.generator.model));
                    }

                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.heading("Recent");
                        if ui.small_button("⟳").clicked() {
                            self.refresh_recent();
                        }
                    });
                    if self.store.is_none() {
                        ui.colored_label(egui::Color32::GRAY, "Storage unavailable");
                    } else if self.recent.is_empty() {
                        ui.colored_label(egui::Color32::GRAY, "No saved flowcharts yet");
                    }

                    let mut open = None;
                    let mut delete = None;
                    for (i, record) in self.recent.iter().enumerate() {
                        ui.horizontal(|ui| {
                            let badge = if record.visibility.is_draft() { "📝" } else { "🌐" };
                            if ui
                                .link(format!("{badge} {}", record.title))
                                .on_hover_text(
                                    record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                                )
                                .clicked()
                            {
                                open = Some(i);
                            }
                            if ui.small_button("✗").clicked() {
                                delete = Some(record.id.clone());
                            }
                        });
                    }
                    if let Some(i) = open {
                        let record = self.recent[i].clone();
                        let _ = self.session.load_stored(&record);
                    }
                    if let Some(id) = delete {
                        self.delete_saved(&id);
                    }
                });
            });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let graph = self.session.graph();
                ui.label(format!(
                    "Nodes: {} | Edges: {}",
                    graph.nodes.len(),
                    graph.edges.len()
                ));
                ui.separator();
                ui.label(format!("Tool: {}", self.session.controller().tool().name()));
                ui.separator();
                ui.label(format!("{:.0}%", self.zoom * 100.0));
                ui.separator();
                let state = if self.session.metadata().is_draft {
                    "Draft"
                } else {
                    "Published"
                };
                ui.label(state);
            });
        });
    }

    /// Modal for the controller's open text request
    fn prompt_window(&mut self, ctx: &egui::Context) {
        let Some(request) = self.session.controller().pending_request().cloned() else {
            return;
        };

        let mut answer: Option<Option<String>> = None;
        egui::Window::new(request.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(request.prompt());
                let edit = ui.text_edit_singleline(&mut self.prompt_answer);
                if ui.memory(|m| m.focused().is_none()) {
                    edit.request_focus();
                }
                if matches!(&request, InputRequest::ConnectTarget { .. }) {
                    ui.small("Known ids:");
                    ui.horizontal_wrapped(|ui| {
                        for node in &self.session.graph().nodes {
                            ui.small(node.id.as_str());
                        }
                    });
                }
                let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.horizontal(|ui| {
                    if ui.button("✓ OK").clicked() || submitted {
                        answer = Some(Some(self.prompt_answer.clone()));
                    }
                    if ui.button("✗ Cancel").clicked() {
                        answer = Some(None);
                    }
                });
            });

        if let Some(answer) = answer {
            let outcome = self.session.answer_prompt(answer);
            self.react(outcome);
            self.prompt_answer.clear();
        }
    }

    fn show_toasts(&self, ctx: &egui::Context) {
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -40.0])
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    let color = match toast.notice.level {
                        NoticeLevel::Info => egui::Color32::from_rgb(59, 130, 246),
                        NoticeLevel::Success => egui::Color32::from_rgb(34, 197, 94),
                        NoticeLevel::Warning => egui::Color32::from_rgb(234, 179, 8),
                        NoticeLevel::Error => egui::Color32::from_rgb(239, 68, 68),
                    };
                    egui::Frame::none()
                        .fill(egui::Color32::from_rgb(30, 41, 59))
                        .stroke(egui::Stroke::new(1.0, color))
                        .rounding(4.0)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.colored_label(color, &toast.notice.message);
                        });
                    ui.add_space(4.0);
                }
            });
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl eframe::App for FlowdraftApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_generations();
        self.poll_code();

        self.menu_bar(ctx);
        self.status_bar(ctx);
        self.side_panel(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (response, painter) =
                    ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
                if self.session.controller().pending_request().is_none() {
                    self.canvas_input(ctx, &response);
                }
                let placing = matches!(self.session.controller().tool(), Tool::Place(_));
                if placing && response.hovered() {
                    ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
                }
                self.paint_canvas(&painter, response.rect);
            });

        self.prompt_window(ctx);
        self.keyboard_input(ctx);

        if self.session.generation_pending() || self.code.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        self.collect_toasts();
        self.show_toasts(ctx);
    }
}

#[derive(Clone, Copy)]
enum ImageExport {
    OverviewPng,
    CanvasPng,
    CanvasSvg,
}

fn editor_key(key: egui::Key) -> Option<Key> {
    match key {
        egui::Key::Delete => Some(Key::Delete),
        egui::Key::Backspace => Some(Key::Backspace),
        egui::Key::Escape => Some(Key::Escape),
        other => {
            let mut chars = other.name().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    Some(Key::Char(c.to_ascii_lowercase()))
                }
                _ => None,
            }
        }
    }
}

/// Fill and border colour per node kind
fn kind_colors(kind: NodeKind) -> (egui::Color32, egui::Color32) {
    match kind {
        NodeKind::StartEnd => (
            egui::Color32::from_rgb(22, 101, 52),
            egui::Color32::from_rgb(34, 197, 94),
        ),
        NodeKind::Process => (
            egui::Color32::from_rgb(30, 64, 175),
            egui::Color32::from_rgb(59, 130, 246),
        ),
        NodeKind::Decision => (
            egui::Color32::from_rgb(133, 77, 14),
            egui::Color32::from_rgb(234, 179, 8),
        ),
        NodeKind::InputOutput => (
            egui::Color32::from_rgb(88, 28, 135),
            egui::Color32::from_rgb(168, 85, 247),
        ),
        NodeKind::Text => (egui::Color32::TRANSPARENT, egui::Color32::from_rgb(148, 163, 184)),
    }
}

fn draw_edge_label(painter: &egui::Painter, pos: egui::Pos2, text: &str, zoom: f32) {
    let font = egui::FontId::proportional(11.0 * zoom);
    let color = egui::Color32::from_rgb(226, 232, 240);
    let galley = painter.layout_no_wrap(text.to_string(), font, color);
    let rect = egui::Rect::from_center_size(pos, galley.size() + egui::vec2(8.0, 4.0));

    painter.rect_filled(rect, 3.0, egui::Color32::from_rgb(30, 41, 59));
    painter.rect_stroke(rect, 3.0, egui::Stroke::new(1.0, egui::Color32::from_rgb(71, 85, 105)));
    painter.galley(rect.center() - galley.size() / 2.0, galley, egui::Color32::WHITE);
}

fn draw_grid(painter: &egui::Painter, rect: egui::Rect, zoom: f32, offset: egui::Vec2) {
    let grid_size = 20.0 * zoom;
    let grid_color = egui::Color32::from_rgba_unmultiplied(148, 163, 184, 24);

    let start_x = rect.left() + offset.x.rem_euclid(grid_size);
    let start_y = rect.top() + offset.y.rem_euclid(grid_size);

    let mut x = start_x;
    while x < rect.right() {
        painter.line_segment(
            [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
            egui::Stroke::new(1.0, grid_color),
        );
        x += grid_size;
    }

    let mut y = start_y;
    while y < rect.bottom() {
        painter.line_segment(
            [egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)],
            egui::Stroke::new(1.0, grid_color),
        );
        y += grid_size;
    }
}
