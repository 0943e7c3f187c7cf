//! Image export
//!
//! Two renditions of a document:
//! - an overview card (fixed 1024x768: heading, title, counts and a grid of
//!   labelled boxes), rasterized to PNG with resvg
//! - a vector SVG of the canvas itself, written from the geometry display list

use log::debug;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use std::fmt::Write as _;
use thiserror::Error;

use crate::document::Document;
use crate::geometry::{self, DrawCommand, Outline, Point, Rect};
use crate::graph::{Graph, NodeKind, Selection};


pub const OVERVIEW_WIDTH: u32 = 1024;
pub const OVERVIEW_HEIGHT: u32 = 768;
const OVERVIEW_BACKGROUND: &str = "#0f172a";
const OVERVIEW_BOX_FILL: &str = "#3b82f6";
const GRID_COLUMNS: usize = 5;
const GRID_ORIGIN: (f64, f64) = (100.0, 150.0);
const GRID_PITCH: (f64, f64) = (180.0, 100.0);
const GRID_BOX: (f64, f64) = (120.0, 60.0);

/// Padding around the graph bounds in vector exports
pub const SVG_MARGIN: f64 = 40.0;
const FONT_FAMILY: &str = "Arial, Helvetica, sans-serif";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to parse generated SVG: {0}")]
    Svg(#[from] usvg::Error),
    #[error("Failed to allocate {width}x{height} surface")]
    Surface { width: u32, height: u32 },
    #[error("Failed to encode PNG: {0}")]
    Encode(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Escape text for use inside SVG element content and attribute values
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// OVERVIEW
// ============================================================================

/// Top-left corner of the `index`-th box in the overview grid
pub fn overview_slot(index: usize) -> (f64, f64) {
    let col = (index % GRID_COLUMNS) as f64;
    let row = (index / GRID_COLUMNS) as f64;
    (
        GRID_ORIGIN.0 + col * GRID_PITCH.0,
        GRID_ORIGIN.1 + row * GRID_PITCH.1,
    )
}

/// The overview card as SVG source.
///
/// Boxes are laid out by node order only; positions and edges are not drawn.
/// Boxes past the bottom of the card are clipped.
pub fn overview_svg(doc: &Document) -> String {
    let graph = &doc.graph;
    let cx = OVERVIEW_WIDTH as f64 / 2.0;
    let mut svg = String::new();

    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = OVERVIEW_WIDTH,
        h = OVERVIEW_HEIGHT
    );
    let _ = writeln!(
        svg,
        r#"<rect width="100%" height="100%" fill="{OVERVIEW_BACKGROUND}"/>"#
    );
    let _ = writeln!(
        svg,
        r##"<g fill="#ffffff" font-family="{FONT_FAMILY}" font-size="16" text-anchor="middle">"##
    );
    let _ = writeln!(svg, r#"<text x="{cx}" y="50">Flowchart Export</text>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{cx}" y="80">Title: {}</text>"#,
        escape_xml(&doc.metadata.title)
    );
    let _ = writeln!(
        svg,
        r#"<text x="{cx}" y="110">Nodes: {}, Edges: {}</text>"#,
        graph.nodes.len(),
        graph.edges.len()
    );
    svg.push_str("</g>\n");

    for (index, node) in graph.nodes.iter().enumerate() {
        let (x, y) = overview_slot(index);
        let _ = writeln!(
            svg,
            r#"<rect x="{x}" y="{y}" width="{}" height="{}" fill="{OVERVIEW_BOX_FILL}"/>"#,
            GRID_BOX.0, GRID_BOX.1
        );
        let _ = writeln!(
            svg,
            r##"<text x="{}" y="{}" fill="#ffffff" font-family="{FONT_FAMILY}" font-size="12" text-anchor="middle">{}</text>"##,
            x + GRID_BOX.0 / 2.0,
            y + 35.0,
            escape_xml(node.label())
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Rasterize any SVG source to PNG bytes at its natural size
pub fn rasterize_svg(svg: &str) -> ExportResult<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &options)?;
    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());

    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Surface { width, height })?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

    let png = pixmap
        .encode_png()
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    debug!("rasterized {width}x{height} PNG ({} bytes)", png.len());
    Ok(png)
}

/// The overview card as PNG bytes
pub fn overview_png(doc: &Document) -> ExportResult<Vec<u8>> {
    rasterize_svg(&overview_svg(doc))
}

// ============================================================================
// VECTOR CANVAS
// ============================================================================

fn node_fill(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::StartEnd => "#dcfce7",
        NodeKind::Process => "#dbeafe",
        NodeKind::Decision => "#fef9c3",
        NodeKind::InputOutput => "#f3e8ff",
        NodeKind::Text => "none",
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_outline(svg: &mut String, outline: &Outline, fill: &str) {
    let stroke = r##"stroke="#334155" stroke-width="1.5""##;
    let _ = match outline {
        Outline::Circle { center, radius } => writeln!(
            svg,
            r#"<circle cx="{}" cy="{}" r="{radius}" fill="{fill}" {stroke}/>"#,
            center.x, center.y
        ),
        Outline::RoundedRect { rect, radius } => writeln!(
            svg,
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{radius}" fill="{fill}" {stroke}/>"#,
            rect.min.x,
            rect.min.y,
            rect.width(),
            rect.height()
        ),
        Outline::Polygon(points) => writeln!(
            svg,
            r#"<polygon points="{}" fill="{fill}" {stroke}/>"#,
            points_attr(points)
        ),
        Outline::DashedRect { rect } => writeln!(
            svg,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{fill}" {stroke} stroke-dasharray="4 3"/>"#,
            rect.min.x,
            rect.min.y,
            rect.width(),
            rect.height()
        ),
    };
}

/// Standalone SVG of the canvas, framed to the graph bounds plus a margin.
///
/// Port handles are editor affordances and are left out.
pub fn canvas_svg(graph: &Graph) -> String {
    let frame = geometry::bounds(graph)
        .unwrap_or_else(|| Rect::from_min_size(Point::new(0.0, 0.0), 0.0, 0.0))
        .expand(SVG_MARGIN);
    let mut svg = String::new();

    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="{x} {y} {w} {h}">"#,
        x = frame.min.x,
        y = frame.min.y,
        w = frame.width(),
        h = frame.height()
    );
    let _ = writeln!(
        svg,
        r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#ffffff"/>"##,
        frame.min.x,
        frame.min.y,
        frame.width(),
        frame.height()
    );

    for command in geometry::render(graph, &Selection::default()) {
        match command {
            DrawCommand::Connector { points, arrow, .. } => {
                let _ = writeln!(
                    svg,
                    r##"<polyline points="{}" fill="none" stroke="#64748b" stroke-width="1.5"/>"##,
                    points_attr(&points)
                );
                if let Some(head) = arrow {
                    let _ = writeln!(
                        svg,
                        r##"<polygon points="{}" fill="#64748b"/>"##,
                        points_attr(&head)
                    );
                }
            }
            DrawCommand::EdgeLabel { at, text, .. } => {
                let _ = writeln!(
                    svg,
                    r##"<text x="{}" y="{}" font-family="{FONT_FAMILY}" font-size="11" fill="#475569" text-anchor="middle" dominant-baseline="central">{}</text>"##,
                    at.x,
                    at.y,
                    escape_xml(&text)
                );
            }
            DrawCommand::Shape { kind, outline, .. } => {
                write_outline(&mut svg, &outline, node_fill(kind));
            }
            DrawCommand::Label { at, text, .. } => {
                let _ = writeln!(
                    svg,
                    r##"<text x="{}" y="{}" font-family="{FONT_FAMILY}" font-size="12" fill="#0f172a" text-anchor="middle" dominant-baseline="central">{}</text>"##,
                    at.x,
                    at.y,
                    escape_xml(&text)
                );
            }
            DrawCommand::Handle { .. } => {}
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// The vector canvas rasterized to PNG
pub fn canvas_png(graph: &Graph) -> ExportResult<Vec<u8>> {
    rasterize_svg(&canvas_svg(graph))
}
