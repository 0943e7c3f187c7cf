//! Geometry & Hit-Testing
//!
//! Maps node kinds to shapes and answers the spatial questions the
//! interaction controller asks: which node is under the pointer, where a
//! port handle sits, how a connector runs between two nodes. [`render`]
//! turns a graph into a flat display list so any surface (egui, SVG) can
//! draw it without knowing about shapes.

use std::collections::HashMap;

use crate::graph::{Edge, EdgeId, Graph, Node, NodeId, NodeKind, Position, Selection};


pub type Point = Position;

/// Radius of the drawn port handles
pub const HANDLE_RADIUS: f64 = 5.0;
/// Distance the self-loop route keeps from the node's box
pub const LOOP_CLEARANCE: f64 = 24.0;
/// Arrowhead length at the target end of connectors
pub const ARROW_SIZE: f64 = 10.0;
const ARROW_SPREAD: f64 = 0.4;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Axis-aligned rectangle in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn from_min_size(min: Point, width: f64, height: f64) -> Self {
        Self {
            min,
            max: Point::new(min.x + width, min.y + height),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Inclusive containment test
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn include(&self, p: Point) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    pub fn expand(&self, margin: f64) -> Rect {
        Rect {
            min: self.min.offset(-margin, -margin),
            max: self.max.offset(margin, margin),
        }
    }
}

/// Side of a node's box where a port handle sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

// ============================================================================
// SHAPES
// ============================================================================

/// Drawn outline of a node kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle,
    RoundedRect { corner_radius: f64 },
    Diamond,
    /// Top edge inset by `inset` (fraction of the width) on both ends
    Parallelogram { inset: f64 },
    DashedBox,
}

/// Shape plus nominal bounding box size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSpec {
    pub shape: Shape,
    pub width: f64,
    pub height: f64,
}

pub fn shape_of(kind: NodeKind) -> ShapeSpec {
    match kind {
        NodeKind::StartEnd => ShapeSpec {
            shape: Shape::Circle,
            width: 100.0,
            height: 100.0,
        },
        NodeKind::Process => ShapeSpec {
            shape: Shape::RoundedRect { corner_radius: 5.0 },
            width: 100.0,
            height: 40.0,
        },
        NodeKind::Decision => ShapeSpec {
            shape: Shape::Diamond,
            width: 100.0,
            height: 40.0,
        },
        NodeKind::InputOutput => ShapeSpec {
            shape: Shape::Parallelogram { inset: 0.1 },
            width: 120.0,
            height: 40.0,
        },
        NodeKind::Text => ShapeSpec {
            shape: Shape::DashedBox,
            width: 100.0,
            height: 30.0,
        },
    }
}

pub fn bounding_box(node: &Node) -> Rect {
    let spec = shape_of(node.kind);
    Rect::from_min_size(node.position, spec.width, spec.height)
}

/// Top-left position that centres a new node of `kind` on `click`
pub fn placement_origin(kind: NodeKind, click: Point) -> Position {
    let spec = shape_of(kind);
    click.offset(-spec.width * 0.5, -spec.height * 0.5)
}

/// Ports exposed by a kind. Decisions branch, so they get all four sides.
pub fn ports(kind: NodeKind) -> &'static [Side] {
    match kind {
        NodeKind::Decision => &[Side::Top, Side::Left, Side::Right, Side::Bottom],
        _ => &[Side::Top, Side::Bottom],
    }
}

/// Connection handle coordinate, or `None` if the kind has no port there
pub fn port_point(node: &Node, side: Side) -> Option<Point> {
    if !ports(node.kind).contains(&side) {
        return None;
    }
    let r = bounding_box(node);
    let c = r.center();
    Some(match side {
        Side::Top => Point::new(c.x, r.min.y),
        Side::Bottom => Point::new(c.x, r.max.y),
        Side::Left => Point::new(r.min.x, c.y),
        Side::Right => Point::new(r.max.x, c.y),
    })
}

fn outline(node: &Node) -> Outline {
    let spec = shape_of(node.kind);
    let r = bounding_box(node);
    match spec.shape {
        Shape::Circle => Outline::Circle {
            center: r.center(),
            radius: spec.width.min(spec.height) * 0.5,
        },
        Shape::RoundedRect { corner_radius } => Outline::RoundedRect {
            rect: r,
            radius: corner_radius,
        },
        Shape::Diamond => {
            let c = r.center();
            Outline::Polygon(vec![
                Point::new(c.x, r.min.y),
                Point::new(r.max.x, c.y),
                Point::new(c.x, r.max.y),
                Point::new(r.min.x, c.y),
            ])
        }
        Shape::Parallelogram { inset } => {
            let dx = r.width() * inset;
            Outline::Polygon(vec![
                Point::new(r.min.x + dx, r.min.y),
                Point::new(r.max.x - dx, r.min.y),
                Point::new(r.max.x, r.max.y),
                Point::new(r.min.x, r.max.y),
            ])
        }
        Shape::DashedBox => Outline::DashedRect { rect: r },
    }
}

// ============================================================================
// CONNECTORS
// ============================================================================

/// Absolute route of a connector; the arrowhead sits at the last point
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRoute {
    pub source_side: Side,
    pub points: Vec<Point>,
}

impl EdgeRoute {
    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn tip(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Point halfway along the route, used to anchor edge labels
    pub fn midpoint(&self) -> Option<Point> {
        polyline_point_at(&self.points, 0.5)
    }

    /// Triangle `[tip, left, right]` for the arrowhead
    pub fn arrow_head(&self, size: f64) -> Option<[Point; 3]> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let tip = self.points[n - 1];
        let prev = self.points[n - 2];
        let (dx, dy) = (tip.x - prev.x, tip.y - prev.y);
        let len = (dx * dx + dy * dy).sqrt();
        if len < f64::EPSILON {
            return None;
        }
        let (ux, uy) = (dx / len, dy / len);
        let (px, py) = (-uy, ux);
        let base = Point::new(tip.x - ux * size, tip.y - uy * size);
        let spread = size * ARROW_SPREAD;
        Some([
            tip,
            Point::new(base.x + px * spread, base.y + py * spread),
            Point::new(base.x - px * spread, base.y - py * spread),
        ])
    }
}

fn source_side(source: &Node, target: &Node) -> Side {
    if source.kind != NodeKind::Decision {
        return Side::Bottom;
    }
    let from = bounding_box(source);
    let to = bounding_box(target).center();
    let dx = to.x - from.center().x;
    if to.y > from.max.y && dx.abs() <= from.width() * 0.5 {
        Side::Bottom
    } else if dx < 0.0 {
        Side::Left
    } else {
        Side::Right
    }
}

fn self_loop_route(node: &Node) -> Option<EdgeRoute> {
    let r = bounding_box(node);
    let start = port_point(node, Side::Bottom)?;
    let end = port_point(node, Side::Top)?;
    let below = r.max.y + LOOP_CLEARANCE;
    let above = r.min.y - LOOP_CLEARANCE;
    let right = r.max.x + LOOP_CLEARANCE;
    Some(EdgeRoute {
        source_side: Side::Bottom,
        points: vec![
            start,
            Point::new(start.x, below),
            Point::new(right, below),
            Point::new(right, above),
            Point::new(end.x, above),
            end,
        ],
    })
}

/// Resolve an edge to absolute coordinates.
///
/// Returns `None` when either endpoint is missing from `nodes`. Always
/// computed from current positions, so a dragged node drags its edges along.
pub fn edge_endpoints(edge: &Edge, nodes: &HashMap<&NodeId, &Node>) -> Option<EdgeRoute> {
    let source = nodes.get(&edge.source)?;
    let target = nodes.get(&edge.target)?;

    if edge.is_self_loop() {
        return self_loop_route(source);
    }

    let side = source_side(source, target);
    let start = port_point(source, side)?;
    let end = port_point(target, Side::Top)?;
    Some(EdgeRoute {
        source_side: side,
        points: vec![start, end],
    })
}

/// Point at fraction `t` (0..=1) of a polyline's length
pub fn polyline_point_at(points: &[Point], t: f64) -> Option<Point> {
    let first = *points.first()?;
    let total: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    if total <= f64::EPSILON {
        return Some(first);
    }
    let mut remaining = total * t.clamp(0.0, 1.0);
    for w in points.windows(2) {
        let seg = w[0].distance(w[1]);
        if remaining <= seg && seg > 0.0 {
            let k = remaining / seg;
            return Some(Point::new(
                w[0].x + (w[1].x - w[0].x) * k,
                w[0].y + (w[1].y - w[0].y) * k,
            ));
        }
        remaining -= seg;
    }
    points.last().copied()
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f64::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + abx * t, a.y + aby * t))
}

// ============================================================================
// HIT-TESTING
// ============================================================================

/// Topmost node (last in render order) whose box contains `point`
pub fn hit_test(point: Point, nodes: &[Node]) -> Option<&Node> {
    nodes.iter().rev().find(|n| bounding_box(n).contains(point))
}

/// A port handle picked by the pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortHit {
    pub node: NodeId,
    pub side: Side,
}

/// Port handle within `radius` of `point`, checking the topmost node first
pub fn hit_port(point: Point, nodes: &[Node], radius: f64) -> Option<PortHit> {
    nodes.iter().rev().find_map(|node| {
        ports(node.kind).iter().find_map(|&side| {
            let at = port_point(node, side)?;
            (at.distance(point) <= radius).then(|| PortHit {
                node: node.id.clone(),
                side,
            })
        })
    })
}

/// Topmost edge whose route passes within `tolerance` of `point`
pub fn hit_edge(point: Point, graph: &Graph, tolerance: f64) -> Option<&Edge> {
    let nodes = graph.nodes_by_id();
    graph.edges.iter().rev().find(|edge| {
        edge_endpoints(edge, &nodes).is_some_and(|route| {
            route
                .points
                .windows(2)
                .any(|w| distance_to_segment(point, w[0], w[1]) <= tolerance)
        })
    })
}

/// Bounding box of every node and connector route
pub fn bounds(graph: &Graph) -> Option<Rect> {
    let nodes = graph.nodes_by_id();
    let mut acc: Option<Rect> = None;
    for node in &graph.nodes {
        let r = bounding_box(node);
        acc = Some(acc.map_or(r, |a| a.union(&r)));
    }
    for edge in &graph.edges {
        if let Some(route) = edge_endpoints(edge, &nodes) {
            for p in route.points {
                acc = acc.map(|a| a.include(p));
            }
        }
    }
    acc
}

// ============================================================================
// DISPLAY LIST
// ============================================================================

/// Outline geometry of a node shape
#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    Circle { center: Point, radius: f64 },
    RoundedRect { rect: Rect, radius: f64 },
    Polygon(Vec<Point>),
    DashedRect { rect: Rect },
}

/// Surface-independent drawing instruction
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Connector {
        edge: EdgeId,
        points: Vec<Point>,
        arrow: Option<[Point; 3]>,
        selected: bool,
    },
    EdgeLabel {
        edge: EdgeId,
        at: Point,
        text: String,
    },
    Shape {
        node: NodeId,
        kind: NodeKind,
        outline: Outline,
        selected: bool,
    },
    Label {
        node: NodeId,
        at: Point,
        text: String,
    },
    Handle {
        node: NodeId,
        side: Side,
        at: Point,
    },
}

/// Build the display list: connectors first so they sit behind shapes.
pub fn render(graph: &Graph, selection: &Selection) -> Vec<DrawCommand> {
    let nodes = graph.nodes_by_id();
    let mut commands = Vec::with_capacity(graph.edges.len() * 2 + graph.nodes.len() * 4);

    for edge in &graph.edges {
        let Some(route) = edge_endpoints(edge, &nodes) else {
            continue;
        };
        let label_at = route.midpoint();
        commands.push(DrawCommand::Connector {
            edge: edge.id.clone(),
            arrow: route.arrow_head(ARROW_SIZE),
            points: route.points,
            selected: selection.edges.contains(&edge.id),
        });
        if let (Some(text), Some(at)) = (&edge.label, label_at) {
            commands.push(DrawCommand::EdgeLabel {
                edge: edge.id.clone(),
                at,
                text: text.clone(),
            });
        }
    }

    for node in &graph.nodes {
        commands.push(DrawCommand::Shape {
            node: node.id.clone(),
            kind: node.kind,
            outline: outline(node),
            selected: selection.nodes.contains(&node.id),
        });
        commands.push(DrawCommand::Label {
            node: node.id.clone(),
            at: bounding_box(node).center(),
            text: node.data.label.clone(),
        });
        for &side in ports(node.kind) {
            if let Some(at) = port_point(node, side) {
                commands.push(DrawCommand::Handle {
                    node: node.id.clone(),
                    side,
                    at,
                });
            }
        }
    }

    commands
}
