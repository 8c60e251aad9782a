//! Core geometry types and the `GeometryBuilder` mesh accumulator.

use serde::{Deserialize, Serialize};

/// 2D point in board coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Midpoint between `self` and `other`.
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A polygon with one exterior ring and zero or more interior rings.
///
/// Rings are closed: the first point is repeated at the end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    /// Outer boundary.
    pub exterior: Vec<Point>,
    /// Holes.
    pub interiors: Vec<Vec<Point>>,
}

impl Polygon {
    /// Creates a polygon without holes.
    pub const fn from_exterior(exterior: Vec<Point>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    /// Bounding box of the exterior ring; empty when the ring is empty.
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::new();
        for point in &self.exterior {
            bounds.update(point.x, point.y);
        }
        bounds
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Minimum X coordinate.
    pub min_x: f64,
    /// Minimum Y coordinate.
    pub min_y: f64,
    /// Maximum X coordinate.
    pub max_x: f64,
    /// Maximum Y coordinate.
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates an empty bounding box that will expand with the first `update` call.
    pub const fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Expands the bounding box to include the given point.
    ///
    /// Non-finite coordinates are ignored.
    pub fn update(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Expands the bounding box to include another one.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// True until the first finite point has been added.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// `(min_x, min_y, max_x, max_y)`, or all zeros when empty.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        if self.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            (self.min_x, self.min_y, self.max_x, self.max_y)
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Triangle mesh of a drill layer, ready to hand to a renderer.
///
/// Positions are interleaved `[x0, y0, x1, y1, ...]` as `f32` for WebGL.
/// Indices reference into the positions array as a triangle list.
#[derive(Debug, Clone)]
pub struct LayerGeometry {
    /// Interleaved vertex positions `[x0, y0, x1, y1, ...]`.
    pub positions: Vec<f32>,
    /// Triangle-list indices into the positions array.
    pub indices: Vec<u32>,
    /// Axis-aligned bounding box of all vertices.
    pub bounds: BoundingBox,
    /// Number of vertices (`positions.len() / 2`).
    pub vertex_count: u32,
    /// Warning messages generated while meshing.
    pub warnings: Vec<String>,
}

/// Metadata returned to JavaScript for a parsed drill layer.
#[derive(Debug, Clone, Serialize)]
pub struct LayerMeta {
    /// Axis-aligned bounding box of the solid geometry.
    pub bounds: BoundingBox,
    /// Number of mesh vertices.
    pub vertex_count: u32,
    /// Number of triangle indices.
    pub index_count: u32,
    /// Number of drill hits plus slots.
    pub command_count: u32,
    /// Number of tools in the registry.
    pub tool_count: u32,
    /// Units of every coordinate and diameter (`"IN"` or `"MM"`).
    pub units: String,
    /// Number of warnings.
    pub warning_count: u32,
    /// Warning messages.
    pub warnings: Vec<String>,
}

/// Accumulator for building a triangle mesh incrementally.
///
/// Passed by mutable reference to the meshing functions.
/// Vertices and indices are collected in flat `Vec`s to minimize allocations.
#[derive(Debug)]
pub struct GeometryBuilder {
    positions: Vec<f32>,
    indices: Vec<u32>,
    bounds: BoundingBox,
    warnings: Vec<String>,
}

impl GeometryBuilder {
    /// Creates an empty builder.
    pub const fn new() -> Self {
        Self {
            positions: Vec::new(),
            indices: Vec::new(),
            bounds: BoundingBox::new(),
            warnings: Vec::new(),
        }
    }

    /// Adds a vertex and returns its index.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn push_vertex(&mut self, x: f64, y: f64) -> u32 {
        let idx = self.positions.len() / 2;
        self.positions.push(x as f32);
        self.positions.push(y as f32);
        self.bounds.update(x, y);
        idx as u32
    }

    /// Adds a triangle from three vertex indices.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.push(a);
        self.indices.push(b);
        self.indices.push(c);
    }

    /// Records a warning message.
    pub fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    /// Returns the current number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        u32::try_from(self.positions.len() / 2).unwrap_or(u32::MAX)
    }

    /// Consumes the builder and produces a [`LayerGeometry`].
    pub fn build(self) -> LayerGeometry {
        let vertex_count = u32::try_from(self.positions.len() / 2).unwrap_or(u32::MAX);
        LayerGeometry {
            positions: self.positions,
            indices: self.indices,
            bounds: self.bounds,
            vertex_count,
            warnings: self.warnings,
        }
    }
}

impl Default for GeometryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Saturating conversion for counts reported to the host.
pub fn saturate_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
