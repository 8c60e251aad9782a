//! Triangle mesh export for drill polygons.
//!
//! Converts closed polygons (exterior plus optional holes) into a triangle
//! list using the `earclip` ear-clipping triangulation algorithm.

use super::types::{GeometryBuilder, LayerGeometry, Point, Polygon};

const POINT_EQUALITY_EPSILON: f64 = 1e-9;

/// Triangulate every polygon into one mesh.
///
/// Polygons that cannot be triangulated are skipped with a warning.
pub fn triangulate(polygons: &[Polygon]) -> LayerGeometry {
    let mut builder = GeometryBuilder::new();
    for polygon in polygons {
        fill_polygon(&mut builder, polygon);
    }
    builder.build()
}

/// Add one polygon's triangles to `builder`.
pub fn fill_polygon(builder: &mut GeometryBuilder, polygon: &Polygon) {
    let exterior = open_ring(&polygon.exterior);
    if exterior.len() < 3 {
        builder.warn(format!(
            "polygon exterior has {} point(s); need at least 3; skipping polygon",
            exterior.len()
        ));
        return;
    }

    let mut flat = Vec::with_capacity(exterior.len() * 2);
    push_ring(&mut flat, exterior);

    let mut holes = Vec::with_capacity(polygon.interiors.len());
    for interior in &polygon.interiors {
        let ring = open_ring(interior);
        if ring.len() < 3 {
            continue;
        }
        holes.push(flat.len() / 2);
        push_ring(&mut flat, ring);
    }

    let indices = earclip::earcut::earcut(&flat, &holes, 2);
    if indices.is_empty() {
        builder.warn("earclip produced no triangles for polygon; skipping".to_string());
        return;
    }

    let base_vertex = emit_vertices(builder, &flat);
    if !emit_triangles(builder, &indices, base_vertex) {
        builder.warn("mesh vertex index overflow; polygon truncated".to_string());
    }
}

/// Ring without its repeated closing point.
fn open_ring(ring: &[Point]) -> &[Point] {
    match ring {
        [first, .., last] if points_approx_equal(*first, *last) => {
            ring.get(..ring.len() - 1).unwrap_or(ring)
        }
        _ => ring,
    }
}

fn push_ring(flat: &mut Vec<f64>, ring: &[Point]) {
    for point in ring {
        flat.push(point.x);
        flat.push(point.y);
    }
}

/// Push all vertices from the flat coordinate buffer and return the first vertex index.
fn emit_vertices(builder: &mut GeometryBuilder, flat: &[f64]) -> u32 {
    let mut first: Option<u32> = None;
    for pair in flat.chunks_exact(2) {
        if let [x, y] = *pair {
            let idx = builder.push_vertex(x, y);
            first.get_or_insert(idx);
        }
    }
    first.unwrap_or(0)
}

/// Convert earclip triangle indices (relative to the flat buffer) into
/// `GeometryBuilder` triangle calls using the base vertex offset.
///
/// Returns `false` if an index does not fit in `u32`.
fn emit_triangles(builder: &mut GeometryBuilder, indices: &[usize], base_vertex: u32) -> bool {
    for tri in indices.chunks_exact(3) {
        if let [ia, ib, ic] = *tri {
            let (Some(a), Some(b), Some(c)) = (
                offset_index(base_vertex, ia),
                offset_index(base_vertex, ib),
                offset_index(base_vertex, ic),
            ) else {
                return false;
            };
            builder.push_triangle(a, b, c);
        }
    }
    true
}

fn offset_index(base: u32, offset: usize) -> Option<u32> {
    base.checked_add(u32::try_from(offset).ok()?)
}

fn points_approx_equal(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= POINT_EQUALITY_EPSILON && (a.y - b.y).abs() <= POINT_EQUALITY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excellon::types::JoinStyle;
    use crate::geometry::buffer::{buffer_point, buffer_segment};

    fn square(size: f64, offset: f64) -> Vec<Point> {
        vec![
            Point::new(offset, offset),
            Point::new(offset + size, offset),
            Point::new(offset + size, offset + size),
            Point::new(offset, offset + size),
            Point::new(offset, offset),
        ]
    }

    fn triangle_count(geom: &LayerGeometry) -> usize {
        geom.indices.len() / 3
    }

    #[test]
    fn ut_mesh_001_closed_square_drops_closing_point() {
        let geom = triangulate(&[Polygon::from_exterior(square(1.0, 0.0))]);
        assert_eq!(geom.vertex_count, 4);
        assert_eq!(triangle_count(&geom), 2);
    }

    #[test]
    fn ut_mesh_002_drill_circle_is_a_fan_of_ring_vertices() {
        let circle = buffer_point(Point::new(3.0, 4.0), 1.0, 4);
        let geom = triangulate(&[circle]);
        assert_eq!(geom.vertex_count, 16);
        assert_eq!(triangle_count(&geom), 14);
        assert!((geom.bounds.min_x - 2.0).abs() < 1e-6);
        assert!((geom.bounds.max_y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn ut_mesh_003_interior_ring_becomes_a_hole() {
        let mut polygon = Polygon::from_exterior(square(4.0, 0.0));
        polygon.interiors.push(square(2.0, 1.0));
        let geom = triangulate(&[polygon]);
        assert_eq!(geom.vertex_count, 8);
        assert_eq!(triangle_count(&geom), 8);
    }

    #[test]
    fn ut_mesh_004_indices_offset_across_polygons() {
        let slot = buffer_segment(
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            0.5,
            4,
            JoinStyle::Round,
        );
        let geom = triangulate(&[Polygon::from_exterior(square(1.0, 10.0)), slot]);
        assert_eq!(geom.positions.len(), geom.vertex_count as usize * 2);
        assert!(geom.indices.iter().all(|&i| i < geom.vertex_count));
        assert!(geom.indices.iter().any(|&i| i >= 4), "second polygon offset");
    }

    #[test]
    fn bc_mesh_001_degenerate_polygon_skips_with_warning() {
        let geom = triangulate(&[Polygon::from_exterior(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ])]);
        assert_eq!(geom.vertex_count, 0);
        assert!(geom.warnings.iter().any(|w| w.contains("2 point(s)")));
    }

    #[test]
    fn bc_mesh_002_empty_input_yields_empty_mesh() {
        let geom = triangulate(&[]);
        assert!(geom.positions.is_empty());
        assert!(geom.indices.is_empty());
        assert!(geom.warnings.is_empty());
    }
}
