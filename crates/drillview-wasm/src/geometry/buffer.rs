//! Buffering of drill points and slot segments into polygons.
//!
//! Circles are linearized with `quadrant_segments` segments per quarter
//! turn. Vertices start at angle zero and run clockwise, and every ring is
//! closed by repeating its first point.

use std::f64::consts::FRAC_PI_2;

use crate::excellon::types::JoinStyle;

use super::types::{Point, Polygon};

const ZERO_LENGTH_EPSILON: f64 = 1e-12;

/// Buffer a drill point into a circular polygon.
pub fn buffer_point(center: Point, radius: f64, quadrant_segments: u32) -> Polygon {
    let segments = quadrant_segments.max(1);
    let step = FRAC_PI_2 / f64::from(segments);
    let total = segments * 4;

    let mut ring = Vec::with_capacity(total as usize + 1);
    for i in 0..total {
        let angle = -step * f64::from(i);
        ring.push(polar(center, radius, angle));
    }
    close_ring(&mut ring);
    Polygon::from_exterior(ring)
}

/// Buffer a slot segment into a capsule (or a box, depending on `join`).
///
/// A zero-length segment is buffered as a point.
pub fn buffer_segment(
    start: Point,
    stop: Point,
    radius: f64,
    quadrant_segments: u32,
    join: JoinStyle,
) -> Polygon {
    let delta_x = stop.x - start.x;
    let delta_y = stop.y - start.y;
    let length = delta_x.hypot(delta_y);
    if length <= ZERO_LENGTH_EPSILON {
        return buffer_point(start, radius, quadrant_segments);
    }

    let direction = Point::new(delta_x / length, delta_y / length);
    let normal = Point::new(-direction.y, direction.x);
    let offset = |p: Point, along: f64, across: f64| Point {
        x: direction.x.mul_add(along, normal.x.mul_add(across, p.x)),
        y: direction.y.mul_add(along, normal.y.mul_add(across, p.y)),
    };

    let mut ring = match join {
        JoinStyle::Round => {
            let segments = quadrant_segments.max(1);
            let heading = direction.y.atan2(direction.x);
            let mut ring = Vec::with_capacity(segments as usize * 4 + 3);
            ring.push(offset(start, 0.0, radius));
            ring.push(offset(stop, 0.0, radius));
            push_end_cap(&mut ring, stop, radius, heading + FRAC_PI_2, segments);
            ring.push(offset(stop, 0.0, -radius));
            ring.push(offset(start, 0.0, -radius));
            push_end_cap(&mut ring, start, radius, heading - FRAC_PI_2, segments);
            ring
        }
        JoinStyle::Square => vec![
            offset(start, -radius, radius),
            offset(stop, radius, radius),
            offset(stop, radius, -radius),
            offset(start, -radius, -radius),
        ],
        JoinStyle::Bevel => vec![
            offset(start, 0.0, radius),
            offset(stop, 0.0, radius),
            offset(stop, 0.0, -radius),
            offset(start, 0.0, -radius),
        ],
    };
    close_ring(&mut ring);
    Polygon::from_exterior(ring)
}

/// Interior vertices of a clockwise half circle starting at `start_angle`.
fn push_end_cap(
    ring: &mut Vec<Point>,
    center: Point,
    radius: f64,
    start_angle: f64,
    segments: u32,
) {
    let step = FRAC_PI_2 / f64::from(segments);
    for k in 1..segments * 2 {
        let angle = start_angle - step * f64::from(k);
        ring.push(polar(center, radius, angle));
    }
}

fn polar(center: Point, radius: f64, angle: f64) -> Point {
    Point {
        x: radius.mul_add(angle.cos(), center.x),
        y: radius.mul_add(angle.sin(), center.y),
    }
}

fn close_ring(ring: &mut Vec<Point>) {
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
}
