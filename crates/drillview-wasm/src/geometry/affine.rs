//! 2D affine matrices for the drill transforms.
//!
//! The matrix maps `(x, y)` to `(a·x + b·y + xoff, d·x + e·y + yoff)`.

use super::types::Point;

/// A 2D affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    a: f64,
    b: f64,
    d: f64,
    e: f64,
    xoff: f64,
    yoff: f64,
}

impl Affine {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        d: 0.0,
        e: 1.0,
        xoff: 0.0,
        yoff: 0.0,
    };

    /// Translation by `(dx, dy)`.
    pub const fn translate(dx: f64, dy: f64) -> Self {
        Self {
            xoff: dx,
            yoff: dy,
            ..Self::IDENTITY
        }
    }

    /// Scale by `(x_factor, y_factor)` keeping `origin` fixed.
    pub fn scale(x_factor: f64, y_factor: f64, origin: Point) -> Self {
        Self {
            a: x_factor,
            b: 0.0,
            d: 0.0,
            e: y_factor,
            xoff: x_factor.mul_add(-origin.x, origin.x),
            yoff: y_factor.mul_add(-origin.y, origin.y),
        }
    }

    /// Counter-clockwise rotation by `angle_deg` about `origin`.
    pub fn rotate(angle_deg: f64, origin: Point) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        Self {
            a: cos,
            b: -sin,
            d: sin,
            e: cos,
            xoff: origin.x - origin.x * cos + origin.y * sin,
            yoff: origin.y - origin.x * sin - origin.y * cos,
        }
    }

    /// Shear by `angle_x_deg` along X and `angle_y_deg` along Y about `origin`.
    pub fn skew(angle_x_deg: f64, angle_y_deg: f64, origin: Point) -> Self {
        let tan_x = angle_x_deg.to_radians().tan();
        let tan_y = angle_y_deg.to_radians().tan();
        Self {
            a: 1.0,
            b: tan_x,
            d: tan_y,
            e: 1.0,
            xoff: -origin.y * tan_x,
            yoff: -origin.x * tan_y,
        }
    }

    /// Applies the transform to a point.
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a.mul_add(p.x, self.b.mul_add(p.y, self.xoff)),
            y: self.d.mul_add(p.x, self.e.mul_add(p.y, self.yoff)),
        }
    }
}
