//! Geometry primitives
//!
//! Points and vectors are `nalgebra` `Point3<f64>` / `Vector3<f64>` in model
//! length units. Every operation here works in the XY machining plane; Z is
//! carried along but never participates in a 2D decision.

use crate::error::GeometryError;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A point in model space.
pub type Point = Point3<f64>;

/// A vector in model space.
pub type Vector = Vector3<f64>;

/// Sine of the smallest angle two lines may enclose and still be intersected.
const PARALLEL_TOLERANCE: f64 = 1e-9;

/// Translate a point by a vector.
pub fn offset(point: &Point, vector: &Vector) -> Point {
    point + vector
}

/// Rotate a vector a quarter turn clockwise in the XY plane: `(x, y) -> (y, -x)`.
///
/// The Z component is dropped, so the XY magnitude is preserved. The offset
/// path generator relies on this exact rotation sense to decide which side
/// of a directed edge a candidate point lies on.
pub fn perpendicular(vector: &Vector) -> Vector {
    Vector::new(vector.y, -vector.x, 0.0)
}

/// An infinite line in the XY plane given as a point and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub point: Point,
    pub direction: Vector,
}

impl Line {
    pub fn new(point: Point, direction: Vector) -> Self {
        Self { point, direction }
    }

    /// Point on the line at parameter `t`.
    pub fn at(&self, t: f64) -> Point {
        self.point + self.direction * t
    }
}

/// Intersect two lines in the XY plane.
///
/// Solves `a.point + t * a.direction = b.point + s * b.direction` for `t`.
/// The returned point takes its Z from `a`. Parallel or coincident lines and
/// zero-length directions are reported as errors, never as a panic.
pub fn line_line_intersect(a: &Line, b: &Line) -> Result<Point, GeometryError> {
    let da = a.direction.xy();
    let db = b.direction.xy();
    let la = da.norm();
    let lb = db.norm();
    if la == 0.0 || lb == 0.0 {
        return Err(GeometryError::ZeroLengthDirection);
    }

    let cross = da.perp(&db);
    if cross.abs() <= PARALLEL_TOLERANCE * la * lb {
        return Err(GeometryError::ParallelLines { cross });
    }

    let delta = (b.point - a.point).xy();
    let t = delta.perp(&db) / cross;
    let mut hit = a.at(t);
    hit.z = a.point.z;
    Ok(hit)
}

/// Parity ray casting test in XY.
///
/// `polygon` must be closed (first point equal to last). Points exactly on
/// an edge may fall on either side.
pub fn point_in_polygon(point: &Point, polygon: &[Point]) -> Result<bool, GeometryError> {
    if polygon.len() < 2 {
        return Err(GeometryError::TooFewPoints {
            required: 2,
            actual: polygon.len(),
        });
    }
    let first = polygon[0];
    let last = polygon[polygon.len() - 1];
    if first != last {
        return Err(GeometryError::OpenPolygon {
            first_x: first.x,
            first_y: first.y,
            last_x: last.x,
            last_y: last.y,
        });
    }

    let mut inside = false;
    for edge in polygon.windows(2) {
        let (pi, pj) = (&edge[0], &edge[1]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = pi.x + (point.y - pi.y) * (pj.x - pi.x) / (pj.y - pi.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
    }
    Ok(inside)
}
