//! Error handling for Wafercut
//!
//! Geometry errors raised by the primitives when an operation has no
//! meaningful answer for its input.

use thiserror::Error;

/// Geometry error type
///
/// Raised by the geometry primitives when an operation has no meaningful
/// answer for its input. Callers in the toolpath engine turn these into
/// per-vertex or per-shape diagnostics rather than aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Two lines are parallel or coincident
    #[error("Lines are parallel or coincident (cross product {cross})")]
    ParallelLines {
        /// The 2D cross product of the two direction vectors.
        cross: f64,
    },

    /// A direction vector has zero length
    #[error("Direction vector has zero length")]
    ZeroLengthDirection,

    /// A polygon test was asked for on an open polyline
    #[error("Polygon is not closed: starts at ({first_x}, {first_y}), ends at ({last_x}, {last_y})")]
    OpenPolygon {
        /// X of the first point.
        first_x: f64,
        /// Y of the first point.
        first_y: f64,
        /// X of the last point.
        last_x: f64,
        /// Y of the last point.
        last_y: f64,
    },

    /// A polyline has too few points for the requested operation
    #[error("Polyline needs at least {required} points, got {actual}")]
    TooFewPoints {
        /// Minimum number of points required.
        required: usize,
        /// Number of points supplied.
        actual: usize,
    },
}
