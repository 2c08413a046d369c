//! # Wafercut Core
//!
//! Core types and utilities for Wafercut.
//! Provides the geometry primitives used by the toolpath engine, the
//! slice data model (segments, polylines, toolpaths, bounds), unit
//! handling and the numeric formatter shared by every output sink.

pub mod error;
pub mod geometry;
pub mod polyline;
pub mod units;

pub use error::GeometryError;

pub use geometry::{
    line_line_intersect, offset, perpendicular, point_in_polygon, Line, Point, Vector,
};

pub use polyline::{Bounds, Polyline, Segment, Toolpath};

pub use units::{round_to_places, LengthUnit, MeasurementSystem, NumericFormatter};
