//! Slice data model
//!
//! Segments come out of a segment provider for one slice height, polylines
//! come out of the loop reconstructor and toolpaths out of the offset path
//! generator. All three are plain values; nothing downstream mutates the
//! points of an upstream stage.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// One crossing of a boundary face with the slicing plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub head: Point,
    pub tail: Point,
}

impl Segment {
    pub fn new(head: Point, tail: Point) -> Self {
        Self { head, tail }
    }

    /// The same segment traversed the other way.
    pub fn reversed(&self) -> Self {
        Self {
            head: self.tail,
            tail: self.head,
        }
    }

    pub fn length(&self) -> f64 {
        (self.tail - self.head).norm()
    }
}

/// An ordered chain of points; a loop when the first and last point are equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// A loop has at least two points and ends exactly where it starts.
    pub fn is_closed(&self) -> bool {
        self.points.len() >= 2 && self.points.first() == self.points.last()
    }

    /// Distance between the two ends, `None` for an empty polyline.
    pub fn gap(&self) -> Option<f64> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((last - first).norm()),
            _ => None,
        }
    }

    /// Consecutive point pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Close the polyline by appending a copy of its first point.
    pub fn close(&mut self) {
        if let Some(first) = self.points.first().copied() {
            if self.points.last() != Some(&first) || self.points.len() < 2 {
                self.points.push(first);
            }
        }
    }

    /// Axis aligned bounds of the points, `None` when empty.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.points.iter())
    }
}

impl From<Vec<Point>> for Polyline {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Ordered tool centerline points for one source polyline.
///
/// An empty toolpath marks a shape that could not be compensated.
pub type Toolpath = Polyline;

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self::new(first, first);
        for p in iter {
            bounds.include(p);
        }
        Some(bounds)
    }

    pub fn include(&mut self, p: &Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn bottom(&self) -> f64 {
        self.min.z
    }

    pub fn top(&self) -> f64 {
        self.max.z
    }

    /// Z extent of the box.
    pub fn thickness(&self) -> f64 {
        self.max.z - self.min.z
    }

    /// Y extent of the box.
    pub fn depth_y(&self) -> f64 {
        self.max.y - self.min.y
    }
}
