//! # Offset Path Generation
//!
//! Turns the closed polylines of a slice into tool centerlines offset by the
//! tool radius.
//!
//! For every directed edge `last -> point` the edge vector is `last - point`
//! and its offset is the clockwise perpendicular scaled to `d / 2`. The cut
//! side is decided once per shape: a probe point beside each edge midpoint
//! is tested against every closed polyline of the slice, each enclosure
//! flipping the vote, and the averaged vote is rounded to a single sign.
//! Offset lines through the shifted edge endpoints are then intersected in
//! turn to get the mitered corners.

use crate::diagnostics::{Diagnostic, Diagnostics};
use tracing::debug;
use wafercut_core::{
    line_line_intersect, offset, perpendicular, point_in_polygon, Line, Point, Polyline,
    Toolpath, Vector,
};

/// Offset path generator for a given tool diameter.
#[derive(Debug, Clone, Copy)]
pub struct OffsetPathGenerator {
    diameter: f64,
}

impl OffsetPathGenerator {
    pub fn new(diameter: f64) -> Self {
        Self { diameter }
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    /// One toolpath per polyline, in the same order.
    ///
    /// With a zero diameter every polyline is returned unchanged, open or not.
    /// Otherwise open polylines yield an empty toolpath.
    pub fn generate(
        &self,
        polylines: &[Polyline],
        height: f64,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Toolpath> {
        if self.diameter == 0.0 {
            return polylines.to_vec();
        }

        let loops: Vec<&Polyline> = polylines.iter().filter(|p| p.is_closed()).collect();
        polylines
            .iter()
            .enumerate()
            .map(|(i, polyline)| self.offset_polyline(i + 1, polyline, &loops, height, diagnostics))
            .collect()
    }

    /// Compensated path for a single polyline. `loops` are the closed
    /// polylines of the slice that vote on the cut side.
    pub fn offset_polyline(
        &self,
        shape: usize,
        polyline: &Polyline,
        loops: &[&Polyline],
        height: f64,
        diagnostics: &mut Diagnostics,
    ) -> Toolpath {
        if !polyline.is_closed() {
            diagnostics.report(Diagnostic::OpenLoop {
                shape,
                gap: polyline.gap().unwrap_or(0.0),
            });
            return Toolpath::default();
        }

        let edges = self.edge_offsets(shape, polyline, diagnostics);
        if edges.is_empty() {
            return Toolpath::default();
        }

        let sign = self.resolve_side(shape, &edges, loops, height, diagnostics);
        debug!("Shape {}: {} edges, cut side {}", shape, edges.len(), sign);

        let lines: Vec<Line> = edges
            .iter()
            .map(|e| {
                let mut through = offset(&e.end, &(e.offset * sign));
                through.z = height;
                Line::new(through, e.direction)
            })
            .collect();

        let mut path = Vec::with_capacity(lines.len() + 1);
        for (i, pair) in lines.windows(2).enumerate() {
            match line_line_intersect(&pair[0], &pair[1]) {
                Ok(corner) => path.push(corner),
                Err(e) => {
                    debug!("Shape {} vertex {}: {}", shape, i + 1, e);
                    diagnostics.report(Diagnostic::DegenerateCorner {
                        shape,
                        vertex: i + 1,
                    });
                }
            }
        }
        if let (Some(last), Some(first)) = (lines.last(), lines.first()) {
            match line_line_intersect(last, first) {
                Ok(corner) => path.push(corner),
                Err(e) => {
                    debug!("Shape {} vertex 0: {}", shape, e);
                    diagnostics.report(Diagnostic::DegenerateCorner { shape, vertex: 0 });
                }
            }
        }

        let mut toolpath = Toolpath::new(path);
        if !toolpath.is_empty() && !toolpath.is_closed() {
            toolpath.close();
        }
        toolpath
    }

    /// Edge vectors and unsigned offsets of every non-degenerate edge.
    fn edge_offsets(
        &self,
        shape: usize,
        polyline: &Polyline,
        diagnostics: &mut Diagnostics,
    ) -> Vec<EdgeOffset> {
        let mut edges = Vec::with_capacity(polyline.len());
        for (i, (last, point)) in polyline.edges().enumerate() {
            let mut direction: Vector = last - point;
            direction.z = 0.0;
            let normal = perpendicular(&direction);
            let length = normal.norm();
            if length == 0.0 {
                diagnostics.report(Diagnostic::DegenerateEdge { shape, edge: i + 1 });
                continue;
            }
            edges.push(EdgeOffset {
                start: *last,
                end: *point,
                direction,
                offset: normal * (self.radius() / length),
            });
        }
        edges
    }

    /// Single cut-side sign for the whole shape.
    fn resolve_side(
        &self,
        shape: usize,
        edges: &[EdgeOffset],
        loops: &[&Polyline],
        height: f64,
        diagnostics: &mut Diagnostics,
    ) -> f64 {
        let mut total = 0.0;
        for edge in edges {
            let midpoint = Point::from((edge.start.coords + edge.end.coords) * 0.5);
            let mut probe = offset(&midpoint, &edge.offset);
            probe.z = height;

            let mut vote = 1.0;
            for candidate in loops {
                if point_in_polygon(&probe, candidate.points()).unwrap_or(false) {
                    vote = -vote;
                }
            }
            total += vote;
        }

        let average = total / edges.len() as f64;
        let sign = average.round();
        if sign == 0.0 {
            diagnostics.report(Diagnostic::AmbiguousSide { shape, average });
            if average < 0.0 {
                -1.0
            } else {
                1.0
            }
        } else {
            sign.signum()
        }
    }
}

struct EdgeOffset {
    start: Point,
    end: Point,
    direction: Vector,
    offset: Vector,
}

/// Compensated toolpaths for the polylines of one slice.
pub fn router_path(
    polylines: &[Polyline],
    diameter: f64,
    height: f64,
    diagnostics: &mut Diagnostics,
) -> Vec<Toolpath> {
    OffsetPathGenerator::new(diameter).generate(polylines, height, diagnostics)
}
