//! # Loop Reconstruction
//!
//! Stitches the unordered segments of one slice into polylines.
//!
//! Segments live in an index-addressed arena with consumed flags; an endpoint
//! index maps every exact point to the segments touching it. A chain is
//! seeded with the first unconsumed segment and grown at both ends: each
//! round gathers every unconsumed segment touching the current head or tail,
//! then joins them in input order against the ends as they move. A candidate
//! that no longer touches either end stays in the arena for the next round.
//!
//! Segment endpoints must be bit-identical where they meet. Loop/open
//! classification and segment membership do not depend on input order; the
//! direction a loop is traversed in does.

use crate::diagnostics::{Diagnostic, Diagnostics};
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use wafercut_core::{Point, Polyline, Segment};

/// Hash key of a point: raw bits with negative zero folded into zero.
type PointKey = [u64; 3];

fn point_key(p: &Point) -> PointKey {
    let bits = |v: f64| if v == 0.0 { 0u64 } else { v.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Loop reconstructor for one slice height.
#[derive(Debug, Clone, Copy)]
pub struct LoopReconstructor {
    close_gaps: f64,
}

impl LoopReconstructor {
    /// Open chains whose ends are closer than `close_gaps` are closed into
    /// loops.
    pub fn new(close_gaps: f64) -> Self {
        Self { close_gaps }
    }

    /// Reconstruct polylines covering every segment exactly once.
    pub fn isolate(&self, segments: &[Segment], diagnostics: &mut Diagnostics) -> Vec<Polyline> {
        let mut endpoints: HashMap<PointKey, Vec<usize>> = HashMap::with_capacity(segments.len());
        for (i, seg) in segments.iter().enumerate() {
            let head = point_key(&seg.head);
            let tail = point_key(&seg.tail);
            endpoints.entry(head).or_default().push(i);
            if tail != head {
                endpoints.entry(tail).or_default().push(i);
            }
        }

        let mut consumed = vec![false; segments.len()];
        let mut polylines = Vec::new();
        let mut next_seed = 0;

        while let Some(seed) = (next_seed..segments.len()).find(|&i| !consumed[i]) {
            next_seed = seed + 1;
            consumed[seed] = true;
            let shape = polylines.len() + 1;

            let mut head = segments[seed].head;
            let mut tail = segments[seed].tail;
            let mut chain = VecDeque::from([tail, head]);

            loop {
                let at_head = unconsumed_at(&endpoints, &consumed, &head);
                let at_tail = unconsumed_at(&endpoints, &consumed, &tail);
                if at_head.is_empty() && at_tail.is_empty() {
                    break;
                }

                for (vertex, found) in [(&head, &at_head), (&tail, &at_tail)] {
                    if found.len() > 1 {
                        diagnostics.report(Diagnostic::NonManifoldVertex {
                            shape,
                            x: vertex.x,
                            y: vertex.y,
                            candidates: found.len(),
                        });
                    }
                }

                let mut adjacent = at_head;
                adjacent.extend(at_tail);
                adjacent.sort_unstable();
                adjacent.dedup();

                for i in adjacent {
                    let seg = &segments[i];
                    if seg.head == head {
                        head = seg.tail;
                        chain.push_back(seg.tail);
                    } else if seg.tail == head {
                        head = seg.head;
                        chain.push_back(seg.head);
                    } else if seg.head == tail {
                        tail = seg.tail;
                        chain.push_front(seg.tail);
                    } else if seg.tail == tail {
                        tail = seg.head;
                        chain.push_front(seg.head);
                    } else {
                        debug!("Segment {} no longer touches shape {}, deferring", i, shape);
                        continue;
                    }
                    consumed[i] = true;
                }
            }

            let mut polyline = Polyline::new(chain.into());
            if !polyline.is_closed() {
                if let Some(gap) = polyline.gap() {
                    if gap < self.close_gaps {
                        polyline.close();
                        diagnostics.report(Diagnostic::GapClosed { shape, gap });
                    }
                }
            }
            debug!(
                "Shape {}: {} points, {}",
                shape,
                polyline.len(),
                if polyline.is_closed() { "loop" } else { "open" }
            );
            polylines.push(polyline);
        }

        polylines
    }
}

fn unconsumed_at(
    endpoints: &HashMap<PointKey, Vec<usize>>,
    consumed: &[bool],
    point: &Point,
) -> Vec<usize> {
    endpoints
        .get(&point_key(point))
        .map(|ids| ids.iter().copied().filter(|&i| !consumed[i]).collect())
        .unwrap_or_default()
}

/// Reconstruct the polylines of one slice.
pub fn isolate_part(
    segments: &[Segment],
    close_gaps: f64,
    diagnostics: &mut Diagnostics,
) -> Vec<Polyline> {
    LoopReconstructor::new(close_gaps).isolate(segments, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y, 0.0)
    }

    fn seg(a: (f64, f64), b: (f64, f64)) -> Segment {
        Segment::new(p(a.0, a.1), p(b.0, b.1))
    }

    fn square_segments() -> Vec<Segment> {
        vec![
            seg((0.0, 0.0), (1.0, 0.0)),
            seg((1.0, 0.0), (1.0, 1.0)),
            seg((1.0, 1.0), (0.0, 1.0)),
            seg((0.0, 1.0), (0.0, 0.0)),
        ]
    }

    #[test]
    fn test_square_in_order() {
        let mut diags = Diagnostics::new();
        let polys = isolate_part(&square_segments(), 0.0, &mut diags);
        assert_eq!(polys.len(), 1);
        assert!(polys[0].is_closed());
        assert_eq!(polys[0].len(), 5);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_square_shuffled_and_flipped() {
        let s = square_segments();
        let shuffled = vec![s[2].reversed(), s[0], s[3].reversed(), s[1]];
        let mut diags = Diagnostics::new();
        let polys = isolate_part(&shuffled, 0.0, &mut diags);
        assert_eq!(polys.len(), 1);
        assert!(polys[0].is_closed());
        assert_eq!(polys[0].len(), 5);
    }

    #[test]
    fn test_seed_orientation() {
        // seed contributes tail then head
        let mut diags = Diagnostics::new();
        let polys = isolate_part(&[seg((0.0, 0.0), (2.0, 0.0))], 0.0, &mut diags);
        assert_eq!(polys[0].points(), &[p(2.0, 0.0), p(0.0, 0.0)]);
        assert!(!polys[0].is_closed());
    }

    #[test]
    fn test_two_separate_loops() {
        let mut segs = square_segments();
        for s in square_segments() {
            segs.push(Segment::new(
                s.head + nalgebra::Vector3::new(5.0, 0.0, 0.0),
                s.tail + nalgebra::Vector3::new(5.0, 0.0, 0.0),
            ));
        }
        let mut diags = Diagnostics::new();
        let polys = isolate_part(&segs, 0.0, &mut diags);
        assert_eq!(polys.len(), 2);
        assert!(polys.iter().all(|p| p.is_closed()));
    }

    #[test]
    fn test_gap_closing_tolerance() {
        // a U of three sides whose ends are 0.5 apart
        let segs = vec![
            seg((0.0, 0.0), (0.0, 5.0)),
            seg((0.0, 5.0), (5.0, 5.0)),
            seg((5.0, 5.0), (0.5, 0.0)),
        ];

        let mut diags = Diagnostics::new();
        let closed = isolate_part(&segs, 1.0, &mut diags);
        assert_eq!(closed.len(), 1);
        assert!(closed[0].is_closed());
        assert_eq!(diags.count(|d| matches!(d, Diagnostic::GapClosed { .. })), 1);

        let mut diags = Diagnostics::new();
        let open = isolate_part(&segs, 0.1, &mut diags);
        assert_eq!(open.len(), 1);
        assert!(!open[0].is_closed());
        assert!(diags.is_empty());

        // a gap equal to the tolerance is not closed
        let mut diags = Diagnostics::new();
        let boundary = isolate_part(&segs, 0.5, &mut diags);
        assert!(!boundary[0].is_closed());
    }

    #[test]
    fn test_non_manifold_vertex_is_flagged() {
        // two triangles sharing the vertex at the origin
        let segs = vec![
            seg((0.0, 0.0), (1.0, 0.0)),
            seg((1.0, 0.0), (1.0, 1.0)),
            seg((1.0, 1.0), (0.0, 0.0)),
            seg((0.0, 0.0), (-1.0, 0.0)),
            seg((-1.0, 0.0), (-1.0, -1.0)),
            seg((-1.0, -1.0), (0.0, 0.0)),
        ];
        let mut diags = Diagnostics::new();
        let polys = isolate_part(&segs, 0.0, &mut diags);
        let total_points: usize = polys.iter().map(|p| p.len() - 1).sum();
        assert_eq!(total_points, segs.len());
        assert!(diags.count(|d| matches!(d, Diagnostic::NonManifoldVertex { .. })) >= 1);
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        let segs = vec![
            Segment::new(Point::new(-0.0, 0.0, 0.0), p(1.0, 0.0)),
            Segment::new(p(1.0, 0.0), p(0.0, 1.0)),
            Segment::new(p(0.0, 1.0), Point::new(0.0, -0.0, 0.0)),
        ];
        let mut diags = Diagnostics::new();
        let polys = isolate_part(&segs, 0.0, &mut diags);
        assert_eq!(polys.len(), 1);
        assert!(polys[0].is_closed());
    }

    #[test]
    fn test_empty_input() {
        let mut diags = Diagnostics::new();
        assert!(isolate_part(&[], 1.0, &mut diags).is_empty());
    }
}
