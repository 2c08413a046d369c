use proptest::prelude::*;
use std::collections::HashSet;

use wafercut_camtools::{isolate_part, router_path, Diagnostics};
use wafercut_core::{Point, Polyline, Segment};

/// Vertices of a regular polygon.
fn polygon(n: usize, radius: f64, cx: f64) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / n as f64;
            Point::new(cx + radius * a.cos(), radius * a.sin(), 0.0)
        })
        .collect()
}

fn decompose(vertices: &[Point]) -> Vec<Segment> {
    (0..vertices.len())
        .map(|i| Segment::new(vertices[i], vertices[(i + 1) % vertices.len()]))
        .collect()
}

/// Apply an input order and per-segment flips.
fn scramble(segments: &[Segment], order: &[usize], flips: &[bool]) -> Vec<Segment> {
    order
        .iter()
        .map(|&i| {
            if flips[i] {
                segments[i].reversed()
            } else {
                segments[i]
            }
        })
        .collect()
}

fn key(p: &Point) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

fn scrambled_polygon() -> impl Strategy<Value = (Vec<Point>, Vec<usize>, Vec<bool>)> {
    (3usize..40, 0.5f64..100.0).prop_flat_map(|(n, radius)| {
        (
            Just(polygon(n, radius, 0.0)),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            prop::collection::vec(any::<bool>(), n),
        )
    })
}

proptest! {
    #[test]
    fn stitching_round_trip((vertices, order, flips) in scrambled_polygon()) {
        let segments = scramble(&decompose(&vertices), &order, &flips);
        let mut diags = Diagnostics::new();
        let polylines = isolate_part(&segments, 0.0, &mut diags);

        prop_assert_eq!(polylines.len(), 1);
        let loop_ = &polylines[0];
        prop_assert!(loop_.is_closed());
        prop_assert_eq!(loop_.len(), vertices.len() + 1);

        let expected: HashSet<_> = vertices.iter().map(key).collect();
        let found: HashSet<_> = loop_.points().iter().map(key).collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn segments_are_conserved(
        a in 3usize..20,
        b in 3usize..20,
        order_seed in prop::collection::vec(any::<u32>(), 40),
    ) {
        let mut segments = decompose(&polygon(a, 3.0, 0.0));
        segments.extend(decompose(&polygon(b, 3.0, 20.0)));
        // deterministic shuffle driven by the generated keys
        let mut keyed: Vec<(u32, Segment)> = segments
            .iter()
            .enumerate()
            .map(|(i, s)| (order_seed[i], *s))
            .collect();
        keyed.sort_by_key(|(k, _)| *k);
        let segments: Vec<Segment> = keyed.into_iter().map(|(_, s)| s).collect();

        let mut diags = Diagnostics::new();
        let polylines = isolate_part(&segments, 0.0, &mut diags);

        prop_assert_eq!(polylines.len(), 2);
        let consumed: usize = polylines.iter().map(|p| p.len() - 1).sum();
        prop_assert_eq!(consumed, a + b);
    }

    #[test]
    fn zero_diameter_is_identity((vertices, _order, _flips) in scrambled_polygon()) {
        let mut points = vertices.clone();
        points.push(vertices[0]);
        let source = vec![Polyline::new(points)];
        let mut diags = Diagnostics::new();
        prop_assert_eq!(router_path(&source, 0.0, 0.0, &mut diags), source);
    }

    #[test]
    fn square_offset_magnitude(half in 0.5f64..50.0, diameter in 0.01f64..1.0) {
        let corners = [(-half, -half), (half, -half), (half, half), (-half, half), (-half, -half)];
        let square = Polyline::new(
            corners.iter().map(|&(x, y)| Point::new(x, y, 0.0)).collect(),
        );
        let mut diags = Diagnostics::new();
        let paths = router_path(&[square], diameter, 0.0, &mut diags);
        let expected = half + diameter / 2.0;
        for p in paths[0].points() {
            prop_assert!((p.x.abs() - expected).abs() < 1e-9);
            prop_assert!((p.y.abs() - expected).abs() < 1e-9);
        }
    }
}
