use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use wafercut_camtools::{
    isolate_part, router_path, Diagnostics, GcodeWriter, Mesh, MeshSegmentProvider, PassDriver,
};
use wafercut_core::{Point, Segment};
use wafercut_settings::{MachiningMode, RunConfig};

criterion_main!(benches);
criterion_group!(benches, isolate_bench, router_bench, contour_run_bench);

const SIDES: [usize; 4] = [16, 64, 256, 1024];

/// Segments of a regular polygon, reversed input order to defeat the seed
/// chain growing in one direction only.
fn ring(n: usize) -> Vec<Segment> {
    let points: Vec<Point> = (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / n as f64;
            Point::new(50.0 * a.cos(), 50.0 * a.sin(), 0.0)
        })
        .collect();
    (0..n)
        .rev()
        .map(|i| Segment::new(points[i], points[(i + 1) % n]))
        .collect()
}

fn isolate_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolate_part");
    for n in SIDES {
        let segments = ring(n);
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| {
                let mut diags = Diagnostics::new();
                black_box(isolate_part(black_box(&segments), 0.0, &mut diags))
            })
        });
    }
    group.finish();
}

fn router_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_path");
    for n in SIDES {
        let mut diags = Diagnostics::new();
        let polylines = isolate_part(&ring(n), 0.0, &mut diags);
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| {
                let mut diags = Diagnostics::new();
                black_box(router_path(black_box(&polylines), 3.175, 0.0, &mut diags))
            })
        });
    }
    group.finish();
}

fn contour_run_bench(c: &mut Criterion) {
    let mut config = RunConfig::default();
    config.machining.mode = MachiningMode::DescendingContour;
    config.tool.cut_depth = 0.5;
    let mesh = Mesh::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(100.0, 60.0, 20.0));

    c.bench_function("descending_contour_cuboid", |b| {
        b.iter(|| {
            let mut provider = MeshSegmentProvider::new(mesh.clone());
            let mut sink = GcodeWriter::new(Vec::new(), config.formatter());
            let mut driver = PassDriver::new(config.clone()).unwrap();
            black_box(driver.run(&mut provider, &mut sink).unwrap())
        })
    });
}
