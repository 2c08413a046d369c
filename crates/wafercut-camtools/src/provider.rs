//! # Segment Providers
//!
//! A [`SegmentProvider`] answers two questions about the part: how far it
//! extends, and which unordered line segments make up its cross-section at a
//! given height.
//!
//! [`MeshSegmentProvider`] slices a triangle mesh (usually read from STL).
//! Segments it produces meet at bit-identical endpoints: a crossing on an
//! edge shared by two triangles is always interpolated from the same,
//! canonically ordered pair of vertices.

use crate::error::{ProviderError, ProviderResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info};
use wafercut_core::{Bounds, Point, Segment};

/// Source of the raw segments of each slice.
pub trait SegmentProvider {
    /// Bounding box of the part, `None` when there is nothing to cut.
    fn bounds(&self) -> Option<Bounds>;

    /// Unordered segments of the cross-section at height `z`, all with
    /// `z` as their Z coordinate.
    fn segments_at(&mut self, z: f64) -> ProviderResult<Vec<Segment>>;
}

impl<T: SegmentProvider + ?Sized> SegmentProvider for &mut T {
    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }

    fn segments_at(&mut self, z: f64) -> ProviderResult<Vec<Segment>> {
        (**self).segments_at(z)
    }
}

fn check_height(z: f64) -> ProviderResult<()> {
    if z.is_finite() {
        Ok(())
    } else {
        Err(ProviderError::InvalidHeight(z))
    }
}

/// A prism: the same outline at every height between `bottom` and `top`.
#[derive(Debug, Clone)]
pub struct StaticSegmentProvider {
    segments: Vec<Segment>,
    bounds: Option<Bounds>,
}

impl StaticSegmentProvider {
    pub fn new(segments: Vec<Segment>, bottom: f64, top: f64) -> Self {
        let bounds = Bounds::from_points(segments.iter().flat_map(|s| [&s.head, &s.tail])).map(
            |b| {
                Bounds::new(
                    Point::new(b.min.x, b.min.y, bottom.min(top)),
                    Point::new(b.max.x, b.max.y, bottom.max(top)),
                )
            },
        );
        Self { segments, bounds }
    }

    /// Prism over a closed outline given as its corner points.
    pub fn from_outline(corners: &[(f64, f64)], bottom: f64, top: f64) -> Self {
        let segments = corners
            .iter()
            .zip(corners.iter().cycle().skip(1))
            .map(|(a, b)| Segment::new(Point::new(a.0, a.1, 0.0), Point::new(b.0, b.1, 0.0)))
            .collect();
        Self::new(segments, bottom, top)
    }
}

impl SegmentProvider for StaticSegmentProvider {
    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn segments_at(&mut self, z: f64) -> ProviderResult<Vec<Segment>> {
        check_height(z)?;
        let Some(bounds) = self.bounds else {
            return Ok(Vec::new());
        };
        if z < bounds.bottom() || z > bounds.top() {
            return Ok(Vec::new());
        }
        Ok(self
            .segments
            .iter()
            .map(|s| {
                Segment::new(
                    Point::new(s.head.x, s.head.y, z),
                    Point::new(s.tail.x, s.tail.y, z),
                )
            })
            .collect())
    }
}

/// A triangle in model units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Point; 3],
}

impl Triangle {
    pub fn new(a: Point, b: Point, c: Point) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Cross-section of the triangle with the plane at height `z`.
    ///
    /// Triangles lying in the plane contribute nothing; their outline comes
    /// from the neighbouring faces. An edge lying in the plane is returned
    /// as is.
    pub fn slice(&self, z: f64) -> Option<Segment> {
        let d = self.vertices.map(|v| v.z - z);
        let on_plane: Vec<usize> = (0..3).filter(|&i| d[i] == 0.0).collect();

        match on_plane.len() {
            3 => None,
            2 => Some(Segment::new(
                flatten(&self.vertices[on_plane[0]], z),
                flatten(&self.vertices[on_plane[1]], z),
            )),
            _ => {
                let mut points: Vec<Point> = on_plane
                    .iter()
                    .map(|&i| flatten(&self.vertices[i], z))
                    .collect();
                for (i, j) in [(0, 1), (1, 2), (2, 0)] {
                    if (d[i] < 0.0 && d[j] > 0.0) || (d[i] > 0.0 && d[j] < 0.0) {
                        points.push(crossing(&self.vertices[i], &self.vertices[j], z));
                    }
                }
                match points.as_slice() {
                    [a, b] if a != b => Some(Segment::new(*a, *b)),
                    _ => None,
                }
            }
        }
    }
}

fn flatten(p: &Point, z: f64) -> Point {
    Point::new(p.x, p.y, z)
}

/// Plane crossing of edge `a`-`b`, computed from the lexicographically
/// smaller endpoint so both faces sharing the edge get identical bits.
fn crossing(a: &Point, b: &Point, z: f64) -> Point {
    let (lo, hi) = if (a.x, a.y, a.z) <= (b.x, b.y, b.z) {
        (a, b)
    } else {
        (b, a)
    };
    let t = (z - lo.z) / (hi.z - lo.z);
    Point::new(lo.x + t * (hi.x - lo.x), lo.y + t * (hi.y - lo.y), z)
}

/// Triangle mesh of the part.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    triangles: Vec<Triangle>,
    bounds: Option<Bounds>,
}

impl Mesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        let bounds = Bounds::from_points(triangles.iter().flat_map(|t| t.vertices.iter()));
        Self { triangles, bounds }
    }

    /// Axis-aligned box spanning `min` to `max`, two triangles per face.
    pub fn cuboid(min: Point, max: Point) -> Self {
        let c = |i: u8, j: u8, k: u8| {
            Point::new(
                if i == 0 { min.x } else { max.x },
                if j == 0 { min.y } else { max.y },
                if k == 0 { min.z } else { max.z },
            )
        };
        let quads = [
            [c(0, 0, 0), c(0, 1, 0), c(1, 1, 0), c(1, 0, 0)],
            [c(0, 0, 1), c(1, 0, 1), c(1, 1, 1), c(0, 1, 1)],
            [c(0, 0, 0), c(1, 0, 0), c(1, 0, 1), c(0, 0, 1)],
            [c(0, 1, 0), c(0, 1, 1), c(1, 1, 1), c(1, 1, 0)],
            [c(0, 0, 0), c(0, 0, 1), c(0, 1, 1), c(0, 1, 0)],
            [c(1, 0, 0), c(1, 1, 0), c(1, 1, 1), c(1, 0, 1)],
        ];
        let triangles = quads
            .iter()
            .flat_map(|q| [Triangle::new(q[0], q[1], q[2]), Triangle::new(q[0], q[2], q[3])])
            .collect();
        Self::new(triangles)
    }

    pub fn from_stl_mesh(stl_mesh: &stl_io::IndexedMesh) -> Self {
        let vertex = |idx: usize| {
            stl_mesh
                .vertices
                .get(idx)
                .map(|v| Point::new(v[0] as f64, v[1] as f64, v[2] as f64))
        };

        let triangles = stl_mesh
            .faces
            .iter()
            .filter_map(|face| {
                Some(Triangle::new(
                    vertex(face.vertices[0])?,
                    vertex(face.vertices[1])?,
                    vertex(face.vertices[2])?,
                ))
            })
            .collect();
        Self::new(triangles)
    }

    /// Read an ASCII or binary STL stream.
    pub fn from_stl_reader<R: Read + Seek>(reader: &mut R, name: &str) -> ProviderResult<Self> {
        let stl = stl_io::read_stl(reader).map_err(|e| ProviderError::ParseError {
            path: name.to_string(),
            reason: e.to_string(),
        })?;
        debug!("STL {} contains {} faces", name, stl.faces.len());

        let mesh = Self::from_stl_mesh(&stl);
        if mesh.is_empty() {
            return Err(ProviderError::EmptyModel(name.to_string()));
        }
        Ok(mesh)
    }

    pub fn from_stl_file(path: &Path) -> ProviderResult<Self> {
        let is_stl = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("stl"));
        if !is_stl {
            return Err(ProviderError::UnsupportedFormat(path.display().to_string()));
        }

        let mut file = File::open(path)?;
        let mesh = Self::from_stl_reader(&mut file, &path.display().to_string())?;
        info!(
            "Loaded {} triangles from {}",
            mesh.triangles.len(),
            path.display()
        );
        Ok(mesh)
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Unique cross-section segments at height `z`.
    pub fn slice(&self, z: f64) -> Vec<Segment> {
        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for segment in self.triangles.iter().filter_map(|t| t.slice(z)) {
            let a = point_bits(&segment.head);
            let b = point_bits(&segment.tail);
            let key = if a <= b { (a, b) } else { (b, a) };
            if seen.insert(key) {
                segments.push(segment);
            }
        }
        segments
    }
}

fn point_bits(p: &Point) -> [u64; 3] {
    let bits = |v: f64| if v == 0.0 { 0u64 } else { v.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Segment provider slicing a triangle mesh.
#[derive(Debug, Clone)]
pub struct MeshSegmentProvider {
    mesh: Mesh,
}

impl MeshSegmentProvider {
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh }
    }

    pub fn from_stl_file(path: &Path) -> ProviderResult<Self> {
        Ok(Self::new(Mesh::from_stl_file(path)?))
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

impl SegmentProvider for MeshSegmentProvider {
    fn bounds(&self) -> Option<Bounds> {
        self.mesh.bounds()
    }

    fn segments_at(&mut self, z: f64) -> ProviderResult<Vec<Segment>> {
        check_height(z)?;
        let segments = self.mesh.slice(z);
        debug!("Sliced {} segments at Z {}", segments.len(), z);
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn unit_cube() -> Mesh {
        Mesh::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(10.0, 10.0, 10.0))
    }

    #[test]
    fn test_triangle_crossing() {
        let tri = Triangle::new(
            Point::new(0.0, 0.0, 0.0),
            Point::new(4.0, 0.0, 0.0),
            Point::new(0.0, 0.0, 4.0),
        );
        let seg = tri.slice(2.0).unwrap();
        assert_eq!(seg.head.z, 2.0);
        assert_eq!(seg.tail.z, 2.0);
        let xs = [seg.head.x, seg.tail.x];
        assert!(xs.contains(&0.0) && xs.contains(&2.0));
    }

    #[test]
    fn test_triangle_coplanar_and_touching() {
        let flat = Triangle::new(
            Point::new(0.0, 0.0, 1.0),
            Point::new(1.0, 0.0, 1.0),
            Point::new(0.0, 1.0, 1.0),
        );
        assert!(flat.slice(1.0).is_none());

        // only the apex touches the plane
        let tri = Triangle::new(
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 0.0, 1.0),
        );
        assert!(tri.slice(1.0).is_none());
        // edge in the plane
        let seg = tri.slice(0.0).unwrap();
        assert_eq!(seg.length(), 1.0);
    }

    #[test]
    fn test_shared_edge_crossings_are_identical() {
        let a = Point::new(0.1, 0.3, 0.0);
        let b = Point::new(0.7, 0.9, 1.0);
        assert_eq!(crossing(&a, &b, 0.37), crossing(&b, &a, 0.37));
    }

    #[test]
    fn test_cuboid_bounds_and_slices() {
        let cube = unit_cube();
        assert_eq!(cube.len(), 12);
        let bounds = cube.bounds().unwrap();
        assert_eq!(bounds.bottom(), 0.0);
        assert_eq!(bounds.top(), 10.0);

        // bottom face: one edge per side face, no diagonals
        assert_eq!(cube.slice(0.0).len(), 4);
        // mid height: each side face is split by its diagonal
        assert_eq!(cube.slice(5.0).len(), 8);
        assert!(cube.slice(11.0).is_empty());
    }

    #[test]
    fn test_static_provider_prism() {
        let mut provider =
            StaticSegmentProvider::from_outline(&[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0)], 0.0, 2.0);
        let bounds = provider.bounds().unwrap();
        assert_eq!(bounds.top(), 2.0);
        assert_eq!(bounds.max.x, 4.0);

        let segs = provider.segments_at(1.5).unwrap();
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.head.z == 1.5 && s.tail.z == 1.5));
        assert_eq!(segs[2].tail, Point::new(0.0, 0.0, 1.5));
        assert!(provider.segments_at(3.0).unwrap().is_empty());
        assert!(matches!(
            provider.segments_at(f64::NAN),
            Err(ProviderError::InvalidHeight(_))
        ));
    }

    #[test]
    fn test_ascii_stl() {
        let stl = "solid t\n\
            facet normal 0 0 1\n outer loop\n\
            vertex 0 0 0\n vertex 1 0 0\n vertex 0 1 1\n\
            endloop\n endfacet\n\
            endsolid t\n";
        let mesh = Mesh::from_stl_reader(&mut Cursor::new(stl.as_bytes()), "t").unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.bounds().unwrap().top(), 1.0);
    }

    #[test]
    fn test_non_stl_extension_rejected() {
        let err = Mesh::from_stl_file(Path::new("part.obj")).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedFormat(_)));
    }
}
