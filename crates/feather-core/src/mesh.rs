//! Triangle mesh surface loaded from STL.
//!
//! Only what sample collection needs: read the triangles, find the one
//! nearest to a picked point and report its face normal.
//!
//! Both STL flavours are accepted. ASCII files start with `solid` and carry
//! no NUL bytes in the first 80 bytes; anything else is read as binary
//! (80-byte header, `u32` face count, 50 bytes per face).

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::collector::Surface;
use crate::error::JobError;

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

/// A triangle soup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub triangles: Vec<[Point3<f64>; 3]>,
}

impl TriangleMesh {
    pub fn new(triangles: Vec<[Point3<f64>; 3]>) -> Self {
        Self { triangles }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Index of the triangle closest to `point` and the closest point on it.
    pub fn closest_triangle(&self, point: &Point3<f64>) -> Option<(usize, Point3<f64>)> {
        let mut best = None;
        let mut min_dist_sq = f64::INFINITY;

        for (i, [a, b, c]) in self.triangles.iter().enumerate() {
            let p = closest_point_on_triangle(point, a, b, c);
            let dist_sq = (p - point).norm_squared();
            if dist_sq < min_dist_sq {
                min_dist_sq = dist_sq;
                best = Some((i, p));
            }
        }

        best
    }

    /// Load a mesh from an ASCII or binary STL file.
    pub fn load_stl(path: &Path) -> Result<Self, JobError> {
        let bytes = std::fs::read(path)
            .map_err(|e| JobError::io(format!("failed to read STL file {}", path.display()), e))?;

        if bytes.len() < 6 {
            return Err(invalid(path, "file too small to be valid STL"));
        }

        // Some exporters start binary headers with "solid", so a size that
        // matches the face count wins over the header text.
        let head = &bytes[..bytes.len().min(HEADER_SIZE)];
        let is_ascii = !binary_size_matches(&bytes)
            && String::from_utf8_lossy(head).trim_start().starts_with("solid")
            && !(bytes.len() >= HEADER_SIZE + 4 && head.contains(&0));

        let mesh = if is_ascii {
            load_ascii(path, BufReader::new(bytes.as_slice()))?
        } else {
            load_binary(path, &bytes)?
        };
        debug!(path = %path.display(), faces = mesh.triangles.len(), "loaded STL");
        Ok(mesh)
    }
}

impl Surface for TriangleMesh {
    /// Right-hand-rule normal of the nearest face; zero for an empty mesh or
    /// a collapsed face.
    fn normal_at(&self, point: &Point3<f64>) -> Vector3<f64> {
        match self.closest_triangle(point) {
            Some((i, _)) => {
                let [a, b, c] = &self.triangles[i];
                (b - a).cross(&(c - a))
            }
            None => Vector3::zeros(),
        }
    }
}

fn invalid(path: &Path, message: impl Into<String>) -> JobError {
    JobError::InvalidGeometry {
        path: PathBuf::from(path),
        message: message.into(),
    }
}

/// Face count stored after the binary header, if the file is long enough.
fn binary_face_count(bytes: &[u8]) -> Option<usize> {
    let count = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?;
    Some(u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize)
}

fn binary_size_matches(bytes: &[u8]) -> bool {
    binary_face_count(bytes)
        .and_then(|n| n.checked_mul(TRIANGLE_SIZE))
        .and_then(|n| n.checked_add(HEADER_SIZE + 4))
        .is_some_and(|expected| expected == bytes.len())
}

fn load_binary(path: &Path, bytes: &[u8]) -> Result<TriangleMesh, JobError> {
    let Some(face_count) = binary_face_count(bytes) else {
        return Err(invalid(path, "binary STL header is truncated"));
    };

    let mut body = &bytes[HEADER_SIZE + 4..];
    let found = body.len() / TRIANGLE_SIZE;
    let fits = face_count
        .checked_mul(TRIANGLE_SIZE)
        .is_some_and(|needed| needed <= body.len());
    if !fits {
        return Err(invalid(
            path,
            format!("expected {face_count} faces, found {found}"),
        ));
    }

    let mut triangles = Vec::with_capacity(face_count);
    let mut buf = [0u8; TRIANGLE_SIZE];
    for i in 0..face_count {
        body.read_exact(&mut buf).map_err(|_| {
            invalid(path, format!("expected {face_count} faces, found {i}"))
        })?;
        // Skip the stored normal; it is recomputed from the winding.
        triangles.push([
            read_vertex(&buf[12..24]),
            read_vertex(&buf[24..36]),
            read_vertex(&buf[36..48]),
        ]);
    }

    Ok(TriangleMesh::new(triangles))
}

fn read_vertex(buf: &[u8]) -> Point3<f64> {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Point3::new(f64::from(x), f64::from(y), f64::from(z))
}

fn load_ascii<R: BufRead>(path: &Path, reader: R) -> Result<TriangleMesh, JobError> {
    let mut triangles = Vec::new();
    let mut in_loop = false;
    let mut corners: Vec<Point3<f64>> = Vec::with_capacity(3);

    for line in reader.lines() {
        let line = line.map_err(|e| {
            JobError::io(format!("failed to read STL file {}", path.display()), e)
        })?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" if in_loop => {
                if parts.len() < 4 {
                    return Err(invalid(path, format!("malformed vertex line: {line:?}")));
                }
                let mut coords = [0.0f64; 3];
                for (slot, raw) in coords.iter_mut().zip(&parts[1..4]) {
                    *slot = raw
                        .parse()
                        .map_err(|_| invalid(path, format!("bad coordinate {raw:?}")))?;
                }
                corners.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            "endloop" => in_loop = false,
            "endfacet" => {
                if corners.len() == 3 {
                    triangles.push([corners[0], corners[1], corners[2]]);
                }
                corners.clear();
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(TriangleMesh::new(triangles))
}

/// Closest point on triangle `abc` to `p`, by barycentric region tests.
#[allow(clippy::many_single_char_names)]
fn closest_point_on_triangle(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Point3<f64> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_and_wall() -> TriangleMesh {
        TriangleMesh::new(vec![
            // Floor at z = 0, counter-clockwise seen from above.
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
            ],
            // Wall at x = 20 facing +x.
            [
                Point3::new(20.0, 0.0, 0.0),
                Point3::new(20.0, 10.0, 0.0),
                Point3::new(20.0, 0.0, 10.0),
            ],
        ])
    }

    #[test]
    fn normal_comes_from_nearest_face() {
        let mesh = floor_and_wall();
        let up = mesh.normal_at(&Point3::new(1.0, 1.0, 0.5));
        assert!((up.normalize() - Vector3::z()).norm() < 1e-12);

        let side = mesh.normal_at(&Point3::new(21.0, 1.0, 1.0));
        assert!((side.normalize() - Vector3::x()).norm() < 1e-12);
    }

    #[test]
    fn empty_mesh_has_zero_normal() {
        let mesh = TriangleMesh::default();
        assert_eq!(mesh.normal_at(&Point3::origin()), Vector3::zeros());
    }

    #[test]
    fn closest_point_regions() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        let vertex = closest_point_on_triangle(&Point3::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert_eq!(vertex, a);

        let edge = closest_point_on_triangle(&Point3::new(0.5, -1.0, 0.0), &a, &b, &c);
        assert!((edge - Point3::new(0.5, 0.0, 0.0)).norm() < 1e-12);

        let inside = closest_point_on_triangle(&Point3::new(0.25, 0.25, 2.0), &a, &b, &c);
        assert!((inside - Point3::new(0.25, 0.25, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn ascii_stl_parsing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tri.stl");
        std::fs::write(
            &path,
            "solid tri\n\
             facet normal 0 0 1\n\
               outer loop\n\
                 vertex 0 0 0\n\
                 vertex 1 0 0\n\
                 vertex 0 1 0\n\
               endloop\n\
             endfacet\n\
             endsolid tri\n",
        )
        .unwrap();

        let mesh = TriangleMesh::load_stl(&path).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0][1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn binary_stl_parsing() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tri.stl");
        std::fs::write(&path, &bytes).unwrap();

        let mesh = TriangleMesh::load_stl(&path).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0][2], Point3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn truncated_binary_stl_is_invalid() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; TRIANGLE_SIZE]);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("short.stl");
        std::fs::write(&path, &bytes).unwrap();

        let err = TriangleMesh::load_stl(&path).unwrap_err();
        assert!(matches!(err, JobError::InvalidGeometry { .. }), "got {err}");
    }

    fn one_facet_binary(header: &[u8], face_count: u32) -> Vec<u8> {
        let mut bytes = header.to_vec();
        bytes.resize(HEADER_SIZE, b' ');
        bytes.extend_from_slice(&face_count.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 3.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes
    }

    #[test]
    fn binary_stl_with_solid_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("exported.stl");
        std::fs::write(&path, one_facet_binary(b"solid exported", 1)).unwrap();

        let mesh = TriangleMesh::load_stl(&path).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0][1], Point3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn oversized_face_count_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corrupt.stl");
        std::fs::write(&path, one_facet_binary(b"", u32::MAX)).unwrap();

        let err = TriangleMesh::load_stl(&path).unwrap_err();
        assert!(matches!(err, JobError::InvalidGeometry { .. }), "got {err}");
        assert!(err.to_string().contains("found 1"), "got {err}");
    }

    #[test]
    fn missing_file_is_io_failure() {
        let err = TriangleMesh::load_stl(Path::new("/nonexistent/model.stl")).unwrap_err();
        assert!(matches!(err, JobError::IoFailure { .. }));
    }
}
