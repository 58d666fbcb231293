//! OBJ format support
//!
//! Line-oriented reader and writer for the subset of OBJ the simplifier
//! consumes: `v x y z` vertex records and `f i1 i2 i3` triangular face
//! records with 1-based indices. Trailing `/`-delimited attribute indices
//! on face records are ignored; unrecognized record types are skipped.

use crate::{MeshReader, MeshWriter};
use decimesh_core::{Error, Point3f, Result, TriangleMesh};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub struct ObjReader;
pub struct ObjWriter;

impl MeshReader for ObjReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let file = File::open(path)?;
        read_obj(BufReader::new(file))
    }
}

impl MeshWriter for ObjWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        let file = File::create(path)?;
        write_obj(mesh, BufWriter::new(file))
    }
}

/// Read an OBJ document from any buffered reader.
pub fn read_obj<R: BufRead>(reader: R) -> Result<TriangleMesh> {
    let mut mesh = TriangleMesh::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let vertex = read_vertex(&mut tokens)
                    .ok_or_else(|| invalid_line("vertex", number + 1, &line))?;
                mesh.add_vertex(vertex);
            }
            Some("f") => {
                let face = read_face(&mut tokens, mesh.vertex_count())
                    .ok_or_else(|| invalid_line("face", number + 1, &line))?;
                mesh.add_face(face);
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn read_vertex<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Option<Point3f> {
    let x = tokens.next()?.parse().ok()?;
    let y = tokens.next()?.parse().ok()?;
    let z = tokens.next()?.parse().ok()?;
    Some(Point3f::new(x, y, z))
}

fn read_face<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    vertex_count: usize,
) -> Option<[usize; 3]> {
    let mut indices = Vec::with_capacity(3);
    for token in tokens {
        // only the leading vertex index matters; texture/normal indices
        // after '/' are dropped
        let index: usize = token.split('/').next().unwrap_or("").parse().ok()?;
        if index == 0 || index > vertex_count {
            return None;
        }
        indices.push(index - 1);
    }
    match indices[..] {
        [a, b, c] => Some([a, b, c]),
        _ => None,
    }
}

fn invalid_line(kind: &str, number: usize, line: &str) -> Error {
    Error::InvalidData(format!("malformed {kind} record at line {number}: {line:?}"))
}

/// Write an OBJ document: one `v` record per vertex in index order, then
/// one `f` record per face with 1-based indices.
pub fn write_obj<W: Write>(mesh: &TriangleMesh, mut writer: W) -> Result<()> {
    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for f in &mesh.faces {
        writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TRIANGLE_WITH_ATTRS: &str = "\
# comment line
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
vt 0.5 0.5
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_read_skips_unknown_records_and_attributes() {
        let mesh = read_obj(TRIANGLE_WITH_ATTRS.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_relative_eq!(mesh.vertices[1].x, 1.0);
    }

    #[test]
    fn test_read_rejects_non_triangle_face() {
        let quad = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        assert!(read_obj(quad.as_bytes()).is_err());
    }

    #[test]
    fn test_read_rejects_out_of_range_index() {
        let bad = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(read_obj(bad.as_bytes()).is_err());

        let zero = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n";
        assert!(read_obj(zero.as_bytes()).is_err());
    }

    #[test]
    fn test_read_rejects_short_vertex() {
        assert!(read_obj("v 1.0 2.0\n".as_bytes()).is_err());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.5, 0.0),
                Point3f::new(0.0, 1.0, -2.5),
            ],
            vec![[0, 1, 2]],
        );

        let mut buffer = Vec::new();
        write_obj(&mesh, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("v 0 0 0\n"));
        assert!(text.contains("f 1 2 3\n"));

        let reread = read_obj(text.as_bytes()).unwrap();
        assert_eq!(reread.vertices, mesh.vertices);
        assert_eq!(reread.faces, mesh.faces);
    }
}
