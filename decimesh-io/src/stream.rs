//! Flattened face-record streaming
//!
//! Secondary output form: one whitespace-separated record per face holding
//! the three raw vertex positions followed by the face normal. No index
//! renumbering is involved, making the records suitable for direct
//! transmission over a socket or pipe rather than persisted-file output.

use decimesh_core::{Result, TriangleMesh};
use std::io::Write;

pub struct FaceStreamWriter;

impl FaceStreamWriter {
    /// Write every face of the mesh as a flattened record:
    /// `x0 y0 z0 x1 y1 z1 x2 y2 z2 nx ny nz`.
    pub fn write_faces<W: Write>(mesh: &TriangleMesh, mut writer: W) -> Result<()> {
        let normals = mesh.calculate_face_normals();
        for (face, normal) in mesh.faces.iter().zip(&normals) {
            let [a, b, c] = face.map(|i| mesh.vertices[i]);
            writeln!(
                writer,
                "{} {} {} {} {} {} {} {} {} {} {} {}",
                a.x, a.y, a.z, b.x, b.y, b.z, c.x, c.y, c.z, normal.x, normal.y, normal.z
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decimesh_core::Point3f;

    #[test]
    fn test_record_per_face_with_normal() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
        );

        let mut buffer = Vec::new();
        FaceStreamWriter::write_faces(&mesh, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.split_whitespace().count(), 12);
        }
        // counterclockwise faces in the xy plane point along +z
        assert!(lines[0].ends_with("0 0 1"));
    }
}
