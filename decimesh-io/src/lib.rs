//! Mesh I/O for decimesh
//!
//! Line-oriented OBJ reading and writing plus a flattened per-face record
//! stream for direct transmission. These are thin wrappers around the
//! core's input construction and output enumeration.

pub mod obj;
pub mod stream;

pub use obj::{ObjReader, ObjWriter};
pub use stream::FaceStreamWriter;

use decimesh_core::{Result, TriangleMesh};

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh<P: AsRef<std::path::Path>>(path: P) -> Result<TriangleMesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<std::path::Path>>(mesh: &TriangleMesh, path: P) -> Result<()>;
}

/// Auto-detect format and read mesh
pub fn read_mesh<P: AsRef<std::path::Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("obj") => obj::ObjReader::read_mesh(path),
        _ => Err(decimesh_core::Error::UnsupportedFormat(format!(
            "Unsupported mesh format: {:?}",
            path.extension()
        ))),
    }
}
