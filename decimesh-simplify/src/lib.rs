//! Quadric error metric mesh simplification
//!
//! This crate reduces the triangle count of a mesh through iterative edge
//! collapse, ordered by the quadric error metric (QEM). It provides:
//! - an adjacency-indexed mesh store with tombstoned deletion
//! - an indexed min-priority queue with decrease-key
//! - the quadric cost engine and the collapse-driving simplifier

pub mod heap;
pub mod math;
pub mod mesh;
pub mod qem;

pub use heap::IndexMinHeap;
pub use mesh::AdjacencyMesh;
pub use qem::{QemSimplifier, SimplifyOptions};

use decimesh_core::{Result, TriangleMesh};

/// Simplify a mesh by reducing the number of vertices
pub trait MeshSimplifier {
    /// Simplify until at most `target_vertices` vertices remain. A target at
    /// or above the current vertex count performs no collapses.
    fn simplify_to_count(&self, mesh: &TriangleMesh, target_vertices: usize)
        -> Result<TriangleMesh>;

    /// Simplify toward `ratio * vertex_count` vertices. A ratio outside
    /// `[0, 1)` is a no-op, not an error.
    fn simplify_to_ratio(&self, mesh: &TriangleMesh, ratio: f32) -> Result<TriangleMesh>;
}
