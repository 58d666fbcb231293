//! Adjacency-indexed mesh store
//!
//! Authoritative owner of the vertex and face arenas during simplification.
//! Elements are addressed by dense indices and deleted by tombstoning
//! (setting the slot to `None`), which keeps indices stable for the
//! priority queue and the adjacency sets. Live counts are tracked
//! separately from slot counts.

use crate::math;
use decimesh_core::{Point3f, TriangleMesh, Vector3f};
use nalgebra::{Matrix4, Vector4};
use std::collections::HashSet;

/// A live vertex slot.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: Point3f,
    /// Accumulated error quadric; meaningful only after quadric
    /// initialization has run.
    pub quadric: Matrix4<f64>,
    /// Cheapest adjacent vertex to collapse into. `None` for a
    /// zero-degree vertex.
    pub candidate: Option<usize>,
    /// Optimal merge position for the candidate collapse, homogeneous.
    pub best_position: Vector4<f64>,
    /// Cached minimal collapse cost. `0` for an isolated vertex.
    pub cost: f64,
    /// Adjacent vertex indices; never contains duplicates or the vertex
    /// itself.
    pub adjacent_vertices: HashSet<usize>,
    pub adjacent_faces: HashSet<usize>,
}

impl Vertex {
    pub fn new(position: Point3f) -> Self {
        Self {
            position,
            quadric: Matrix4::zeros(),
            candidate: None,
            best_position: math::homogeneous(&position),
            cost: f64::INFINITY,
            adjacent_vertices: HashSet::new(),
            adjacent_faces: HashSet::new(),
        }
    }
}

/// A live face slot. Normal, area and the fundamental quadric `k` are
/// recomputed together whenever the vertex indices change.
#[derive(Debug, Clone)]
pub struct Face {
    pub vertices: [usize; 3],
    pub normal: Vector3f,
    pub area: f32,
    pub k: Matrix4<f64>,
}

impl Face {
    pub fn contains_vertex(&self, v: usize) -> bool {
        self.vertices.contains(&v)
    }
}

/// Mesh arena with adjacency bookkeeping and tombstoned deletion.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyMesh {
    vertices: Vec<Option<Vertex>>,
    faces: Vec<Option<Face>>,
    vertex_count: usize,
    face_count: usize,
}

impl AdjacencyMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the adjacency mesh from an indexed triangle mesh.
    pub fn from_triangle_mesh(mesh: &TriangleMesh) -> Self {
        let mut out = Self::new();
        for v in &mesh.vertices {
            out.add_vertex(*v);
        }
        for f in &mesh.faces {
            out.add_face(f[0], f[1], f[2]);
        }
        out
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of live faces.
    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// Total vertex slots, live and tombstoned. Dense index space for the
    /// priority queue.
    pub fn vertex_slots(&self) -> usize {
        self.vertices.len()
    }

    /// Total face slots, live and tombstoned.
    pub fn face_slots(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex(&self, i: usize) -> Option<&Vertex> {
        self.vertices[i].as_ref()
    }

    pub fn vertex_mut(&mut self, i: usize) -> Option<&mut Vertex> {
        self.vertices[i].as_mut()
    }

    pub fn face(&self, i: usize) -> Option<&Face> {
        self.faces[i].as_ref()
    }

    /// Iterate live vertices with their slot indices.
    pub fn live_vertices(&self) -> impl Iterator<Item = (usize, &Vertex)> {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    /// Iterate live faces with their slot indices.
    pub fn live_faces(&self) -> impl Iterator<Item = (usize, &Face)> {
        self.faces
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (i, f)))
    }

    /// Append a vertex slot, returning its index.
    pub fn add_vertex(&mut self, position: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(Some(Vertex::new(position)));
        self.vertex_count += 1;
        index
    }

    /// Append a face over three existing vertices, returning its index.
    ///
    /// Registers the face and the vertex pairs in the three vertices'
    /// adjacency sets and computes the face normal, area and quadric.
    pub fn add_face(&mut self, i0: usize, i1: usize, i2: usize) -> usize {
        let index = self.faces.len();
        let (normal, area) = self.face_geometry([i0, i1, i2]);
        let k = self.face_quadric([i0, i1, i2], &normal);
        self.faces.push(Some(Face {
            vertices: [i0, i1, i2],
            normal,
            area,
            k,
        }));
        self.face_count += 1;

        let verts = [i0, i1, i2];
        for (n, &vi) in verts.iter().enumerate() {
            if let Some(v) = self.vertices[vi].as_mut() {
                v.adjacent_faces.insert(index);
                for (m, &ui) in verts.iter().enumerate() {
                    if m != n && ui != vi {
                        v.adjacent_vertices.insert(ui);
                    }
                }
            }
        }
        index
    }

    /// Rewrite one vertex slot of a face if present, otherwise no-op.
    /// The caller must follow up with [`AdjacencyMesh::update_face`].
    pub fn replace_vertex_in_face(&mut self, face: usize, old: usize, new: usize) -> bool {
        if let Some(f) = self.faces[face].as_mut() {
            for slot in f.vertices.iter_mut() {
                if *slot == old {
                    *slot = new;
                    return true;
                }
            }
        }
        false
    }

    /// Recompute a face's normal, area and quadric from the current vertex
    /// positions. Must be called whenever the face's vertex set changes.
    /// No-op on a tombstoned slot.
    pub fn update_face(&mut self, face: usize) {
        let verts = match self.faces[face].as_ref() {
            Some(f) => f.vertices,
            None => return,
        };
        let (normal, area) = self.face_geometry(verts);
        let k = self.face_quadric(verts, &normal);
        if let Some(f) = self.faces[face].as_mut() {
            f.normal = normal;
            f.area = area;
            f.k = k;
        }
    }

    /// Overwrite a live vertex slot. The live count is unchanged.
    pub fn replace_vertex(&mut self, i: usize, vertex: Vertex) {
        self.vertices[i] = Some(vertex);
    }

    /// Mark a vertex slot dead. Dead slots are skipped by every iteration
    /// and must not be dereferenced again.
    pub fn tombstone_vertex(&mut self, i: usize) {
        if self.vertices[i].take().is_some() {
            self.vertex_count -= 1;
        }
    }

    /// Mark a face slot dead.
    pub fn tombstone_face(&mut self, i: usize) {
        if self.faces[i].take().is_some() {
            self.face_count -= 1;
        }
    }

    /// Compact live slots into an indexed triangle mesh, renumbering
    /// vertices in original relative order.
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.vertex_count);
        for (i, v) in self.live_vertices() {
            remap[i] = vertices.len();
            vertices.push(v.position);
        }

        let mut faces = Vec::with_capacity(self.face_count);
        for (_, f) in self.live_faces() {
            faces.push([
                remap[f.vertices[0]],
                remap[f.vertices[1]],
                remap[f.vertices[2]],
            ]);
        }

        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    /// Mean triangle quality over live faces, where an equilateral triangle
    /// scores 1 and a degenerate sliver 0:
    /// `q = 4 * sqrt(3) * area / (l1^2 + l2^2 + l3^2)`, clamped to [0, 1].
    pub fn quality_mean(&self) -> f32 {
        let mut mean = 0.0f32;
        let mut n = 0u32;
        for (_, f) in self.live_faces() {
            n += 1;
            let q = self.face_quality(f);
            mean += (q - mean) / n as f32;
        }
        mean
    }

    /// Mean squared error of triangle quality against a given mean.
    pub fn quality_mse(&self, mean: f32) -> f32 {
        let mut mse = 0.0f32;
        let mut n = 0u32;
        for (_, f) in self.live_faces() {
            n += 1;
            let q = self.face_quality(f);
            let e = (q - mean) * (q - mean);
            mse += (e - mse) / n as f32;
        }
        mse
    }

    fn face_quality(&self, f: &Face) -> f32 {
        let [a, b, c] = f.vertices.map(|i| self.position_of(i));
        let l1 = (a - b).norm_squared();
        let l2 = (b - c).norm_squared();
        let l3 = (a - c).norm_squared();
        let q = 4.0 * 3.0f32.sqrt() * f.area / (l1 + l2 + l3);
        q.clamp(0.0, 1.0)
    }

    fn position_of(&self, i: usize) -> Point3f {
        match self.vertices[i].as_ref() {
            Some(v) => v.position,
            None => Point3f::origin(),
        }
    }

    fn face_geometry(&self, verts: [usize; 3]) -> (Vector3f, f32) {
        let p0 = self.position_of(verts[0]);
        let p1 = self.position_of(verts[1]);
        let p2 = self.position_of(verts[2]);
        let n = (p0 - p1).cross(&(p2 - p1));
        let len = n.norm();
        if len == 0.0 {
            log::warn!("face {:?} is degenerate, keeping unnormalized normal", verts);
            return (n, 0.0);
        }
        (n / len, len / 2.0)
    }

    fn face_quadric(&self, verts: [usize; 3], normal: &Vector3f) -> Matrix4<f64> {
        math::plane_quadric(normal, &self.position_of(verts[0]))
    }
}
