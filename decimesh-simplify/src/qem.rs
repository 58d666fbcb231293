//! Quadric error metric simplifier
//!
//! The driving loop over the adjacency mesh store: initialize face quadrics
//! and per-vertex error quadrics, seed the indexed priority queue with each
//! vertex's cheapest local collapse, then repeatedly extract the globally
//! cheapest collapse, apply it, and refresh the queue entries of every
//! vertex whose cost function changed. Strictly sequential: each collapse
//! mutates adjacency state the next cost computation depends on.

use crate::heap::IndexMinHeap;
use crate::math;
use crate::mesh::{AdjacencyMesh, Vertex};
use crate::MeshSimplifier;
use decimesh_core::{Error, Point3f, Result, TriangleMesh};
use nalgebra::{Matrix4, Vector4};
use std::collections::HashSet;

/// Cost-weighting modes. The weightings compose, except that area
/// weighting takes precedence over volume weighting when both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimplifyOptions {
    /// Scale each face's quadric contribution by its area.
    pub area_weighting: bool,
    /// Scale each face's quadric contribution by its squared area.
    /// Ignored while `area_weighting` is set.
    pub volume_weighting: bool,
    /// Rescale edge costs by a curvature factor derived from the maximum
    /// normal deviation among the faces incident to either endpoint.
    pub normal_weighting: bool,
}

/// Quadric error metric edge-collapse simplifier.
///
/// Collapses are ordered by an indexed min-priority queue keyed on each
/// vertex's cheapest adjacent collapse. Merged vertices reuse the slot of
/// the extracted endpoint, and their quadric is the sum of the endpoint
/// quadrics rather than a recomputation from scratch — a deliberate
/// approximation.
#[derive(Debug, Clone, Default)]
pub struct QemSimplifier {
    pub options: SimplifyOptions,
}

impl QemSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SimplifyOptions) -> Self {
        Self { options }
    }

    /// Run the collapse loop on an adjacency mesh until at most
    /// `target_vertices` live vertices remain.
    pub fn simplify_in_place(&self, mesh: &mut AdjacencyMesh, target_vertices: usize) {
        let mut heap = IndexMinHeap::new(mesh.vertex_slots());
        self.compute_all_costs(mesh, &mut heap);

        while mesh.vertex_count() > target_vertices && !heap.is_empty() {
            let v0 = heap.pop_min();
            self.collapse(mesh, &mut heap, v0);
        }
    }

    /// Compute face quadrics, per-vertex quadrics under the active
    /// weighting, and each vertex's cheapest collapse; seed the queue.
    fn compute_all_costs(&self, mesh: &mut AdjacencyMesh, heap: &mut IndexMinHeap) {
        for fi in 0..mesh.face_slots() {
            mesh.update_face(fi);
        }

        for vi in 0..mesh.vertex_slots() {
            if mesh.vertex(vi).is_none() {
                continue;
            }
            let q = self.vertex_quadric(mesh, vi);
            if let Some(v) = mesh.vertex_mut(vi) {
                v.quadric = q;
            }
        }

        for vi in 0..mesh.vertex_slots() {
            if mesh.vertex(vi).is_none() {
                continue;
            }
            let cost = self.refresh_vertex(mesh, vi);
            heap.insert(vi, cost);
        }
    }

    /// Sum the (weighted) fundamental quadrics of a vertex's incident faces.
    fn vertex_quadric(&self, mesh: &AdjacencyMesh, vi: usize) -> Matrix4<f64> {
        let mut q = Matrix4::zeros();
        let v = match mesh.vertex(vi) {
            Some(v) => v,
            None => return q,
        };
        for &fi in &v.adjacent_faces {
            if let Some(f) = mesh.face(fi) {
                if self.options.area_weighting {
                    q += f.k * f.area as f64;
                } else if self.options.volume_weighting {
                    q += f.k * (f.area as f64 * f.area as f64);
                } else {
                    q += f.k;
                }
            }
        }
        q
    }

    /// Recompute a vertex's cheapest collapse target, merge position and
    /// cost, store them on the vertex, and return the cost.
    fn refresh_vertex(&self, mesh: &mut AdjacencyMesh, vi: usize) -> f64 {
        let (cost, candidate, best_position) = self.cost_and_candidate(mesh, vi);
        if let Some(v) = mesh.vertex_mut(vi) {
            v.cost = cost;
            v.candidate = candidate;
            v.best_position = best_position;
        }
        cost
    }

    /// The cheapest adjacent collapse for a vertex. A zero-degree vertex
    /// has cost `0` and no candidate, prioritizing it for removal.
    fn cost_and_candidate(
        &self,
        mesh: &AdjacencyMesh,
        vi: usize,
    ) -> (f64, Option<usize>, Vector4<f64>) {
        let v = match mesh.vertex(vi) {
            Some(v) => v,
            None => return (f64::INFINITY, None, Vector4::new(0.0, 0.0, 0.0, 1.0)),
        };

        if v.adjacent_vertices.is_empty() {
            return (0.0, None, math::homogeneous(&v.position));
        }

        let mut best_cost = f64::INFINITY;
        let mut candidate = None;
        let mut best_position = math::homogeneous(&v.position);
        for &ui in &v.adjacent_vertices {
            let (cost, position) = self.edge_cost(mesh, vi, ui);
            if cost < best_cost {
                best_cost = cost;
                candidate = Some(ui);
                best_position = position;
            }
        }
        (best_cost, candidate, best_position)
    }

    /// Cost and optimal merge position for collapsing `vi` into `ui`.
    fn edge_cost(&self, mesh: &AdjacencyMesh, vi: usize, ui: usize) -> (f64, Vector4<f64>) {
        let (v, u) = match (mesh.vertex(vi), mesh.vertex(ui)) {
            (Some(v), Some(u)) => (v, u),
            _ => return (f64::INFINITY, Vector4::new(0.0, 0.0, 0.0, 1.0)),
        };
        let qe = v.quadric + u.quadric;

        let (position, mut cost) = match math::optimal_position(&qe) {
            Some(p) => (p, math::quadric_error(&qe, &p)),
            None => {
                // Singular clamped matrix: evaluate the endpoints and the
                // midpoint, take the minimum. Always finite.
                let mid = Point3f::from((v.position.coords + u.position.coords) / 2.0);
                let mut best = (f64::INFINITY, Vector4::new(0.0, 0.0, 0.0, 1.0));
                for candidate in [
                    math::homogeneous(&v.position),
                    math::homogeneous(&u.position),
                    math::homogeneous(&mid),
                ] {
                    let c = math::quadric_error(&qe, &candidate);
                    if c < best.0 {
                        best = (c, candidate);
                    }
                }
                (best.1, best.0)
            }
        };

        if self.options.normal_weighting {
            cost = self.normal_weighted_cost(mesh, vi, ui, cost);
        }
        (cost, position)
    }

    /// Rescale a collapse cost by the curvature factor
    /// `1 - alpha + alpha * maxcurv`, where `maxcurv` is the largest
    /// minimal normal deviation between any incident face and the faces
    /// shared by both endpoints, and `alpha` weighs the extremal face
    /// areas against the total incident area. Edges without shared faces
    /// keep the unmodified cost.
    fn normal_weighted_cost(
        &self,
        mesh: &AdjacencyMesh,
        vi: usize,
        ui: usize,
        cost: f64,
    ) -> f64 {
        let (v, u) = match (mesh.vertex(vi), mesh.vertex(ui)) {
            (Some(v), Some(u)) => (v, u),
            _ => return cost,
        };

        let sides: Vec<usize> = v
            .adjacent_faces
            .iter()
            .copied()
            .filter(|&fi| {
                mesh.face(fi)
                    .is_some_and(|f| f.contains_vertex(ui))
            })
            .collect();
        if sides.is_empty() {
            return cost;
        }

        let mut min_side = usize::MAX;
        let mut max_face = usize::MAX;
        let mut max_curv = -1.0f32;
        let mut total_area = 0.0f32;

        for &fi in v.adjacent_faces.iter().chain(u.adjacent_faces.iter()) {
            let f1 = match mesh.face(fi) {
                Some(f) => f,
                None => continue,
            };
            total_area += f1.area;

            let mut m_curv = 2.0f32;
            for &si in &sides {
                if let Some(f2) = mesh.face(si) {
                    let curv = (1.0 - f1.normal.dot(&f2.normal)) / 2.0;
                    if curv < m_curv {
                        m_curv = curv;
                        min_side = si;
                    }
                }
            }
            if m_curv > max_curv {
                max_curv = m_curv;
                max_face = fi;
            }
        }

        for &si in &sides {
            if let Some(f) = mesh.face(si) {
                total_area -= f.area;
            }
        }
        if total_area <= 0.0 {
            return cost;
        }

        let area_of = |fi: usize| mesh.face(fi).map_or(0.0, |f| f.area);
        let mut alpha = 4.0 * (area_of(min_side) + area_of(max_face)) / total_area;
        if alpha > 1.0 {
            alpha = 1.0;
        }
        cost * (1.0 - alpha + alpha * max_curv) as f64
    }

    /// Collapse the extracted vertex `v0` into its precomputed candidate,
    /// repair the local topology, and refresh every affected queue entry.
    /// `v0` has already been removed from the queue.
    fn collapse(&self, mesh: &mut AdjacencyMesh, heap: &mut IndexMinHeap, v0: usize) {
        let (candidate, v0_faces, v0_verts, v0_quadric, best_position) = match mesh.vertex(v0) {
            Some(v) => (
                v.candidate,
                v.adjacent_faces.clone(),
                v.adjacent_vertices.clone(),
                v.quadric,
                v.best_position,
            ),
            None => return,
        };

        // Zero-degree vertex: nothing to merge, remove it outright.
        let v1 = match candidate {
            Some(v1) => v1,
            None => {
                mesh.tombstone_vertex(v0);
                return;
            }
        };

        let (v1_faces, v1_verts, v1_quadric) = match mesh.vertex(v1) {
            Some(v) => (
                v.adjacent_faces.clone(),
                v.adjacent_vertices.clone(),
                v.quadric,
            ),
            None => return,
        };

        // Union of incident faces; faces spanning both endpoints become
        // degenerate and are tombstoned, and their third vertex forgets them.
        let mut faces: HashSet<usize> = v0_faces.union(&v1_faces).copied().collect();
        for &fi in &v0_faces {
            let shared = match mesh.face(fi) {
                Some(f) if f.contains_vertex(v1) => Some(f.vertices),
                _ => None,
            };
            if let Some(verts) = shared {
                mesh.tombstone_face(fi);
                faces.remove(&fi);
                for wi in verts {
                    if wi != v0 && wi != v1 {
                        if let Some(w) = mesh.vertex_mut(wi) {
                            w.adjacent_faces.remove(&fi);
                        }
                    }
                }
            }
        }

        // Surviving neighborhood, excluding the endpoints themselves.
        let mut neighbors: HashSet<usize> = v0_verts.union(&v1_verts).copied().collect();
        neighbors.remove(&v0);
        neighbors.remove(&v1);

        // Replacement vertex reuses slot v0 to avoid extra queue churn; its
        // quadric is the additive approximation, not a recomputation.
        let mut merged = Vertex::new(Point3f::new(
            best_position.x as f32,
            best_position.y as f32,
            best_position.z as f32,
        ));
        merged.quadric = v0_quadric + v1_quadric;
        merged.adjacent_faces = faces.clone();
        merged.adjacent_vertices = neighbors.clone();
        mesh.replace_vertex(v0, merged);
        mesh.tombstone_vertex(v1);

        // Surviving faces: rewrite v1 references and recompute geometry.
        for &fi in &faces {
            mesh.replace_vertex_in_face(fi, v1, v0);
            mesh.update_face(fi);
        }

        // Surviving neighbors: swap v1 for v0 in their adjacency.
        for &ni in &neighbors {
            if let Some(n) = mesh.vertex_mut(ni) {
                n.adjacent_vertices.remove(&v1);
                n.adjacent_vertices.insert(v0);
            }
        }

        // Refresh costs for everything whose cost function changed.
        for &ni in &neighbors {
            let cost = self.refresh_vertex(mesh, ni);
            heap.change_key(ni, cost);
        }
        let cost = self.refresh_vertex(mesh, v0);
        heap.insert(v0, cost);
        heap.remove(v1);
    }
}

impl MeshSimplifier for QemSimplifier {
    fn simplify_to_count(
        &self,
        mesh: &TriangleMesh,
        target_vertices: usize,
    ) -> Result<TriangleMesh> {
        if mesh.is_empty() {
            return Err(Error::InvalidData("mesh is empty".to_string()));
        }
        let mut amesh = AdjacencyMesh::from_triangle_mesh(mesh);
        self.simplify_in_place(&mut amesh, target_vertices);
        Ok(amesh.to_triangle_mesh())
    }

    fn simplify_to_ratio(&self, mesh: &TriangleMesh, ratio: f32) -> Result<TriangleMesh> {
        if !(0.0..1.0).contains(&ratio) {
            return Ok(mesh.clone());
        }
        let target = (mesh.vertex_count() as f32 * ratio) as usize;
        self.simplify_to_count(mesh, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn octahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(-1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, -1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
                Point3f::new(0.0, 0.0, -1.0),
            ],
            vec![
                [0, 2, 4],
                [2, 1, 4],
                [1, 3, 4],
                [3, 0, 4],
                [2, 0, 5],
                [1, 2, 5],
                [3, 1, 5],
                [0, 3, 5],
            ],
        )
    }

    fn flat_grid(size: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3f::new(x as f32, y as f32, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                faces.push([tl, bl, tr]);
                faces.push([tr, bl, br]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    #[test]
    fn test_octahedron_to_four_vertices() {
        let s = QemSimplifier::new();
        let result = s.simplify_to_count(&octahedron(), 4).unwrap();

        assert_eq!(result.vertex_count(), 4);
        assert_eq!(result.face_count(), 4);
        for f in &result.faces {
            assert_ne!(f[0], f[1]);
            assert_ne!(f[1], f[2]);
            assert_ne!(f[2], f[0]);
            assert!(f.iter().all(|&i| i < result.vertex_count()));
        }
    }

    #[test]
    fn test_count_invariant_per_collapse() {
        // each collapse on a closed manifold removes 1 vertex and 2 faces
        let s = QemSimplifier::new();
        for k in 0..=2usize {
            let result = s.simplify_to_count(&octahedron(), 6 - k).unwrap();
            assert_eq!(result.vertex_count(), 6 - k);
            assert_eq!(result.face_count(), 8 - 2 * k);
        }
    }

    #[test]
    fn test_target_at_or_above_count_is_noop() {
        let s = QemSimplifier::new();
        let mesh = octahedron();
        for target in [6, 10] {
            let result = s.simplify_to_count(&mesh, target).unwrap();
            assert_eq!(result.vertices, mesh.vertices);
            assert_eq!(result.faces, mesh.faces);
        }
    }

    #[test]
    fn test_ratio_boundaries() {
        let s = QemSimplifier::new();
        let mesh = octahedron();

        // out-of-range ratios are no-ops, not errors
        for ratio in [1.0, 1.5, -0.1] {
            let result = s.simplify_to_ratio(&mesh, ratio).unwrap();
            assert_eq!(result.vertex_count(), 6);
            assert_eq!(result.face_count(), 8);
        }

        // ratio 0 simplifies toward the structural minimum
        let result = s.simplify_to_ratio(&mesh, 0.0).unwrap();
        assert!(result.vertex_count() < 6);
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let s = QemSimplifier::new();
        assert!(s.simplify_to_count(&TriangleMesh::new(), 0).is_err());
    }

    #[test]
    fn test_isolated_vertex_removed_first() {
        let mut mesh = octahedron();
        mesh.add_vertex(Point3f::new(10.0, 10.0, 10.0));

        let s = QemSimplifier::new();
        let result = s.simplify_to_count(&mesh, 6).unwrap();

        // the zero-degree vertex has cost 0 and goes first; the octahedron
        // itself survives untouched
        assert_eq!(result.vertex_count(), 6);
        assert_eq!(result.face_count(), 8);
        assert!(result
            .vertices
            .iter()
            .all(|p| *p != Point3f::new(10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_singular_fallback_is_finite() {
        // a flat grid's quadrics constrain only the plane normal, so the
        // clamped sum is singular and every edge takes the fallback path
        let mut mesh = AdjacencyMesh::from_triangle_mesh(&flat_grid(4));
        let s = QemSimplifier::new();
        let mut heap = IndexMinHeap::new(mesh.vertex_slots());
        s.compute_all_costs(&mut mesh, &mut heap);

        for (_, v) in mesh.live_vertices() {
            assert!(v.cost.is_finite());
            assert!(v.cost >= 0.0);
            assert!(v.candidate.is_some());
            assert!(v.best_position.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn test_flat_grid_simplifies() {
        let s = QemSimplifier::new();
        let mesh = flat_grid(5);
        let result = s.simplify_to_count(&mesh, 10).unwrap();
        assert_eq!(result.vertex_count(), 10);
        // flat geometry stays flat
        for v in &result.vertices {
            assert_relative_eq!(v.z, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_area_takes_precedence_over_volume() {
        let mesh = AdjacencyMesh::from_triangle_mesh(&octahedron());

        let area_only = QemSimplifier::with_options(SimplifyOptions {
            area_weighting: true,
            ..Default::default()
        });
        let both = QemSimplifier::with_options(SimplifyOptions {
            area_weighting: true,
            volume_weighting: true,
            ..Default::default()
        });

        for vi in 0..mesh.vertex_slots() {
            let qa = area_only.vertex_quadric(&mesh, vi);
            let qb = both.vertex_quadric(&mesh, vi);
            assert_eq!(qa, qb);
        }
    }

    #[test]
    fn test_weighting_modes_terminate() {
        let all = QemSimplifier::with_options(SimplifyOptions {
            area_weighting: true,
            volume_weighting: false,
            normal_weighting: true,
        });
        let result = all.simplify_to_count(&octahedron(), 4).unwrap();
        assert_eq!(result.vertex_count(), 4);

        let volume = QemSimplifier::with_options(SimplifyOptions {
            volume_weighting: true,
            ..Default::default()
        });
        let result = volume.simplify_to_count(&octahedron(), 4).unwrap();
        assert_eq!(result.vertex_count(), 4);
    }

    #[test]
    fn test_normal_weighting_without_shared_faces_keeps_cost() {
        // two vertices marked adjacent with no face spanning both: the
        // curvature factor must leave the base cost unchanged
        let mut mesh = AdjacencyMesh::from_triangle_mesh(&octahedron());
        let a = mesh.add_vertex(Point3f::new(5.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3f::new(6.0, 0.0, 0.0));
        mesh.vertex_mut(a).unwrap().adjacent_vertices.insert(b);
        mesh.vertex_mut(b).unwrap().adjacent_vertices.insert(a);

        let plain = QemSimplifier::new();
        let weighted = QemSimplifier::with_options(SimplifyOptions {
            normal_weighting: true,
            ..Default::default()
        });
        let (base_cost, _) = plain.edge_cost(&mesh, a, b);
        let (weighted_cost, _) = weighted.edge_cost(&mesh, a, b);
        assert_eq!(base_cost, weighted_cost);
    }

    #[test]
    fn test_normal_weighting_discounts_flat_edges() {
        // on a curved-vs-flat comparison the factor shrinks the cost of
        // collapsing across coplanar faces toward (1 - alpha) * cost
        let mesh = AdjacencyMesh::from_triangle_mesh(&octahedron());
        let plain = QemSimplifier::new();
        let weighted = QemSimplifier::with_options(SimplifyOptions {
            normal_weighting: true,
            ..Default::default()
        });

        let v = mesh.vertex(0).unwrap();
        let &u = v.adjacent_vertices.iter().next().unwrap();
        let (base_cost, _) = plain.edge_cost(&mesh, 0, u);
        let (weighted_cost, _) = weighted.edge_cost(&mesh, 0, u);
        assert!(weighted_cost.is_finite());
        assert!(weighted_cost >= 0.0);
        assert!(base_cost.is_finite());
    }
}
