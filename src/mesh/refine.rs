use std::collections::BinaryHeap;

use tracing::debug;

use crate::error::Result;
use crate::mesh::half_edge::{HalfEdgeMesh, UNPAIRED, project_to_surface};
use crate::sdf::SdfExpr;

/// Both the deviation threshold and the minimum splittable edge length
/// are `min_size` divided by this.
const REFINEMENT_DIVISOR: f64 = 100.0;

/// An edge lineage stops splitting after this many generations.
const MAX_EDGE_GENERATION: u32 = 8;

/// Hard stop: no refinement pass performs more splits than this multiple
/// of the initial half-edge count.
const GLOBAL_SPLIT_FACTOR: usize = 4;

/// Max-heap entry ordered by midpoint deviation.
#[derive(Debug)]
struct Candidate {
    deviation: f64,
    edge: u32,
    generation: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.deviation == other.deviation
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deviation.total_cmp(&other.deviation)
    }
}

/// Split paired edges whose midpoint strays from the surface, worst first,
/// until every midpoint is within `min_size / 100` of the surface, edges
/// become too short to split, or the generation / global caps stop the
/// pass. Returns the number of splits performed.
pub fn refine_edges(mesh: &mut HalfEdgeMesh, sdf: &SdfExpr, min_size: f64) -> Result<usize> {
    let threshold = min_size / REFINEMENT_DIVISOR;
    let min_length = min_size / REFINEMENT_DIVISOR;
    let max_splits = mesh.half_edge_count() * GLOBAL_SPLIT_FACTOR;

    let mut heap = BinaryHeap::new();
    for e in 0..mesh.half_edge_count() as u32 {
        let pair = mesh.half_edge(e).pair;
        if pair != UNPAIRED && e < pair {
            push_candidate(&mut heap, mesh, sdf, e, 0, threshold, min_length);
        }
    }

    let mut splits = 0usize;
    while let Some(candidate) = heap.pop() {
        if splits >= max_splits {
            break;
        }
        // Entries go stale as splits rewrite edges in place; re-check
        // against current geometry before acting.
        let Some((midpoint, deviation)) = edge_midpoint_deviation(mesh, sdf, candidate.edge)
        else {
            continue;
        };
        if deviation <= threshold || edge_length(mesh, candidate.edge) <= min_length {
            continue;
        }

        let a = mesh.from_vertex(candidate.edge);
        let b = mesh.half_edge(candidate.edge).to_vertex;
        let local_sdf = mesh
            .vertex(a)
            .local_sdf
            .clone()
            .or_else(|| mesh.vertex(b).local_sdf.clone());
        let surface = local_sdf.as_ref().unwrap_or(sdf);
        let x = mesh.add_vertex_with_sdf(project_to_surface(surface, midpoint), local_sdf.clone());

        let [ax, xb, _, _] = mesh.split_edge(candidate.edge, x)?;
        splits += 1;

        if candidate.generation + 1 < MAX_EDGE_GENERATION {
            for half in [ax, xb] {
                push_candidate(
                    &mut heap,
                    mesh,
                    sdf,
                    half,
                    candidate.generation + 1,
                    threshold,
                    min_length,
                );
            }
        }
    }

    debug!(splits, threshold, "edge refinement complete");
    Ok(splits)
}

fn push_candidate(
    heap: &mut BinaryHeap<Candidate>,
    mesh: &HalfEdgeMesh,
    sdf: &SdfExpr,
    edge: u32,
    generation: u32,
    threshold: f64,
    min_length: f64,
) {
    let Some((_, deviation)) = edge_midpoint_deviation(mesh, sdf, edge) else {
        return;
    };
    if deviation > threshold && edge_length(mesh, edge) > min_length {
        heap.push(Candidate {
            deviation,
            edge,
            generation,
        });
    }
}

/// Midpoint and its distance-to-surface for a paired edge.
fn edge_midpoint_deviation(
    mesh: &HalfEdgeMesh,
    sdf: &SdfExpr,
    edge: u32,
) -> Option<(glam::DVec3, f64)> {
    if mesh.half_edge(edge).pair == UNPAIRED {
        return None;
    }
    let a = mesh.position(mesh.from_vertex(edge));
    let b = mesh.position(mesh.half_edge(edge).to_vertex);
    let midpoint = (a + b) * 0.5;
    Some((midpoint, sdf.evaluate(midpoint).abs()))
}

fn edge_length(mesh: &HalfEdgeMesh, edge: u32) -> f64 {
    let a = mesh.position(mesh.from_vertex(edge));
    let b = mesh.position(mesh.half_edge(edge).to_vertex);
    (a - b).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildParams;
    use crate::mesh::extractor::extract_surface;
    use crate::octree;
    use crate::progress::CancelToken;
    use crate::sdf::scenes;
    use glam::DVec3;

    fn sphere_mesh(min_size: f64) -> (HalfEdgeMesh, SdfExpr) {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let params = BuildParams {
            root_center: DVec3::ZERO,
            root_size: 4.0,
            min_size,
            cell_budget: 1_000_000,
            ..BuildParams::default()
        };
        let tree = octree::build(&sdf, &params, &CancelToken::new(), &mut |_| {}).unwrap();
        let (mut mesh, _) = extract_surface(&tree).unwrap();
        mesh.optimize_vertices(&sdf);
        (mesh, sdf)
    }

    fn max_midpoint_deviation(mesh: &HalfEdgeMesh, sdf: &SdfExpr) -> f64 {
        (0..mesh.half_edge_count() as u32)
            .filter_map(|e| edge_midpoint_deviation(mesh, sdf, e))
            .map(|(_, d)| d)
            .fold(0.0, f64::max)
    }

    #[test]
    fn refinement_reduces_deviation_and_keeps_manifoldness() {
        let (mut mesh, sdf) = sphere_mesh(0.25);
        let before = max_midpoint_deviation(&mesh, &sdf);
        assert!(before > 0.005, "coarse mesh should have chord error");

        let splits = refine_edges(&mut mesh, &sdf, 0.5).unwrap();
        assert!(splits > 0);
        assert!(mesh.is_manifold());
        let after = max_midpoint_deviation(&mesh, &sdf);
        assert!(after < before, "deviation should shrink: {after} vs {before}");
    }

    #[test]
    fn unpaired_edges_are_never_split() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let mut mesh = HalfEdgeMesh::new();
        mesh.add_vertex(DVec3::new(1.0, 0.0, 0.0));
        mesh.add_vertex(DVec3::new(0.0, 1.0, 0.0));
        mesh.add_vertex(DVec3::new(0.0, 0.0, 1.0));
        mesh.add_face(0, 1, 2).unwrap();

        let splits = refine_edges(&mut mesh, &sdf, 1.0).unwrap();
        assert_eq!(splits, 0);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn refinement_terminates_under_caps() {
        // Tiny threshold: without the generation and global caps this
        // would grind on ever-shorter edges.
        let (mut mesh, sdf) = sphere_mesh(0.25);
        let initial = mesh.half_edge_count();
        let splits = refine_edges(&mut mesh, &sdf, 1e-3).unwrap();
        assert!(splits <= initial * GLOBAL_SPLIT_FACTOR);
        assert!(mesh.is_manifold());
    }
}
