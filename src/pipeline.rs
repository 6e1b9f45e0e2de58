use std::time::{Duration, Instant};

use tracing::info;

use crate::config::BuildParams;
use crate::error::{MesherError, Result};
use crate::mesh::{self, ExtractionStats, SerializedMesh};
use crate::octree;
use crate::progress::{CancelToken, Phase, ProgressSink, ProgressUpdate};
use crate::sdf::SdfExpr;

/// Fraction of the progress range spent on octree subdivision; the
/// remaining stages share the rest (extraction to 0.5, refinement and
/// projection to 0.55, manifold check to 0.6, serialization to 1.0).
const OCTREE_SPAN: f64 = 0.4;

/// Summary of a completed meshing run.
#[derive(Debug)]
pub struct MeshingResult {
    pub mesh: SerializedMesh,
    pub cell_count: usize,
    pub stats: ExtractionStats,
    pub duration: Duration,
}

/// Pipeline orchestrator -- drives the SDF-to-mesh stages in order.
pub struct Pipeline;

impl Pipeline {
    /// Run the full meshing pipeline for one task.
    ///
    /// Progress updates are monotone non-decreasing and the final update
    /// always carries `completed` or `failed` status. Cancellation is
    /// polled inside subdivision and between every later stage; a
    /// cancelled run produces no result.
    pub fn run(
        task_id: u64,
        sdf: &SdfExpr,
        params: &BuildParams,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(ProgressUpdate),
    ) -> Result<MeshingResult> {
        let start = Instant::now();
        let mut callback = |update: ProgressUpdate| on_progress(update);
        let mut sink = ProgressSink::new(task_id, &mut callback);
        let mut phase = Phase::Octree;

        match Self::stages(sdf, params, cancel, &mut sink, &mut phase) {
            Ok((serialized, cell_count, stats)) => {
                sink.completed();
                let duration = start.elapsed();
                info!(
                    task_id,
                    vertices = serialized.vertex_count(),
                    triangles = serialized.triangle_count(),
                    cells = cell_count,
                    elapsed = ?duration,
                    "Meshing complete"
                );
                Ok(MeshingResult {
                    mesh: serialized,
                    cell_count,
                    stats,
                    duration,
                })
            }
            Err(e) => {
                sink.failed(phase, e.to_string());
                Err(e)
            }
        }
    }

    fn stages(
        sdf: &SdfExpr,
        params: &BuildParams,
        cancel: &CancelToken,
        sink: &mut ProgressSink<'_>,
        phase: &mut Phase,
    ) -> Result<(SerializedMesh, usize, ExtractionStats)> {
        info!(
            min_size = params.min_size,
            cell_budget = params.cell_budget,
            "Stage 1/5: octree subdivision"
        );
        sink.running(Phase::Octree, 0.0);
        let tree = octree::build(sdf, params, cancel, &mut |fraction| {
            sink.running(Phase::Octree, fraction * OCTREE_SPAN)
        })?;

        *phase = Phase::Mesh;
        check_cancelled(cancel)?;
        info!(
            cells = tree.cell_count(),
            boundary_leaves = tree.boundary_leaf_count(),
            "Stage 2/5: surface extraction"
        );
        sink.running(Phase::Mesh, OCTREE_SPAN);
        let (mut half_edge_mesh, stats) = mesh::extract_surface(&tree)?;
        sink.running(Phase::Mesh, 0.5);

        check_cancelled(cancel)?;
        if params.refine {
            info!("Stage 3/5: edge refinement + vertex projection");
            mesh::refine_edges(&mut half_edge_mesh, sdf, params.min_size)?;
        } else if params.optimize {
            info!("Stage 3/5: vertex projection");
        }
        if params.optimize {
            half_edge_mesh.optimize_vertices(sdf);
        }
        sink.running(Phase::Mesh, 0.55);

        check_cancelled(cancel)?;
        info!("Stage 4/5: manifold check");
        if !half_edge_mesh.is_manifold() {
            return Err(MesherError::NonManifold {
                open_edges: half_edge_mesh.open_edge_count(),
            });
        }
        sink.running(Phase::Mesh, 0.6);

        check_cancelled(cancel)?;
        info!("Stage 5/5: serialization");
        let serialized = half_edge_mesh.to_serialized();
        Ok((serialized, tree.cell_count(), stats))
    }
}

fn check_cancelled(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MesherError::Cancelled);
    }
    Ok(())
}
