use glam::DVec3;
use tracing::debug;

use crate::config::BuildParams;
use crate::error::{MesherError, Result};
use crate::interval::Interval;
use crate::octree::node::{CellState, NodeId, Octree, OctreeNode, child_center};
use crate::progress::CancelToken;
use crate::sdf::{Category, Content, SdfExpr};

/// Evaluation boxes are expanded by 10% per axis so a surface grazing a
/// cell face cannot be misclassified as outside by tight interval bounds.
const CONTENT_PADDING: f64 = 1.1;

/// `Complex` regions (several surfaces / sharp features) subdivide to an
/// eighth of the recommended feature size.
const COMPLEX_REFINE_FACTOR: f64 = 8.0;

/// Progress is reported at least every this many created cells.
const PROGRESS_INTERVAL: usize = 256;

struct BuildCtx<'a> {
    sdf: &'a SdfExpr,
    min_size: f64,
    budget: usize,
    remaining: usize,
    cancel: &'a CancelToken,
    progress: &'a mut dyn FnMut(f64),
}

impl BuildCtx<'_> {
    fn cells_created(&self) -> usize {
        self.budget - self.remaining
    }

    /// Charge one cell against the shared budget.
    fn charge(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(MesherError::BudgetExhausted {
                budget: self.budget,
            });
        }
        self.remaining -= 1;
        if self.cells_created() % PROGRESS_INTERVAL == 0 {
            let fraction = self.cells_created() as f64 / self.budget as f64;
            (self.progress)(fraction);
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MesherError::Cancelled);
        }
        Ok(())
    }
}

/// Classification of one cell box: leaf state, captured content, and the
/// effective minimum size that gates further subdivision.
struct Classified {
    state: CellState,
    content: Option<Content>,
    effective_min: f64,
}

fn classify(ctx: &BuildCtx, center: DVec3, size: f64) -> Result<Classified> {
    let half = size * 0.5 * CONTENT_PADDING;
    let x = Interval::centered(center.x, half);
    let y = Interval::centered(center.y, half);
    let z = Interval::centered(center.z, half);

    if let Some(content) = ctx.sdf.evaluate_content(x, y, z) {
        let state = match content.category {
            Category::Inside => CellState::Inside,
            Category::Outside => CellState::Outside,
            Category::Face | Category::Complex => CellState::Boundary,
        };
        let mut effective_min = ctx.min_size.min(content.min_feature_size);
        if content.category == Category::Complex {
            effective_min /= COMPLEX_REFINE_FACTOR;
        }
        return Ok(Classified {
            state,
            content: Some(content),
            effective_min,
        });
    }

    // No rich classification available: fall back to raw interval bounds.
    let iv = ctx.sdf.evaluate_interval(x, y, z);
    if iv.min.is_nan() || iv.max.is_nan() {
        return Err(MesherError::InvalidSdf(format!(
            "interval evaluation produced NaN over cell at {center}"
        )));
    }
    let state = if iv.is_strictly_negative() {
        CellState::Inside
    } else if iv.is_strictly_positive() {
        CellState::Outside
    } else {
        CellState::Boundary
    };
    Ok(Classified {
        state,
        content: None,
        effective_min: ctx.min_size,
    })
}

/// Build the classified octree for `sdf` over the root box.
///
/// Fails with `BudgetExhausted` the moment the cell budget would be
/// overdrawn and with `Cancelled` when the cooperative flag is set;
/// partial trees never escape.
pub fn build(
    sdf: &SdfExpr,
    params: &BuildParams,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f64),
) -> Result<Octree> {
    let mut ctx = BuildCtx {
        sdf,
        min_size: params.min_size,
        budget: params.cell_budget,
        remaining: params.cell_budget,
        cancel,
        progress,
    };

    let mut tree = Octree {
        nodes: Vec::new(),
        root_center: params.root_center,
        root_size: params.root_size,
    };

    ctx.check_cancelled()?;
    let root_class = classify(&ctx, params.root_center, params.root_size)?;
    ctx.charge()?;
    tree.nodes.push(OctreeNode {
        parent: None,
        state: root_class.state,
        children: None,
        content: root_class.content,
    });

    let root = tree.root();
    if root_class.state == CellState::Boundary
        && params.root_size * 0.25 > root_class.effective_min
    {
        subdivide(&mut tree, &mut ctx, root, params.root_center, params.root_size)?;
    }

    debug!(
        cells = tree.cell_count(),
        boundary_leaves = tree.boundary_leaf_count(),
        "octree classification complete"
    );
    Ok(tree)
}

fn subdivide(
    tree: &mut Octree,
    ctx: &mut BuildCtx,
    id: NodeId,
    center: DVec3,
    size: f64,
) -> Result<()> {
    let child_size = size * 0.5;
    let mut children = [0 as NodeId; 8];
    // children that subdivide further, with their centers
    let mut pending = Vec::new();

    for octant in 0..8u8 {
        ctx.check_cancelled()?;
        let c = child_center(center, size, octant);
        let class = classify(ctx, c, child_size)?;
        ctx.charge()?;

        let child_id = tree.nodes.len();
        tree.nodes.push(OctreeNode {
            parent: Some((id, octant)),
            state: class.state,
            children: None,
            content: class.content,
        });
        children[octant as usize] = child_id;

        if class.state == CellState::Boundary && child_size * 0.25 > class.effective_min {
            pending.push((child_id, c));
        }
    }
    tree.nodes[id].children = Some(children);

    for (child_id, c) in pending {
        subdivide(tree, ctx, child_id, c, child_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::scenes;

    fn params(root_size: f64, min_size: f64, cell_budget: usize) -> BuildParams {
        BuildParams {
            root_center: DVec3::ZERO,
            root_size,
            min_size,
            cell_budget,
            ..BuildParams::default()
        }
    }

    fn build_quiet(sdf: &SdfExpr, p: &BuildParams) -> Result<Octree> {
        build(sdf, p, &CancelToken::new(), &mut |_| {})
    }

    #[test]
    fn sphere_classifies_all_three_states() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let tree = build_quiet(&sdf, &params(4.0, 0.125, 10_000)).unwrap();

        let mut counts = [0usize; 3];
        tree.for_each_leaf(&mut |_, _, _, state| {
            counts[match state {
                CellState::Inside => 0,
                CellState::Outside => 1,
                CellState::Boundary => 2,
            }] += 1;
        });
        assert!(counts[0] > 0, "sphere interior should produce inside leaves");
        assert!(counts[1] > 0, "corners should produce outside leaves");
        assert!(counts[2] > 0, "surface should produce boundary leaves");
    }

    #[test]
    fn boundary_leaves_straddle_the_surface() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let tree = build_quiet(&sdf, &params(4.0, 0.125, 10_000)).unwrap();

        tree.for_each_leaf(&mut |_, center, size, state| {
            if state == CellState::Boundary {
                // Cell center must be within a padded cell diagonal of the
                // surface, otherwise classification leaked.
                let d = center.length() - 1.0;
                assert!(
                    d.abs() <= size * 1.0,
                    "boundary cell at {center} size {size} is {d} from surface"
                );
            }
        });
    }

    #[test]
    fn equal_level_boundary_adjacency() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let tree = build_quiet(&sdf, &params(4.0, 0.125, 10_000)).unwrap();

        let mut leaves = Vec::new();
        tree.for_each_leaf(&mut |id, _, size, state| {
            if state == CellState::Boundary {
                leaves.push((id, size));
            }
        });
        for &(id, size) in &leaves {
            for dir in crate::octree::Direction::ALL {
                let Some(n) = tree.neighbor_at_level(id, dir) else {
                    continue;
                };
                let node = tree.node(n);
                if node.is_leaf() && node.state == CellState::Boundary {
                    let (_, nsize) = tree.cell_geometry(n);
                    assert!(
                        (nsize - size).abs() < 1e-12,
                        "boundary leaves of different size share a face"
                    );
                }
            }
        }
    }

    #[test]
    fn cell_count_within_budget() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let budget = 10_000;
        let tree = build_quiet(&sdf, &params(4.0, 0.125, budget)).unwrap();
        assert!(tree.cell_count() <= budget);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let sdf = scenes::gyroid(8.0, 0.2);
        let err = build_quiet(&sdf, &params(4.0, 0.001, 100)).unwrap_err();
        assert!(matches!(err, MesherError::BudgetExhausted { budget: 100 }));
    }

    #[test]
    fn interval_fallback_classifies_raw_expressions() {
        // Bare arithmetic sphere: evaluate_content returns None everywhere,
        // so every cell goes through the interval path.
        let x = SdfExpr::x();
        let y = SdfExpr::y();
        let z = SdfExpr::z();
        let sdf = x
            .mul(&x)
            .add(&y.mul(&y))
            .add(&z.mul(&z))
            .sqrt()
            .sub(&SdfExpr::constant(1.0));

        let tree = build_quiet(&sdf, &params(4.0, 0.25, 10_000)).unwrap();
        let mut boundary = 0;
        tree.for_each_leaf(&mut |id, _, _, state| {
            assert!(tree.node(id).content.is_none());
            if state == CellState::Boundary {
                boundary += 1;
            }
        });
        assert!(boundary > 0);
    }

    #[test]
    fn detail_hint_forces_deeper_subdivision() {
        let coarse = scenes::sphere(DVec3::ZERO, 1.0);
        let fine = match scenes::sphere(DVec3::ZERO, 1.0).node() {
            crate::sdf::SdfNode::Primitive { field, .. } => field.with_detail(0.02),
            _ => unreachable!(),
        };
        let p = params(4.0, 0.25, 200_000);
        let coarse_tree = build_quiet(&coarse, &p).unwrap();
        let fine_tree = build_quiet(&fine, &p).unwrap();
        assert!(fine_tree.cell_count() > coarse_tree.cell_count());
    }

    #[test]
    fn cancellation_unwinds() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = build(&sdf, &params(4.0, 0.01, 1_000_000), &cancel, &mut |_| {}).unwrap_err();
        assert!(matches!(err, MesherError::Cancelled));
    }

    #[test]
    fn progress_fractions_are_monotone_and_bounded() {
        let sdf = scenes::sphere(DVec3::ZERO, 1.0);
        let mut seen = Vec::new();
        build(
            &sdf,
            &params(4.0, 0.05, 100_000),
            &CancelToken::new(),
            &mut |f| seen.push(f),
        )
        .unwrap();
        assert!(!seen.is_empty());
        for w in seen.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));
    }
}
