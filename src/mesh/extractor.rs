use std::collections::HashMap;

use glam::DVec3;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::mesh::half_edge::HalfEdgeMesh;
use crate::octree::node::octant_offset;
use crate::octree::{CellState, Direction, NodeId, Octree};
use crate::sdf::SdfExpr;

/// Vertex dedup keys live on a dyadic lattice of `root_size / 2^40`.
/// Every corner and edge midpoint the extractor produces is a dyadic
/// rational of far smaller depth, so keys are exact.
const LATTICE_BITS: u32 = 40;

/// Corner octants of each face quad, counter-clockwise when seen from
/// outside the cell (cross product of the first two quad edges points
/// along the outward face direction). Indexed by `Direction`.
const FACE_CORNERS: [[u8; 4]; 6] = [
    [0, 4, 6, 2], // -X
    [1, 3, 7, 5], // +X
    [0, 1, 5, 4], // -Y
    [2, 6, 7, 3], // +Y
    [0, 2, 3, 1], // -Z
    [4, 5, 7, 6], // +Z
];

/// For a neighbor lying in direction `d`, the four of its child octants
/// that touch the shared face, one per face quadrant. Each entry is the
/// matching `FACE_CORNERS` octant mirrored across the face
/// (XOR with the direction's axis bit).
const ADJACENT_CHILDREN: [[u8; 4]; 6] = [
    [1, 5, 7, 3], // -X
    [0, 2, 6, 4], // +X
    [2, 3, 7, 6], // -Y
    [0, 4, 5, 1], // +Y
    [4, 6, 7, 5], // -Z
    [0, 1, 3, 2], // +Z
];

/// Outward tangential direction of each face-quad edge: edge `k` runs
/// from corner `k` to corner `k + 1` and borders the cell's neighbor in
/// this direction. Indexed by `Direction`.
const FACE_EDGE_DIRS: [[Direction; 4]; 6] = [
    [Direction::NegY, Direction::PosZ, Direction::PosY, Direction::NegZ], // -X
    [Direction::NegZ, Direction::PosY, Direction::PosZ, Direction::NegY], // +X
    [Direction::NegZ, Direction::PosX, Direction::PosZ, Direction::NegX], // -Y
    [Direction::NegX, Direction::PosZ, Direction::PosX, Direction::NegZ], // +Y
    [Direction::NegX, Direction::PosY, Direction::PosX, Direction::NegY], // -Z
    [Direction::NegY, Direction::PosX, Direction::PosY, Direction::NegX], // +Z
];

/// Counters reported by one extraction sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ExtractionStats {
    pub boundary_cells: usize,
    pub quads_emitted: usize,
    pub edge_splits_enqueued: usize,
    pub edge_splits_applied: usize,
}

/// One queued T-junction fix, held as positions: the endpoints resolve to
/// vertices only if the mesh actually emitted them, and the midpoint
/// vertex is created only when a split really happens.
struct QueuedSplit {
    start: DVec3,
    midpoint: DVec3,
    end: DVec3,
    local_sdf: Option<SdfExpr>,
}

struct Extractor<'a> {
    tree: &'a Octree,
    mesh: HalfEdgeMesh,
    /// Lattice-keyed vertex cache: cells share corners freely.
    vertex_cache: HashMap<[i64; 3], u32>,
    /// Queued T-junction fixes, drained in FIFO order after the sweep so
    /// coarser splits always precede finer ones.
    split_queue: Vec<QueuedSplit>,
    stats: ExtractionStats,
    lattice_origin: DVec3,
    lattice_scale: f64,
}

/// Extract the blocky interface between solid (inside + boundary) cells
/// and empty space as axis-aligned quads: per-cell faces against outside
/// neighbors, plus closure faces where the solid is clipped by the root
/// box. Cross-level T-junctions drain through the half-edge split queue.
pub fn extract_surface(tree: &Octree) -> Result<(HalfEdgeMesh, ExtractionStats)> {
    let mut extractor = Extractor {
        tree,
        mesh: HalfEdgeMesh::new(),
        vertex_cache: HashMap::new(),
        split_queue: Vec::new(),
        stats: ExtractionStats::default(),
        lattice_origin: tree.root_center - DVec3::splat(tree.root_size * 0.5),
        lattice_scale: (1u64 << LATTICE_BITS) as f64 / tree.root_size,
    };

    let mut boundary_leaves = Vec::new();
    tree.for_each_leaf(&mut |id, center, size, state| {
        if state == CellState::Boundary {
            boundary_leaves.push((id, center, size));
        }
    });

    for &(id, center, size) in &boundary_leaves {
        extractor.stats.boundary_cells += 1;
        for dir in Direction::ALL {
            extractor.emit_cell_face(id, center, size, dir)?;
        }
    }

    // Clip the solid watertight against the six root faces.
    for dir in Direction::ALL {
        let quad = face_quad(tree.root_center, tree.root_size, dir);
        extractor.emit_root_face(tree.root(), &quad, dir)?;
    }

    // Drain to a fixpoint: a fine split may target a half-edge that only
    // comes into existence once a coarser edge (queued by a cell processed
    // later) has been split, so passes repeat until nothing applies.
    let mut pending = std::mem::take(&mut extractor.split_queue);
    loop {
        let mut deferred = Vec::new();
        let mut applied_any = false;
        for split in pending {
            if extractor.apply_queued_split(&split)? {
                applied_any = true;
            } else {
                deferred.push(split);
            }
        }
        if !applied_any || deferred.is_empty() {
            break;
        }
        pending = deferred;
    }

    debug!(
        boundary_cells = extractor.stats.boundary_cells,
        quads = extractor.stats.quads_emitted,
        splits_enqueued = extractor.stats.edge_splits_enqueued,
        splits_applied = extractor.stats.edge_splits_applied,
        vertices = extractor.mesh.vertex_count(),
        "surface extraction complete"
    );
    Ok((extractor.mesh, extractor.stats))
}

impl Extractor<'_> {
    fn emit_cell_face(
        &mut self,
        id: NodeId,
        center: DVec3,
        size: f64,
        dir: Direction,
    ) -> Result<()> {
        let local_sdf = self
            .tree
            .node(id)
            .content
            .as_ref()
            .and_then(|c| c.local_sdf.clone());
        let quad = face_quad(center, size, dir);

        match self.tree.neighbor_at_level(id, dir) {
            // Root boundary: the closure sweep owns those faces.
            None => Ok(()),
            Some(n) if self.tree.node(n).is_leaf() => match self.tree.node(n).state {
                CellState::Outside => {
                    self.emit_quad(&quad, local_sdf.as_ref())?;
                    self.reconcile_face_edges(id, &quad, dir, local_sdf.as_ref())
                }
                // Interior faces and boundary-boundary faces carry no surface.
                CellState::Inside | CellState::Boundary => Ok(()),
            },
            Some(n) => {
                self.emit_split_face(n, &quad, dir, local_sdf.as_ref())?;
                self.reconcile_face_edges(id, &quad, dir, local_sdf.as_ref())
            }
        }
    }

    /// Emit one full face quad as two triangles.
    fn emit_quad(&mut self, quad: &[DVec3; 4], local_sdf: Option<&SdfExpr>) -> Result<()> {
        let mut v = [0u32; 4];
        for (slot, &corner) in v.iter_mut().zip(quad.iter()) {
            *slot = self.vertex(corner, local_sdf);
        }
        self.mesh.add_face(v[0], v[1], v[2])?;
        self.mesh.add_face(v[0], v[2], v[3])?;
        self.stats.quads_emitted += 1;
        Ok(())
    }

    fn enqueue_split(&mut self, a: DVec3, m: DVec3, b: DVec3, local_sdf: Option<&SdfExpr>) {
        self.split_queue.push(QueuedSplit {
            start: a,
            midpoint: m,
            end: b,
            local_sdf: local_sdf.cloned(),
        });
        self.stats.edge_splits_enqueued += 1;
    }

    /// Drain one queue entry. Applies only when both endpoints were
    /// actually emitted and a half-edge between them is still waiting for
    /// its pair (the other side was emitted at a finer subdivision); the
    /// midpoint vertex is created on demand.
    fn apply_queued_split(&mut self, split: &QueuedSplit) -> Result<bool> {
        let Some(start) = self.lookup_vertex(split.start) else {
            return Ok(false);
        };
        let Some(end) = self.lookup_vertex(split.end) else {
            return Ok(false);
        };
        if !self.mesh.has_open_edge(start, end) {
            return Ok(false);
        }
        let midpoint = self.vertex(split.midpoint, split.local_sdf.as_ref());
        self.mesh.late_split_edge(start, end, midpoint)?;
        self.stats.edge_splits_applied += 1;
        Ok(true)
    }

    /// The neighbor is finer than this cell: split the face into a 2x2
    /// grid of sub-quads and emit each against the neighbor child behind
    /// it, recursing while those children are themselves subdivided.
    ///
    /// The outer half-length edges created at every level terminate
    /// against coarser edges emitted by other faces, so each is queued for
    /// a late split before recursing (coarse entries must drain first).
    fn emit_split_face(
        &mut self,
        neighbor: NodeId,
        quad: &[DVec3; 4],
        dir: Direction,
        local_sdf: Option<&SdfExpr>,
    ) -> Result<()> {
        let mid = [
            (quad[0] + quad[1]) * 0.5,
            (quad[1] + quad[2]) * 0.5,
            (quad[2] + quad[3]) * 0.5,
            (quad[3] + quad[0]) * 0.5,
        ];
        let center = (quad[0] + quad[1] + quad[2] + quad[3]) * 0.25;

        for k in 0..4 {
            self.enqueue_split(quad[k], mid[k], quad[(k + 1) % 4], local_sdf);
        }

        // Sub-quads keep the ring orientation: position j of each sub-quad
        // lies toward corner j of the parent quad.
        let sub_quads = [
            [quad[0], mid[0], center, mid[3]],
            [mid[0], quad[1], mid[1], center],
            [center, mid[1], quad[2], mid[2]],
            [mid[3], center, mid[2], quad[3]],
        ];
        let children = self
            .tree
            .node(neighbor)
            .children
            .expect("split face requires an internal neighbor");

        for (k, sub_quad) in sub_quads.iter().enumerate() {
            let child = children[ADJACENT_CHILDREN[dir as usize][k] as usize];
            let child_node = self.tree.node(child);
            if child_node.is_leaf() {
                if child_node.state == CellState::Outside {
                    self.emit_quad(sub_quad, local_sdf)?;
                }
            } else {
                self.emit_split_face(child, sub_quad, dir, local_sdf)?;
            }
        }
        Ok(())
    }

    /// Quadtree sweep of one root face: the solid is clipped watertight by
    /// emitting the face quads of inside and boundary cells touching the
    /// root box wall. Splits follow the octree structure, so the sweep
    /// queues exactly the midpoints needed where coarse wall quads meet
    /// finer ones.
    fn emit_root_face(&mut self, node: NodeId, quad: &[DVec3; 4], dir: Direction) -> Result<()> {
        let cell = self.tree.node(node);
        let Some(children) = cell.children else {
            return match cell.state {
                CellState::Inside | CellState::Boundary => {
                    let local_sdf = cell.content.as_ref().and_then(|c| c.local_sdf.clone());
                    self.emit_quad(quad, local_sdf.as_ref())
                }
                CellState::Outside => Ok(()),
            };
        };

        let mid = [
            (quad[0] + quad[1]) * 0.5,
            (quad[1] + quad[2]) * 0.5,
            (quad[2] + quad[3]) * 0.5,
            (quad[3] + quad[0]) * 0.5,
        ];
        let center = (quad[0] + quad[1] + quad[2] + quad[3]) * 0.25;
        for k in 0..4 {
            self.enqueue_split(quad[k], mid[k], quad[(k + 1) % 4], None);
        }
        let sub_quads = [
            [quad[0], mid[0], center, mid[3]],
            [mid[0], quad[1], mid[1], center],
            [center, mid[1], quad[2], mid[2]],
            [mid[3], center, mid[2], quad[3]],
        ];
        for (k, sub_quad) in sub_quads.iter().enumerate() {
            // Children on the wall side of the split, one per quadrant.
            let child = children[FACE_CORNERS[dir as usize][k] as usize];
            self.emit_root_face(child, sub_quad, dir)?;
        }
        Ok(())
    }

    /// After emitting a face for `id`, queue the splits its outer edges
    /// need against finer regions across each tangential neighbor. The
    /// finer side emits half-length edges at its own scale; walking the
    /// neighbor subtree queues the matching midpoints at every level.
    /// Entries that turn out to face equal-size quads drain as no-ops.
    fn reconcile_face_edges(
        &mut self,
        id: NodeId,
        quad: &[DVec3; 4],
        dir: Direction,
        local_sdf: Option<&SdfExpr>,
    ) -> Result<()> {
        for k in 0..4 {
            let tangent = FACE_EDGE_DIRS[dir as usize][k];
            let Some(n) = self.tree.neighbor_at_level(id, tangent) else {
                continue;
            };
            if !self.tree.node(n).is_leaf() {
                self.enqueue_edge_splits(n, quad[k], quad[(k + 1) % 4], dir, tangent, local_sdf);
            }
        }
        Ok(())
    }

    /// Recursively queue midpoint splits for the edge `(a, b)` following
    /// the subdivision of the tangential neighbor subtree along it.
    fn enqueue_edge_splits(
        &mut self,
        node: NodeId,
        a: DVec3,
        b: DVec3,
        dir: Direction,
        tangent: Direction,
        local_sdf: Option<&SdfExpr>,
    ) {
        let Some(children) = self.tree.node(node).children else {
            return;
        };
        let m = (a + b) * 0.5;
        self.enqueue_split(a, m, b, local_sdf);

        // Children abutting the edge share the emitting cell's face plane
        // along `dir` and face back toward it along `tangent`; the third
        // axis selects the half of the edge.
        let mut base = 0u8;
        if dir.is_positive() {
            base |= dir.axis_bit();
        }
        if !tangent.is_positive() {
            base |= tangent.axis_bit();
        }
        let edge_bit = 7 ^ dir.axis_bit() ^ tangent.axis_bit();
        let edge_axis = match edge_bit {
            1 => 0,
            2 => 1,
            _ => 2,
        };
        let first = if a[edge_axis] > b[edge_axis] {
            base | edge_bit
        } else {
            base
        };
        let second = if b[edge_axis] > a[edge_axis] {
            base | edge_bit
        } else {
            base
        };
        self.enqueue_edge_splits(children[first as usize], a, m, dir, tangent, local_sdf);
        self.enqueue_edge_splits(children[second as usize], m, b, dir, tangent, local_sdf);
    }

    fn lattice_key(&self, position: DVec3) -> [i64; 3] {
        let rel = (position - self.lattice_origin) * self.lattice_scale;
        [
            rel.x.round() as i64,
            rel.y.round() as i64,
            rel.z.round() as i64,
        ]
    }

    /// Deduplicated vertex lookup. The first cell to create a vertex
    /// donates its local surface reference.
    fn vertex(&mut self, position: DVec3, local_sdf: Option<&SdfExpr>) -> u32 {
        let key = self.lattice_key(position);
        if let Some(&v) = self.vertex_cache.get(&key) {
            return v;
        }
        let v = self.mesh.add_vertex_with_sdf(position, local_sdf.cloned());
        self.vertex_cache.insert(key, v);
        v
    }

    /// Cache probe that never creates a vertex.
    fn lookup_vertex(&self, position: DVec3) -> Option<u32> {
        self.vertex_cache.get(&self.lattice_key(position)).copied()
    }
}

/// The four corners of a cell's face in `dir`, counter-clockwise from
/// outside.
fn face_quad(center: DVec3, size: f64, dir: Direction) -> [DVec3; 4] {
    FACE_CORNERS[dir as usize].map(|octant| center + octant_offset(octant) * (size * 0.5))
}
