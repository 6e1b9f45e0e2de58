use glam::DVec3;

use crate::sdf::Content;

/// Handle into the octree node arena.
pub type NodeId = usize;

/// Classification of a leaf cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Inside,
    Outside,
    Boundary,
}

/// One of the six axial face directions.
///
/// `axis_bit` is the octant-index bit for the direction's axis
/// (x = 1, y = 2, z = 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    NegX,
    PosX,
    NegY,
    PosY,
    NegZ,
    PosZ,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::NegX,
        Direction::PosX,
        Direction::NegY,
        Direction::PosY,
        Direction::NegZ,
        Direction::PosZ,
    ];

    pub fn axis_bit(self) -> u8 {
        match self {
            Direction::NegX | Direction::PosX => 1,
            Direction::NegY | Direction::PosY => 2,
            Direction::NegZ | Direction::PosZ => 4,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Direction::PosX | Direction::PosY | Direction::PosZ)
    }

    /// Unit vector along the direction.
    pub fn unit(self) -> DVec3 {
        match self {
            Direction::NegX => DVec3::new(-1.0, 0.0, 0.0),
            Direction::PosX => DVec3::new(1.0, 0.0, 0.0),
            Direction::NegY => DVec3::new(0.0, -1.0, 0.0),
            Direction::PosY => DVec3::new(0.0, 1.0, 0.0),
            Direction::NegZ => DVec3::new(0.0, 0.0, -1.0),
            Direction::PosZ => DVec3::new(0.0, 0.0, 1.0),
        }
    }
}

/// Unit-sign offset of an octant from its parent's center.
///
/// Octant layout (bit pattern: z_hi | y_hi | x_hi):
///   0 = (lo, lo, lo), 1 = (hi, lo, lo), 2 = (lo, hi, lo), 3 = (hi, hi, lo)
///   4 = (lo, lo, hi), 5 = (hi, lo, hi), 6 = (lo, hi, hi), 7 = (hi, hi, hi)
pub fn octant_offset(octant: u8) -> DVec3 {
    DVec3::new(
        if octant & 1 != 0 { 1.0 } else { -1.0 },
        if octant & 2 != 0 { 1.0 } else { -1.0 },
        if octant & 4 != 0 { 1.0 } else { -1.0 },
    )
}

/// Center of the child occupying `octant` within a parent cell.
pub fn child_center(parent_center: DVec3, parent_size: f64, octant: u8) -> DVec3 {
    parent_center + octant_offset(octant) * (parent_size * 0.25)
}

/// A node in the classified octree arena.
///
/// Geometry is never stored: center and size are re-derived from the root
/// and the octant path, so cached geometry can never drift.
#[derive(Debug, Clone)]
pub struct OctreeNode {
    /// Parent handle plus this node's octant index within it; `None` for
    /// the root. Used only for neighbor queries.
    pub parent: Option<(NodeId, u8)>,
    pub state: CellState,
    pub children: Option<[NodeId; 8]>,
    /// Classification captured at build time; `Face` content carries the
    /// local surface that extraction attaches to vertices.
    pub content: Option<Content>,
}

impl OctreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Classified adaptive octree over the box
/// `root_center ± root_size / 2` per axis.
#[derive(Debug)]
pub struct Octree {
    pub(crate) nodes: Vec<OctreeNode>,
    pub root_center: DVec3,
    pub root_size: f64,
}

impl Octree {
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &OctreeNode {
        &self.nodes[id]
    }

    /// Total number of cells in the tree.
    pub fn cell_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of boundary leaves.
    pub fn boundary_leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf() && n.state == CellState::Boundary)
            .count()
    }

    /// Neighbor of `id` across the given face, at the same level or
    /// shallower. `None` at the root boundary.
    ///
    /// Cost is O(depth): walk up while the move crosses the parent, then
    /// mirror back down through equal levels.
    pub fn neighbor_at_level(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        let (parent, octant) = self.nodes[id].parent?;
        let bit = dir.axis_bit();
        let on_positive_side = octant & bit != 0;

        // Moving toward the parent's interior: the neighbor is a sibling.
        if on_positive_side != dir.is_positive() {
            let siblings = self.nodes[parent]
                .children
                .expect("parent of a node must be internal");
            return Some(siblings[(octant ^ bit) as usize]);
        }

        // Crossing out of the parent: descend into the parent's neighbor
        // through the mirrored octant, or return it as-is when coarser.
        let parent_neighbor = self.neighbor_at_level(parent, dir)?;
        match self.nodes[parent_neighbor].children {
            None => Some(parent_neighbor),
            Some(children) => Some(children[(octant ^ bit) as usize]),
        }
    }

    /// Re-derive a cell's center and size from its octant path.
    pub fn cell_geometry(&self, id: NodeId) -> (DVec3, f64) {
        let mut path = Vec::new();
        let mut cur = id;
        while let Some((parent, octant)) = self.nodes[cur].parent {
            path.push(octant);
            cur = parent;
        }
        let mut center = self.root_center;
        let mut size = self.root_size;
        for octant in path.into_iter().rev() {
            center = child_center(center, size, octant);
            size *= 0.5;
        }
        (center, size)
    }

    /// Visit every leaf with its derived geometry.
    pub fn for_each_leaf<F>(&self, f: &mut F)
    where
        F: FnMut(NodeId, DVec3, f64, CellState),
    {
        self.walk(self.root(), self.root_center, self.root_size, f);
    }

    fn walk<F>(&self, id: NodeId, center: DVec3, size: f64, f: &mut F)
    where
        F: FnMut(NodeId, DVec3, f64, CellState),
    {
        match self.nodes[id].children {
            None => f(id, center, size, self.nodes[id].state),
            Some(children) => {
                for (octant, child) in children.into_iter().enumerate() {
                    self.walk(
                        child,
                        child_center(center, size, octant as u8),
                        size * 0.5,
                        f,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built tree: root subdivided once, then octants 6 and 7
    /// subdivided again.
    fn two_level_tree() -> Octree {
        let mut nodes = vec![OctreeNode {
            parent: None,
            state: CellState::Boundary,
            children: None,
            content: None,
        }];
        let first: Vec<NodeId> = (0..8u8)
            .map(|octant| {
                nodes.push(OctreeNode {
                    parent: Some((0, octant)),
                    state: CellState::Boundary,
                    children: None,
                    content: None,
                });
                nodes.len() - 1
            })
            .collect();
        nodes[0].children = Some(first.clone().try_into().unwrap());

        for deep_parent in [first[6], first[7]] {
            let second: Vec<NodeId> = (0..8u8)
                .map(|octant| {
                    nodes.push(OctreeNode {
                        parent: Some((deep_parent, octant)),
                        state: CellState::Boundary,
                        children: None,
                        content: None,
                    });
                    nodes.len() - 1
                })
                .collect();
            nodes[deep_parent].children = Some(second.try_into().unwrap());
        }

        Octree {
            nodes,
            root_center: DVec3::ZERO,
            root_size: 4.0,
        }
    }

    #[test]
    fn octant_offsets_match_bit_layout() {
        assert_eq!(octant_offset(0), DVec3::new(-1.0, -1.0, -1.0));
        assert_eq!(octant_offset(1), DVec3::new(1.0, -1.0, -1.0));
        assert_eq!(octant_offset(2), DVec3::new(-1.0, 1.0, -1.0));
        assert_eq!(octant_offset(4), DVec3::new(-1.0, -1.0, 1.0));
        assert_eq!(octant_offset(7), DVec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn child_center_derivation() {
        let c = child_center(DVec3::ZERO, 4.0, 7);
        assert_eq!(c, DVec3::new(1.0, 1.0, 1.0));
        let c = child_center(DVec3::new(1.0, 1.0, 1.0), 2.0, 0);
        assert_eq!(c, DVec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn root_has_no_neighbors() {
        let tree = two_level_tree();
        for dir in Direction::ALL {
            assert_eq!(tree.neighbor_at_level(tree.root(), dir), None);
        }
    }

    #[test]
    fn sibling_neighbor_within_parent() {
        let tree = two_level_tree();
        let children = tree.node(0).children.unwrap();
        // Octant 0 moving +X reaches octant 1
        assert_eq!(
            tree.neighbor_at_level(children[0], Direction::PosX),
            Some(children[1])
        );
        // Octant 5 moving -Z reaches octant 1
        assert_eq!(
            tree.neighbor_at_level(children[5], Direction::NegZ),
            Some(children[1])
        );
    }

    #[test]
    fn boundary_of_root_is_none() {
        let tree = two_level_tree();
        let children = tree.node(0).children.unwrap();
        assert_eq!(tree.neighbor_at_level(children[0], Direction::NegX), None);
        assert_eq!(tree.neighbor_at_level(children[7], Direction::PosZ), None);
    }

    #[test]
    fn same_level_internal_sibling_returned_whole() {
        let tree = two_level_tree();
        let first = tree.node(0).children.unwrap();
        // Octant 5 moving +Y reaches octant 7; the lookup stays at the
        // caller's level even though that sibling is subdivided.
        let n = tree.neighbor_at_level(first[5], Direction::PosY).unwrap();
        assert_eq!(n, first[7]);
        assert!(!tree.node(n).is_leaf());
    }

    #[test]
    fn cross_parent_neighbor_descends_into_subdivided_sibling() {
        let tree = two_level_tree();
        let first = tree.node(0).children.unwrap();
        let in_six = tree.node(first[6]).children.unwrap();
        let in_seven = tree.node(first[7]).children.unwrap();
        // Octant 1 inside subtree 6, moving +X, crosses into subtree 7;
        // the neighbor is the mirrored child (octant 0) at the same level.
        let n = tree.neighbor_at_level(in_six[1], Direction::PosX).unwrap();
        assert_eq!(n, in_seven[0]);
    }

    #[test]
    fn coarser_neighbor_returned_as_leaf() {
        let tree = two_level_tree();
        let first = tree.node(0).children.unwrap();
        let in_seven = tree.node(first[7]).children.unwrap();
        // A depth-2 cell on the -Y face of its parent: the neighbor in -Y
        // is the depth-1 leaf in octant 5.
        let n = tree.neighbor_at_level(in_seven[0], Direction::NegY).unwrap();
        assert_eq!(n, first[5]);
        assert!(tree.node(n).is_leaf());
    }

    #[test]
    fn neighbor_boxes_abut() {
        let tree = two_level_tree();
        let mut leaves = Vec::new();
        tree.for_each_leaf(&mut |id, center, size, _| leaves.push((id, center, size)));

        for &(id, center, size) in &leaves {
            for dir in Direction::ALL {
                let Some(n) = tree.neighbor_at_level(id, dir) else {
                    continue;
                };
                let (nc, ns) = tree.cell_geometry(n);
                // Face planes must coincide along `dir`
                let my_face = (center + dir.unit() * (size * 0.5)).dot(dir.unit());
                let their_face = (nc - dir.unit() * (ns * 0.5)).dot(dir.unit());
                assert!(
                    (my_face - their_face).abs() < 1e-12,
                    "neighbor of {id} along {dir:?} does not abut"
                );
            }
        }
    }

    #[test]
    fn cell_geometry_matches_walk() {
        let tree = two_level_tree();
        tree.for_each_leaf(&mut |id, center, size, _| {
            let (dc, ds) = tree.cell_geometry(id);
            assert!((dc - center).length() < 1e-12);
            assert!((ds - size).abs() < 1e-12);
        });
    }
}
