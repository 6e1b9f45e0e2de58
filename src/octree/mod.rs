pub mod builder;
pub mod node;

pub use builder::build;
pub use node::{CellState, Direction, NodeId, Octree, OctreeNode};
