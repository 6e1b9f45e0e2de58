pub mod extractor;
pub mod half_edge;
pub mod refine;
pub mod serialized;

pub use extractor::{ExtractionStats, extract_surface};
pub use half_edge::{HalfEdge, HalfEdgeMesh, HalfEdgeSplit, UNPAIRED, Vertex};
pub use refine::refine_edges;
pub use serialized::SerializedMesh;
