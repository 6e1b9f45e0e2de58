use std::io;

/// All error types for the sdf-mesher pipeline.
///
/// No error is retried: the pipeline either completes fully or surfaces
/// exactly one of these to the caller. No partial mesh is ever emitted.
#[derive(thiserror::Error, Debug)]
pub enum MesherError {
    /// The octree builder hit the hard cell budget mid-subdivision.
    #[error("Cell budget exhausted: {budget} cells")]
    BudgetExhausted { budget: usize },
    /// The cooperative cancellation flag was set; the build unwound silently.
    #[error("Meshing cancelled")]
    Cancelled,
    /// A face or edge operation would attach a third triangle to an edge.
    #[error("Non-manifold attachment: {0}")]
    NonManifoldAttachment(String),
    /// The mesh still had open edges after extraction and split draining.
    #[error("Mesh is not manifold: {open_edges} open edges")]
    NonManifold { open_edges: usize },
    /// The SDF evaluator produced an unusable value (NaN domain, etc).
    #[error("Invalid SDF: {0}")]
    InvalidSdf(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MesherError>;
