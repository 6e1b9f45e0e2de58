use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::mesh::SerializedMesh;

/// Write a serialized mesh as ASCII Wavefront OBJ.
///
/// Positions only; OBJ indices are 1-based.
pub fn write_obj(path: &Path, mesh: &SerializedMesh) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    for i in 0..mesh.vertex_count() {
        let p = mesh.position(i);
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for tri in mesh.indices.chunks_exact(3) {
        writeln!(out, "f {} {} {}", tri[0] + 1, tri[1] + 1, tri[2] + 1)?;
    }
    out.flush()?;

    info!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "wrote OBJ"
    );
    Ok(())
}
