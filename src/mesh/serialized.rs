use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Flat triangle-soup output of the pipeline.
///
/// Positions are packed `[x, y, z, x, y, z, ...]`; indices are triangle
/// triples wound counter-clockwise when seen from outside the solid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedMesh {
    pub vertices: Vec<f64>,
    pub indices: Vec<u32>,
}

impl SerializedMesh {
    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles (indices / 3).
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn position(&self, i: usize) -> DVec3 {
        DVec3::new(
            self.vertices[i * 3],
            self.vertices[i * 3 + 1],
            self.vertices[i * 3 + 2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mesh() {
        let mesh = SerializedMesh::default();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn single_triangle() {
        let mesh = SerializedMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
        };
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.position(1), DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn serde_round_trip() {
        let mesh = SerializedMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
        };
        let json = serde_json::to_string(&mesh).unwrap();
        let back: SerializedMesh = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vertices, mesh.vertices);
        assert_eq!(back.indices, mesh.indices);
    }
}
