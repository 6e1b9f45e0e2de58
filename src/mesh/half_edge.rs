use std::collections::HashMap;
use std::collections::hash_map::Entry;

use glam::DVec3;

use crate::error::{MesherError, Result};
use crate::mesh::serialized::SerializedMesh;
use crate::sdf::SdfExpr;

/// Sentinel for a half-edge with no opposite partner yet.
pub const UNPAIRED: u32 = u32::MAX;

/// Gradient-descent step for surface projection.
const PROJECTION_STEP: f64 = 1e-4;
/// Projection stops once the field magnitude drops below this.
const PROJECTION_TOLERANCE: f64 = 1e-4;
const PROJECTION_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: DVec3,
    /// Surface this vertex was created from, when known. Projection uses
    /// it instead of the global field for better conditioning.
    pub local_sdf: Option<SdfExpr>,
}

/// Directed traversal element. Three half-edges linked through `next`
/// form one implicit triangle; `pair` is the opposite half-edge on the
/// shared undirected edge, or [`UNPAIRED`].
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    pub to_vertex: u32,
    pub next: u32,
    pub pair: u32,
}

/// Indices of the three outgoing half-edges produced by a half-edge split.
///
/// Splitting `A→B` (triangle `A,B,C`) around `X` yields triangles
/// `A,X,C` and `X,B,C`.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdgeSplit {
    /// `A→X`, occupying the original `A→B` slot.
    pub tail_to_split: u32,
    /// `X→C`, the interior edge of the first new triangle.
    pub split_to_opposite: u32,
    /// `X→B`, continuing the original edge; unpaired until relinked.
    pub split_to_head: u32,
}

/// Triangle mesh stored as half-edge arenas with integer handles.
///
/// Storage is append-only: splits mutate half-edges in place and append
/// new ones, so indices held by callers stay valid across edits. Vertex
/// positions may move during projection; nothing is ever deleted.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    vertices: Vec<Vertex>,
    half_edges: Vec<HalfEdge>,
    /// Unordered vertex pair -> the one half-edge still lacking its pair.
    /// Empty map after construction == manifold mesh.
    open_edge_map: HashMap<(u32, u32), u32>,
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.half_edges.len() / 3
    }

    pub fn vertex(&self, v: u32) -> &Vertex {
        &self.vertices[v as usize]
    }

    pub fn position(&self, v: u32) -> DVec3 {
        self.vertices[v as usize].position
    }

    pub fn half_edge(&self, e: u32) -> HalfEdge {
        self.half_edges[e as usize]
    }

    /// Origin vertex of a half-edge (the target of its predecessor in the
    /// triangle cycle).
    pub fn from_vertex(&self, e: u32) -> u32 {
        let next = self.half_edges[e as usize].next;
        let prev = self.half_edges[next as usize].next;
        self.half_edges[prev as usize].to_vertex
    }

    pub fn open_edge_count(&self) -> usize {
        self.open_edge_map.len()
    }

    /// A mesh is manifold iff every half-edge found its pair.
    pub fn is_manifold(&self) -> bool {
        self.open_edge_map.is_empty()
    }

    /// Whether a half-edge between the two vertices is still waiting for
    /// its pair.
    pub fn has_open_edge(&self, a: u32, b: u32) -> bool {
        self.open_edge_map.contains_key(&edge_key(a, b))
    }

    pub fn add_vertex(&mut self, position: DVec3) -> u32 {
        self.add_vertex_with_sdf(position, None)
    }

    pub fn add_vertex_with_sdf(&mut self, position: DVec3, local_sdf: Option<SdfExpr>) -> u32 {
        self.vertices.push(Vertex {
            position,
            local_sdf,
        });
        (self.vertices.len() - 1) as u32
    }

    /// Add the triangle `v0 → v1 → v2` and link opposite half-edges as
    /// they meet. Returns the index of the `v0 → v1` half-edge.
    pub fn add_face(&mut self, v0: u32, v1: u32, v2: u32) -> Result<u32> {
        let base = self.half_edges.len() as u32;
        self.half_edges.push(HalfEdge {
            to_vertex: v1,
            next: base + 1,
            pair: UNPAIRED,
        });
        self.half_edges.push(HalfEdge {
            to_vertex: v2,
            next: base + 2,
            pair: UNPAIRED,
        });
        self.half_edges.push(HalfEdge {
            to_vertex: v0,
            next: base,
            pair: UNPAIRED,
        });
        self.register_half_edge(base)?;
        self.register_half_edge(base + 1)?;
        self.register_half_edge(base + 2)?;
        Ok(base)
    }

    /// Register a half-edge in the open-edge map, linking it with the
    /// waiting opposite half-edge if one exists.
    fn register_half_edge(&mut self, e: u32) -> Result<()> {
        let from = self.from_vertex(e);
        let to = self.half_edges[e as usize].to_vertex;
        match self.open_edge_map.entry(edge_key(from, to)) {
            Entry::Occupied(entry) => {
                let other = *entry.get();
                let other_edge = self.half_edges[other as usize];
                // Entries are removed the moment they pair, so a waiting
                // half-edge is always unpaired.
                debug_assert_eq!(other_edge.pair, UNPAIRED);
                if other_edge.to_vertex == to {
                    // Same direction: a second face on the same side.
                    return Err(MesherError::NonManifoldAttachment(format!(
                        "duplicate half-edge {from} -> {to}"
                    )));
                }
                entry.remove();
                self.half_edges[other as usize].pair = e;
                self.half_edges[e as usize].pair = other;
            }
            Entry::Vacant(entry) => {
                entry.insert(e);
            }
        }
        Ok(())
    }

    /// Split the triangle of `ab` along that edge by inserting vertex `x`.
    ///
    /// `A→B→C` becomes `A→X→C` plus `X→B→C`. The `ab` slot is mutated into
    /// `A→X` so external pair pointers stay valid; the caller relinks the
    /// pairs of `A→X` and `X→B` (the returned `split_to_head`). The
    /// interior edges `X→C` / `C→X` are paired here. The open-edge map is
    /// not consulted; map-level bookkeeping belongs to the caller.
    pub fn split_half_edge(&mut self, ab: u32, x: u32) -> HalfEdgeSplit {
        let bc = self.half_edges[ab as usize].next;
        let ca = self.half_edges[bc as usize].next;
        let b = self.half_edges[ab as usize].to_vertex;
        let c = self.half_edges[bc as usize].to_vertex;

        let xc = self.half_edges.len() as u32;
        let cx = xc + 1;
        let xb = xc + 2;
        self.half_edges.push(HalfEdge {
            to_vertex: c,
            next: ca,
            pair: cx,
        });
        self.half_edges.push(HalfEdge {
            to_vertex: x,
            next: xb,
            pair: xc,
        });
        self.half_edges.push(HalfEdge {
            to_vertex: b,
            next: bc,
            pair: UNPAIRED,
        });

        self.half_edges[ab as usize].to_vertex = x;
        self.half_edges[ab as usize].next = xc;
        self.half_edges[bc as usize].next = cx;

        HalfEdgeSplit {
            tail_to_split: ab,
            split_to_opposite: xc,
            split_to_head: xb,
        }
    }

    /// Split a fully paired edge on both sides around vertex `x`,
    /// cross-linking the four resulting half-edges. Returns
    /// `[A→X, X→B, B→X, X→A]`.
    pub fn split_edge(&mut self, ab: u32, x: u32) -> Result<[u32; 4]> {
        let ba = self.half_edges[ab as usize].pair;
        if ba == UNPAIRED {
            return Err(MesherError::NonManifoldAttachment(format!(
                "split_edge on unpaired half-edge {ab}"
            )));
        }
        let front = self.split_half_edge(ab, x);
        let back = self.split_half_edge(ba, x);

        // A→X pairs with X→A, B→X pairs with X→B.
        self.half_edges[front.tail_to_split as usize].pair = back.split_to_head;
        self.half_edges[back.split_to_head as usize].pair = front.tail_to_split;
        self.half_edges[back.tail_to_split as usize].pair = front.split_to_head;
        self.half_edges[front.split_to_head as usize].pair = back.tail_to_split;

        Ok([
            front.tail_to_split,
            front.split_to_head,
            back.tail_to_split,
            back.split_to_head,
        ])
    }

    /// Resolve a queued T-junction: if a half-edge between `start` and
    /// `end` is still waiting for its pair, split it around `split` and
    /// re-register both halves. Returns whether a split was applied; when
    /// the coarse side was already emitted in split form this is a no-op.
    pub fn late_split_edge(&mut self, start: u32, end: u32, split: u32) -> Result<bool> {
        let Some(open) = self.open_edge_map.remove(&edge_key(start, end)) else {
            return Ok(false);
        };
        let result = self.split_half_edge(open, split);
        self.register_half_edge(result.tail_to_split)?;
        self.register_half_edge(result.split_to_head)?;
        Ok(true)
    }

    /// Pull every vertex onto the zero isosurface with up to ten
    /// gradient-descent steps, preferring the vertex's own local surface
    /// over the global field.
    pub fn optimize_vertices(&mut self, global_sdf: &SdfExpr) {
        for vertex in &mut self.vertices {
            let sdf = vertex.local_sdf.as_ref().unwrap_or(global_sdf).clone();
            vertex.position = project_to_surface(&sdf, vertex.position);
        }
    }

    /// Flatten into parallel vertex / index buffers, enumerating triangles
    /// by walking unvisited half-edge triples.
    pub fn to_serialized(&self) -> SerializedMesh {
        let mut vertices = Vec::with_capacity(self.vertices.len() * 3);
        for v in &self.vertices {
            vertices.extend_from_slice(&[v.position.x, v.position.y, v.position.z]);
        }

        let mut indices = Vec::with_capacity(self.half_edges.len());
        let mut visited = vec![false; self.half_edges.len()];
        for e in 0..self.half_edges.len() {
            if visited[e] {
                continue;
            }
            let e = e as u32;
            let second = self.half_edges[e as usize].next;
            let third = self.half_edges[second as usize].next;
            visited[e as usize] = true;
            visited[second as usize] = true;
            visited[third as usize] = true;
            indices.push(self.half_edges[third as usize].to_vertex);
            indices.push(self.half_edges[e as usize].to_vertex);
            indices.push(self.half_edges[second as usize].to_vertex);
        }

        SerializedMesh { vertices, indices }
    }

    /// Rebuild a half-edge mesh from serialized buffers.
    pub fn from_serialized(mesh: &SerializedMesh) -> Result<Self> {
        let mut out = Self::new();
        for i in 0..mesh.vertex_count() {
            out.add_vertex(mesh.position(i));
        }
        for tri in mesh.indices.chunks_exact(3) {
            out.add_face(tri[0], tri[1], tri[2])?;
        }
        Ok(out)
    }
}

/// Newton-style projection of a point onto the zero isosurface.
///
/// Steps `-distance` along the normalized central-difference gradient,
/// stopping once `|distance|` falls under the tolerance or the gradient
/// degenerates.
pub(crate) fn project_to_surface(sdf: &SdfExpr, mut p: DVec3) -> DVec3 {
    for _ in 0..PROJECTION_MAX_ITERATIONS {
        let distance = sdf.evaluate(p);
        if distance.abs() < PROJECTION_TOLERANCE || !distance.is_finite() {
            break;
        }
        let gradient = sdf.gradient(p, PROJECTION_STEP);
        let Some(normal) = gradient.try_normalize() else {
            break;
        };
        p -= normal * distance;
    }
    p
}
