//! Geometry batch merge
//!
//! All meshes share one vertex buffer and one index buffer. Each submesh is
//! remembered as `(index_count, start_index, base_vertex)` into the shared
//! arrays, so indices stay local to their own mesh and the draw adds the
//! base vertex back.

use std::collections::HashMap;

use crate::render::{RenderError, RenderResult};

/// Vertex layout shared by every mesh in a batch
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    /// Object space position
    pub position: [f32; 3],
    /// Object space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Vertex from position, normal and texture coordinate
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }
}

/// Draw parameters of one submesh inside the shared buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshRange {
    /// Indices belonging to the submesh
    pub index_count: u32,
    /// First index in the shared index buffer
    pub start_index: u32,
    /// First vertex in the shared vertex buffer
    pub base_vertex: i32,
}

/// Accumulates meshes into shared vertex/index arrays
#[derive(Debug, Default)]
pub struct MeshBatchBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    names: Vec<String>,
    submeshes: HashMap<String, SubmeshRange>,
}

impl MeshBatchBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mesh under `name` and return where it landed
    pub fn add_mesh(&mut self, name: impl Into<String>, vertices: &[Vertex], indices: &[u32]) -> RenderResult<SubmeshRange> {
        let name = name.into();
        if self.submeshes.contains_key(&name) {
            return Err(RenderError::DuplicateName { kind: "submesh", name });
        }

        if let Some(&bad) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(RenderError::InvalidGeometry(format!(
                "mesh '{name}' index {bad} is outside its {} vertices",
                vertices.len()
            )));
        }

        let too_large = |what: &str| RenderError::InvalidGeometry(format!("mesh batch {what} exceeds 32-bit range"));
        let range = SubmeshRange {
            index_count: u32::try_from(indices.len()).map_err(|_| too_large("index count"))?,
            start_index: u32::try_from(self.indices.len()).map_err(|_| too_large("index offset"))?,
            base_vertex: i32::try_from(self.vertices.len()).map_err(|_| too_large("vertex offset"))?,
        };

        self.vertices.extend_from_slice(vertices);
        self.indices.extend_from_slice(indices);

        log::debug!(
            "Merged mesh '{}': {} vertices, {} indices at start {} / base {}",
            name,
            vertices.len(),
            indices.len(),
            range.start_index,
            range.base_vertex
        );

        self.names.push(name.clone());
        self.submeshes.insert(name, range);
        Ok(range)
    }

    /// Freeze the batch
    pub fn build(self) -> MeshBatch {
        MeshBatch {
            vertices: self.vertices,
            indices: self.indices,
            names: self.names,
            submeshes: self.submeshes,
        }
    }
}

/// Immutable merged geometry
#[derive(Debug, Clone)]
pub struct MeshBatch {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    names: Vec<String>,
    submeshes: HashMap<String, SubmeshRange>,
}

impl MeshBatch {
    /// Draw parameters of submesh `name`
    pub fn submesh(&self, name: &str) -> RenderResult<SubmeshRange> {
        self.submeshes
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::UnknownSubmesh(name.to_string()))
    }

    /// Submesh names in insertion order
    pub fn submesh_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Shared vertices
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Shared indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Shared vertices as raw bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Bytes per vertex
    pub fn vertex_stride(&self) -> u32 {
        std::mem::size_of::<Vertex>() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        (vertices, vec![0, 1, 2, 0, 2, 3])
    }

    fn triangle() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];
        (vertices, vec![0, 1, 2])
    }

    #[test]
    fn test_offsets_accumulate() {
        let mut builder = MeshBatchBuilder::new();
        let (qv, qi) = quad();
        let (tv, ti) = triangle();

        let first = builder.add_mesh("quad", &qv, &qi).unwrap();
        let second = builder.add_mesh("triangle", &tv, &ti).unwrap();
        let third = builder.add_mesh("quad2", &qv, &qi).unwrap();

        assert_eq!(first, SubmeshRange { index_count: 6, start_index: 0, base_vertex: 0 });
        assert_eq!(second, SubmeshRange { index_count: 3, start_index: 6, base_vertex: 4 });
        assert_eq!(third, SubmeshRange { index_count: 6, start_index: 9, base_vertex: 7 });

        let batch = builder.build();
        assert_eq!(batch.vertices().len(), 11);
        assert_eq!(batch.indices().len(), 15);
        assert_eq!(batch.submesh("triangle").unwrap(), second);
        assert_eq!(batch.submesh_names().collect::<Vec<_>>(), vec!["quad", "triangle", "quad2"]);
    }

    #[test]
    fn test_indices_stay_mesh_local() {
        let mut builder = MeshBatchBuilder::new();
        let (qv, qi) = quad();
        let (tv, ti) = triangle();
        builder.add_mesh("quad", &qv, &qi).unwrap();
        builder.add_mesh("triangle", &tv, &ti).unwrap();
        let batch = builder.build();

        let range = batch.submesh("triangle").unwrap();
        let start = range.start_index as usize;
        let resolved: Vec<Vertex> = batch.indices()[start..start + range.index_count as usize]
            .iter()
            .map(|&index| batch.vertices()[(index as i32 + range.base_vertex) as usize])
            .collect();
        assert_eq!(resolved, tv);
    }

    #[test]
    fn test_duplicate_and_unknown_names() {
        let mut builder = MeshBatchBuilder::new();
        let (qv, qi) = quad();
        builder.add_mesh("quad", &qv, &qi).unwrap();

        assert!(matches!(
            builder.add_mesh("quad", &qv, &qi),
            Err(RenderError::DuplicateName { kind: "submesh", .. })
        ));

        let batch = builder.build();
        assert!(matches!(batch.submesh("sphere"), Err(RenderError::UnknownSubmesh(_))));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut builder = MeshBatchBuilder::new();
        let (tv, _) = triangle();
        let result = builder.add_mesh("broken", &tv, &[0, 1, 3]);
        assert!(matches!(result, Err(RenderError::InvalidGeometry(_))));
    }

    #[test]
    fn test_vertex_bytes_match_stride() {
        let mut builder = MeshBatchBuilder::new();
        let (qv, qi) = quad();
        builder.add_mesh("quad", &qv, &qi).unwrap();
        let batch = builder.build();

        assert_eq!(batch.vertex_stride(), 32);
        assert_eq!(batch.vertex_bytes().len(), 4 * 32);
    }
}
