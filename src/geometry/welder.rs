//! Vertex deduplication ("welding") into an indexed triangle list.

use super::vertex::{AttributeSet, FaceVertex, VertexKey};
use crate::error::{ExportError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// A contiguous run of the index stream drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialGroup {
    pub start: usize,
    pub count: usize,
    pub material_index: usize,
}

/// Unique vertices plus the triangle index stream that references them.
#[derive(Debug, Clone, Default)]
pub struct WeldedGeometry {
    /// Optional attributes carried by every vertex.
    pub attributes: AttributeSet,
    /// Unique vertices, in first-occurrence order.
    pub vertices: Vec<FaceVertex>,
    /// Three indices per triangle.
    pub indices: Vec<u32>,
    /// Per-material index ranges, in material order.
    pub groups: Vec<MaterialGroup>,
}

impl WeldedGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Incrementally welds faces into a [`WeldedGeometry`].
///
/// One vertex map is shared by every material of the geometry, so identical
/// vertices on a material seam collapse into a single entry. Only the index
/// stream is split by material.
#[derive(Debug)]
pub struct VertexWelder {
    attributes: AttributeSet,
    lookup: HashMap<VertexKey, u32>,
    vertices: Vec<FaceVertex>,
    indices: Vec<u32>,
    groups: Vec<MaterialGroup>,
    /// Material index and start of the open group.
    open_group: Option<(usize, usize)>,
}

impl VertexWelder {
    /// Create a welder for vertices carrying exactly `attributes`.
    pub fn new(attributes: AttributeSet) -> Self {
        Self {
            attributes,
            lookup: HashMap::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            groups: Vec::new(),
            open_group: None,
        }
    }

    /// Weld faces grouped by material, materials in ascending index order.
    pub fn weld<M, F>(attributes: AttributeSet, faces_by_material: M) -> Result<WeldedGeometry>
    where
        M: IntoIterator<Item = (usize, F)>,
        F: IntoIterator,
        F::Item: AsRef<[FaceVertex]>,
    {
        let mut welder = Self::new(attributes);
        for (material_index, faces) in faces_by_material {
            welder.begin_group(material_index);
            for face in faces {
                welder.push_face(face.as_ref())?;
            }
            welder.end_group();
        }
        Ok(welder.finish())
    }

    /// Start a new material group, closing the open one.
    ///
    /// Material indices must not decrease from one group to the next.
    pub fn begin_group(&mut self, material_index: usize) {
        self.end_group();
        debug_assert!(
            self.groups
                .last()
                .map_or(true, |last| last.material_index <= material_index),
            "material group {} opened after group {:?}",
            material_index,
            self.groups.last()
        );
        self.open_group = Some((material_index, self.indices.len()));
    }

    /// Close the open group. Groups without any index are dropped.
    pub fn end_group(&mut self) {
        if let Some((material_index, start)) = self.open_group.take() {
            let count = self.indices.len() - start;
            if count > 0 {
                self.groups.push(MaterialGroup {
                    start,
                    count,
                    material_index,
                });
            }
        }
    }

    /// Append one triangulated face: three vertices per triangle, in loop order.
    ///
    /// Faces pushed before any [`begin_group`](Self::begin_group) belong to
    /// material 0.
    pub fn push_face(&mut self, face: &[FaceVertex]) -> Result<()> {
        if face.is_empty() || face.len() % 3 != 0 {
            return Err(ExportError::UnsupportedPolygon(face.len()));
        }
        // Check the whole face first so a rejected face leaves no indices.
        if let Some(vertex) = face.iter().find(|v| v.attributes() != self.attributes) {
            return Err(ExportError::InconsistentAttributes(format!(
                "expected {:?}, vertex carries {:?}",
                self.attributes,
                vertex.attributes()
            )));
        }
        if self.open_group.is_none() {
            self.begin_group(0);
        }

        let (vertices, indices) = (self.vertices.len(), self.indices.len());
        for vertex in face {
            match self.push_vertex(*vertex) {
                Ok(index) => self.indices.push(index),
                Err(err) => {
                    self.rollback(vertices, indices);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Drop vertices and indices pushed after the given lengths.
    fn rollback(&mut self, vertices: usize, indices: usize) {
        for vertex in self.vertices.drain(vertices..) {
            self.lookup.remove(&VertexKey(vertex));
        }
        self.indices.truncate(indices);
    }

    /// Resolve a vertex to its index, assigning the next index on first sight.
    fn push_vertex(&mut self, vertex: FaceVertex) -> Result<u32> {
        let key = VertexKey(vertex);
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        let index = u32::try_from(self.vertices.len())
            .map_err(|_| ExportError::Unsupported("more than 2^32 unique vertices".to_string()))?;
        self.lookup.insert(key, index);
        self.vertices.push(vertex);
        Ok(index)
    }

    /// Close the open group and return the result. The lookup map is dropped.
    pub fn finish(mut self) -> WeldedGeometry {
        self.end_group();
        WeldedGeometry {
            attributes: self.attributes,
            vertices: self.vertices,
            indices: self.indices,
            groups: self.groups,
        }
    }
}
