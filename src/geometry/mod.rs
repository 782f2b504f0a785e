//! Indexed geometry from triangulated face-vertex streams.
//!
//! [`VertexWelder`] collapses identical face vertices into a unique vertex
//! table plus a triangle index stream split into per-material groups.
//! [`BufferGeometry::assemble`] then projects the table into named flat
//! attribute arrays and computes the bounding sphere.

pub mod buffer;
pub mod vertex;
pub mod welder;

pub use buffer::{AttributeName, BoundingSphere, BufferAttribute, BufferGeometry};
pub use vertex::{AttributeSet, FaceVertex, VertexKey};
pub use welder::{MaterialGroup, VertexWelder, WeldedGeometry};

use crate::error::Result;

/// Weld and assemble in one step.
pub fn build_geometry<M, F>(attributes: AttributeSet, faces_by_material: M) -> Result<BufferGeometry>
where
    M: IntoIterator<Item = (usize, F)>,
    F: IntoIterator,
    F::Item: AsRef<[FaceVertex]>,
{
    let welded = VertexWelder::weld(attributes, faces_by_material)?;
    Ok(BufferGeometry::assemble(welded))
}
