//! # three-export
//!
//! Export 3D scene descriptions to the three.js JSON Object Format 4.
//!
//! ## Overview
//!
//! A [`SceneDescription`] (objects, meshes, materials, textures, images,
//! armatures and actions, usually loaded from JSON) is walked by an
//! [`Exporter`], which welds mesh faces into indexed `BufferGeometry`
//! buffers and streams the document through an incremental JSON
//! [`Encoder`]. Geometry is only built when the encoder reaches it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use three_export::{load_scene, write_scene, ExportConfig};
//!
//! let scene = load_scene("scene.json")?;
//! let summary = write_scene("scene.three.json", &scene, &ExportConfig::default())?;
//! println!("{} geometries", summary.geometries);
//! ```
//!
//! ## Building geometry directly
//!
//! The welder and encoder are usable without a scene:
//!
//! ```ignore
//! use three_export::{AttributeSet, BufferGeometry, Encoder, EncoderConfig, FaceVertex, VertexWelder};
//!
//! let mut welder = VertexWelder::new(AttributeSet::BASIC);
//! welder.push_face(&triangle)?;
//! let geometry = BufferGeometry::assemble(welder.finish());
//! let json = Encoder::new(EncoderConfig::compact()).encode_to_string(&geometry.into_node(), None)?;
//! ```

pub mod encoder;
pub mod error;
pub mod export;
pub mod geometry;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use encoder::{Encoder, EncoderConfig, Map, Node, Reduce, Seq};
pub use error::{ExportError, Result};
pub use export::{export_to_string, write_scene, ExportConfig, ExportSummary, Exporter};
pub use geometry::{build_geometry, AttributeSet, BufferGeometry, FaceVertex, MaterialGroup, VertexWelder};
pub use scene::SceneDescription;
pub use types::{entity_uuid, Color};

/// Load and validate a scene description from a JSON file.
pub fn load_scene<P: AsRef<std::path::Path>>(path: P) -> Result<SceneDescription> {
    SceneDescription::load(path)
}

/// Parse and validate a scene description from JSON text.
pub fn load_scene_from_str(text: &str) -> Result<SceneDescription> {
    SceneDescription::from_json(text)
}
