//! Mesh, material, texture and image data blocks.

use super::Properties;
use crate::types::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mesh data block with evaluated (modifier-applied) faces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    /// Material slots. An empty slot uses the default material.
    #[serde(default)]
    pub materials: Vec<Option<String>>,
    #[serde(default)]
    pub faces: Vec<MeshFace>,
    #[serde(default)]
    pub properties: Properties,
}

impl MeshData {
    /// Named materials, skipping empty slots.
    pub fn material_names(&self) -> impl Iterator<Item = &str> {
        self.materials.iter().flatten().map(String::as_str)
    }
}

/// One polygon in host (Z-up) space. Polygons with more than three
/// corners are fan-triangulated on export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshFace {
    #[serde(default)]
    pub material_index: usize,
    pub vertices: Vec<MeshVertex>,
}

/// One face corner ("loop") with its per-corner attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: [f64; 3],
    pub normal: [f64; 3],
    #[serde(default)]
    pub uv: Option<[f64; 2]>,
    #[serde(default)]
    pub uv2: Option<[f64; 2]>,
    #[serde(default)]
    pub color: Option<[f64; 3]>,
    /// Vertex group name to weight.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl MeshVertex {
    pub fn new(position: [f64; 3], normal: [f64; 3]) -> Self {
        Self {
            position,
            normal,
            ..Self::default()
        }
    }
}

/// Texture slot of a material, named after the output property it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapKind {
    Map,
    AlphaMap,
    NormalMap,
    EmissiveMap,
    BumpMap,
    DisplacementMap,
    RoughnessMap,
    MetalnessMap,
    LightMap,
    AoMap,
    SpecularMap,
    EnvMap,
}

impl MapKind {
    pub const ALL: [MapKind; 12] = [
        MapKind::Map,
        MapKind::AlphaMap,
        MapKind::NormalMap,
        MapKind::EmissiveMap,
        MapKind::BumpMap,
        MapKind::DisplacementMap,
        MapKind::RoughnessMap,
        MapKind::MetalnessMap,
        MapKind::LightMap,
        MapKind::AoMap,
        MapKind::SpecularMap,
        MapKind::EnvMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapKind::Map => "map",
            MapKind::AlphaMap => "alphaMap",
            MapKind::NormalMap => "normalMap",
            MapKind::EmissiveMap => "emissiveMap",
            MapKind::BumpMap => "bumpMap",
            MapKind::DisplacementMap => "displacementMap",
            MapKind::RoughnessMap => "roughnessMap",
            MapKind::MetalnessMap => "metalnessMap",
            MapKind::LightMap => "lightMap",
            MapKind::AoMap => "aoMap",
            MapKind::SpecularMap => "specularMap",
            MapKind::EnvMap => "envMap",
        }
    }

    /// Maps sampled with the first UV channel.
    pub fn uses_uv(&self) -> bool {
        matches!(
            self,
            MapKind::Map
                | MapKind::AlphaMap
                | MapKind::NormalMap
                | MapKind::EmissiveMap
                | MapKind::BumpMap
                | MapKind::DisplacementMap
                | MapKind::RoughnessMap
                | MapKind::MetalnessMap
        )
    }

    /// Maps sampled with the second UV channel.
    pub fn uses_uv2(&self) -> bool {
        matches!(self, MapKind::LightMap | MapKind::AoMap)
    }
}

fn default_true() -> bool {
    true
}

fn default_intensity() -> f32 {
    0.8
}

fn default_roughness() -> f64 {
    0.5
}

fn default_alpha() -> f64 {
    1.0
}

/// Surface material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialData {
    pub name: String,
    #[serde(default)]
    pub diffuse_color: Color,
    #[serde(default = "default_intensity")]
    pub diffuse_intensity: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f64,
    #[serde(default)]
    pub use_transparency: bool,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub use_vertex_color: bool,
    /// Whether the material is affected by scene fog.
    #[serde(default = "default_true")]
    pub use_mist: bool,
    #[serde(default = "default_true")]
    pub cast_shadows: bool,
    #[serde(default = "default_true")]
    pub receive_shadows: bool,
    /// Texture name per slot.
    #[serde(default)]
    pub textures: BTreeMap<MapKind, String>,
    #[serde(default)]
    pub properties: Properties,
}

impl MaterialData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse_color: Color::WHITE,
            diffuse_intensity: default_intensity(),
            roughness: default_roughness(),
            use_transparency: false,
            alpha: default_alpha(),
            use_vertex_color: false,
            use_mist: true,
            cast_shadows: true,
            receive_shadows: true,
            textures: BTreeMap::new(),
            properties: Properties::new(),
        }
    }
}

/// Behaviour outside the `[0, 1]` UV range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    #[default]
    Repeat,
    Checker,
    Extend,
    Clip,
}

/// Image texture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureData {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Environment (cube) map.
    #[serde(default)]
    pub environment: bool,
    #[serde(default = "default_repeat")]
    pub repeat: [f64; 2],
    #[serde(default)]
    pub extension: Extension,
    #[serde(default = "default_true")]
    pub use_interpolation: bool,
    #[serde(default = "default_true")]
    pub use_mipmap: bool,
    #[serde(default)]
    pub use_mipmap_gauss: bool,
    #[serde(default)]
    pub properties: Properties,
}

fn default_repeat() -> [f64; 2] {
    [1.0, 1.0]
}

impl TextureData {
    pub fn new(name: impl Into<String>, image: Option<String>) -> Self {
        Self {
            name: name.into(),
            image,
            environment: false,
            repeat: default_repeat(),
            extension: Extension::Repeat,
            use_interpolation: true,
            use_mipmap: true,
            use_mipmap_gauss: false,
            properties: Properties::new(),
        }
    }
}

/// Image referenced by a texture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageData {
    pub name: String,
    /// Path of the image file, relative to the scene description.
    #[serde(default)]
    pub filepath: String,
    /// Image data is stored with the scene and exported inline.
    #[serde(default)]
    pub packed: bool,
}
