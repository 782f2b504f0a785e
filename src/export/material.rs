//! Materials, textures and images.

use super::object::color_node;
use super::{Exporter, MaterialRef};
use crate::encoder::{Map, Node, Seq};
use crate::error::Result;
use crate::scene::properties::overrides;
use crate::scene::{Extension, MaterialData};
use crate::types::{clean_name, entity_uuid, Color};
use base64::Engine;
use log::{debug, info};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// three.js texture constants.
pub mod constants {
    pub const CUBE_REFLECTION_MAPPING: i64 = 301;
    pub const REPEAT_WRAPPING: i64 = 1000;
    pub const MIRRORED_REPEAT_WRAPPING: i64 = 1002;
    pub const NEAREST_FILTER: i64 = 1003;
    pub const NEAREST_MIPMAP_NEAREST_FILTER: i64 = 1004;
    pub const NEAREST_MIPMAP_LINEAR_FILTER: i64 = 1005;
    pub const LINEAR_FILTER: i64 = 1006;
    pub const LINEAR_MIPMAP_NEAREST_FILTER: i64 = 1007;
}

use constants::*;

const ANISOTROPY: i64 = 16;

/// Material for faces whose slot is empty.
fn default_material() -> Map {
    Map::new()
        .with("name", "DEFAULT_MATERIAL")
        .with("type", "MeshStandardMaterial")
        .with("color", color_node(Color::WHITE))
        .with("roughness", 0.5)
}

impl Exporter<'_> {
    pub(super) fn material_uuid(&self, index: usize) -> String {
        match self.materials[index] {
            MaterialRef::Single(m) => entity_uuid("Material", &self.scene.materials[m].name),
            MaterialRef::Multi { mesh } => entity_uuid("MultiMaterial", &self.scene.meshes[mesh].name),
        }
    }

    /// `(castShadow, receiveShadow)` of a mesh using material `index`.
    pub(super) fn shadow_flags(&self, index: usize) -> (bool, bool) {
        let scene = self.scene;
        match self.materials[index] {
            MaterialRef::Single(m) => {
                let mat = &scene.materials[m];
                (mat.cast_shadows, mat.receive_shadows)
            }
            MaterialRef::Multi { mesh } => {
                let mats: Vec<&MaterialData> = scene.meshes[mesh]
                    .material_names()
                    .filter_map(|name| scene.material_index(name).ok())
                    .map(|m| &scene.materials[m])
                    .collect();
                (
                    mats.iter().any(|m| m.cast_shadows),
                    mats.iter().any(|m| m.receive_shadows),
                )
            }
        }
    }

    pub(super) fn export_material(&self, index: usize) -> Result<Node> {
        let scene = self.scene;
        let out = match self.materials[index] {
            MaterialRef::Single(m) => {
                let out = self.standard_material(m);
                out.insert("uuid", self.material_uuid(index));
                out
            }
            MaterialRef::Multi { mesh } => {
                let mesh_data = &scene.meshes[mesh];
                let materials = Seq::new();
                for slot in &mesh_data.materials {
                    match slot {
                        Some(name) => materials.push(self.standard_material(scene.material_index(name)?)),
                        None => materials.push(default_material()),
                    }
                }
                Map::new()
                    .with("uuid", self.material_uuid(index))
                    .with("name", clean_name(&mesh_data.name))
                    .with("type", "MultiMaterial")
                    .with("materials", materials)
            }
        };
        info!("-> THREE.{}(\"{}\")", type_name(&out), display_name(&out));
        Ok(out.into())
    }

    /// A `MeshStandardMaterial` without uuid.
    fn standard_material(&self, m: usize) -> Map {
        let scene = self.scene;
        let mat = &scene.materials[m];
        // The uuid goes first; MultiMaterial children leave it out.
        let out = Map::new()
            .with("uuid", Node::Null)
            .with("name", clean_name(&mat.name))
            .with("type", "MeshStandardMaterial")
            .with("color", color_node(mat.diffuse_color.scale(mat.diffuse_intensity)));
        if mat.roughness != 1.0 {
            out.insert("roughness", mat.roughness);
        }
        if mat.use_transparency {
            out.insert("transparent", true);
            if mat.alpha > 0.0 {
                out.insert("opacity", 1.0 - mat.alpha);
            }
        }
        if mat.use_vertex_color {
            out.insert("vertexColors", true);
        }
        if !mat.use_mist {
            out.insert("fog", false);
        }
        if let Some(slots) = self.material_textures.get(&m) {
            for &(kind, texture) in slots {
                out.insert(kind.as_str(), entity_uuid("Texture", &scene.textures[texture].name));
            }
        }
        out.update(&overrides(&mat.properties));
        out
    }

    pub(super) fn export_texture(&self, index: usize) -> Node {
        let scene = self.scene;
        let tex = &scene.textures[self.textures[index]];
        let out = Map::new()
            .with("uuid", entity_uuid("Texture", &tex.name))
            .with("name", clean_name(&tex.name));

        if tex.environment {
            out.insert("type", "CubeTexture");
            out.insert("mapping", CUBE_REFLECTION_MAPPING);
        } else {
            out.insert("type", "Texture");
            if tex.repeat != [1.0, 1.0] {
                out.insert("repeat", tex.repeat);
            }
            match tex.extension {
                Extension::Checker => {
                    out.insert("wrap", [MIRRORED_REPEAT_WRAPPING, MIRRORED_REPEAT_WRAPPING]);
                }
                Extension::Repeat => {
                    out.insert("wrap", [REPEAT_WRAPPING, REPEAT_WRAPPING]);
                }
                Extension::Extend | Extension::Clip => {}
            }
            for (key, filter) in texture_filters(tex.use_interpolation, tex.use_mipmap, tex.use_mipmap_gauss) {
                out.insert(key, filter);
            }
        }

        out.insert("anisotropy", ANISOTROPY);
        if let Some(image) = &tex.image {
            out.insert("image", entity_uuid("Image", image));
        }
        out.update(&overrides(&tex.properties));
        info!("-> THREE.{}(\"{}\")", type_name(&out), tex.name);
        out.into()
    }

    /// Whether image `index` (into the export list) is written inline.
    pub(super) fn embeds_image(&self, index: usize) -> bool {
        self.config.embed_images || self.scene.images[self.images[index]].packed
    }

    pub(super) fn export_image(&self, index: usize) -> Result<Node> {
        let image = &self.scene.images[self.images[index]];
        let url = if self.embeds_image(index) {
            data_uri(&self.resolve(&image.filepath))?
        } else {
            basename(&image.filepath)
        };
        info!("-> THREE.Image(\"{}\")", image.name);
        Ok(Map::new()
            .with("uuid", entity_uuid("Image", &image.name))
            .with("name", image.name.as_str())
            .with("url", url)
            .into())
    }

    /// Host paths may be `//`-relative to the scene file.
    fn resolve(&self, filepath: &str) -> PathBuf {
        let relative = filepath.trim_start_matches("//");
        match &self.asset_root {
            Some(root) if !Path::new(relative).is_absolute() => root.join(relative),
            _ => PathBuf::from(relative),
        }
    }
}

/// `magFilter` / `minFilter` entries for the sampling flags.
fn texture_filters(interpolation: bool, mipmap: bool, gauss: bool) -> Vec<(&'static str, i64)> {
    if !interpolation {
        let min = match (mipmap, gauss) {
            (false, _) => NEAREST_FILTER,
            (true, false) => NEAREST_MIPMAP_NEAREST_FILTER,
            (true, true) => NEAREST_MIPMAP_LINEAR_FILTER,
        };
        vec![("magFilter", NEAREST_FILTER), ("minFilter", min)]
    } else if !mipmap {
        vec![("magFilter", LINEAR_FILTER)]
    } else if !gauss {
        vec![("minFilter", LINEAR_MIPMAP_NEAREST_FILTER)]
    } else {
        Vec::new()
    }
}

fn type_name(record: &Map) -> String {
    match record.get("type") {
        Some(Node::Str(kind)) => kind,
        _ => String::new(),
    }
}

fn display_name(record: &Map) -> String {
    match record.get("name") {
        Some(Node::Str(name)) => name,
        _ => String::new(),
    }
}

/// File name of a host path.
pub(crate) fn basename(filepath: &str) -> String {
    Path::new(filepath)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filepath.to_string())
}

/// Read an image file and return it re-encoded as a PNG data URI.
pub(crate) fn data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let decoded = image::load_from_memory(&bytes)?;
    let mut png = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    debug!("Embedded {} ({} bytes as PNG)", path.display(), png.len());
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    ))
}
