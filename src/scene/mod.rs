//! Host-agnostic scene description.
//!
//! A [`SceneDescription`] is the exporter's view of the host scene: a flat
//! list of objects linked by parent name plus the data blocks they use
//! (meshes, materials, textures, images, armatures, actions). Data blocks
//! are referenced by name. Mesh faces are already evaluated and carry
//! per-corner attributes in host (Z-up) space.

pub mod animation;
pub mod data;
pub mod object;
pub mod properties;

pub use animation::{ActionData, ActionGroup, ArmatureData, BoneData, Channel};
pub use data::{Extension, ImageData, MapKind, MaterialData, MeshData, MeshFace, MeshVertex, TextureData};
pub use object::{CameraData, CameraKind, LightData, LightKind, ObjectKind, SceneObject, ShadowSettings};

use crate::error::{ExportError, Result};
use crate::types::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Free-form custom properties of an entity.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// World (environment) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    #[serde(default = "black")]
    pub ambient_color: Color,
    #[serde(default = "black")]
    pub horizon_color: Color,
    #[serde(default)]
    pub mist: Option<Mist>,
}

fn black() -> Color {
    Color::BLACK
}

impl Default for World {
    fn default() -> Self {
        Self {
            ambient_color: Color::BLACK,
            horizon_color: Color::BLACK,
            mist: None,
        }
    }
}

/// Distance fog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mist {
    pub start: f64,
    pub depth: f64,
}

fn default_fps() -> f64 {
    24.0
}

fn default_resolution() -> [u32; 2] {
    [1920, 1080]
}

/// A complete scene as handed over by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDescription {
    pub name: String,
    /// Object the export starts from when not exporting the whole scene.
    #[serde(default)]
    pub active_object: Option<String>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Render resolution, used for camera aspect ratios.
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default)]
    pub world: Option<World>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub meshes: Vec<MeshData>,
    #[serde(default)]
    pub materials: Vec<MaterialData>,
    #[serde(default)]
    pub textures: Vec<TextureData>,
    #[serde(default)]
    pub images: Vec<ImageData>,
    #[serde(default)]
    pub armatures: Vec<ArmatureData>,
    #[serde(default)]
    pub actions: Vec<ActionData>,
    #[serde(default)]
    pub properties: Properties,
}

fn position<T>(items: &[T], name: &str, kind: &'static str, key: impl Fn(&T) -> &str) -> Result<usize> {
    items
        .iter()
        .position(|item| key(item) == name)
        .ok_or_else(|| ExportError::missing(kind, name))
}

impl SceneDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active_object: None,
            fps: default_fps(),
            resolution: default_resolution(),
            world: None,
            objects: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            images: Vec::new(),
            armatures: Vec::new(),
            actions: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Parse and validate a scene description.
    pub fn from_json(text: &str) -> Result<Self> {
        let scene: SceneDescription = serde_json::from_str(text)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Read, parse and validate a scene description file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn object_index(&self, name: &str) -> Result<usize> {
        position(&self.objects, name, "object", |o| o.name.as_str())
    }

    pub fn mesh_index(&self, name: &str) -> Result<usize> {
        position(&self.meshes, name, "mesh", |m| m.name.as_str())
    }

    pub fn material_index(&self, name: &str) -> Result<usize> {
        position(&self.materials, name, "material", |m| m.name.as_str())
    }

    pub fn texture_index(&self, name: &str) -> Result<usize> {
        position(&self.textures, name, "texture", |t| t.name.as_str())
    }

    pub fn image_index(&self, name: &str) -> Result<usize> {
        position(&self.images, name, "image", |i| i.name.as_str())
    }

    pub fn armature_index(&self, name: &str) -> Result<usize> {
        position(&self.armatures, name, "armature", |a| a.name.as_str())
    }

    pub fn action_index(&self, name: &str) -> Result<usize> {
        position(&self.actions, name, "action", |a| a.name.as_str())
    }

    /// Indices of the direct children of `parent` (roots for `None`), in
    /// declaration order.
    pub fn children_of<'a>(&'a self, parent: Option<&'a str>) -> impl Iterator<Item = usize> + 'a {
        self.objects
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.parent.as_deref() == parent)
            .map(|(i, _)| i)
    }

    /// Check that every name reference resolves, the parent links form a
    /// forest and the frame rate is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ExportError::Unsupported(format!(
                "frame rate must be positive, got {}",
                self.fps
            )));
        }

        let mut names = HashSet::new();
        for ob in &self.objects {
            if !names.insert(ob.name.as_str()) {
                return Err(ExportError::Unsupported(format!(
                    "duplicate object name `{}`",
                    ob.name
                )));
            }
        }

        if let Some(active) = &self.active_object {
            self.object_index(active)?;
        }

        for ob in &self.objects {
            if let Some(parent) = &ob.parent {
                self.object_index(parent)?;
            }
            if let Some(action) = &ob.action {
                self.action_index(action)?;
            }
            match &ob.kind {
                ObjectKind::Mesh { mesh, armature, .. } => {
                    if let Some(mesh) = mesh {
                        self.mesh_index(mesh)?;
                    }
                    if let Some(armature) = armature {
                        self.object_index(armature)?;
                    }
                }
                ObjectKind::Armature { armature } => {
                    self.armature_index(armature)?;
                }
                _ => {}
            }
            self.check_ancestry(ob)?;
        }

        for mesh in &self.meshes {
            for name in mesh.material_names() {
                self.material_index(name)?;
            }
        }
        for mat in &self.materials {
            for texture in mat.textures.values() {
                self.texture_index(texture)?;
            }
        }
        for tex in &self.textures {
            if let Some(image) = &tex.image {
                self.image_index(image)?;
            }
        }
        for arm in &self.armatures {
            for bone in &arm.bones {
                if let Some(parent) = &bone.parent {
                    if !arm.bones.iter().any(|b| &b.name == parent) {
                        return Err(ExportError::missing("bone", parent.as_str()));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_ancestry(&self, ob: &SceneObject) -> Result<()> {
        let mut current = ob.parent.as_deref();
        let mut steps = 0;
        while let Some(name) = current {
            steps += 1;
            if steps > self.objects.len() {
                return Err(ExportError::Unsupported(format!(
                    "object `{}` is its own ancestor",
                    ob.name
                )));
            }
            current = self.objects[self.object_index(name)?].parent.as_deref();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "name": "Scene",
        "objects": [
            {"name": "Root"},
            {"name": "Cube", "parent": "Root",
             "kind": {"type": "Mesh", "mesh": "CubeMesh"}},
            {"name": "Lamp", "kind": {"type": "Light", "light_type": "point"}}
        ],
        "meshes": [{"name": "CubeMesh", "materials": ["Red"]}],
        "materials": [{"name": "Red", "diffuse_color": [1, 0, 0]}]
    }"#;

    #[test]
    fn test_parse_and_lookup() {
        let scene = SceneDescription::from_json(SCENE).unwrap();
        assert_eq!(scene.fps, 24.0);
        assert_eq!(scene.resolution, [1920, 1080]);
        assert_eq!(scene.object_index("Lamp").unwrap(), 2);
        assert_eq!(scene.children_of(None).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(scene.children_of(Some("Root")).collect::<Vec<_>>(), vec![1]);
        assert_eq!(scene.materials[0].diffuse_color, Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_missing_reference() {
        let text = SCENE.replace(r#""materials": ["Red"]"#, r#""materials": ["Blue"]"#);
        let err = SceneDescription::from_json(&text).unwrap_err();
        assert!(matches!(
            err,
            ExportError::MissingReference { kind: "material", ref name } if name == "Blue"
        ));
    }

    #[test]
    fn test_parent_cycle_is_rejected() {
        let mut scene = SceneDescription::new("Loop");
        scene.objects.push(SceneObject::new("A", ObjectKind::Empty).with_parent("B"));
        scene.objects.push(SceneObject::new("B", ObjectKind::Empty).with_parent("A"));
        assert!(matches!(scene.validate(), Err(ExportError::Unsupported(_))));
    }

    #[test]
    fn test_non_positive_fps_is_rejected() {
        let text = SCENE.replace(r#""name": "Scene","#, r#""name": "Scene", "fps": 0,"#);
        let err = SceneDescription::from_json(&text).unwrap_err();
        assert!(matches!(err, ExportError::Unsupported(_)));

        let mut scene = SceneDescription::new("Negative");
        scene.fps = -24.0;
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_duplicate_object_names_are_rejected() {
        let mut scene = SceneDescription::new("Dup");
        scene.objects.push(SceneObject::new("A", ObjectKind::Empty));
        scene.objects.push(SceneObject::new("A", ObjectKind::Empty));
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(&path, SCENE).unwrap();
        let scene = SceneDescription::load(&path).unwrap();
        assert_eq!(scene.objects.len(), 3);
    }
}
