//! Scene description to three.js JSON Object Format 4.
//!
//! [`Exporter::new`] walks the scene once and records what is exported and
//! how entities relate (export parents and matrices, geometries, materials,
//! textures, armatures, actions). [`Exporter::document`] then returns the
//! output tree, in which every exported entity is an opaque handle. The
//! exporter itself is the encoder's [`Reduce`] callback and expands each
//! handle while the document streams, so geometry buffers are only built
//! when the encoder reaches them.

mod animation;
mod material;
mod mesh;
mod object;

use crate::encoder::{Encoder, EncoderConfig, Map, Node, Opaque, Reduce, Seq};
use crate::error::{ExportError, Result};
use crate::scene::{LightKind, MapKind, ObjectKind, SceneDescription, SceneObject};
use crate::types::transform::{directional_light_matrix, matrix_from_rows, ROT_X_PI2};
use glam::DMat4;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Output format version written to `metadata.version`.
pub const FORMAT_VERSION: f64 = 4.4;

/// Scene export options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Export the whole scene; otherwise the subtree of the active object.
    pub export_scene: bool,
    /// Only export selected objects.
    pub selected_only: bool,
    pub export_geometries: bool,
    /// Requires geometries.
    pub export_materials: bool,
    /// Requires materials.
    pub export_textures: bool,
    /// Requires textures.
    pub export_images: bool,
    pub export_animations: bool,
    /// Embed every image as a data URI, not only packed ones.
    pub embed_images: bool,
    /// Decimal places for floats, `0..=8`.
    pub float_precision: usize,
    /// Indent mappings and put each entry on its own line.
    pub pretty_print: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_scene: true,
            selected_only: false,
            export_geometries: true,
            export_materials: true,
            export_textures: true,
            export_images: true,
            export_animations: false,
            embed_images: false,
            float_precision: 5,
            pretty_print: true,
        }
    }
}

impl ExportConfig {
    pub const MAX_PRECISION: usize = 8;

    pub fn geometries(&self) -> bool {
        self.export_geometries
    }

    pub fn materials(&self) -> bool {
        self.export_materials && self.geometries()
    }

    pub fn textures(&self) -> bool {
        self.export_textures && self.materials()
    }

    pub fn images(&self) -> bool {
        self.export_images && self.textures()
    }

    /// Encoder options for this export.
    pub fn encoder_config(&self) -> EncoderConfig {
        let base = if self.pretty_print {
            EncoderConfig::pretty()
        } else {
            EncoderConfig::compact()
        };
        base.with_precision(self.float_precision.min(Self::MAX_PRECISION))
            .with_skip_empty(true)
    }
}

/// Geometry of a mesh object. Skinned meshes get a geometry of their own
/// because skin indices depend on the object's vertex groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GeometryRef {
    pub mesh: usize,
    pub skinned_object: Option<usize>,
}

/// Material of a mesh object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MaterialRef {
    Single(usize),
    /// One child material per slot of the mesh.
    Multi { mesh: usize },
}

/// Handle to an exported entity, expanded by [`Exporter::reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entity {
    Scene,
    Object(usize),
    Geometry(usize),
    Material(usize),
    Texture(usize),
    Image(usize),
    Action(usize),
}

/// Export placement of an object.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placement {
    /// Nearest exported ancestor.
    pub parent: Option<usize>,
    /// Transform relative to `parent`, host space.
    pub matrix: DMat4,
}

/// Entity counts of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub objects: usize,
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
    pub images: usize,
    /// Images written as data URIs.
    pub embedded_images: usize,
    pub skeletons: usize,
    pub animations: usize,
}

/// Per-export state. Built fresh for every export.
pub struct Exporter<'a> {
    scene: &'a SceneDescription,
    config: ExportConfig,
    asset_root: Option<PathBuf>,
    root: Entity,
    /// Exported objects in traversal order.
    objects: Vec<usize>,
    placements: HashMap<usize, Placement>,
    geometries: Vec<GeometryRef>,
    object_geometry: HashMap<usize, usize>,
    materials: Vec<MaterialRef>,
    object_material: HashMap<usize, usize>,
    /// Texture slots per material, in slot order.
    material_textures: HashMap<usize, Vec<(MapKind, usize)>>,
    textures: Vec<usize>,
    images: Vec<usize>,
    /// Armature data index per armature object and per skinned mesh object.
    object_armature: HashMap<usize, usize>,
    /// `(action, animated object)`.
    actions: Vec<(usize, usize)>,
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> usize {
    match items.iter().position(|existing| *existing == item) {
        Some(index) => index,
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}

impl<'a> Exporter<'a> {
    /// Validate `scene` and parse it for exportable entities.
    pub fn new(scene: &'a SceneDescription, config: ExportConfig) -> Result<Self> {
        scene.validate()?;
        let mut exporter = Self {
            scene,
            config,
            asset_root: None,
            root: Entity::Scene,
            objects: Vec::new(),
            placements: HashMap::new(),
            geometries: Vec::new(),
            object_geometry: HashMap::new(),
            materials: Vec::new(),
            object_material: HashMap::new(),
            material_textures: HashMap::new(),
            textures: Vec::new(),
            images: Vec::new(),
            object_armature: HashMap::new(),
            actions: Vec::new(),
        };
        exporter.parse()?;
        Ok(exporter)
    }

    /// Directory that relative image paths are resolved against.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn scene(&self) -> &'a SceneDescription {
        self.scene
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Names of the exported objects, in traversal order.
    pub fn object_names(&self) -> Vec<&'a str> {
        let scene = self.scene;
        self.objects
            .iter()
            .map(|&i| scene.objects[i].name.as_str())
            .collect()
    }

    fn object(&self, index: usize) -> &'a SceneObject {
        &self.scene.objects[index]
    }

    fn is_exported(&self, index: usize) -> bool {
        self.placements.contains_key(&index)
    }

    fn parse(&mut self) -> Result<()> {
        let scene = self.scene;

        if self.config.export_scene {
            self.root = Entity::Scene;
            for root in scene.children_of(None) {
                self.traverse(root);
            }
        } else {
            let active = scene.active_object.as_deref().ok_or_else(|| {
                ExportError::Unsupported("no active object to export from".to_string())
            })?;
            let index = scene.object_index(active)?;
            self.traverse(index);
            if !self.objects.contains(&index) {
                return Err(ExportError::Unsupported(format!(
                    "active object `{}` is not exported",
                    active
                )));
            }
            self.root = Entity::Object(index);
        }

        // Placements first: later steps ask whether an object is exported.
        for &ob in &self.objects {
            let placement = self.placement(ob)?;
            self.placements.insert(ob, placement);
        }

        for ob in self.objects.clone() {
            let geometry = self.map_geometry(ob)?;
            if let Some(geometry) = geometry {
                self.map_material(ob, geometry)?;
            }
            self.map_armature(ob)?;
            self.map_action(ob)?;
        }

        // Skinned geometries are known only once armatures are mapped.
        for geometry in &mut self.geometries {
            if let Some(ob) = geometry.skinned_object {
                let has_groups = matches!(
                    &scene.objects[ob].kind,
                    ObjectKind::Mesh { vertex_groups, .. } if !vertex_groups.is_empty()
                );
                if !has_groups || !self.object_armature.contains_key(&ob) {
                    geometry.skinned_object = None;
                }
            }
        }
        let mut unique = Vec::new();
        for ob in self.objects.clone() {
            if let Some(&g) = self.object_geometry.get(&ob) {
                let index = push_unique(&mut unique, self.geometries[g]);
                self.object_geometry.insert(ob, index);
            }
        }
        self.geometries = unique;

        debug!(
            "Parsed {} objects, {} geometries, {} materials, {} textures",
            self.objects.len(),
            self.geometries.len(),
            self.materials.len(),
            self.textures.len()
        );
        Ok(())
    }

    /// Depth-first over visible objects; children are visited even when
    /// their parent is skipped.
    fn traverse(&mut self, index: usize) {
        let ob = self.object(index);
        if ob.visible && (!self.config.selected_only || ob.selected) {
            self.objects.push(index);
        }
        let children: Vec<usize> = self.scene.children_of(Some(ob.name.as_str())).collect();
        for child in children {
            self.traverse(child);
        }
    }

    fn export_parent(&self, index: usize) -> Result<Option<usize>> {
        let mut parent = self.object(index).parent.as_deref();
        while let Some(name) = parent {
            let parent_index = self.scene.object_index(name)?;
            if self.objects.contains(&parent_index) {
                return Ok(Some(parent_index));
            }
            parent = self.object(parent_index).parent.as_deref();
        }
        Ok(None)
    }

    fn placement(&self, index: usize) -> Result<Placement> {
        let ob = self.object(index);
        let parent = self.export_parent(index)?;
        let world = matrix_from_rows(&ob.matrix_world);
        let mut matrix = match parent {
            None => world,
            Some(p) => matrix_from_rows(&self.object(p).matrix_world).inverse() * world,
        };

        match &ob.kind {
            ObjectKind::Camera(_) => matrix *= ROT_X_PI2,
            ObjectKind::Light(light)
                if matches!(light.light_type, LightKind::Sun | LightKind::Hemi | LightKind::Spot) =>
            {
                matrix = directional_light_matrix(&matrix);
            }
            _ => {}
        }
        Ok(Placement { parent, matrix })
    }

    fn map_geometry(&mut self, ob: usize) -> Result<Option<usize>> {
        if !self.config.geometries() {
            return Ok(None);
        }
        let ObjectKind::Mesh { mesh: Some(mesh), .. } = &self.object(ob).kind else {
            return Ok(None);
        };
        let geometry = GeometryRef {
            mesh: self.scene.mesh_index(mesh)?,
            skinned_object: Some(ob),
        };
        // Unskinned duplicates are merged after armatures are mapped.
        self.geometries.push(geometry);
        let index = self.geometries.len() - 1;
        self.object_geometry.insert(ob, index);
        Ok(Some(index))
    }

    fn map_material(&mut self, ob: usize, geometry: usize) -> Result<()> {
        if !self.config.materials() {
            return Ok(());
        }
        let scene = self.scene;
        let mesh_index = self.geometries[geometry].mesh;
        let mesh = &scene.meshes[mesh_index];
        let material = match mesh.materials.as_slice() {
            [] | [None] => None,
            [Some(name)] => Some(MaterialRef::Single(scene.material_index(name)?)),
            _ => Some(MaterialRef::Multi { mesh: mesh_index }),
        };
        let Some(material) = material else {
            return Ok(());
        };

        let index = push_unique(&mut self.materials, material);
        self.object_material.insert(ob, index);

        if self.config.textures() {
            let names: Vec<&str> = match material {
                MaterialRef::Single(m) => vec![scene.materials[m].name.as_str()],
                MaterialRef::Multi { .. } => mesh.material_names().collect(),
            };
            for name in names {
                let m = scene.material_index(name)?;
                self.map_textures(m)?;
            }
        }
        Ok(())
    }

    /// Record the texture slots of material `m` and the textures and
    /// images they use.
    fn map_textures(&mut self, m: usize) -> Result<()> {
        if self.material_textures.contains_key(&m) {
            return Ok(());
        }
        let scene = self.scene;
        let mat = &scene.materials[m];
        let mut slots = Vec::new();
        for kind in MapKind::ALL {
            let Some(name) = mat.textures.get(&kind) else {
                continue;
            };
            // An alpha map needs a colour map and must differ from it.
            if kind == MapKind::AlphaMap && mat.textures.get(&MapKind::Map).map_or(true, |map| map == name) {
                continue;
            }
            let texture = scene.texture_index(name)?;
            slots.push((kind, texture));
            push_unique(&mut self.textures, texture);
            if self.config.images() {
                if let Some(image) = &scene.textures[texture].image {
                    push_unique(&mut self.images, scene.image_index(image)?);
                }
            }
        }
        self.material_textures.insert(m, slots);
        Ok(())
    }

    fn map_armature(&mut self, ob: usize) -> Result<()> {
        let armature_object = match &self.object(ob).kind {
            ObjectKind::Armature { .. } => Some(ob),
            ObjectKind::Mesh {
                armature: Some(name),
                ..
            } => Some(self.scene.object_index(name)?),
            _ => None,
        };
        let Some(armature_object) = armature_object else {
            return Ok(());
        };
        if !self.is_exported(armature_object) {
            return Ok(());
        }
        if let ObjectKind::Armature { armature } = &self.object(armature_object).kind {
            let data = self.scene.armature_index(armature)?;
            self.object_armature.insert(ob, data);
        }
        Ok(())
    }

    fn map_action(&mut self, ob: usize) -> Result<()> {
        if !self.config.export_animations {
            return Ok(());
        }
        if let Some(name) = &self.object(ob).action {
            let action = self.scene.action_index(name)?;
            if !self.actions.iter().any(|&(a, _)| a == action) {
                self.actions.push((action, ob));
            }
        }
        Ok(())
    }

    /// Exported objects whose export parent is `parent`.
    pub(crate) fn children(&self, parent: Option<usize>) -> Vec<usize> {
        self.objects
            .iter()
            .copied()
            .filter(|ob| self.placements.get(ob).map(|p| p.parent) == Some(parent))
            .collect()
    }

    /// Counts of what this export writes.
    pub fn summary(&self) -> ExportSummary {
        let embedded_images = (0..self.images.len())
            .filter(|&i| self.embeds_image(i))
            .count();
        let mut skeletons: Vec<usize> = self.object_armature.values().copied().collect();
        skeletons.sort_unstable();
        skeletons.dedup();
        ExportSummary {
            objects: self.objects.len(),
            geometries: self.geometries.len(),
            materials: self.materials.len(),
            textures: self.textures.len(),
            images: self.images.len(),
            embedded_images,
            skeletons: skeletons.len(),
            animations: self.actions.len(),
        }
    }

    fn root_name(&self) -> &'a str {
        match self.root {
            Entity::Object(ob) => &self.object(ob).name,
            _ => &self.scene.name,
        }
    }

    /// The output document, with entities as opaque handles.
    pub fn document(&self) -> Node {
        let metadata = Map::new()
            .with("name", self.root_name())
            .with("type", "Object")
            .with("version", FORMAT_VERSION)
            .with("generator", concat!("three-export ", env!("CARGO_PKG_VERSION")));

        let handles = |make: fn(usize) -> Entity, count: usize| -> Seq {
            (0..count).map(|i| Node::opaque(make(i))).collect()
        };

        Map::new()
            .with("metadata", metadata)
            .with("object", Node::opaque(self.root))
            .with("geometries", handles(Entity::Geometry, self.geometries.len()))
            .with("materials", handles(Entity::Material, self.materials.len()))
            .with("textures", handles(Entity::Texture, self.textures.len()))
            .with("images", handles(Entity::Image, self.images.len()))
            .with("animations", handles(Entity::Action, self.actions.len()))
            .into()
    }

    /// Stream the document into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let encoder = Encoder::new(self.config.encoder_config());
        encoder.encode_to_writer(&self.document(), Some(self), writer)
    }

    /// Encode the document into a string.
    pub fn to_json_string(&self) -> Result<String> {
        let encoder = Encoder::new(self.config.encoder_config());
        encoder.encode_to_string(&self.document(), Some(self))
    }

    /// Write the document to `path`.
    ///
    /// Output goes to a temporary file next to `path` that is renamed into
    /// place once encoding succeeded; on failure it is removed and `path` is
    /// left untouched.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<ExportSummary> {
        let path = path.as_ref();
        let start = Instant::now();
        let summary = self.summary();
        info!(
            "Exporting \"{}\": {} objects, {} geometries, {} materials, {} textures, \
             {} images ({} embedded), {} skeletons, {} animations",
            self.root_name(),
            summary.objects,
            summary.geometries,
            summary.materials,
            summary.textures,
            summary.images,
            summary.embedded_images,
            summary.skeletons,
            summary.animations
        );

        let tmp = temp_path(path);
        let result = File::create(&tmp)
            .map_err(ExportError::from)
            .and_then(|file| self.write_to(BufWriter::new(file)))
            .and_then(|()| std::fs::rename(&tmp, path).map_err(ExportError::from));
        if let Err(err) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }

        info!("Wrote {} in {:.2?}", path.display(), start.elapsed());
        Ok(summary)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export.json".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

impl Reduce for Exporter<'_> {
    fn reduce(&self, value: &Opaque) -> Result<Option<Node>> {
        let Some(&entity) = value.downcast_ref::<Entity>() else {
            return Ok(None);
        };
        let node = match entity {
            Entity::Scene => self.export_scene(),
            Entity::Object(ob) => self.export_object(ob)?,
            Entity::Geometry(g) => self.export_geometry(g)?,
            Entity::Material(m) => self.export_material(m)?,
            Entity::Texture(t) => self.export_texture(t),
            Entity::Image(i) => self.export_image(i)?,
            Entity::Action(a) => self.export_action(a)?,
        };
        Ok(Some(node))
    }
}

/// Export `scene` to `path` with images resolved against the current
/// directory.
pub fn write_scene<P: AsRef<Path>>(
    path: P,
    scene: &SceneDescription,
    config: &ExportConfig,
) -> Result<ExportSummary> {
    Exporter::new(scene, config.clone())?.write_file(path)
}

/// Export `scene` into a string.
pub fn export_to_string(scene: &SceneDescription, config: &ExportConfig) -> Result<String> {
    Exporter::new(scene, config.clone())?.to_json_string()
}
