//! Scene-graph objects and their type-specific data.

use super::Properties;
use crate::types::Color;
use serde::{Deserialize, Serialize};

/// Host row-major 4x4 identity.
pub const IDENTITY_ROWS: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub(crate) fn identity_rows() -> [[f64; 4]; 4] {
    IDENTITY_ROWS
}

fn default_true() -> bool {
    true
}

/// A node of the host scene graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,

    /// Name of the parent object, `None` for roots.
    #[serde(default)]
    pub parent: Option<String>,

    #[serde(default = "default_true")]
    pub visible: bool,

    #[serde(default)]
    pub selected: bool,

    /// World transform, host row-major (`m[row][col]`), Z-up.
    #[serde(default = "identity_rows")]
    pub matrix_world: [[f64; 4]; 4],

    #[serde(default)]
    pub kind: ObjectKind,

    /// Name of the action animating this object.
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub properties: Properties,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            parent: None,
            visible: true,
            selected: false,
            matrix_world: IDENTITY_ROWS,
            kind,
            action: None,
            properties: Properties::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_matrix(mut self, matrix_world: [[f64; 4]; 4]) -> Self {
        self.matrix_world = matrix_world;
        self
    }

    /// Host type name, as used in identifiers and log lines.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Empty => "EMPTY",
            ObjectKind::Mesh { .. } => "MESH",
            ObjectKind::Light(_) => "LAMP",
            ObjectKind::Camera(_) => "CAMERA",
            ObjectKind::Armature { .. } => "ARMATURE",
        }
    }
}

/// Type-specific object data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectKind {
    #[default]
    Empty,
    Mesh {
        /// Mesh data block, `None` for a mesh object without data.
        #[serde(default)]
        mesh: Option<String>,
        /// Armature object deforming this mesh.
        #[serde(default)]
        armature: Option<String>,
        /// Vertex group names in slot order. Groups named after bones
        /// carry skin weights.
        #[serde(default)]
        vertex_groups: Vec<String>,
    },
    Light(LightData),
    Camera(CameraData),
    Armature {
        armature: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Point,
    Sun,
    Spot,
    Hemi,
    Area,
}

/// Lamp data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightData {
    pub light_type: LightKind,
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_energy")]
    pub energy: f64,
    /// Falloff distance for spot lights.
    #[serde(default = "default_distance")]
    pub distance: f64,
    /// Full cone angle in radians.
    #[serde(default = "default_spot_size")]
    pub spot_size: f64,
    #[serde(default = "default_spot_blend")]
    pub spot_blend: f64,
    /// Buffered shadow settings, `None` for lights without shadows.
    #[serde(default)]
    pub shadow: Option<ShadowSettings>,
    #[serde(default)]
    pub properties: Properties,
}

fn default_energy() -> f64 {
    1.0
}

fn default_distance() -> f64 {
    25.0
}

fn default_spot_size() -> f64 {
    std::f64::consts::FRAC_PI_4
}

fn default_spot_blend() -> f64 {
    0.15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowSettings {
    #[serde(default = "default_buffer_bias")]
    pub buffer_bias: f64,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    #[serde(default = "default_frustum_size")]
    pub frustum_size: f64,
    #[serde(default = "default_clip_start")]
    pub clip_start: f64,
    #[serde(default = "default_clip_end")]
    pub clip_end: f64,
}

fn default_buffer_bias() -> f64 {
    1.0
}

fn default_buffer_size() -> u32 {
    512
}

fn default_frustum_size() -> f64 {
    10.0
}

fn default_clip_start() -> f64 {
    0.1
}

fn default_clip_end() -> f64 {
    100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    #[default]
    Perspective,
    Orthographic,
}

/// Camera data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraData {
    #[serde(default)]
    pub camera_type: CameraKind,
    /// Horizontal field of view in radians.
    #[serde(default = "default_angle")]
    pub angle: f64,
    #[serde(default = "default_clip_start")]
    pub clip_start: f64,
    #[serde(default = "default_clip_end")]
    pub clip_end: f64,
}

fn default_angle() -> f64 {
    0.857_556
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            camera_type: CameraKind::Perspective,
            angle: default_angle(),
            clip_start: default_clip_start(),
            clip_end: default_clip_end(),
        }
    }
}
