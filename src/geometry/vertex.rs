//! Face-vertex attribute tuples and their exact-equality key.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One corner of one triangle, in output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceVertex {
    pub position: [f64; 3],
    pub normal: [f64; 3],
    #[serde(default)]
    pub uv: Option<[f64; 2]>,
    #[serde(default)]
    pub uv2: Option<[f64; 2]>,
    /// Vertex colour, components in `[0, 1]`.
    #[serde(default)]
    pub color: Option<[f64; 3]>,
    /// Bone indices.
    #[serde(default)]
    pub skin_index: Option<[u32; 4]>,
    /// Bone weights, not normalized.
    #[serde(default)]
    pub skin_weight: Option<[f64; 4]>,
}

impl FaceVertex {
    pub fn new(position: [f64; 3], normal: [f64; 3]) -> Self {
        Self {
            position,
            normal,
            ..Self::default()
        }
    }

    pub fn with_uv(mut self, uv: [f64; 2]) -> Self {
        self.uv = Some(uv);
        self
    }

    pub fn with_uv2(mut self, uv2: [f64; 2]) -> Self {
        self.uv2 = Some(uv2);
        self
    }

    pub fn with_color(mut self, color: [f64; 3]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_skin(mut self, index: [u32; 4], weight: [f64; 4]) -> Self {
        self.skin_index = Some(index);
        self.skin_weight = Some(weight);
        self
    }

    /// The optional attributes this vertex carries.
    pub fn attributes(&self) -> AttributeSet {
        AttributeSet {
            uv: self.uv.is_some(),
            uv2: self.uv2.is_some(),
            color: self.color.is_some(),
            skin: self.skin_index.is_some() && self.skin_weight.is_some(),
        }
    }

    /// Keep exactly the attributes in `set`, filling absent ones with defaults
    /// (uv `(0, 0)`, white, zero skin).
    pub fn conform(mut self, set: AttributeSet) -> Self {
        self.uv = set.uv.then(|| self.uv.unwrap_or([0.0, 0.0]));
        self.uv2 = set.uv2.then(|| self.uv2.unwrap_or([0.0, 0.0]));
        self.color = set.color.then(|| self.color.unwrap_or([1.0, 1.0, 1.0]));
        self.skin_index = set.skin.then(|| self.skin_index.unwrap_or([0; 4]));
        self.skin_weight = set.skin.then(|| self.skin_weight.unwrap_or([0.0; 4]));
        self
    }
}

/// Which optional attributes a geometry carries. Position and normal are
/// always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttributeSet {
    pub uv: bool,
    pub uv2: bool,
    pub color: bool,
    /// Both `skinIndex` and `skinWeight`.
    pub skin: bool,
}

impl AttributeSet {
    pub const BASIC: AttributeSet = AttributeSet {
        uv: false,
        uv2: false,
        color: false,
        skin: false,
    };

    pub fn with_uv(mut self) -> Self {
        self.uv = true;
        self
    }

    pub fn with_uv2(mut self) -> Self {
        self.uv2 = true;
        self
    }

    pub fn with_color(mut self) -> Self {
        self.color = true;
        self
    }

    pub fn with_skin(mut self) -> Self {
        self.skin = true;
        self
    }
}

/// Exact-equality deduplication key over every component of a vertex.
///
/// Floats compare by bit pattern, except that `-0.0` and `0.0` are the same
/// key.
#[derive(Debug, Clone, Copy)]
pub struct VertexKey(pub FaceVertex);

type KeyBits = (
    [u64; 3],
    [u64; 3],
    Option<[u64; 2]>,
    Option<[u64; 2]>,
    Option<[u64; 3]>,
    Option<[u32; 4]>,
    Option<[u64; 4]>,
);

fn float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

impl VertexKey {
    fn bits(&self) -> KeyBits {
        let v = &self.0;
        (
            v.position.map(float_bits),
            v.normal.map(float_bits),
            v.uv.map(|c| c.map(float_bits)),
            v.uv2.map(|c| c.map(float_bits)),
            v.color.map(|c| c.map(float_bits)),
            v.skin_index,
            v.skin_weight.map(|c| c.map(float_bits)),
        )
    }
}

impl PartialEq for VertexKey {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for VertexKey {}

impl Hash for VertexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}
