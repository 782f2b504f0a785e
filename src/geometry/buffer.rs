//! Buffer assembly: named flat attribute arrays, groups and bounds.

use super::vertex::FaceVertex;
use super::welder::{MaterialGroup, WeldedGeometry};
use crate::encoder::{Map, Node, Seq};

/// Named vertex attributes, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeName {
    Position,
    Normal,
    Uv,
    Uv2,
    Color,
    SkinIndex,
    SkinWeight,
}

impl AttributeName {
    pub const ALL: [AttributeName; 7] = [
        AttributeName::Position,
        AttributeName::Normal,
        AttributeName::Uv,
        AttributeName::Uv2,
        AttributeName::Color,
        AttributeName::SkinIndex,
        AttributeName::SkinWeight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeName::Position => "position",
            AttributeName::Normal => "normal",
            AttributeName::Uv => "uv",
            AttributeName::Uv2 => "uv2",
            AttributeName::Color => "color",
            AttributeName::SkinIndex => "skinIndex",
            AttributeName::SkinWeight => "skinWeight",
        }
    }

    /// Components per vertex.
    pub fn item_size(&self) -> usize {
        match self {
            AttributeName::Position | AttributeName::Normal | AttributeName::Color => 3,
            AttributeName::Uv | AttributeName::Uv2 => 2,
            AttributeName::SkinIndex | AttributeName::SkinWeight => 4,
        }
    }

    /// Append this attribute's components of `vertex` to `out`.
    /// Returns false if the vertex does not carry the attribute.
    fn extend_from(&self, vertex: &FaceVertex, out: &mut Vec<f64>) -> bool {
        match self {
            AttributeName::Position => out.extend_from_slice(&vertex.position),
            AttributeName::Normal => out.extend_from_slice(&vertex.normal),
            AttributeName::Uv => match &vertex.uv {
                Some(uv) => out.extend_from_slice(uv),
                None => return false,
            },
            AttributeName::Uv2 => match &vertex.uv2 {
                Some(uv) => out.extend_from_slice(uv),
                None => return false,
            },
            AttributeName::Color => match &vertex.color {
                Some(color) => out.extend_from_slice(color),
                None => return false,
            },
            AttributeName::SkinIndex => match &vertex.skin_index {
                Some(index) => out.extend(index.iter().map(|&i| i as f64)),
                None => return false,
            },
            AttributeName::SkinWeight => match &vertex.skin_weight {
                Some(weight) => out.extend_from_slice(weight),
                None => return false,
            },
        }
        true
    }
}

/// A flat per-vertex attribute array.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    pub name: AttributeName,
    /// `item_size` components per vertex, vertex-index order.
    pub array: Vec<f64>,
}

impl BufferAttribute {
    pub const TYPE: &'static str = "Float32Array";

    pub fn item_size(&self) -> usize {
        self.name.item_size()
    }

    pub fn count(&self) -> usize {
        self.array.len() / self.item_size()
    }
}

/// Loose bounding sphere around an axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    pub center: [f64; 3],
    pub radius: f64,
}

impl BoundingSphere {
    /// Sphere through the corners of the bounding box of `positions`.
    ///
    /// The centre is the box midpoint and the radius the distance from it to
    /// the max corner. This is not the minimal enclosing sphere. No positions
    /// yield a zero sphere at the origin.
    pub fn from_positions(positions: impl IntoIterator<Item = [f64; 3]>) -> Self {
        let mut positions = positions.into_iter();
        let Some(first) = positions.next() else {
            return Self::default();
        };
        let (mut min, mut max) = (first, first);
        for p in positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        let center = [0, 1, 2].map(|i| (min[i] + max[i]) / 2.0);
        let radius = (0..3)
            .map(|i| (max[i] - center[i]).powi(2))
            .sum::<f64>()
            .sqrt();
        Self { center, radius }
    }
}

/// Indexed buffer geometry ready for encoding.
#[derive(Debug, Clone, Default)]
pub struct BufferGeometry {
    /// Present attributes, in [`AttributeName::ALL`] order.
    pub attributes: Vec<BufferAttribute>,
    pub index: Vec<u32>,
    pub groups: Vec<MaterialGroup>,
    pub bounding_sphere: BoundingSphere,
}

impl BufferGeometry {
    pub const INDEX_TYPE: &'static str = "Uint32Array";

    /// Project welded vertices column-wise into flat attribute arrays.
    pub fn assemble(welded: WeldedGeometry) -> Self {
        let set = welded.attributes;
        let present = |name: &AttributeName| match name {
            AttributeName::Position | AttributeName::Normal => true,
            AttributeName::Uv => set.uv,
            AttributeName::Uv2 => set.uv2,
            AttributeName::Color => set.color,
            AttributeName::SkinIndex | AttributeName::SkinWeight => set.skin,
        };

        let attributes = AttributeName::ALL
            .iter()
            .filter(|name| present(*name))
            .map(|&name| {
                let mut array = Vec::with_capacity(welded.vertices.len() * name.item_size());
                for vertex in &welded.vertices {
                    if !name.extend_from(vertex, &mut array) {
                        // Caller contract: attribute sets are uniform.
                        array.extend(std::iter::repeat(0.0).take(name.item_size()));
                    }
                }
                BufferAttribute { name, array }
            })
            .collect();

        let bounding_sphere =
            BoundingSphere::from_positions(welded.vertices.iter().map(|v| v.position));

        Self {
            attributes,
            index: welded.indices,
            groups: welded.groups,
            bounding_sphere,
        }
    }

    pub fn attribute(&self, name: AttributeName) -> Option<&BufferAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.attribute(AttributeName::Position)
            .map_or(0, BufferAttribute::count)
    }

    pub fn triangle_count(&self) -> usize {
        self.index.len() / 3
    }

    /// Build the `data` mapping of a `BufferGeometry` record.
    ///
    /// Attribute and index arrays are handed over as lazy sequences so they
    /// are formatted one number at a time while streaming.
    pub fn into_node(self) -> Node {
        let attributes = Map::new();
        for attribute in self.attributes {
            let item_size = attribute.item_size();
            let entry = Map::new()
                .with("type", BufferAttribute::TYPE)
                .with("itemSize", item_size)
                .with("array", Node::lazy(attribute.array.into_iter().map(Node::Float)));
            attributes.insert(attribute.name.as_str(), entry);
        }

        let index = Map::new()
            .with("type", Self::INDEX_TYPE)
            .with("itemSize", 1)
            .with("array", Node::lazy(self.index.into_iter().map(Node::from)));

        let groups: Seq = self
            .groups
            .iter()
            .map(|g| {
                Map::new()
                    .with("start", g.start)
                    .with("count", g.count)
                    .with("materialIndex", g.material_index)
            })
            .collect();

        let bounding_sphere = Map::new()
            .with("center", self.bounding_sphere.center)
            .with("radius", self.bounding_sphere.radius);

        Map::new()
            .with("attributes", attributes)
            .with("index", index)
            .with("groups", groups)
            .with("boundingSphere", bounding_sphere)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::geometry::{AttributeSet, VertexWelder};

    fn quad_geometry() -> BufferGeometry {
        let up = [0.0, 0.0, 1.0];
        let a = FaceVertex::new([0.0, 0.0, 0.0], up).with_uv([0.0, 0.0]);
        let b = FaceVertex::new([2.0, 0.0, 0.0], up).with_uv([1.0, 0.0]);
        let c = FaceVertex::new([2.0, 4.0, 0.0], up).with_uv([1.0, 1.0]);
        let d = FaceVertex::new([0.0, 4.0, 0.0], up).with_uv([0.0, 1.0]);
        let welded = VertexWelder::weld(
            AttributeSet::BASIC.with_uv(),
            [(0, vec![[a, b, c], [a, c, d]])],
        )
        .unwrap();
        BufferGeometry::assemble(welded)
    }

    #[test]
    fn test_attribute_arrays_are_flattened_in_vertex_order() {
        let geometry = quad_geometry();

        let names: Vec<_> = geometry.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["position", "normal", "uv"]);

        let position = geometry.attribute(AttributeName::Position).unwrap();
        assert_eq!(
            position.array,
            vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 4.0, 0.0, 0.0, 4.0, 0.0]
        );
        assert_eq!(geometry.attribute(AttributeName::Uv).unwrap().count(), 4);
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.triangle_count(), 2);
    }

    #[test]
    fn test_item_sizes() {
        assert_eq!(AttributeName::Position.item_size(), 3);
        assert_eq!(AttributeName::Normal.item_size(), 3);
        assert_eq!(AttributeName::Color.item_size(), 3);
        assert_eq!(AttributeName::Uv.item_size(), 2);
        assert_eq!(AttributeName::Uv2.item_size(), 2);
        assert_eq!(AttributeName::SkinIndex.item_size(), 4);
        assert_eq!(AttributeName::SkinWeight.item_size(), 4);
    }

    #[test]
    fn test_skin_arrays() {
        let v = FaceVertex::new([0.0; 3], [0.0, 0.0, 1.0]).with_skin([3, 1, 0, 0], [0.75, 0.5, 0.0, 0.0]);
        let welded = VertexWelder::weld(AttributeSet::BASIC.with_skin(), [(0, vec![[v, v, v]])]).unwrap();
        let geometry = BufferGeometry::assemble(welded);

        assert_eq!(
            geometry.attribute(AttributeName::SkinIndex).unwrap().array,
            vec![3.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(
            geometry.attribute(AttributeName::SkinWeight).unwrap().array,
            vec![0.75, 0.5, 0.0, 0.0]
        );
        assert_eq!(geometry.index, vec![0, 0, 0]);
    }

    #[test]
    fn test_bounding_sphere_uses_box_corners() {
        let sphere = BoundingSphere::from_positions([
            [-1.0, 0.0, 2.0],
            [3.0, 4.0, 2.0],
            [1.0, -2.0, 6.0],
        ]);
        assert_eq!(sphere.center, [1.0, 1.0, 4.0]);
        let expected = ((3.0f64 - 1.0).powi(2) + (4.0f64 - 1.0).powi(2) + (6.0f64 - 4.0).powi(2)).sqrt();
        assert_eq!(sphere.radius, expected);
    }

    #[test]
    fn test_bounding_sphere_of_nothing() {
        let sphere = BoundingSphere::from_positions(std::iter::empty());
        assert_eq!(sphere, BoundingSphere::default());
    }

    #[test]
    fn test_quad_bounding_sphere() {
        let geometry = quad_geometry();
        assert_eq!(geometry.bounding_sphere.center, [1.0, 2.0, 0.0]);
        assert_eq!(geometry.bounding_sphere.radius, 5.0f64.sqrt());
    }

    #[test]
    fn test_encoded_data_record() {
        let text = Encoder::default()
            .encode_to_string(&quad_geometry().into_node(), None)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["attributes"]["position"]["type"], "Float32Array");
        assert_eq!(value["attributes"]["position"]["itemSize"], 3);
        assert_eq!(value["attributes"]["uv"]["itemSize"], 2);
        assert_eq!(value["attributes"]["uv"]["array"].as_array().unwrap().len(), 8);
        assert_eq!(value["index"]["type"], "Uint32Array");
        assert_eq!(value["index"]["itemSize"], 1);
        assert_eq!(value["index"]["array"], serde_json::json!([0, 1, 2, 0, 2, 3]));
        assert_eq!(
            value["groups"],
            serde_json::json!([{"start": 0, "count": 6, "materialIndex": 0}])
        );
        assert_eq!(value["boundingSphere"]["center"], serde_json::json!([1, 2, 0]));
        assert!(!text.contains('\n'));
    }
}
