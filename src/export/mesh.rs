//! Mesh data to indexed `BufferGeometry` records.

use super::{Exporter, GeometryRef};
use crate::encoder::{Map, Node};
use crate::error::{ExportError, Result};
use crate::geometry::{AttributeSet, BufferGeometry, FaceVertex, VertexWelder};
use crate::scene::properties::overrides;
use crate::scene::{MeshData, MeshVertex, ObjectKind};
use crate::types::transform::to_y_up;
use crate::types::{clean_name, entity_uuid};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::time::Instant;

/// Bones influencing one vertex.
const MAX_INFLUENCES: usize = 4;

/// Vertex group to bone index, in vertex group order.
type GroupMap = Vec<(String, u32)>;

impl Exporter<'_> {
    pub(super) fn geometry_uuid(&self, index: usize) -> String {
        let geometry = self.geometries[index];
        match geometry.skinned_object {
            Some(ob) => entity_uuid("ModifiedMesh", &self.object(ob).name),
            None => entity_uuid("Mesh", &self.scene.meshes[geometry.mesh].name),
        }
    }

    /// Optional attributes carried by a geometry, decided once from its
    /// materials and armature.
    pub(crate) fn attribute_set(&self, geometry: GeometryRef) -> AttributeSet {
        let scene = self.scene;
        let mesh = &scene.meshes[geometry.mesh];
        let mut set = AttributeSet::BASIC;

        for name in mesh.material_names() {
            let Ok(m) = scene.material_index(name) else {
                continue;
            };
            if let Some(slots) = self.material_textures.get(&m) {
                set.uv |= slots.iter().any(|(kind, _)| kind.uses_uv());
                set.uv2 |= slots.iter().any(|(kind, _)| kind.uses_uv2());
            }
            set.color |= scene.materials[m].use_vertex_color;
        }
        set.skin = geometry.skinned_object.is_some();
        set
    }

    /// Vertex groups of a skinned object that name an exported bone.
    fn group_map(&self, ob: usize) -> GroupMap {
        let Some(&armature) = self.object_armature.get(&ob) else {
            return Vec::new();
        };
        let bones = self.scene.armatures[armature].export_bones();
        let ObjectKind::Mesh { vertex_groups, .. } = &self.object(ob).kind else {
            return Vec::new();
        };
        vertex_groups
            .iter()
            .filter_map(|group| {
                bones
                    .iter()
                    .position(|bone| &bone.name == group)
                    .map(|bone| (group.clone(), bone as u32))
            })
            .collect()
    }

    pub(super) fn export_geometry(&self, index: usize) -> Result<Node> {
        let start = Instant::now();
        let geometry = self.geometries[index];
        let mesh = &self.scene.meshes[geometry.mesh];
        let attributes = self.attribute_set(geometry);
        let groups = match geometry.skinned_object {
            Some(ob) => self.group_map(ob),
            None => Vec::new(),
        };

        let buffer = build_buffer(mesh, attributes, &groups)?;
        debug!(
            "Geometry \"{}\": {} vertices, {} triangles, {} groups in {:.2?}",
            mesh.name,
            buffer.vertex_count(),
            buffer.triangle_count(),
            buffer.groups.len(),
            start.elapsed()
        );

        let name = match geometry.skinned_object {
            Some(ob) => &self.object(ob).name,
            None => &mesh.name,
        };
        let out = Map::new()
            .with("uuid", self.geometry_uuid(index))
            .with("name", clean_name(name))
            .with("type", "BufferGeometry")
            .with("data", buffer.into_node());
        out.update(&overrides(&mesh.properties));
        info!("-> THREE.BufferGeometry(\"{}\")", name);
        Ok(out.into())
    }
}

/// Weld the faces of `mesh` into an indexed buffer.
///
/// Faces are visited by material slot (a mesh without slots has one
/// implicit slot), polygons are fan-triangulated, positions and normals are
/// converted to Y-up and missing attributes take their defaults.
pub(crate) fn build_buffer(mesh: &MeshData, attributes: AttributeSet, groups: &GroupMap) -> Result<BufferGeometry> {
    let slots = mesh.materials.len().max(1);
    let stray = mesh.faces.iter().filter(|f| f.material_index >= slots).count();
    if stray > 0 {
        warn!(
            "{}: {} faces use a material slot the mesh does not have, skipping",
            mesh.name, stray
        );
    }

    let mut welder = VertexWelder::new(attributes);
    let mut triangles = Vec::new();
    for slot in 0..slots {
        welder.begin_group(slot);
        for face in mesh.faces.iter().filter(|f| f.material_index == slot) {
            let corners = &face.vertices;
            if corners.len() < 3 {
                return Err(ExportError::UnsupportedPolygon(corners.len()));
            }
            triangles.clear();
            for i in 1..corners.len() - 1 {
                for corner in [&corners[0], &corners[i], &corners[i + 1]] {
                    triangles.push(face_vertex(corner, attributes, groups));
                }
            }
            welder.push_face(&triangles)?;
        }
        welder.end_group();
    }
    Ok(BufferGeometry::assemble(welder.finish()))
}

fn face_vertex(corner: &MeshVertex, attributes: AttributeSet, groups: &GroupMap) -> FaceVertex {
    let mut vertex = FaceVertex::new(to_y_up(corner.position), to_y_up(corner.normal));
    vertex.uv = corner.uv;
    vertex.uv2 = corner.uv2;
    vertex.color = corner.color;
    if attributes.skin {
        let (index, weight) = skin(corner, groups);
        vertex = vertex.with_skin(index, weight);
    }
    vertex.conform(attributes)
}

/// The strongest bone influences of a corner.
///
/// Every mapped vertex group takes part, with weight 0 where the corner is
/// not in the group; ties keep vertex group order. Fewer than four
/// influences are padded with bone 0 at weight 0.
fn skin(corner: &MeshVertex, groups: &GroupMap) -> ([u32; 4], [f64; 4]) {
    let mut influences: Vec<(u32, f64)> = groups
        .iter()
        .map(|(name, bone)| (*bone, corner.weights.get(name).copied().unwrap_or(0.0)))
        .collect();
    influences.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    influences.resize(MAX_INFLUENCES, (0, 0.0));

    let mut index = [0; 4];
    let mut weight = [0.0; 4];
    for (slot, (bone, w)) in influences.into_iter().enumerate() {
        index[slot] = bone;
        weight[slot] = w;
    }
    (index, weight)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{export_json, quad_mesh, textured_scene};
    use super::super::ExportConfig;
    use super::*;
    use crate::geometry::{AttributeName, MaterialGroup};
    use crate::scene::MeshFace;

    fn v(x: f64, y: f64) -> MeshVertex {
        MeshVertex::new([x, y, 0.0], [0.0, 0.0, 1.0])
    }

    #[test]
    fn test_quad_is_fan_triangulated_and_welded() {
        let mesh = quad_mesh("Quad", vec![]);
        let buffer = build_buffer(&mesh, AttributeSet::BASIC.with_uv(), &Vec::new()).unwrap();

        assert_eq!(buffer.vertex_count(), 4);
        assert_eq!(buffer.index, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(
            buffer.groups,
            vec![MaterialGroup {
                start: 0,
                count: 6,
                material_index: 0
            }]
        );
    }

    #[test]
    fn test_positions_and_normals_are_y_up() {
        let mesh = MeshData {
            name: "Tri".to_string(),
            faces: vec![MeshFace {
                material_index: 0,
                vertices: vec![
                    MeshVertex::new([0.0, 1.0, 2.0], [0.0, 0.0, 1.0]),
                    MeshVertex::new([1.0, 1.0, 2.0], [0.0, 0.0, 1.0]),
                    MeshVertex::new([0.0, 2.0, 2.0], [0.0, 0.0, 1.0]),
                ],
            }],
            ..MeshData::default()
        };
        let buffer = build_buffer(&mesh, AttributeSet::BASIC, &Vec::new()).unwrap();
        let position = buffer.attribute(AttributeName::Position).unwrap();
        let normal = buffer.attribute(AttributeName::Normal).unwrap();
        assert_eq!(&position.array[0..3], &[0.0, 2.0, -1.0]);
        assert_eq!(&normal.array[0..3], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_missing_attributes_get_defaults() {
        let mesh = MeshData {
            name: "Tri".to_string(),
            faces: vec![MeshFace {
                material_index: 0,
                vertices: vec![v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)],
            }],
            ..MeshData::default()
        };
        let set = AttributeSet::BASIC.with_uv().with_color();
        let buffer = build_buffer(&mesh, set, &Vec::new()).unwrap();
        assert_eq!(buffer.attribute(AttributeName::Uv).unwrap().array, vec![0.0; 6]);
        assert_eq!(buffer.attribute(AttributeName::Color).unwrap().array, vec![1.0; 9]);
    }

    #[test]
    fn test_faces_are_grouped_by_slot() {
        let tri = |slot: usize, x: f64| MeshFace {
            material_index: slot,
            vertices: vec![v(x, 0.0), v(x + 1.0, 0.0), v(x, 1.0)],
        };
        let mesh = MeshData {
            name: "Mixed".to_string(),
            materials: vec![Some("A".to_string()), Some("B".to_string()), Some("C".to_string())],
            // Slot 1 has no faces; slot 7 does not exist.
            faces: vec![tri(2, 0.0), tri(0, 5.0), tri(2, 10.0), tri(7, 20.0)],
            ..MeshData::default()
        };
        let buffer = build_buffer(&mesh, AttributeSet::BASIC, &Vec::new()).unwrap();
        assert_eq!(
            buffer.groups,
            vec![
                MaterialGroup {
                    start: 0,
                    count: 3,
                    material_index: 0
                },
                MaterialGroup {
                    start: 3,
                    count: 6,
                    material_index: 2
                },
            ]
        );
        assert_eq!(buffer.triangle_count(), 3);
    }

    #[test]
    fn test_skin_influences() {
        let groups: GroupMap = vec![
            ("Root".to_string(), 0),
            ("Arm".to_string(), 1),
            ("Hand".to_string(), 2),
        ];
        let mut corner = v(0.0, 0.0);
        corner.weights.insert("Hand".to_string(), 0.75);
        corner.weights.insert("Root".to_string(), 0.25);
        corner.weights.insert("Unrelated".to_string(), 1.0);

        let (index, weight) = skin(&corner, &groups);
        assert_eq!(index, [2, 0, 1, 0]);
        assert_eq!(weight, [0.75, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_skin_keeps_four_strongest() {
        let groups: GroupMap = (0..6).map(|i| (format!("B{}", i), i)).collect();
        let mut corner = v(0.0, 0.0);
        for i in 0..6 {
            corner.weights.insert(format!("B{}", i), i as f64 / 10.0);
        }
        let (index, weight) = skin(&corner, &groups);
        assert_eq!(index, [5, 4, 3, 2]);
        assert_eq!(weight, [0.5, 0.4, 0.3, 0.2]);
    }

    #[test]
    fn test_attribute_set_from_materials() {
        let mut scene = textured_scene();
        scene.materials[0].use_vertex_color = true;
        let exporter = Exporter::new(&scene, ExportConfig::default()).unwrap();
        let set = exporter.attribute_set(exporter.geometries[0]);
        assert!(set.uv && set.color);
        assert!(!set.uv2 && !set.skin);

        // Without textures the uv channel is not needed.
        let config = ExportConfig {
            export_textures: false,
            ..ExportConfig::default()
        };
        let exporter = Exporter::new(&scene, config).unwrap();
        let set = exporter.attribute_set(exporter.geometries[0]);
        assert!(!set.uv && set.color);
    }

    #[test]
    fn test_geometry_record() {
        let scene = textured_scene();
        let out = export_json(&scene, ExportConfig::default());
        let geometry = &out["geometries"][0];
        assert_eq!(geometry["type"], "BufferGeometry");
        assert_eq!(geometry["name"], "FloorMesh");
        assert_eq!(geometry["uuid"], entity_uuid("Mesh", "FloorMesh"));

        let data = &geometry["data"];
        let attributes = data["attributes"].as_object().unwrap();
        let names: Vec<_> = attributes.keys().cloned().collect();
        assert!(names.contains(&"position".to_string()));
        assert!(names.contains(&"uv".to_string()));
        assert_eq!(data["attributes"]["position"]["type"], "Float32Array");
        assert_eq!(data["attributes"]["position"]["itemSize"], 3);
        assert_eq!(data["attributes"]["uv"]["itemSize"], 2);
        assert_eq!(data["index"]["type"], "Uint32Array");
        assert_eq!(data["index"]["array"], serde_json::json!([0, 1, 2, 0, 2, 3]));
        assert_eq!(data["groups"][0]["count"], 6);
        assert_eq!(data["boundingSphere"]["center"], serde_json::json!([0.5, 0, -0.5]));
    }

    #[test]
    fn test_skinned_mesh_gets_own_geometry() {
        use crate::scene::{ArmatureData, BoneData, ObjectKind, SceneObject};

        let mut scene = textured_scene();
        for corner in &mut scene.meshes[0].faces[0].vertices {
            corner.weights.insert("Arm".to_string(), 1.0);
        }
        scene.objects.push(SceneObject::new(
            "Rig",
            ObjectKind::Armature {
                armature: "RigData".to_string(),
            },
        ));
        scene.armatures.push(ArmatureData {
            name: "RigData".to_string(),
            bones: vec![BoneData::new("Root"), BoneData::new("Arm")],
        });
        scene.objects[1].kind = ObjectKind::Mesh {
            mesh: Some("FloorMesh".to_string()),
            armature: Some("Rig".to_string()),
            vertex_groups: vec!["Arm".to_string(), "Root".to_string()],
        };

        let out = export_json(&scene, ExportConfig::default());
        let geometries = out["geometries"].as_array().unwrap();
        assert_eq!(geometries.len(), 2);

        let skinned = &geometries[1];
        assert_eq!(skinned["uuid"], entity_uuid("ModifiedMesh", "Tile"));
        assert_eq!(skinned["name"], "Tile");
        let attributes = &skinned["data"]["attributes"];
        assert_eq!(attributes["skinIndex"]["itemSize"], 4);
        assert_eq!(
            attributes["skinIndex"]["array"].as_array().unwrap()[..4],
            [1, 0, 0, 0]
        );
        assert_eq!(
            attributes["skinWeight"]["array"].as_array().unwrap()[..4],
            [1, 0, 0, 0]
        );
        assert!(geometries[0]["data"]["attributes"].get("skinIndex").is_none());
    }

    #[test]
    fn test_pretty_arrays_stay_inline() {
        let scene = textured_scene();
        let text = Exporter::new(&scene, ExportConfig::default())
            .unwrap()
            .to_json_string()
            .unwrap();
        assert!(text.contains("\"array\": [0,1,2,0,2,3]"));
    }
}
