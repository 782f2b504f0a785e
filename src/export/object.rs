//! Scene, object, light and camera records.

use super::{Exporter, Placement};
use crate::encoder::{Map, Node, Seq};
use crate::error::{ExportError, Result};
use crate::scene::properties::{dotted, overrides, user_data};
use crate::scene::{CameraData, CameraKind, LightData, LightKind, ObjectKind, SceneObject};
use crate::types::transform::export_matrix;
use crate::types::{clean_name, entity_uuid, Color};
use glam::DMat4;
use log::info;

/// Colours are written as sRGB-encoded `0xRRGGBB` integers.
pub(super) fn color_node(color: Color) -> Node {
    Node::from(color.to_hex(true))
}

impl Exporter<'_> {
    pub(super) fn export_scene(&self) -> Node {
        let scene = self.scene;
        info!("-> THREE.Scene(\"{}\")", scene.name);

        let out = Map::new()
            .with("uuid", entity_uuid("Scene", &scene.name))
            .with("name", clean_name(&scene.name))
            .with("type", "Scene")
            .with("fog", self.export_fog());
        out.update(&overrides(&scene.properties));

        let children: Seq = self
            .children(None)
            .into_iter()
            .map(|ob| Node::opaque(super::Entity::Object(ob)))
            .collect();
        if let Some(ambient) = self.export_ambient_light() {
            children.push(ambient);
        }
        out.insert("children", children);
        out.into()
    }

    fn export_fog(&self) -> Node {
        let Some(world) = &self.scene.world else {
            return Node::Null;
        };
        let Some(mist) = world.mist else {
            return Node::Null;
        };
        Map::new()
            .with("type", "Fog")
            .with("color", color_node(world.horizon_color))
            .with("near", mist.start)
            .with("far", mist.start + mist.depth)
            .into()
    }

    fn export_ambient_light(&self) -> Option<Map> {
        let world = self.scene.world.as_ref()?;
        if world.ambient_color.is_black() {
            return None;
        }
        info!("-> THREE.AmbientLight()");
        Some(
            Map::new()
                .with("name", "Ambient")
                .with("type", "AmbientLight")
                .with("color", color_node(world.ambient_color)),
        )
    }

    pub(super) fn export_object(&self, index: usize) -> Result<Node> {
        let ob = self.object(index);
        let out = match &ob.kind {
            ObjectKind::Empty => base_record(ob, "Object3D"),
            ObjectKind::Mesh { .. } => self.export_mesh_object(index),
            ObjectKind::Light(light) => export_light(ob, light)?,
            ObjectKind::Camera(camera) => self.export_camera(ob, camera)?,
            ObjectKind::Armature { .. } => self.export_armature_object(index),
        };

        let Placement { matrix, .. } = self.placements[&index];
        if matrix != DMat4::IDENTITY {
            out.insert("matrix", export_matrix(&matrix));
        }

        let children: Seq = self
            .children(Some(index))
            .into_iter()
            .map(|child| Node::opaque(super::Entity::Object(child)))
            .collect();
        out.insert("children", children);

        let user = match out.get("userData") {
            Some(Node::Map(existing)) => existing,
            _ => {
                let fresh = Map::new();
                out.insert("userData", fresh.clone());
                fresh
            }
        };
        user.update(&user_data(&ob.properties));
        out.update(&overrides(&ob.properties));

        info!(
            "-> THREE.{}(\"{}\")",
            type_of(&out).unwrap_or_else(|| "Object3D".to_string()),
            ob.name
        );
        Ok(out.into())
    }

    fn export_mesh_object(&self, index: usize) -> Map {
        let ob = self.object(index);
        let out = base_record(ob, "Mesh");
        let Some(&geometry) = self.object_geometry.get(&index) else {
            return out;
        };
        out.insert("geometry", self.geometry_uuid(geometry));

        if let Some(&material) = self.object_material.get(&index) {
            out.insert("material", self.material_uuid(material));
            let (cast, receive) = self.shadow_flags(material);
            out.insert("castShadow", cast);
            out.insert("receiveShadow", receive);
        }
        out
    }

    fn export_camera(&self, ob: &SceneObject, camera: &CameraData) -> Result<Map> {
        if camera.camera_type != CameraKind::Perspective {
            return Err(ExportError::Unsupported(format!(
                "camera `{}`: only perspective cameras are supported",
                ob.name
            )));
        }
        let [width, height] = self.scene.resolution;
        let aspect = width as f64 / height.max(1) as f64;
        let fov = (2.0 * ((camera.angle / 2.0).tan() / aspect).atan()).to_degrees();

        let out = base_record(ob, "PerspectiveCamera");
        out.insert("aspect", aspect);
        out.insert("fov", fov);
        out.insert("near", camera.clip_start);
        out.insert("far", camera.clip_end);
        Ok(out)
    }

    fn export_armature_object(&self, index: usize) -> Map {
        let ob = self.object(index);
        let out = base_record(ob, "Group");
        // Bones travel in userData; app code builds the skeleton.
        if let Some(&armature) = self.object_armature.get(&index) {
            let bones = super::animation::export_bones(&self.scene.armatures[armature]);
            out.insert("userData", Map::new().with("bones", bones));
        }
        out
    }
}

/// `uuid`, `name` and `type` of an object record.
fn base_record(ob: &SceneObject, kind: &str) -> Map {
    Map::new()
        .with("uuid", entity_uuid(ob.type_name(), &ob.name))
        .with("name", clean_name(&ob.name))
        .with("type", kind)
}

fn type_of(record: &Map) -> Option<String> {
    match record.get("type") {
        Some(Node::Str(kind)) => Some(kind),
        _ => None,
    }
}

fn export_light(ob: &SceneObject, light: &LightData) -> Result<Map> {
    let out = match light.light_type {
        LightKind::Hemi => {
            let out = base_record(ob, "HemisphereLight");
            out.insert("color", color_node(light.color));
            out.insert("groundColor", color_node(light.color.scale(0.5)));
            out.insert("intensity", light.energy);
            out
        }
        LightKind::Point => {
            let out = base_record(ob, "PointLight");
            out.insert("color", color_node(light.color));
            out
        }
        LightKind::Sun => {
            let out = base_record(ob, "DirectionalLight");
            out.insert("color", color_node(light.color));
            out.insert("intensity", light.energy);
            if let Some(shadow) = export_shadow(ob, light) {
                out.insert("castShadow", true);
                out.insert("shadow", shadow);
            }
            out
        }
        LightKind::Spot => {
            let out = base_record(ob, "SpotLight");
            out.insert("color", color_node(light.color));
            out.insert("intensity", light.energy);
            out.insert("distance", light.distance);
            out.insert("angle", light.spot_size / 2.0);
            out.insert("penumbra", light.spot_blend);
            out
        }
        LightKind::Area => {
            return Err(ExportError::Unsupported(format!(
                "light `{}`: area lights are not supported",
                ob.name
            )))
        }
    };
    Ok(out)
}

/// Orthographic shadow camera of a directional light.
///
/// The frustum defaults to the buffer's frustum size and can be overridden
/// per side with `three_camera.top` / `bottom` / `left` / `right`.
fn export_shadow(ob: &SceneObject, light: &LightData) -> Option<Map> {
    let settings = light.shadow.as_ref()?;
    let size = settings.frustum_size;
    let side = |name: &str, default: f64| {
        dotted(&light.properties, &format!("camera.{}", name))
            .and_then(serde_json::Value::as_f64)
            .filter(|v| *v != 0.0)
            .unwrap_or(default)
    };

    let camera = Map::new()
        .with("name", format!("{}ShadowCamera", clean_name(&ob.name)))
        .with("type", "OrthographicCamera")
        .with("top", side("top", size))
        .with("bottom", side("bottom", -size))
        .with("left", side("left", -size))
        .with("right", side("right", size))
        .with("near", settings.clip_start)
        .with("far", settings.clip_end);

    let shadow = Map::new()
        .with("bias", settings.buffer_bias - 1.0)
        .with("mapSize", [settings.buffer_size, settings.buffer_size])
        .with("camera", camera);
    shadow.update(&overrides(&light.properties));
    Some(shadow)
}

#[cfg(test)]
mod tests {
    use super::super::tests::export_json;
    use super::super::ExportConfig;
    use crate::scene::{Mist, SceneDescription, SceneObject, ShadowSettings, World};
    use super::*;
    use serde_json::json;

    fn light(name: &str, light_type: LightKind) -> SceneObject {
        SceneObject::new(
            name,
            ObjectKind::Light(LightData {
                light_type,
                color: Color::WHITE,
                energy: 2.0,
                distance: 30.0,
                spot_size: 1.0,
                spot_blend: 0.2,
                shadow: None,
                properties: Default::default(),
            }),
        )
    }

    fn translated(x: f64, y: f64, z: f64) -> [[f64; 4]; 4] {
        [
            [1.0, 0.0, 0.0, x],
            [0.0, 1.0, 0.0, y],
            [0.0, 0.0, 1.0, z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn test_empty_object_record() {
        let mut scene = SceneDescription::new("S");
        let mut ob = SceneObject::new("My Empty", ObjectKind::Empty).with_matrix(translated(1.0, 2.0, 3.0));
        ob.properties.insert("three_visible".to_string(), json!(0));
        ob.properties.insert("userData_tag".to_string(), json!("marker"));
        scene.objects.push(ob);

        let out = export_json(&scene, ExportConfig::default());
        let empty = &out["object"]["children"][0];
        assert_eq!(empty["type"], "Object3D");
        assert_eq!(empty["name"], "My_Empty");
        assert_eq!(empty["uuid"], entity_uuid("EMPTY", "My Empty"));
        assert_eq!(empty["visible"], false);
        assert_eq!(empty["userData"]["tag"], "marker");
        let m = empty["matrix"].as_array().unwrap();
        assert_eq!(m.len(), 16);
        assert_eq!(m[12], 1);
        assert_eq!(m[13], 3);
        assert_eq!(m[14], -2);
        // Empty children lists are skipped.
        assert!(empty.get("children").is_none());
    }

    #[test]
    fn test_child_matrix_is_relative_to_parent() {
        let mut scene = SceneDescription::new("S");
        scene.objects.push(SceneObject::new("Parent", ObjectKind::Empty).with_matrix(translated(1.0, 0.0, 0.0)));
        scene.objects.push(
            SceneObject::new("Child", ObjectKind::Empty)
                .with_parent("Parent")
                .with_matrix(translated(1.0, 0.0, 0.0)),
        );

        let out = export_json(&scene, ExportConfig::default());
        let parent = &out["object"]["children"][0];
        assert_eq!(parent["matrix"][12], 1);
        // Same world position as the parent: identity, so omitted.
        assert!(parent["children"][0].get("matrix").is_none());
    }

    #[test]
    fn test_scene_fog_and_ambient() {
        let mut scene = SceneDescription::new("World Scene");
        scene.world = Some(World {
            ambient_color: Color::new(1.0, 1.0, 1.0),
            horizon_color: Color::new(1.0, 0.0, 0.0),
            mist: Some(Mist {
                start: 5.0,
                depth: 20.0,
            }),
        });
        scene.properties.insert("three_background".to_string(), json!(255));

        let out = export_json(&scene, ExportConfig::default());
        let root = &out["object"];
        assert_eq!(root["name"], "World_Scene");
        assert_eq!(root["fog"], json!({"type": "Fog", "color": 0xFF0000, "near": 5, "far": 25}));
        assert_eq!(root["background"], 255);
        assert_eq!(root["children"][0]["type"], "AmbientLight");
        assert_eq!(root["children"][0]["color"], 0xFFFFFF);
    }

    #[test]
    fn test_no_world_means_no_fog() {
        let scene = SceneDescription::new("S");
        let out = export_json(&scene, ExportConfig::default());
        assert!(out["object"].get("fog").is_none());
        assert!(out["object"].get("children").is_none());
    }

    #[test]
    fn test_lights() {
        let mut scene = SceneDescription::new("S");
        scene.objects.push(light("Hemi", LightKind::Hemi));
        scene.objects.push(light("Point", LightKind::Point));
        scene.objects.push(light("Spot", LightKind::Spot));

        let out = export_json(&scene, ExportConfig::default());
        let children = out["object"]["children"].as_array().unwrap();
        assert_eq!(children[0]["type"], "HemisphereLight");
        assert_eq!(children[0]["groundColor"], 0xBBBBBB);
        assert_eq!(children[0]["intensity"], 2);
        assert_eq!(children[1]["type"], "PointLight");
        assert!(children[1].get("intensity").is_none());
        assert_eq!(children[2]["type"], "SpotLight");
        assert_eq!(children[2]["angle"], 0.5);
        assert_eq!(children[2]["penumbra"], 0.2);
        assert_eq!(children[2]["distance"], 30);
    }

    #[test]
    fn test_sun_shadow_camera() {
        let mut scene = SceneDescription::new("S");
        let mut sun = light("Sun", LightKind::Sun);
        sun.matrix_world = translated(0.0, 0.0, 10.0);
        if let ObjectKind::Light(data) = &mut sun.kind {
            data.shadow = Some(ShadowSettings {
                buffer_bias: 1.5,
                buffer_size: 2048,
                frustum_size: 8.0,
                clip_start: 1.0,
                clip_end: 50.0,
            });
            data.properties.insert("three_camera.top".to_string(), json!(12.0));
            data.properties.insert("three_radius".to_string(), json!(3));
        }
        scene.objects.push(sun);

        let out = export_json(&scene, ExportConfig::default());
        let sun = &out["object"]["children"][0];
        assert_eq!(sun["type"], "DirectionalLight");
        assert_eq!(sun["castShadow"], true);
        let shadow = &sun["shadow"];
        assert_eq!(shadow["bias"], 0.5);
        assert_eq!(shadow["mapSize"], json!([2048, 2048]));
        assert_eq!(shadow["radius"], 3);
        assert_eq!(shadow["camera"]["name"], "SunShadowCamera");
        assert_eq!(shadow["camera"]["top"], 12);
        assert_eq!(shadow["camera"]["bottom"], -8);
        assert_eq!(shadow["camera"]["far"], 50);
        // Pointing straight down from 10 units up: position (0, 10, 0) in Y-up.
        assert_eq!(sun["matrix"][13], 10);
    }

    #[test]
    fn test_area_light_is_unsupported() {
        let mut scene = SceneDescription::new("S");
        scene.objects.push(light("Area", LightKind::Area));
        let exporter = Exporter::new(&scene, ExportConfig::default()).unwrap();
        assert!(matches!(
            exporter.to_json_string(),
            Err(ExportError::Unsupported(_))
        ));
    }

    #[test]
    fn test_perspective_camera() {
        let mut scene = SceneDescription::new("S");
        scene.resolution = [1000, 500];
        let camera = CameraData {
            angle: std::f64::consts::FRAC_PI_2,
            ..CameraData::default()
        };
        scene.objects.push(SceneObject::new("Cam", ObjectKind::Camera(camera)));

        let out = export_json(&scene, ExportConfig::default());
        let cam = &out["object"]["children"][0];
        assert_eq!(cam["type"], "PerspectiveCamera");
        assert_eq!(cam["aspect"], 2);
        // 2 * atan(tan(45°) / 2) = 53.13010°
        assert_eq!(cam["fov"], 53.1301);
        assert_eq!(cam["near"], 0.1);
        // The host camera looks down -Z; the exported matrix is rotated.
        assert!(cam.get("matrix").is_some());
    }

    #[test]
    fn test_orthographic_camera_is_unsupported() {
        let mut scene = SceneDescription::new("S");
        let camera = CameraData {
            camera_type: CameraKind::Orthographic,
            ..CameraData::default()
        };
        scene.objects.push(SceneObject::new("Ortho", ObjectKind::Camera(camera)));
        let exporter = Exporter::new(&scene, ExportConfig::default()).unwrap();
        assert!(exporter.to_json_string().is_err());
    }
}
