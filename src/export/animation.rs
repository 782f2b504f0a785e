//! Skeleton bones and `AnimationClip` records.

use super::Exporter;
use crate::encoder::{Map, Node, Seq};
use crate::error::Result;
use crate::scene::{ActionGroup, ArmatureData, BoneData, Channel};
use crate::types::transform::{decompose, export_quat, matrix_from_rows, to_y_up};
use crate::types::{clean_name, entity_uuid};
use glam::{DMat4, DQuat, DVec3};
use log::{info, warn};

/// Rest transform of `bone` relative to its parent when the parent is
/// exported too, otherwise relative to the armature.
fn bone_matrix(bones: &[&BoneData], bone: &BoneData) -> DMat4 {
    let local = matrix_from_rows(&bone.matrix_local);
    let parent = bone
        .parent
        .as_deref()
        .and_then(|name| bones.iter().find(|b| b.name == name));
    match parent {
        Some(parent) => matrix_from_rows(&parent.matrix_local).inverse() * local,
        None => local,
    }
}

/// Bone list written to an armature's `userData.bones`.
pub(super) fn export_bones(armature: &ArmatureData) -> Seq {
    let bones = armature.export_bones();
    bones
        .iter()
        .map(|bone| {
            let (pos, rot, scl) = decompose(&bone_matrix(&bones, bone));
            let parent = bone
                .parent
                .as_deref()
                .and_then(|name| bones.iter().position(|b| b.name == name))
                .map_or(-1, |i| i as i64);

            let out = Map::new()
                .with("name", clean_name(&bone.name))
                .with("pos", to_y_up(pos.to_array()))
                .with("parent", parent)
                .with("rotq", export_quat(rot));
            if scl != DVec3::ONE {
                out.insert("scl", [scl.x, scl.z, scl.y]);
            }
            out
        })
        .collect()
}

/// Channels of one data path, ordered by array index.
struct Track<'a> {
    path: &'a str,
    channels: Vec<&'a Channel>,
}

/// Split a group's channels by data path, paths in first-appearance order.
fn tracks(group: &ActionGroup) -> Vec<Track<'_>> {
    let mut tracks: Vec<Track> = Vec::new();
    for channel in &group.channels {
        match tracks.iter_mut().find(|t| t.path == channel.data_path) {
            Some(track) => track.channels.push(channel),
            None => tracks.push(Track {
                path: &channel.data_path,
                channels: vec![channel],
            }),
        }
    }
    for track in &mut tracks {
        track.channels.sort_by_key(|c| c.array_index);
    }
    tracks
}

/// Keyframe `i` across all channels of a track.
fn sample(channels: &[&Channel], i: usize) -> Vec<f64> {
    channels.iter().map(|c| c.keyframes[i][1]).collect()
}

impl Exporter<'_> {
    pub(super) fn export_action(&self, index: usize) -> Result<Node> {
        let (action, ob) = self.actions[index];
        let action = &self.scene.actions[action];
        let fps = self.scene.fps;
        let frames = action.frame_range[1] - action.frame_range[0];

        let out = Map::new()
            .with("uuid", entity_uuid("Action", &action.name))
            .with("name", action.name.as_str())
            .with("type", "AnimationClip")
            .with("fps", fps)
            .with("duration", (frames - 1.0) / fps);

        let armature = self.object_armature.get(&ob).map(|&a| &self.scene.armatures[a]);
        let bones = armature.map(ArmatureData::export_bones).unwrap_or_default();

        let out_tracks = Seq::new();
        for group in &action.groups {
            let group_name = clean_name(&group.name);
            let Some(bone) = bones.iter().find(|b| clean_name(&b.name) == group_name) else {
                warn!(
                    "{}: no exported bone for group \"{}\", skipping",
                    action.name, group.name
                );
                continue;
            };
            let matrix = bone_matrix(&bones, bone);
            let (_, rot, _) = decompose(&matrix);

            for track in tracks(group) {
                if let Some(node) = export_track(&group_name, &track, &matrix, rot) {
                    out_tracks.push(node);
                }
            }
        }
        out.insert("tracks", out_tracks);

        info!("-> THREE.AnimationClip(\"{}\")", action.name);
        Ok(out.into())
    }
}

/// One keyframe track, or `None` when its channels cannot be combined.
fn export_track(group: &str, track: &Track, matrix: &DMat4, rot: DQuat) -> Option<Node> {
    let path = track.path.rsplit('.').next().unwrap_or(track.path);

    if track.channels.iter().any(|c| c.mute) {
        warn!("{}\t{} has muted channels, skipping", group, path);
        return None;
    }
    let times = track.channels[0].times();
    if track.channels.iter().any(|c| c.times() != times) {
        warn!("{}\t{} has mismatched keyframes, skipping", group, path);
        return None;
    }

    let name = path.replace("rotation_", "").replace("location", "position");
    let channels = &track.channels;
    let values: Vec<f64> = match name.as_str() {
        "quaternion" if channels.len() == 4 => (0..times.len())
            .flat_map(|i| {
                let [w, x, y, z] = [0, 1, 2, 3].map(|c| channels[c].keyframes[i][1]);
                export_quat(rot * DQuat::from_xyzw(x, y, z, w).normalize())
            })
            .collect(),
        "position" if channels.len() == 3 => (0..times.len())
            .flat_map(|i| {
                let v = DVec3::from_slice(&sample(channels, i));
                to_y_up(matrix.transform_point3(v).to_array())
            })
            .collect(),
        "quaternion" | "position" => {
            warn!(
                "{}\t{} has {} channels, skipping",
                group,
                path,
                channels.len()
            );
            return None;
        }
        _ => (0..times.len()).flat_map(|i| sample(channels, i)).collect(),
    };

    let kind = if name == "quaternion" { "quaternion" } else { "vector3" };
    info!("-> {}.{}", group, name);
    Some(
        Map::new()
            .with("name", format!("{}.{}", group, name))
            .with("type", kind)
            .with("times", times)
            .with("values", values)
            .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::super::tests::export_json;
    use super::super::ExportConfig;
    use super::*;
    use crate::encoder::{Encoder, EncoderConfig};
    use crate::scene::{ActionData, ObjectKind, SceneDescription, SceneObject};
    use serde_json::Value;

    fn translation(x: f64, y: f64, z: f64) -> [[f64; 4]; 4] {
        [
            [1.0, 0.0, 0.0, x],
            [0.0, 1.0, 0.0, y],
            [0.0, 0.0, 1.0, z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    fn assert_floats(value: &Value, expected: &[f64]) {
        let actual: Vec<f64> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(actual.len(), expected.len(), "{:?}", actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
        }
    }

    fn rig() -> ArmatureData {
        let mut root = BoneData::new("Root");
        root.matrix_local = translation(0.0, 0.0, 1.0);
        let mut arm = BoneData::new("Arm.L");
        arm.parent = Some("Root".to_string());
        arm.matrix_local = translation(0.0, 0.0, 2.0);
        let mut helper = BoneData::new("Helper");
        helper.deform = false;
        ArmatureData {
            name: "RigData".to_string(),
            bones: vec![root, helper, arm],
        }
    }

    fn channel(path: &str, index: usize, keyframes: &[[f64; 2]]) -> Channel {
        Channel {
            data_path: path.to_string(),
            array_index: index,
            mute: false,
            keyframes: keyframes.to_vec(),
        }
    }

    fn animated_scene() -> SceneDescription {
        let location = r#"pose.bones["Arm.L"].location"#;
        let rotation = r#"pose.bones["Arm.L"].rotation_quaternion"#;
        let mut channels = vec![
            channel(location, 2, &[[1.0, 0.0], [10.0, 0.0]]),
            channel(location, 0, &[[1.0, 0.0], [10.0, 0.0]]),
            channel(location, 1, &[[1.0, 0.0], [10.0, 1.0]]),
        ];
        for (i, w) in [1.0, 0.0, 0.0, 0.0].into_iter().enumerate() {
            channels.push(channel(rotation, i, &[[1.0, w], [10.0, w]]));
        }

        let mut scene = SceneDescription::new("Scene");
        let mut ob = SceneObject::new(
            "Rig",
            ObjectKind::Armature {
                armature: "RigData".to_string(),
            },
        );
        ob.action = Some("Wave".to_string());
        scene.objects.push(ob);
        scene.armatures.push(rig());
        scene.actions.push(ActionData {
            name: "Wave".to_string(),
            frame_range: [1.0, 25.0],
            groups: vec![
                ActionGroup {
                    name: "Arm.L".to_string(),
                    channels,
                },
                ActionGroup {
                    name: "Helper".to_string(),
                    channels: vec![channel("location", 0, &[[1.0, 0.0]])],
                },
            ],
        });
        scene
    }

    fn animations() -> ExportConfig {
        ExportConfig {
            export_animations: true,
            ..ExportConfig::default()
        }
    }

    #[test]
    fn test_bones_are_parent_relative() {
        let armature = rig();
        let text = Encoder::new(EncoderConfig::default())
            .encode_to_string(&Node::from(export_bones(&armature)), None)
            .unwrap();
        let bones: Value = serde_json::from_str(&text).unwrap();
        let bones = bones.as_array().unwrap();

        assert_eq!(bones.len(), 2);
        assert_eq!(bones[0]["name"], "Root");
        assert_eq!(bones[0]["parent"], -1);
        assert_floats(&bones[0]["pos"], &[0.0, 1.0, 0.0]);
        assert_eq!(bones[1]["name"], "Arm_L");
        assert_eq!(bones[1]["parent"], 0);
        assert_floats(&bones[1]["pos"], &[0.0, 1.0, 0.0]);
        assert_floats(&bones[1]["rotq"], &[0.0, 0.0, 0.0, 1.0]);
        assert!(bones[1].get("scl").is_none());
    }

    #[test]
    fn test_bone_scale_is_written_when_not_unit() {
        let mut bone = BoneData::new("Big");
        bone.matrix_local[0][0] = 2.0;
        let armature = ArmatureData {
            name: "Rig".to_string(),
            bones: vec![bone],
        };
        let text = Encoder::new(EncoderConfig::default())
            .encode_to_string(&Node::from(export_bones(&armature)), None)
            .unwrap();
        let bones: Value = serde_json::from_str(&text).unwrap();
        assert_floats(&bones[0]["scl"], &[2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_armature_object_carries_bones() {
        let out = export_json(&animated_scene(), ExportConfig::default());
        let rig = &out["object"]["children"][0];
        assert_eq!(rig["type"], "Group");
        assert_eq!(rig["userData"]["bones"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_animation_clip() {
        let out = export_json(&animated_scene(), animations());
        let clip = &out["animations"][0];
        assert_eq!(clip["type"], "AnimationClip");
        assert_eq!(clip["name"], "Wave");
        assert_eq!(clip["uuid"], entity_uuid("Action", "Wave"));
        assert_eq!(clip["fps"], 24);
        assert!((clip["duration"].as_f64().unwrap() - 23.0 / 24.0).abs() < 1e-5);

        // The non-deforming helper bone has no track.
        let tracks = clip["tracks"].as_array().unwrap();
        assert_eq!(tracks.len(), 2);

        let position = &tracks[0];
        assert_eq!(position["name"], "Arm_L.position");
        assert_eq!(position["type"], "vector3");
        assert_floats(&position["times"], &[1.0, 10.0]);
        assert_floats(&position["values"], &[0.0, 1.0, 0.0, 0.0, 1.0, -1.0]);

        let rotation = &tracks[1];
        assert_eq!(rotation["name"], "Arm_L.quaternion");
        assert_eq!(rotation["type"], "quaternion");
        assert_floats(&rotation["values"], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_muted_and_mismatched_tracks_are_skipped() {
        let mut scene = animated_scene();
        let channels = &mut scene.actions[0].groups[0].channels;
        channels[0].mute = true;
        channels[4].keyframes[1][0] = 12.0;

        let out = export_json(&scene, animations());
        assert!(out["animations"][0].get("tracks").is_none());
    }

    #[test]
    fn test_other_paths_are_flattened() {
        let mut scene = animated_scene();
        scene.actions[0].groups[0].channels = vec![
            channel("scale", 1, &[[1.0, 2.0], [5.0, 3.0]]),
            channel("scale", 0, &[[1.0, 1.0], [5.0, 4.0]]),
        ];
        let out = export_json(&scene, animations());
        let track = &out["animations"][0]["tracks"][0];
        assert_eq!(track["name"], "Arm_L.scale");
        assert_eq!(track["type"], "vector3");
        assert_floats(&track["values"], &[1.0, 2.0, 4.0, 3.0]);
    }

    #[test]
    fn test_animations_are_off_by_default() {
        let out = export_json(&animated_scene(), ExportConfig::default());
        assert!(out.get("animations").is_none());
    }
}
