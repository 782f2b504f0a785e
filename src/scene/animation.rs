//! Armatures and keyframed actions.

use super::object::identity_rows;
use serde::{Deserialize, Serialize};

/// Skeleton data block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmatureData {
    pub name: String,
    #[serde(default)]
    pub bones: Vec<BoneData>,
}

impl ArmatureData {
    /// Bones that deform meshes and are not hidden, in armature order.
    pub fn export_bones(&self) -> Vec<&BoneData> {
        self.bones.iter().filter(|b| b.deform && !b.hidden).collect()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneData {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Rest transform in armature space, host row-major.
    #[serde(default = "identity_rows")]
    pub matrix_local: [[f64; 4]; 4],
    #[serde(default = "default_true")]
    pub deform: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            matrix_local: identity_rows(),
            deform: true,
            hidden: false,
        }
    }
}

/// A keyframed action, grouped by bone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionData {
    pub name: String,
    /// First and last frame.
    pub frame_range: [f64; 2],
    #[serde(default)]
    pub groups: Vec<ActionGroup>,
}

/// Channels animating one bone; the group is named after the bone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionGroup {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// One animated scalar, e.g. `pose.bones["Arm"].location[1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub data_path: String,
    #[serde(default)]
    pub array_index: usize,
    #[serde(default)]
    pub mute: bool,
    /// `(frame, value)` pairs.
    #[serde(default)]
    pub keyframes: Vec<[f64; 2]>,
}

impl Channel {
    pub fn times(&self) -> Vec<f64> {
        self.keyframes.iter().map(|k| k[0]).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.keyframes.iter().map(|k| k[1]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_bones_skips_hidden_and_non_deform() {
        let mut hidden = BoneData::new("Hidden");
        hidden.hidden = true;
        let mut control = BoneData::new("IK");
        control.deform = false;
        let arm = ArmatureData {
            name: "Rig".to_string(),
            bones: vec![BoneData::new("Root"), hidden, control, BoneData::new("Arm")],
        };

        let names: Vec<_> = arm.export_bones().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Root", "Arm"]);
    }

    #[test]
    fn test_channel_columns() {
        let channel: Channel = serde_json::from_str(
            r#"{"data_path": "location", "array_index": 2, "keyframes": [[1, 0.5], [10, 2.0]]}"#,
        )
        .unwrap();
        assert_eq!(channel.times(), vec![1.0, 10.0]);
        assert_eq!(channel.values(), vec![0.5, 2.0]);
        assert!(!channel.mute);
    }
}
