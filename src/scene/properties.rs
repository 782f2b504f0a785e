//! Prefixed custom properties that override or extend exported entities.

use super::Properties;
use crate::encoder::{Map, Node};
use serde_json::Value;

/// Prefix of properties that override output keys.
pub const OVERRIDE_PREFIX: &str = "three_";

/// Prefix of object properties copied into `userData`.
pub const USER_DATA_PREFIX: &str = "userData_";

/// Collect `three_*` properties as output overrides.
pub fn overrides(properties: &Properties) -> Map {
    prefixed(properties, OVERRIDE_PREFIX)
}

/// Collect `userData_*` properties.
pub fn user_data(properties: &Properties) -> Map {
    prefixed(properties, USER_DATA_PREFIX)
}

/// Properties starting with `prefix`, prefix removed.
///
/// Keys containing `.` address nested output values and are skipped here.
/// Numbers equal to `0` or `1` are host booleans and come out as `false` /
/// `true`.
pub fn prefixed(properties: &Properties, prefix: &str) -> Map {
    let out = Map::new();
    for (key, value) in properties {
        let Some(name) = key.strip_prefix(prefix) else {
            continue;
        };
        if name.contains('.') {
            continue;
        }
        out.insert(name, property_value(value));
    }
    out
}

/// Look up a dotted property such as `three_camera.top`.
pub fn dotted<'a>(properties: &'a Properties, key: &str) -> Option<&'a Value> {
    properties.get(&format!("{}{}", OVERRIDE_PREFIX, key))
}

fn property_value(value: &Value) -> Node {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Node::Bool(false),
            Some(f) if f == 1.0 => Node::Bool(true),
            _ => Node::from(value.clone()),
        },
        other => Node::from(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides() {
        let p = props(json!({
            "three_castShadow": 1,
            "three_visible": 0,
            "three_renderOrder": 3,
            "three_tags": ["a", "b"],
            "three_camera.top": 5.0,
            "userData_note": "hi",
            "plain": true
        }));

        let out = overrides(&p);
        assert!(matches!(out.get("castShadow"), Some(Node::Bool(true))));
        assert!(matches!(out.get("visible"), Some(Node::Bool(false))));
        assert!(matches!(out.get("renderOrder"), Some(Node::Int(3))));
        assert!(matches!(out.get("tags"), Some(Node::Seq(ref s)) if s.len() == 2));
        assert!(!out.contains_key("camera.top"));
        assert!(!out.contains_key("plain"));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_user_data() {
        let p = props(json!({"userData_note": "hi", "three_x": 2}));
        let out = user_data(&p);
        assert_eq!(out.keys(), vec!["note"]);
        assert!(matches!(out.get("note"), Some(Node::Str(ref s)) if s == "hi"));
    }

    #[test]
    fn test_dotted_lookup() {
        let p = props(json!({"three_camera.top": 5.0}));
        assert_eq!(dotted(&p, "camera.top").and_then(Value::as_f64), Some(5.0));
        assert!(dotted(&p, "camera.bottom").is_none());
    }
}
