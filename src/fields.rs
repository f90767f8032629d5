use serde_json::{Map, Value};

/// The canonical "no observation" value for a leaf field, keyed by the
/// leaf name alone, not the full path (`auton.fuelScored` and
/// `teleop.fuelScored` share a default).
pub fn default_value(leaf_name: &str) -> Option<Value> {
    match leaf_name {
        "fuelScored" | "fuelMissed" | "teamPenalties" | "opponentPenalties" => {
            Some(Value::from(0))
        }
        "climbLevel" => Some(Value::from("none")),
        _ => None,
    }
}

/// The default for the leaf at the end of a dotted path.
pub fn default_for_path(field_path: &str) -> Option<Value> {
    default_value(leaf_name(field_path))
}

/// True iff the value equals the canonical default for the field's leaf
/// name. A scout who left a field untouched must not produce a "value"
/// that competes with real observations.
pub fn is_default_value(field_path: &str, value: &Value) -> bool {
    match default_for_path(field_path) {
        Some(default) => default == *value,
        None => false,
    }
}

fn leaf_name(field_path: &str) -> &str {
    field_path.rsplit('.').next().unwrap_or(field_path)
}

/// Human-readable label for a field path, for review surfaces and log
/// messages. Falls back to the raw path.
pub fn field_label(field_path: &str) -> &str {
    match field_path {
        "auton.fuelScored" => "Auton Fuel Scored",
        "auton.fuelMissed" => "Auton Fuel Missed",
        "auton.climbLevel" => "Auton Climb Level",
        "teleop.fuelScored" => "Teleop Fuel Scored",
        "teleop.fuelMissed" => "Teleop Fuel Missed",
        "teleop.climbLevel" => "Teleop Climb Level",
        "teamPenalties" => "Team Penalties",
        "opponentPenalties" => "Opponent Penalties",
        other => other,
    }
}

/// Every leaf field path of a nested document, in key order. Recurses
/// into objects; arrays count as opaque leaves.
pub fn all_field_paths(data: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_field_paths(data, "", &mut paths);
    paths
}

fn collect_field_paths(data: &Value, prefix: &str, out: &mut Vec<String>) {
    if let Value::Object(map) = data {
        for (key, child) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match child {
                Value::Object(_) => collect_field_paths(child, &path, out),
                _ => out.push(path),
            }
        }
    }
}

/// The value at a dotted path, if every segment exists.
pub fn get_path<'a>(data: &'a Value, field_path: &str) -> Option<&'a Value> {
    field_path
        .split('.')
        .try_fold(data, |current, key| current.get(key))
}

/// Writes a value at a dotted path, creating intermediate objects as
/// needed. A non-object root is left untouched; a non-object intermediate
/// is replaced by an object.
pub fn set_path(data: &mut Value, field_path: &str, value: Value) {
    match field_path.split_once('.') {
        None => {
            if let Value::Object(map) = data {
                map.insert(field_path.to_string(), value);
            }
        }
        Some((head, rest)) => {
            let Value::Object(map) = data else { return };
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            set_path(child, rest, value);
        }
    }
}


#[cfg(test)]
use serde_json::json;

#[test]
fn test_walker_matches_static_path_list() {
    use crate::domain::observation::ObservationData;

    let doc = serde_json::to_value(ObservationData::default()).unwrap();
    assert_eq!(all_field_paths(&doc), ObservationData::FIELD_PATHS.to_vec());
}

#[test]
fn test_walker_treats_arrays_as_leaves() {
    let doc = json!({
        "a": 1,
        "b": { "c": [1, 2, 3], "d": { "e": "x" } },
        "f": null,
    });
    assert_eq!(all_field_paths(&doc), vec!["a", "b.c", "b.d.e", "f"]);
}

#[test]
fn test_walker_on_empty_and_scalar_documents() {
    assert_eq!(all_field_paths(&json!({})), Vec::<String>::new());
    assert_eq!(all_field_paths(&json!(7)), Vec::<String>::new());
}

#[test]
fn test_get_path() {
    let doc = json!({ "auton": { "fuelScored": 5 }, "teamPenalties": 2 });
    assert_eq!(get_path(&doc, "auton.fuelScored"), Some(&json!(5)));
    assert_eq!(get_path(&doc, "teamPenalties"), Some(&json!(2)));
    assert_eq!(get_path(&doc, "auton.fuelMissed"), None);
    assert_eq!(get_path(&doc, "teleop.fuelScored"), None);
}

#[test]
fn test_set_path_creates_intermediate_objects() {
    let mut doc = json!({});
    set_path(&mut doc, "auton.climbLevel", json!("mid"));
    set_path(&mut doc, "auton.fuelScored", json!(4));
    set_path(&mut doc, "teamPenalties", json!(1));
    assert_eq!(
        doc,
        json!({ "auton": { "climbLevel": "mid", "fuelScored": 4 }, "teamPenalties": 1 })
    );
}

#[test]
fn test_set_path_overwrites_scalar_intermediate() {
    let mut doc = json!({ "auton": 3 });
    set_path(&mut doc, "auton.fuelScored", json!(4));
    assert_eq!(doc, json!({ "auton": { "fuelScored": 4 } }));
}

#[test]
fn test_default_policy_is_keyed_by_leaf_name() {
    assert!(is_default_value("auton.fuelScored", &json!(0)));
    assert!(is_default_value("teleop.fuelScored", &json!(0)));
    assert!(!is_default_value("auton.fuelScored", &json!(3)));
    assert!(is_default_value("teleop.climbLevel", &json!("none")));
    assert!(!is_default_value("teleop.climbLevel", &json!("high")));
    // Unknown leaves have no default, so any value counts as observed.
    assert!(!is_default_value("somethingElse", &json!(0)));
}

#[test]
fn test_field_labels() {
    assert_eq!(field_label("auton.fuelScored"), "Auton Fuel Scored");
    assert_eq!(field_label("unknown.path"), "unknown.path");
}
