//! Sensitive-value masking for client round-trips (§4.5). Operates on plain
//! `serde_json::Value` rather than a specific config struct, since every
//! entity kind (MCP server, AI provider, integration) shares the same rule:
//! walk the object, mask any field whose name looks sensitive, and mask
//! every value inside an MCP server's `env` map unconditionally.

use serde_json::Map;
use serde_json::Value;

const SENSITIVE_NAME_FRAGMENTS: &[&str] = &[
    "apikey", "api_key", "password", "token", "secret", "auth",
];

const MASK_PLACEHOLDER: &str = "****";

fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_NAME_FRAGMENTS.iter().any(|frag| lower.contains(frag))
}

/// Mask a single scalar value per its length bucket (§4.5 *Mask*).
pub fn mask_scalar(value: &str) -> String {
    match value.len() {
        0..=8 => "****".to_string(),
        9..=11 => "xx****xx".to_string(),
        _ => "xxxx****xxxx".to_string(),
    }
}

/// Deep-clone `config`, replacing every sensitive field's string value with
/// its masked form, and masking every value under any `env` object
/// unconditionally (§4.5).
pub fn mask_value(config: &Value) -> Value {
    match config {
        Value::Object(map) => {
            let mut masked = Map::new();
            for (key, value) in map {
                if key == "env" {
                    masked.insert(key.clone(), mask_env_map(value));
                } else if is_sensitive_field(key) {
                    masked.insert(key.clone(), mask_field_value(value));
                } else {
                    masked.insert(key.clone(), mask_value(value));
                }
            }
            Value::Object(masked)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask_value).collect()),
        other => other.clone(),
    }
}

fn mask_field_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_scalar(s)),
        other => other.clone(),
    }
}

fn mask_env_map(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut masked = Map::new();
            for (key, value) in map {
                masked.insert(key.clone(), mask_field_value(value));
            }
            Value::Object(masked)
        }
        other => other.clone(),
    }
}

/// Accept a client's edited config, restoring any sensitive field whose
/// value still contains the mask placeholder from `original`, and treating
/// any other sensitive value as a deliberate rotation (§4.5 *Unmask*).
///
/// Keys present in `original` but absent from `incoming` are preserved,
/// *except* when the original value there is an array — arrays are always
/// replaced wholesale by whatever `incoming` specifies (including absence).
pub fn unmask_value(incoming: &Value, original: &Value) -> Value {
    match (incoming, original) {
        (Value::Object(incoming_map), Value::Object(original_map)) => {
            let mut result = Map::new();
            for (key, incoming_val) in incoming_map {
                let original_val = original_map.get(key);
                if key == "env" {
                    result.insert(
                        key.clone(),
                        unmask_env_map(incoming_val, original_val),
                    );
                } else if is_sensitive_field(key) {
                    result.insert(key.clone(), unmask_field(incoming_val, original_val));
                } else {
                    match (incoming_val, original_val) {
                        (Value::Object(_), Some(Value::Object(_))) => {
                            let original_val = original_val.unwrap_or(&Value::Null);
                            result.insert(key.clone(), unmask_value(incoming_val, original_val));
                        }
                        _ => {
                            result.insert(key.clone(), incoming_val.clone());
                        }
                    }
                }
            }
            for (key, original_val) in original_map {
                if incoming_map.contains_key(key) {
                    continue;
                }
                if matches!(original_val, Value::Array(_)) {
                    continue;
                }
                result.insert(key.clone(), original_val.clone());
            }
            Value::Object(result)
        }
        _ => incoming.clone(),
    }
}

fn unmask_field(incoming_val: &Value, original_val: Option<&Value>) -> Value {
    match incoming_val {
        Value::String(s) if s.contains(MASK_PLACEHOLDER) => {
            original_val.cloned().unwrap_or_else(|| incoming_val.clone())
        }
        other => other.clone(),
    }
}

fn unmask_env_map(incoming_val: &Value, original_val: Option<&Value>) -> Value {
    let (Value::Object(incoming_map), Some(Value::Object(original_map))) = (incoming_val, original_val)
    else {
        return incoming_val.clone();
    };
    let mut result = Map::new();
    for (key, value) in incoming_map {
        result.insert(key.clone(), unmask_field(value, original_map.get(key)));
    }
    for (key, original_val) in original_map {
        if !incoming_map.contains_key(key) {
            result.insert(key.clone(), original_val.clone());
        }
    }
    Value::Object(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn masks_by_length_bucket() {
        assert_eq!(mask_scalar("short"), "****");
        assert_eq!(mask_scalar("ninelen12"), "xx****xx");
        assert_eq!(mask_scalar("a-very-long-secret-value"), "xxxx****xxxx");
    }

    #[test]
    fn masks_sensitive_fields_and_env_map() {
        let config = json!({
            "id": "gh",
            "authToken": "sekretvalue",
            "env": {"TOKEN": "sekretvalue", "PATH": "/usr/bin"},
        });
        let masked = mask_value(&config);
        assert_eq!(masked["id"], json!("gh"));
        assert_ne!(masked["authToken"], json!("sekretvalue"));
        assert_ne!(masked["env"]["TOKEN"], json!("sekretvalue"));
        assert_ne!(masked["env"]["PATH"], json!("/usr/bin"));
    }

    #[test]
    fn unmask_round_trip_restores_unchanged_field() {
        let original = json!({"id": "gh", "authToken": "sekretvalue"});
        let masked = mask_value(&original);
        let restored = unmask_value(&masked, &original);
        assert_eq!(restored, original);
    }

    #[test]
    fn unmask_accepts_rotation_when_placeholder_absent() {
        let original = json!({"id": "gh", "authToken": "sekretvalue"});
        let edited = json!({"id": "gh", "authToken": "brand-new-value"});
        let restored = unmask_value(&edited, &original);
        assert_eq!(restored["authToken"], json!("brand-new-value"));
    }

    #[test]
    fn keys_missing_from_incoming_are_preserved_unless_array() {
        let original = json!({"id": "gh", "cwd": "/tmp", "args": ["a", "b"]});
        let edited = json!({"id": "gh"});
        let restored = unmask_value(&edited, &original);
        assert_eq!(restored["cwd"], json!("/tmp"));
        assert!(restored.get("args").is_none());
    }

    #[test]
    fn env_keys_removed_from_incoming_are_preserved_from_original() {
        let original = json!({
            "id": "gh",
            "env": {"TOKEN": "sekretvalue", "EXTRA": "gone-from-client"},
        });
        let edited = json!({"id": "gh", "env": {"TOKEN": "****"}});
        let restored = unmask_value(&edited, &original);
        assert_eq!(restored["env"]["TOKEN"], json!("sekretvalue"));
        assert_eq!(restored["env"]["EXTRA"], json!("gone-from-client"));
    }
}
