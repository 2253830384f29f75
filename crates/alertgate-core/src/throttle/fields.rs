//! Group key resolution from event payloads

use serde_json::Value;

/// Group used when no field is configured or the path is missing
pub const DEFAULT_GROUP: &str = "default";

/// Look up a dotted path (e.g. `interface.name`) in nested objects
pub fn field_value<'a>(path: &str, data: &'a Value) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, part| current.as_object()?.get(part))
}

/// Stringify a leaf value for use as a group key.
///
/// Strings are used verbatim, numbers in their shortest decimal form and
/// booleans as `true`/`false`. Anything else yields an empty string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Resolve the throttle group for an event
pub fn group_key(group_by_field: Option<&str>, data: &Value) -> String {
    group_by_field
        .filter(|field| !field.is_empty())
        .and_then(|field| field_value(field, data))
        .map(value_to_string)
        .unwrap_or_else(|| DEFAULT_GROUP.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_lookup() {
        let data = json!({"interface": {"name": "ether1", "stats": {"errors": 4}}});

        assert_eq!(field_value("interface.name", &data), Some(&json!("ether1")));
        assert_eq!(field_value("interface.stats.errors", &data), Some(&json!(4)));
        assert_eq!(field_value("interface.missing", &data), None);
        assert_eq!(field_value("interface.name.deeper", &data), None);
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("router-1")), "router-1");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(-7)), "-7");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(3.0)), "3");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!([1, 2])), "");
    }

    #[test]
    fn test_group_key_falls_back_to_default() {
        let data = json!({"device_id": "r1"});

        assert_eq!(group_key(None, &data), "default");
        assert_eq!(group_key(Some(""), &data), "default");
        assert_eq!(group_key(Some("interface"), &data), "default");
        assert_eq!(group_key(Some("device_id"), &data), "r1");
    }
}
