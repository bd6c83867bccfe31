//! Field-level normalization helpers
//! Shared by every record kind. All helpers are total: any malformed or
//! missing input yields the field default, never an error. Each helper takes
//! a list of accepted key spellings so legacy camelCase blobs still read.

use crate::utils::new_record_id;
use serde_json::Value;

/// Look up the first present key among the accepted spellings
pub fn field<'a>(raw: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let obj = raw.as_object()?;
    names.iter().find_map(|name| obj.get(*name))
}

/// Trimmed string field, replaced by `fallback` when missing, wrong-typed,
/// or empty after trimming
pub fn text(raw: &Value, names: &[&str], fallback: &str) -> String {
    match field(raw, names) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                fallback.to_string()
            } else {
                trimmed.to_string()
            }
        }
        _ => fallback.to_string(),
    }
}

/// Boolean field with a per-kind default
pub fn flag(raw: &Value, names: &[&str], default: bool) -> bool {
    match field(raw, names) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

/// Float clamped into [min, max]; non-finite values fall back to the default
pub fn bounded_f64(raw: &Value, names: &[&str], default: f64, min: f64, max: f64) -> f64 {
    match field(raw, names).and_then(Value::as_f64) {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => default,
    }
}

/// Ratio clamped into [0, 1]
pub fn unit_ratio(raw: &Value, names: &[&str], default: f64) -> f64 {
    bounded_f64(raw, names, default, 0.0, 1.0)
}

/// Positive integer, coerced to at least 1
pub fn positive_int(raw: &Value, names: &[&str], default: u32) -> u32 {
    match field(raw, names).and_then(Value::as_f64) {
        Some(v) if v.is_finite() => {
            let v = v.floor();
            if v < 1.0 {
                1
            } else if v > u32::MAX as f64 {
                u32::MAX
            } else {
                v as u32
            }
        }
        _ => default.max(1),
    }
}

/// Settings-style validation: the stored value is kept only when it is a
/// finite number >= 1, otherwise the default stands
pub fn valid_positive_int(raw: &Value, names: &[&str], default: u32) -> u32 {
    match field(raw, names).and_then(Value::as_f64) {
        Some(v) if v.is_finite() && v >= 1.0 => {
            let v = v.floor();
            if v > u32::MAX as f64 {
                u32::MAX
            } else {
                v as u32
            }
        }
        _ => default,
    }
}

/// Non-negative counter
pub fn count(raw: &Value, names: &[&str], default: u32) -> u32 {
    match field(raw, names).and_then(Value::as_f64) {
        Some(v) if v.is_finite() && v >= 0.0 => {
            let v = v.floor();
            if v > u32::MAX as f64 {
                u32::MAX
            } else {
                v as u32
            }
        }
        _ => default,
    }
}

/// Millisecond timestamp; non-finite or negative values fall back
pub fn timestamp(raw: &Value, names: &[&str], default: i64) -> i64 {
    match field(raw, names).and_then(Value::as_f64) {
        Some(v) if v.is_finite() && v >= 0.0 => v as i64,
        _ => default,
    }
}

/// Set-valued field: accepts both a JSON array and a comma-delimited string,
/// canonicalized to trimmed non-empty strings in input order
pub fn string_set(raw: &Value, names: &[&str]) -> Vec<String> {
    match field(raw, names) {
        Some(Value::Array(items)) => set_from_array(items),
        Some(Value::String(joined)) => set_from_delimited(joined),
        _ => Vec::new(),
    }
}

pub fn set_from_array(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn set_from_delimited(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical snake_case spelling of a field name, so a camelCase patch key
/// overwrites the stored snake_case field instead of coexisting with it
pub fn snake_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Stable record id: kept when present and non-empty, synthesized otherwise
pub fn record_id(raw: &Value, names: &[&str], kind: &str) -> String {
    match field(raw, names) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => new_record_id(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_helpers_are_total_over_junk() {
        for raw in [
            json!(null),
            json!({}),
            json!([]),
            json!(42),
            json!({"summary": 9, "pinned": "yes", "confidence": "high", "tokens": null}),
        ] {
            assert_eq!(text(&raw, &["summary"], "Untitled"), "Untitled");
            assert!(!flag(&raw, &["pinned"], false));
            assert_eq!(unit_ratio(&raw, &["confidence"], 0.5), 0.5);
            assert_eq!(positive_int(&raw, &["tokens"], 10), 10);
            assert!(string_set(&raw, &["keywords"]).is_empty());
        }
    }

    #[test]
    fn test_unit_ratio_clamps() {
        let low = json!({"confidence": -3.5});
        let high = json!({"confidence": 1.7});
        let nan = json!({"confidence": f64::NAN});
        assert_eq!(unit_ratio(&low, &["confidence"], 0.5), 0.0);
        assert_eq!(unit_ratio(&high, &["confidence"], 0.5), 1.0);
        // serde_json turns NAN into null, which falls back to the default
        assert_eq!(unit_ratio(&nan, &["confidence"], 0.5), 0.5);
    }

    #[test]
    fn test_positive_int_floor_is_one() {
        assert_eq!(positive_int(&json!({"tokens": 0}), &["tokens"], 5), 1);
        assert_eq!(positive_int(&json!({"tokens": -9}), &["tokens"], 5), 1);
        assert_eq!(positive_int(&json!({"tokens": 3.9}), &["tokens"], 5), 3);
    }

    #[test]
    fn test_valid_positive_int_keeps_default_on_junk() {
        assert_eq!(valid_positive_int(&json!({"cap": 120}), &["cap"], 50), 120);
        assert_eq!(valid_positive_int(&json!({"cap": 0}), &["cap"], 50), 50);
        assert_eq!(valid_positive_int(&json!({"cap": "big"}), &["cap"], 50), 50);
    }

    #[test]
    fn test_string_set_array_and_delimited_agree() {
        let from_string = string_set(&json!({"tags": "a, b ,c"}), &["tags"]);
        let from_array = string_set(&json!({"tags": ["a", "b", "c"]}), &["tags"]);
        assert_eq!(from_string, vec!["a", "b", "c"]);
        assert_eq!(from_string, from_array);
    }

    #[test]
    fn test_string_set_drops_blanks_and_non_strings() {
        let set = string_set(&json!({"tags": ["a", "", "  ", 7, null, "b"]}), &["tags"]);
        assert_eq!(set, vec!["a", "b"]);
        let set = string_set(&json!({"tags": "a,, ,b"}), &["tags"]);
        assert_eq!(set, vec!["a", "b"]);
    }

    #[test]
    fn test_legacy_key_spellings() {
        let raw = json!({"createdAt": 123});
        assert_eq!(timestamp(&raw, &["created_at", "createdAt"], 0), 123);
    }

    #[test]
    fn test_snake_key_canonicalizes_camel_case() {
        assert_eq!(snake_key("updatedAt"), "updated_at");
        assert_eq!(snake_key("lastInjectedAt"), "last_injected_at");
        assert_eq!(snake_key("updated_at"), "updated_at");
        assert_eq!(snake_key("id"), "id");
    }

    #[test]
    fn test_record_id_kept_or_synthesized() {
        assert_eq!(record_id(&json!({"id": " abc "}), &["id"], "mem"), "abc");
        let synthesized = record_id(&json!({"id": ""}), &["id"], "mem");
        assert!(synthesized.starts_with("mem_"));
    }
}
