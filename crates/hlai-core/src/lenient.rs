//! Tolerant field coercion for loosely-typed server payloads.
//!
//! Realtime payloads are never strictly validated: a field of the wrong type
//! is treated as absent rather than failing the whole event. These helpers are
//! used as `#[serde(default, deserialize_with = "...")]` targets.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A string that is present only when it is non-blank.
pub fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| string_value(&v)))
}

/// A number given either as a JSON number or a numeric string.
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| number_value(&v)))
}

/// An integer count; non-numeric input reads as zero.
pub fn count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| number_value(&v))
        .map(|n| n.round() as i64)
        .unwrap_or(0))
}

/// A string field of a snapshot record; null or a non-string reads as `""`.
pub fn string_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    })
}

/// A list that may be sent as `null`.
pub fn list_or_default<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A map of named counts. Non-numeric entries are skipped; anything other
/// than an object reads as empty.
pub fn count_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| number_value(&v).map(|n| (k, n.round() as i64)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// A JSON object; anything else reads as absent.
pub fn object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

/// Coerce a JSON value to a non-blank string.
pub fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Coerce a JSON value to a finite number.
pub fn number_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "non_empty_string")]
        name: Option<String>,
        #[serde(default, deserialize_with = "number")]
        score: Option<f64>,
        #[serde(default, deserialize_with = "count")]
        used: i64,
        #[serde(default, deserialize_with = "object")]
        extra: Option<Map<String, Value>>,
        #[serde(default, deserialize_with = "string_or_default")]
        label: String,
        #[serde(default, deserialize_with = "list_or_default")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "count_map")]
        counts: BTreeMap<String, i64>,
    }

    #[test]
    fn test_wrong_types_read_as_absent() {
        let probe: Probe = serde_json::from_value(json!({
            "name": 42,
            "score": {"nested": true},
            "used": "three",
            "extra": ["not", "an", "object"]
        }))
        .unwrap();

        assert_eq!(probe.name, None);
        assert_eq!(probe.score, None);
        assert_eq!(probe.used, 0);
        assert_eq!(probe.extra, None);
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let probe: Probe = serde_json::from_value(json!({"name": "   "})).unwrap();
        assert_eq!(probe.name, None);
    }

    #[test]
    fn test_numeric_strings_are_numbers() {
        let probe: Probe = serde_json::from_value(json!({"score": " 87 ", "used": 2.6})).unwrap();
        assert_eq!(probe.score, Some(87.0));
        assert_eq!(probe.used, 3);
    }

    #[test]
    fn test_null_and_missing_fields() {
        let probe: Probe = serde_json::from_value(json!({"name": null})).unwrap();
        assert_eq!(probe.name, None);
        assert_eq!(probe.score, None);
        assert_eq!(probe.used, 0);
    }

    #[test]
    fn test_null_snapshot_fields_read_as_defaults() {
        let probe: Probe =
            serde_json::from_value(json!({"label": null, "tags": null, "counts": null})).unwrap();
        assert_eq!(probe.label, "");
        assert!(probe.tags.is_empty());
        assert!(probe.counts.is_empty());

        let probe: Probe = serde_json::from_value(json!({"label": 7})).unwrap();
        assert_eq!(probe.label, "");
    }

    #[test]
    fn test_count_map_skips_non_numeric_entries() {
        let probe: Probe = serde_json::from_value(json!({
            "counts": {"today": 3, "upcoming": "4", "past": null, "bad": "x"}
        }))
        .unwrap();
        assert_eq!(probe.counts.len(), 2);
        assert_eq!(probe.counts["today"], 3);
        assert_eq!(probe.counts["upcoming"], 4);
    }
}
