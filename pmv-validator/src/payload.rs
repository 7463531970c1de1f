//! Loosely-typed response document
//!
//! AI responses vary in shape by response type, so the pipeline never binds
//! them to a fixed schema. Fields are addressed by dotted path
//! (`pricing.total`, `photos.0.url`); numeric segments index arrays.

use crate::error::{ValidatorError, ValidatorResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

/// Read-only view over a response document
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    root: &'a Value,
}

impl<'a> Payload<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        if path.is_empty() {
            return Some(self.root);
        }
        let mut current = self.root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// True when the path exists and is not null
    pub fn has(&self, path: &str) -> bool {
        matches!(self.get(path), Some(v) if !v.is_null())
    }

    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    pub fn str(&self, path: &str) -> Option<&'a str> {
        self.get(path)?.as_str()
    }

    pub fn object(&self, path: &str) -> Option<&'a Map<String, Value>> {
        self.get(path)?.as_object()
    }

    /// First path in `candidates` that holds a number
    pub fn first_number(&self, candidates: &[&str]) -> Option<(String, f64)> {
        candidates
            .iter()
            .find_map(|p| self.number(p).map(|n| (p.to_string(), n)))
    }

    /// String items of an array field; non-string items are skipped
    pub fn string_list(&self, path: &str) -> Vec<&'a str> {
        match self.get(path) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Parse a date or datetime field into UTC
    ///
    /// Accepts `YYYY-MM-DD` (midnight UTC) and RFC 3339 timestamps.
    pub fn datetime(&self, path: &str) -> Option<DateTime<Utc>> {
        parse_datetime(self.str(path)?)
    }

    /// Every string-valued leaf, as (dotted path, value)
    pub fn string_fields(&self) -> Vec<(String, &'a str)> {
        let mut out = Vec::new();
        walk(self.root, String::new(), &mut |path, value| {
            if let Value::String(s) = value {
                out.push((path.to_string(), s.as_str()));
            }
        });
        out
    }

    /// Every leaf value, as (dotted path, value)
    pub fn leaves(&self) -> Vec<(String, &'a Value)> {
        let mut out = Vec::new();
        walk(self.root, String::new(), &mut |path, value| {
            out.push((path.to_string(), value));
        });
        out
    }

    /// Number of leaf fields in the document
    pub fn field_count(&self) -> usize {
        let mut count = 0;
        walk(self.root, String::new(), &mut |_, _| count += 1);
        count
    }
}

fn walk<'a, F>(value: &'a Value, path: String, visit: &mut F)
where
    F: FnMut(&str, &'a Value),
{
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, join(&path, key), visit);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                walk(child, join(&path, &idx.to_string()), visit);
            }
        }
        _ => visit(&path, value),
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

/// Last segment of a dotted path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Parse `YYYY-MM-DD` or RFC 3339 into UTC
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Overwrite the value at `path`, returning the previous value
///
/// Intermediate objects are created when missing; array segments must
/// already exist.
pub fn set_path(root: &mut Value, path: &str, new_value: Value) -> ValidatorResult<Value> {
    if path.is_empty() {
        return Err(ValidatorError::Pipeline("cannot replace document root".to_string()));
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ValidatorError::Pipeline(format!("empty path: {}", path)))?;

    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let idx = parse_index(segment, path)?;
                items.get_mut(idx).ok_or_else(|| out_of_range(path))?
            }
            _ => {
                return Err(ValidatorError::Pipeline(format!(
                    "path {} crosses a scalar at '{}'",
                    path, segment
                )))
            }
        };
    }

    match current {
        Value::Object(map) => Ok(map.insert(last.to_string(), new_value).unwrap_or(Value::Null)),
        Value::Array(items) => {
            let idx = parse_index(last, path)?;
            let slot = items.get_mut(idx).ok_or_else(|| out_of_range(path))?;
            Ok(std::mem::replace(slot, new_value))
        }
        _ => Err(ValidatorError::Pipeline(format!("path {} ends under a scalar", path))),
    }
}

fn parse_index(segment: &str, path: &str) -> ValidatorResult<usize> {
    segment.parse::<usize>().map_err(|_| {
        ValidatorError::Pipeline(format!("non-numeric array index '{}' in {}", segment, path))
    })
}

fn out_of_range(path: &str) -> ValidatorError {
    ValidatorError::Pipeline(format!("index out of range in {}", path))
}

/// Round to two decimal places (currency precision)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// JSON number for a currency amount
pub fn money(value: f64) -> Value {
    serde_json::Number::from_f64(round2(value))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_and_array_paths() {
        let doc = json!({"pricing": {"total": 10.5}, "photos": [{"url": "a"}, {"url": "b"}]});
        let p = Payload::new(&doc);
        assert_eq!(p.number("pricing.total"), Some(10.5));
        assert_eq!(p.str("photos.1.url"), Some("b"));
        assert!(p.get("photos.9.url").is_none());
        assert!(p.get("pricing.total.deeper").is_none());
    }

    #[test]
    fn test_string_fields_walks_recursively() {
        let doc = json!({"host": {"email": "a@b.co"}, "tags": ["x"], "n": 1});
        let fields = Payload::new(&doc).string_fields();
        assert!(fields.contains(&("host.email".to_string(), "a@b.co")));
        assert!(fields.contains(&("tags.0".to_string(), "x")));
        assert_eq!(fields.len(), 2);
        assert_eq!(Payload::new(&doc).field_count(), 3);
    }

    #[test]
    fn test_set_path_replaces_and_creates() {
        let mut doc = json!({"pricing": {"total": 1}});
        let old = set_path(&mut doc, "pricing.total", json!(2)).unwrap();
        assert_eq!(old, json!(1));
        assert_eq!(doc["pricing"]["total"], json!(2));

        let old = set_path(&mut doc, "meta.source", json!("ai")).unwrap();
        assert_eq!(old, Value::Null);
        assert_eq!(doc["meta"]["source"], "ai");
    }

    #[test]
    fn test_set_path_into_array() {
        let mut doc = json!({"photos": ["a", "b"]});
        set_path(&mut doc, "photos.1", json!("c")).unwrap();
        assert_eq!(doc["photos"][1], "c");
        assert!(set_path(&mut doc, "photos.5", json!("d")).is_err());
        assert!(set_path(&mut doc, "photos.x", json!("d")).is_err());
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-06-15").is_some());
        assert!(parse_datetime("2024-06-15T14:00:00Z").is_some());
        assert!(parse_datetime("15/06/2024").is_none());
    }

    #[test]
    fn test_money_rounds_to_cents() {
        assert_eq!(money(10.005_1), json!(10.01));
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(leaf_name("pricing.total"), "total");
    }
}
