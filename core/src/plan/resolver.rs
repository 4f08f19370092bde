//! `${dot.path}` substitution over JSON-shaped configuration trees.
//!
//! A string that is exactly one reference takes the referenced value with its
//! type intact and fails hard when the path is missing. References embedded
//! in longer strings are interpolated as text; unresolvable ones are left as
//! written.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::ResolveError;

lazy_static! {
    static ref REFERENCE: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
    static ref WHOLE_REFERENCE: Regex = Regex::new(r"^\$\{([^}]+)\}$").unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VariableResolver;

impl VariableResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every value of `tree` against `context`.
    pub fn resolve_values(
        &self,
        tree: &Map<String, Value>,
        context: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ResolveError> {
        let mut resolved = Map::with_capacity(tree.len());
        for (key, value) in tree {
            let value = self
                .resolve_value(value, context)
                .map_err(|e| ResolveError::in_key(key, e))?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    pub fn resolve_value(
        &self,
        value: &Value,
        context: &Map<String, Value>,
    ) -> Result<Value, ResolveError> {
        match value {
            Value::String(s) => self.resolve_string(s, context),
            Value::Object(map) => self.resolve_values(map, context).map(Value::Object),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.resolve_value(item, context)
                        .map_err(|e| ResolveError::in_index(i, e))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    /// Look up a dot-separated path. Every intermediate must be a mapping.
    pub fn resolve_path<'a>(
        &self,
        path: &str,
        context: &'a Map<String, Value>,
    ) -> Result<&'a Value, ResolveError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = context
            .get(first)
            .ok_or_else(|| ResolveError::PathNotFound {
                path: path.to_string(),
            })?;
        let mut previous = first;

        for segment in segments {
            let Value::Object(map) = current else {
                return Err(ResolveError::NotAMapping {
                    path: path.to_string(),
                    segment: previous.to_string(),
                });
            };
            current = map.get(segment).ok_or_else(|| ResolveError::PathNotFound {
                path: path.to_string(),
            })?;
            previous = segment;
        }

        Ok(current)
    }

    fn resolve_string(
        &self,
        value: &str,
        context: &Map<String, Value>,
    ) -> Result<Value, ResolveError> {
        if let Some(caps) = WHOLE_REFERENCE.captures(value) {
            let path = &caps[1];
            return self.resolve_path(path, context).cloned();
        }

        if !REFERENCE.is_match(value) {
            return Ok(Value::String(value.to_string()));
        }

        let interpolated = REFERENCE.replace_all(value, |caps: &Captures| {
            match self.resolve_path(&caps[1], context) {
                Ok(found) => display_value(found),
                Err(_) => caps[0].to_string(),
            }
        });
        Ok(Value::String(interpolated.into_owned()))
    }
}

/// Text form used for interpolation: strings verbatim, everything else as
/// compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("context must be an object"),
        }
    }

    fn resolve(value: Value, context: Value) -> Result<Value, ResolveError> {
        VariableResolver::new().resolve_value(&value, &ctx(context))
    }

    #[test]
    fn test_whole_reference_preserves_type() {
        let out = resolve(json!("${a.b}"), json!({"a": {"b": 42}})).unwrap();
        assert_eq!(out, json!(42));

        let out = resolve(json!("${flags}"), json!({"flags": {"x": true, "y": [1, 2]}})).unwrap();
        assert_eq!(out, json!({"x": true, "y": [1, 2]}));
    }

    #[test]
    fn test_embedded_reference_is_stringified() {
        let out = resolve(json!("port=${a.b}"), json!({"a": {"b": 42}})).unwrap();
        assert_eq!(out, json!("port=42"));

        let out = resolve(
            json!("${svc.host}:${svc.port}"),
            json!({"svc": {"host": "api", "port": 8080}}),
        )
        .unwrap();
        assert_eq!(out, json!("api:8080"));
    }

    #[test]
    fn test_embedded_missing_reference_left_untouched() {
        let out = resolve(json!("port=${missing.x}"), json!({"a": {"b": 42}})).unwrap();
        assert_eq!(out, json!("port=${missing.x}"));

        let out = resolve(json!("${a.b}-${missing}"), json!({"a": {"b": 1}})).unwrap();
        assert_eq!(out, json!("1-${missing}"));
    }

    #[test]
    fn test_whole_missing_reference_fails() {
        let err = resolve(json!("${missing.x}"), json!({"a": 1})).unwrap_err();
        assert_eq!(
            err,
            ResolveError::PathNotFound {
                path: "missing.x".into()
            }
        );
    }

    #[test]
    fn test_non_mapping_intermediate_fails() {
        let err = resolve(json!("${a.b.c}"), json!({"a": {"b": 3}})).unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotAMapping {
                path: "a.b.c".into(),
                segment: "b".into()
            }
        );
    }

    #[test]
    fn test_nested_trees_and_scalars() {
        let tree = ctx(json!({
            "replicas": 3,
            "enabled": true,
            "image": "${registry}/app:${tag}",
            "ports": ["${port}", 9090],
            "meta": {"owner": "${team.name}"}
        }));
        let context = ctx(json!({
            "registry": "ghcr.io",
            "tag": "1.2.0",
            "port": 8080,
            "team": {"name": "platform"}
        }));

        let out = VariableResolver::new().resolve_values(&tree, &context).unwrap();
        assert_eq!(
            Value::Object(out),
            json!({
                "replicas": 3,
                "enabled": true,
                "image": "ghcr.io/app:1.2.0",
                "ports": [8080, 9090],
                "meta": {"owner": "platform"}
            })
        );
    }

    #[test]
    fn test_error_carries_location() {
        let tree = ctx(json!({"spec": {"items": ["ok", "${nope}"]}}));
        let err = VariableResolver::new()
            .resolve_values(&tree, &Map::new())
            .unwrap_err();

        assert_eq!(err.path(), "nope");
        let msg = err.to_string();
        assert!(msg.contains("key spec"), "unexpected message: {msg}");
    }

    #[test]
    fn test_adjacent_text_is_not_a_whole_reference() {
        let out = resolve(json!("${a}x"), json!({"a": 5})).unwrap();
        assert_eq!(out, json!("5x"));
    }
}
