//! Segment path resolution for structured variable expressions.
//!
//! A variable expression that is not a flat store key may address a value
//! inside a stored container, e.g. `container.items[1].name` or
//! `payload.jsonPath($.user.id)`. The expression is split into segments and
//! each segment is resolved against the current value by the first extractor
//! that accepts it.

use std::sync::Arc;
use std::sync::OnceLock;

use jsonpath_rust::JsonPathFinder;
use regex::Regex;

use crate::error::{EngineError, Result};
use crate::value::Value;

/// A single segment of a structured variable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSegment {
    /// The full segment expression as written, for diagnostics
    pub expression: String,
    /// Segment name, e.g. `items` in `items[1]` or `jsonPath` in `jsonPath($.id)`
    pub name: String,
    /// Optional list index suffix
    pub index: Option<usize>,
    /// Optional parenthesized argument, e.g. the path in `jsonPath($.id)`
    pub argument: Option<String>,
}

fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^\[\]().]+)(?:\[(\d+)\])?$").unwrap())
}

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\((.+)\)$").unwrap())
}

/// Split a variable expression into path segments.
///
/// Dots inside parentheses belong to a segment argument and do not split,
/// so `payload.jsonPath($.user.id)` yields two segments. Returns `None`
/// when the expression does not form a valid segment path.
pub fn parse_segments(expression: &str) -> Option<Vec<VariableSegment>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in expression.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                current.push(ch);
            }
            '.' if depth == 0 => {
                tokens.push(std::mem::take(&mut current));
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if depth != 0 {
        return None;
    }
    tokens.push(current);

    let mut segments = Vec::with_capacity(tokens.len());
    for token in tokens {
        segments.push(parse_segment(&token)?);
    }

    if segments.len() < 2 {
        // A single segment is a flat variable name, not a path.
        return None;
    }

    Some(segments)
}

fn parse_segment(token: &str) -> Option<VariableSegment> {
    if token.is_empty() {
        return None;
    }

    if let Some(captures) = call_pattern().captures(token) {
        return Some(VariableSegment {
            expression: token.to_string(),
            name: captures[1].to_string(),
            index: None,
            argument: Some(captures[2].to_string()),
        });
    }

    let captures = field_pattern().captures(token)?;
    let index = captures
        .get(2)
        .and_then(|m| m.as_str().parse::<usize>().ok());

    Some(VariableSegment {
        expression: token.to_string(),
        name: captures[1].to_string(),
        index,
        argument: None,
    })
}

/// Apply a list index suffix to a resolved segment value
pub fn apply_index(value: Value, segment: &VariableSegment) -> Result<Value> {
    match segment.index {
        None => Ok(value),
        Some(index) => match value {
            Value::List(mut values) => {
                if index < values.len() {
                    Ok(values.swap_remove(index))
                } else {
                    Err(EngineError::segment_extraction(
                        segment.expression.clone(),
                        format!("index {} out of bounds for list of length {}", index, values.len()),
                    ))
                }
            }
            other => Err(EngineError::segment_extraction(
                segment.expression.clone(),
                format!("cannot index into value of type '{}'", other.kind_name()),
            )),
        },
    }
}

/// Pluggable resolver capable of extracting a value from one path segment
pub trait SegmentVariableExtractor: Send + Sync {
    /// Check whether this extractor can handle the segment for the given value
    fn can_extract(&self, value: &Value, segment: &VariableSegment) -> bool;

    /// Extract the segment value; called only after `can_extract` returned true
    fn extract(&self, value: &Value, segment: &VariableSegment) -> Result<Value>;
}

/// Resolves plain field segments against map values
#[derive(Debug, Clone, Default)]
pub struct MapSegmentExtractor;

impl SegmentVariableExtractor for MapSegmentExtractor {
    fn can_extract(&self, value: &Value, segment: &VariableSegment) -> bool {
        segment.argument.is_none() && matches!(value, Value::Map(_))
    }

    fn extract(&self, value: &Value, segment: &VariableSegment) -> Result<Value> {
        let Value::Map(entries) = value else {
            return Err(EngineError::segment_extraction(
                segment.expression.clone(),
                "value is not a map".to_string(),
            ));
        };

        let field = entries.get(&segment.name).cloned().ok_or_else(|| {
            EngineError::segment_extraction(
                segment.expression.clone(),
                format!("no entry named '{}'", segment.name),
            )
        })?;

        apply_index(field, segment)
    }
}

/// Resolves `jsonPath(...)` segments against string values holding JSON.
///
/// Array results collapse to their first element, mirroring single-value
/// extraction semantics.
#[derive(Debug, Clone, Default)]
pub struct JsonPathSegmentExtractor;

impl SegmentVariableExtractor for JsonPathSegmentExtractor {
    fn can_extract(&self, value: &Value, segment: &VariableSegment) -> bool {
        segment.name == "jsonPath"
            && segment.argument.is_some()
            && matches!(value, Value::String(_))
    }

    fn extract(&self, value: &Value, segment: &VariableSegment) -> Result<Value> {
        let json = value.as_str().ok_or_else(|| {
            EngineError::segment_extraction(
                segment.expression.clone(),
                "value is not a string".to_string(),
            )
        })?;
        let path = segment.argument.as_deref().unwrap_or_default();

        let finder = JsonPathFinder::from_str(json, path).map_err(|err| {
            EngineError::segment_extraction(
                segment.expression.clone(),
                format!("invalid JSONPath expression '{}': {}", path, err),
            )
        })?;

        match finder.find() {
            serde_json::Value::Null => Err(EngineError::segment_extraction(
                segment.expression.clone(),
                format!("no match for JSONPath expression '{}'", path),
            )),
            serde_json::Value::Array(values) if values.is_empty() => {
                Err(EngineError::segment_extraction(
                    segment.expression.clone(),
                    format!("no match for JSONPath expression '{}'", path),
                ))
            }
            serde_json::Value::Array(mut values) => Ok(Value::from(values.remove(0))),
            found => Ok(Value::from(found)),
        }
    }
}

/// Registry holding all available segment variable extractors in resolution order
pub struct SegmentExtractorRegistry {
    extractors: Vec<Arc<dyn SegmentVariableExtractor>>,
}

impl Default for SegmentExtractorRegistry {
    fn default() -> Self {
        Self {
            extractors: vec![
                Arc::new(MapSegmentExtractor),
                Arc::new(JsonPathSegmentExtractor),
            ],
        }
    }
}

impl SegmentExtractorRegistry {
    /// Create an empty registry without the built-in extractors
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Append a custom extractor to the resolution chain
    pub fn register(&mut self, extractor: Arc<dyn SegmentVariableExtractor>) {
        self.extractors.push(extractor);
    }

    /// Obtain the extractors managed by this registry
    pub fn extractors(&self) -> &[Arc<dyn SegmentVariableExtractor>] {
        &self.extractors
    }

    /// Walk the remaining segments of a path starting from a resolved value.
    ///
    /// Each segment is offered to the extractors in order; the first extractor
    /// accepting it resolves the segment. A segment no extractor accepts fails
    /// with an unresolvable-reference error naming the full expression.
    pub fn resolve_path(
        &self,
        expression: &str,
        start: Value,
        segments: &[VariableSegment],
    ) -> Result<Value> {
        let mut current = start;

        for segment in segments {
            let extractor = self
                .extractors
                .iter()
                .find(|e| e.can_extract(&current, segment));

            match extractor {
                Some(extractor) => {
                    current = extractor.extract(&current, segment)?;
                }
                None => {
                    return Err(EngineError::unresolvable(expression));
                }
            }
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_segments() {
        let segments = parse_segments("container.items[1].name").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].name, "container");
        assert_eq!(segments[1].name, "items");
        assert_eq!(segments[1].index, Some(1));
        assert_eq!(segments[2].name, "name");
    }

    #[test]
    fn test_parse_segments_with_json_path() {
        let segments = parse_segments("payload.jsonPath($.user.id)").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].name, "jsonPath");
        assert_eq!(segments[1].argument.as_deref(), Some("$.user.id"));
    }

    #[test]
    fn test_parse_segments_rejects_flat_names() {
        assert!(parse_segments("plain_name").is_none());
        assert!(parse_segments("unbalanced(").is_none());
        assert!(parse_segments("trailing.").is_none());
    }

    #[test]
    fn test_map_extractor() {
        let mut inner = HashMap::new();
        inner.insert(
            "items".to_string(),
            Value::List(vec![Value::from("a"), Value::from("b")]),
        );
        let value = Value::Map(inner);

        let segments = parse_segments("container.items[1]").unwrap();
        let extractor = MapSegmentExtractor;

        assert!(extractor.can_extract(&value, &segments[1]));
        assert_eq!(
            extractor.extract(&value, &segments[1]).unwrap(),
            Value::from("b")
        );
    }

    #[test]
    fn test_map_extractor_unknown_field() {
        let value = Value::Map(HashMap::new());
        let segments = parse_segments("container.missing").unwrap();

        let result = MapSegmentExtractor.extract(&value, &segments[1]);
        assert!(matches!(result, Err(EngineError::SegmentExtraction { .. })));
    }

    #[test]
    fn test_json_path_extractor() {
        let value = Value::from(r#"{"user": {"id": 42, "name": "Peter"}}"#);
        let segments = parse_segments("payload.jsonPath($.user.name)").unwrap();
        let extractor = JsonPathSegmentExtractor;

        assert!(extractor.can_extract(&value, &segments[1]));
        assert_eq!(
            extractor.extract(&value, &segments[1]).unwrap(),
            Value::from("Peter")
        );
    }

    #[test]
    fn test_json_path_extractor_no_match() {
        let value = Value::from(r#"{"name": "Peter"}"#);
        let segments = parse_segments("payload.jsonPath($.other)").unwrap();

        let result = JsonPathSegmentExtractor.extract(&value, &segments[1]);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_resolve_path() {
        let registry = SegmentExtractorRegistry::default();

        let mut user = HashMap::new();
        user.insert("name".to_string(), Value::from("Peter"));
        let mut root = HashMap::new();
        root.insert("user".to_string(), Value::Map(user));

        let segments = parse_segments("data.user.name").unwrap();
        let resolved = registry
            .resolve_path("data.user.name", Value::Map(root), &segments[1..])
            .unwrap();

        assert_eq!(resolved, Value::from("Peter"));
    }

    #[test]
    fn test_registry_unresolvable_segment() {
        let registry = SegmentExtractorRegistry::default();
        let segments = parse_segments("data.field").unwrap();

        let result = registry.resolve_path("data.field", Value::from(17i64), &segments[1..]);
        assert!(matches!(
            result,
            Err(EngineError::UnresolvableVariable { .. })
        ));
    }
}
