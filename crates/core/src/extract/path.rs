//! Dotted-path resolution over a decoded JSON document.
//!
//! A path such as `profile.contact.email` is split on `.` and walked one
//! object key at a time. Blank nodes short-circuit the walk, so a value that
//! is missing and a value that is present but blank look the same to the
//! caller.

use std::fmt;

use serde_json::Value;

/// An ordered list of object keys parsed from a dot-delimited expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dot-delimited expression. An empty or whitespace-only
    /// expression gives an empty path. Trailing empty segments are dropped,
    /// so `a.` is the same path as `a` and `.` is empty; leading and inner
    /// empty segments are kept.
    pub fn parse(expr: &str) -> Self {
        if expr.trim().is_empty() {
            return Self::default();
        }
        let mut segments: Vec<String> = expr.split('.').map(str::to_string).collect();
        while segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }
        Self { segments }
    }

    /// Build a path from pre-split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when some segment is empty, e.g. `a..b` or `.a`. Such a path can
    /// never resolve.
    pub fn has_empty_segment(&self) -> bool {
        self.segments.iter().any(|s| s.trim().is_empty())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Whether a node counts as blank: `null`, `false`, a whitespace-only
/// string, or an empty array or object.
pub fn is_blank(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

/// Walk `path` through `node`.
///
/// Returns the child reached by the last segment, or a blank child met on
/// the way. Returns `None` for an empty path, a blank node, a blank segment,
/// a non-object node, or a missing key.
pub fn resolve<'a>(node: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    walk(node, path.segments())
}

fn walk<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    if first.trim().is_empty() || is_blank(node) {
        return None;
    }
    let child = node.as_object()?.get(first.as_str())?;

    if is_blank(child) || rest.is_empty() {
        Some(child)
    } else {
        walk(child, rest)
    }
}

/// Like [`resolve`], but a blank result is reported as `None`.
pub fn resolve_present<'a>(node: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    resolve(node, path).filter(|v| !is_blank(v))
}

/// Render a scalar node as a string. Objects, arrays, and blank values give
/// `None`.
pub fn scalar_to_string(node: &Value) -> Option<String> {
    if is_blank(node) {
        return None;
    }
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(expr: &str) -> FieldPath {
        FieldPath::parse(expr)
    }

    #[test]
    fn test_resolves_nested_string() {
        let doc = json!({"a": {"b": "x"}});
        assert_eq!(resolve_present(&doc, &path("a.b")), Some(&json!("x")));
    }

    #[test]
    fn test_blank_leaf_is_nothing() {
        let doc = json!({"a": {"b": ""}});
        assert_eq!(resolve_present(&doc, &path("a.b")), None);
        // The raw walk still hands back the blank child.
        assert_eq!(resolve(&doc, &path("a.b")), Some(&json!("")));
    }

    #[test]
    fn test_missing_key_is_nothing() {
        assert_eq!(resolve(&json!({}), &path("a")), None);
        assert_eq!(resolve(&json!({"a": {"c": 1}}), &path("a.b")), None);
    }

    #[test]
    fn test_empty_path_is_nothing() {
        let doc = json!({"a": 1});
        assert!(path("").is_empty());
        assert_eq!(resolve(&doc, &path("")), None);
        assert_eq!(resolve(&doc, &FieldPath::default()), None);
        assert_eq!(resolve(&json!(null), &FieldPath::default()), None);
    }

    #[test]
    fn test_blank_intermediate_short_circuits() {
        let doc = json!({"a": null});
        assert_eq!(resolve(&doc, &path("a.b.c")), Some(&Value::Null));
        assert_eq!(resolve_present(&doc, &path("a.b.c")), None);

        let doc = json!({"a": {}});
        assert_eq!(resolve_present(&doc, &path("a.b")), None);
    }

    #[test]
    fn test_non_object_is_not_traversable() {
        let doc = json!({"a": [ {"b": "x"} ]});
        assert_eq!(resolve(&doc, &path("a.b")), None);
        assert_eq!(resolve(&doc, &path("a.0")), None);

        let doc = json!({"a": "scalar"});
        assert_eq!(resolve(&doc, &path("a.b")), None);
        assert_eq!(resolve(&json!("top"), &path("a")), None);
    }

    #[test]
    fn test_empty_segment_never_traversed() {
        let doc = json!({"a": {"": "hidden", "b": "x"}});
        let p = path("a..b");
        assert!(p.has_empty_segment());
        assert_eq!(resolve(&doc, &p), None);
        assert_eq!(resolve(&doc, &path(".a")), None);
    }

    #[test]
    fn test_trailing_dots_dropped() {
        let doc = json!({"a": {"b": "x"}});
        assert_eq!(path("a.b."), path("a.b"));
        assert_eq!(resolve_present(&doc, &path("a.b..")), Some(&json!("x")));
        assert!(!path("a.").has_empty_segment());
        assert!(path(".").is_empty());
        assert!(path(".a").has_empty_segment());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let doc = json!({"Email": "e@x.com"});
        assert_eq!(resolve(&doc, &path("email")), None);
        assert_eq!(resolve(&doc, &path("Email")), Some(&json!("e@x.com")));
    }

    #[test]
    fn test_non_scalar_leaf() {
        let doc = json!({"a": {"b": {"c": 1}}});
        let node = resolve_present(&doc, &path("a.b")).unwrap();
        assert!(node.is_object());
        assert_eq!(scalar_to_string(node), None);
    }

    #[test]
    fn test_blankness() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!(false)));
        assert!(is_blank(&json!("  \t")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(true)));
        assert!(!is_blank(&json!(" x ")));
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!("bob")), Some("bob".into()));
        assert_eq!(scalar_to_string(&json!(42)), Some("42".into()));
        assert_eq!(scalar_to_string(&json!(true)), Some("true".into()));
        assert_eq!(scalar_to_string(&json!("")), None);
        assert_eq!(scalar_to_string(&json!([1])), None);
    }

    #[test]
    fn test_display_round_trips_expression() {
        assert_eq!(path("profile.contact.email").to_string(), "profile.contact.email");
        assert_eq!(
            FieldPath::from_segments(["a", "b"]),
            path("a.b")
        );
    }

    #[test]
    fn test_deep_path_terminates() {
        let mut doc = json!("leaf");
        let mut segments = Vec::new();
        for i in 0..200 {
            let key = format!("k{i}");
            doc = json!({ key.clone(): doc });
            segments.push(key);
        }
        segments.reverse();
        let p = FieldPath::from_segments(segments);
        assert_eq!(resolve_present(&doc, &p), Some(&json!("leaf")));
    }
}
