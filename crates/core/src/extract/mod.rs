//! Field extraction from the provider's user-info document.
//!
//! The document is decoded into a [`serde_json::Value`] and each configured
//! path expression is resolved against it with [`path::resolve_present`].

pub mod path;

pub use path::{is_blank, resolve, resolve_present, FieldPath};

use serde_json::Value;
use tracing::debug;

use crate::config::JsonPathConfig;
use crate::errors::ParseError;
use crate::models::ExtractedIdentity;

/// Decode a user-info response body.
pub fn decode(body: &[u8]) -> Result<Value, ParseError> {
    Ok(serde_json::from_slice(body)?)
}

/// Pull `user_id`, `username`, `name` and `email` out of `document`.
///
/// Properties with a blank path expression, a path that does not resolve,
/// or a path that lands on a blank or non-scalar value stay unset.
pub fn extract_identity(document: &Value, paths: &JsonPathConfig) -> ExtractedIdentity {
    let mut identity = ExtractedIdentity::default();
    if is_blank(document) {
        debug!("user-info document is blank");
        return identity;
    }

    for (prop, expr) in paths.entries() {
        let field_path = FieldPath::parse(expr);
        if field_path.is_empty() {
            continue;
        }
        match resolve_present(document, &field_path) {
            Some(node) => match path::scalar_to_string(node) {
                Some(value) => identity.set(prop, value),
                None => debug!(prop, path = %field_path, "path resolved to a non-scalar value"),
            },
            None => debug!(prop, path = %field_path, "path did not resolve"),
        }
    }

    identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths() -> JsonPathConfig {
        JsonPathConfig {
            user_id: "id".into(),
            username: "login".into(),
            name: "profile.name".into(),
            email: "profile.email".into(),
        }
    }

    #[test]
    fn test_extracts_all_fields() {
        let doc = json!({
            "id": 42,
            "login": "bob",
            "profile": {"name": "Bob Builder", "email": "bob@x.com"}
        });
        let identity = extract_identity(&doc, &paths());
        assert_eq!(identity.user_id.as_deref(), Some("42"));
        assert_eq!(identity.username.as_deref(), Some("bob"));
        assert_eq!(identity.name.as_deref(), Some("Bob Builder"));
        assert_eq!(identity.email.as_deref(), Some("bob@x.com"));
    }

    #[test]
    fn test_blank_and_missing_fields_left_unset() {
        let doc = json!({"id": "7", "login": "", "profile": null});
        let identity = extract_identity(&doc, &paths());
        assert_eq!(identity.user_id.as_deref(), Some("7"));
        assert_eq!(identity.username, None);
        assert_eq!(identity.name, None);
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_blank_expression_skips_property() {
        let doc = json!({"id": "7", "login": "bob"});
        let mut p = paths();
        p.username = String::new();
        let identity = extract_identity(&doc, &p);
        assert_eq!(identity.username, None);
        assert_eq!(identity.user_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_non_scalar_left_unset() {
        let doc = json!({"id": {"value": 1}, "login": ["bob"]});
        let identity = extract_identity(&doc, &paths());
        assert!(identity.is_empty());
    }

    #[test]
    fn test_blank_document() {
        assert!(extract_identity(&json!({}), &paths()).is_empty());
        assert!(extract_identity(&json!(null), &paths()).is_empty());
        assert!(extract_identity(&json!([1, 2]), &paths()).is_empty());
    }

    #[test]
    fn test_decode() {
        let value = decode(br#"{"id": 1}"#).unwrap();
        assert_eq!(value["id"], json!(1));
        assert!(matches!(decode(b"<html>"), Err(ParseError::MalformedJson(_))));
    }
}
