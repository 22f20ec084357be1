//! Named-placeholder formatting for URL templates.
//!
//! Supported syntax: `%{key}` and `%<key>s` insert a named value, `%%` is a
//! literal percent sign. Any other `%` sequence is rejected, so a template
//! such as `https://x/%20` must be written `https://x/%%20`.

use std::collections::HashMap;

use crate::errors::ConfigError;

/// Placeholders available to `accounts.avatar_url_template`.
pub const AVATAR_TEMPLATE_KEYS: &[&str] = &["username", "name", "oauth_id", "user_id"];

/// Substitute named values into `template`.
///
/// `field` names the setting the template came from and is used in the
/// error when a placeholder is unknown or malformed.
pub fn format(
    template: &str,
    values: &HashMap<&str, String>,
    field: &str,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (key, consumed) = match after.chars().next() {
            Some('%') => {
                out.push('%');
                rest = &after[1..];
                continue;
            }
            Some('{') => {
                let end = after
                    .find('}')
                    .ok_or_else(|| malformed(field, "unterminated %{ placeholder"))?;
                (&after[1..end], end + 1)
            }
            Some('<') => {
                let end = after
                    .find('>')
                    .ok_or_else(|| malformed(field, "unterminated %< placeholder"))?;
                if !after[end + 1..].starts_with('s') {
                    return Err(malformed(field, "%<key> must be followed by 's'"));
                }
                (&after[1..end], end + 2)
            }
            Some(c) => {
                return Err(malformed(
                    field,
                    &std::format!("unsupported format directive '%{c}' (use %% for a literal %)"),
                ))
            }
            None => return Err(malformed(field, "template ends with a bare '%'")),
        };

        let value = values
            .get(key)
            .ok_or_else(|| malformed(field, &std::format!("unknown key '{key}'")))?;
        out.push_str(value);
        rest = &after[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Check that `template` formats with exactly the given keys available.
pub fn check(template: &str, keys: &[&str], field: &str) -> Result<(), ConfigError> {
    let probe: HashMap<&str, String> = keys.iter().map(|k| (*k, String::new())).collect();
    format(template, &probe, field).map(|_| ())
}

fn malformed(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: &str = "accounts.avatar_url_template";

    fn values() -> HashMap<&'static str, String> {
        HashMap::from([
            ("username", "bob".to_string()),
            ("name", "Bob Builder".to_string()),
            ("oauth_id", "42".to_string()),
            ("user_id", "7".to_string()),
        ])
    }

    #[test]
    fn test_substitutes_named_keys() {
        let url = format(
            "https://cdn.example.com/%{oauth_id}/%<username>s.png?u=%{user_id}",
            &values(),
            FIELD,
        )
        .unwrap();
        assert_eq!(url, "https://cdn.example.com/42/bob.png?u=7");
    }

    #[test]
    fn test_literal_percent() {
        let url = format("https://x/%%20%{name}", &values(), FIELD).unwrap();
        assert_eq!(url, "https://x/%20Bob Builder");
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(
            format("https://x/static.png", &values(), FIELD).unwrap(),
            "https://x/static.png"
        );
    }

    #[test]
    fn test_unknown_key_is_error() {
        let err = format("https://x/%{email}", &values(), FIELD).unwrap_err();
        assert!(err.to_string().contains("unknown key 'email'"));
    }

    #[test]
    fn test_malformed_sequences() {
        for tpl in ["https://x/%20", "https://x/%{name", "https://x/%<name>", "x%"] {
            let result = format(tpl, &values(), FIELD);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { ref field, .. }) if field == FIELD),
                "expected error for {tpl}"
            );
        }
    }

    #[test]
    fn test_check_against_avatar_keys() {
        assert!(check("https://x/%{username}/%{user_id}", AVATAR_TEMPLATE_KEYS, FIELD).is_ok());
        assert!(check("https://x/%{login}", AVATAR_TEMPLATE_KEYS, FIELD).is_err());
    }
}
