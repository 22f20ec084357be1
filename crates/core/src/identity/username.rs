//! Username sanitization.
//!
//! Provider usernames can contain anything; local usernames are restricted
//! to ASCII letters, digits and single underscores, starting and ending
//! with a letter or digit, and at most [`MAX_USERNAME_LENGTH`] characters.
//!
//! There is no transliteration: non-ASCII letters become separators, so
//! `zoë smith` gives `zo_smith`. Folding diacritics needs Unicode tables
//! this crate does not carry, and callers that want it can transliterate
//! before calling [`sanitize_username`].

use std::sync::OnceLock;

use regex_lite::Regex;

/// Longest username the sanitizer produces.
pub const MAX_USERNAME_LENGTH: usize = 20;

struct Patterns {
    edges: Regex,
    non_word: Regex,
    leading_underscores: Regex,
    trailing_non_alnum: Regex,
    repeated_separators: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        edges: Regex::new(r"^[^[:alnum:]]+|\W+$").expect("valid regex"),
        non_word: Regex::new(r"\W+").expect("valid regex"),
        leading_underscores: Regex::new(r"^_+").expect("valid regex"),
        trailing_non_alnum: Regex::new(r"[^A-Za-z0-9]+$").expect("valid regex"),
        repeated_separators: Regex::new(r"[-_.]{2,}").expect("valid regex"),
    })
}

/// Reduce a provider username to a valid local username.
///
/// The result may be empty when the input has no ASCII letters or digits.
pub fn sanitize_username(raw: &str) -> String {
    let p = patterns();
    let name = p.edges.replace_all(raw.trim(), "");
    let name = p.non_word.replace_all(&name, "_");
    let name = p.leading_underscores.replace_all(&name, "");
    let name: String = name.chars().take(MAX_USERNAME_LENGTH).collect();
    let name = p.trailing_non_alnum.replace_all(&name, "");
    let name = p.repeated_separators.replace_all(&name, "_");
    name.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name_unchanged() {
        assert_eq!(sanitize_username("bob"), "bob");
        assert_eq!(sanitize_username("Bob_42"), "Bob_42");
    }

    #[test]
    fn test_strips_edges() {
        assert_eq!(sanitize_username("  __bob!! "), "bob");
        assert_eq!(sanitize_username("-alice-"), "alice");
        assert_eq!(sanitize_username("bob_"), "bob");
    }

    #[test]
    fn test_collapses_inner_separators() {
        assert_eq!(sanitize_username("john.doe"), "john_doe");
        assert_eq!(sanitize_username("john  doe"), "john_doe");
        assert_eq!(sanitize_username("a-.-b"), "a_b");
        assert_eq!(sanitize_username("a__b"), "a_b");
    }

    #[test]
    fn test_email_like_input() {
        assert_eq!(sanitize_username("bob@x.com"), "bob_x_com");
    }

    #[test]
    fn test_non_ascii_treated_as_separator() {
        assert_eq!(sanitize_username("zoë smith"), "zo_smith");
        assert_eq!(sanitize_username("日本"), "");
    }

    #[test]
    fn test_truncates_to_max_length() {
        assert_eq!(
            sanitize_username("abcdefghijklmnopqrstuvwxyz"),
            "abcdefghijklmnopqrst"
        );
        // Cut lands on a separator, which is then stripped.
        assert_eq!(sanitize_username("abcdefghijklmnopqrs.tuv"), "abcdefghijklmnopqrs");
        assert_eq!(sanitize_username("  __abcdefghijklmnopqrstu"), "abcdefghijklmnopqrst");
        assert!(sanitize_username(&"x".repeat(500)).len() <= MAX_USERNAME_LENGTH);
    }

    #[test]
    fn test_empty() {
        assert_eq!(sanitize_username(""), "");
        assert_eq!(sanitize_username("!!!"), "");
    }
}
