//! Input normalization and validation helpers shared by request handlers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid regex")
});

/// Trims and lowercases an email address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate)
}

pub fn require_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if is_email(&email) {
        Ok(email)
    } else {
        Err(AppError::Validation(format!("'{}' is not a valid email address", raw.trim())))
    }
}

pub fn is_http_url(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && candidate.len() > "https://".len()
        && !candidate.chars().any(char::is_whitespace)
}

/// Trims a required text field and checks its length in characters.
pub fn require_text(field: &str, raw: &str, min: usize, max: usize) -> Result<String, AppError> {
    let value = raw.trim();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Trims an optional text field; blank becomes `None`.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Like [`optional_text`], but rejects values longer than `max` characters.
pub fn optional_text_max(field: &str, raw: Option<&str>, max: usize) -> Result<Option<String>, AppError> {
    match optional_text(raw) {
        Some(value) if value.chars().count() > max => Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        ))),
        other => Ok(other),
    }
}

/// User-supplied tag list: each tag at most `max_len` chars, at most
/// `max_items` distinct tags, duplicates folded case-insensitively.
pub fn require_tags(
    field: &str,
    items: &[String],
    max_len: usize,
    max_items: usize,
) -> Result<Vec<String>, AppError> {
    if let Some(long) = items.iter().find(|t| t.trim().chars().count() > max_len) {
        return Err(AppError::Validation(format!(
            "{field} entries must be at most {max_len} characters ('{}')",
            long.trim()
        )));
    }
    let tags = normalize_tags(items, max_len, usize::MAX);
    if tags.len() > max_items {
        return Err(AppError::Validation(format!(
            "{field} may contain at most {max_items} entries"
        )));
    }
    Ok(tags)
}

/// Optional http(s) URL; blank becomes `None`, anything else must be a URL.
pub fn optional_url(field: &str, raw: Option<&str>) -> Result<Option<String>, AppError> {
    match optional_text(raw) {
        Some(url) if is_http_url(&url) => Ok(Some(url)),
        Some(_) => Err(AppError::Validation(format!(
            "{field} must be an http(s) URL"
        ))),
        None => Ok(None),
    }
}

/// Trims, drops blanks, deduplicates case-insensitively (first spelling wins),
/// truncates to `max_items`.
pub fn normalize_tags(items: &[String], max_len: usize, max_items: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && s.chars().count() <= max_len)
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(max_items)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization_and_shape() {
        assert_eq!(require_email("  Jane.Doe@Example.COM ").unwrap(), "jane.doe@example.com");
        assert!(require_email("jane@").is_err());
        assert!(require_email("jane.example.com").is_err());
        assert!(require_email("jane@example").is_err());
        assert!(is_email("a+tag@sub.example.co"));
    }

    #[test]
    fn test_http_urls() {
        assert!(is_http_url("https://linkedin.com/in/jane"));
        assert!(is_http_url("HTTP://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("https://exa mple.com"));
        assert!(optional_url("website", Some("  ")).unwrap().is_none());
        assert!(optional_url("website", Some("example.com")).is_err());
    }

    #[test]
    fn test_require_text_counts_chars() {
        assert!(require_text("title", "  ab ", 3, 10).is_err());
        assert_eq!(require_text("title", " éèà ", 3, 10).unwrap(), "éèà");
        assert!(require_text("title", "abcdefghijk", 3, 10).is_err());
    }

    #[test]
    fn test_require_tags_limits() {
        let many: Vec<String> = (0..51).map(|i| format!("t{i}")).collect();
        assert!(require_tags("skills", &many, 60, 50).is_err());
        let dupes: Vec<String> = (0..60).map(|_| "Rust".to_string()).collect();
        assert_eq!(require_tags("skills", &dupes, 60, 50).unwrap(), vec!["Rust"]);
        assert!(require_tags("skills", &["x".repeat(61)], 60, 50).is_err());
        assert!(optional_text_max("headline", Some(&"a".repeat(201)), 200).is_err());
    }

    #[test]
    fn test_normalize_tags() {
        let input: Vec<String> = ["Rust", " rust ", "", "Go", "SQL", "go"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalize_tags(&input, 60, 50), vec!["Rust", "Go", "SQL"]);
        assert_eq!(normalize_tags(&input, 60, 2), vec!["Rust", "Go"]);
        let long = vec!["x".repeat(61)];
        assert!(normalize_tags(&long, 60, 50).is_empty());
    }
}
