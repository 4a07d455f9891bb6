//! Validation helpers shared by the cart and catalog entities.
//!
//! Text fields that end up rendered to customers must be plain text: no
//! markup and no control characters. Image references must be absolute
//! http(s) URLs.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{DomainError, DomainResult};

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new("<[^>]+>").expect("valid regex"));

/// Reject values containing markup-looking sequences or control characters.
pub fn ensure_plain_text(value: &str, field: &str) -> DomainResult<()> {
    if MARKUP.is_match(value) {
        return Err(DomainError::validation(format!(
            "{field} must be plain text without markup"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(DomainError::validation(format!(
            "{field} contains control characters"
        )));
    }
    Ok(())
}

/// Require an absolute URL with an `http` or `https` scheme.
pub fn ensure_http_url(value: &str, field: &str) -> DomainResult<()> {
    let url = Url::parse(value).map_err(|_| {
        DomainError::validation(format!("{field} must be a valid absolute URL"))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(DomainError::validation(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_accepts_ordinary_names() {
        assert!(ensure_plain_text("Widget Deluxe 2", "name").is_ok());
    }

    #[test]
    fn plain_text_rejects_markup() {
        let err = ensure_plain_text("<b>Widget</b>", "name").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn plain_text_rejects_control_characters() {
        assert!(ensure_plain_text("Widget\u{0007}", "name").is_err());
        assert!(ensure_plain_text("Widget\nDeluxe", "name").is_err());
    }

    #[test]
    fn http_url_accepts_absolute_http_and_https() {
        assert!(ensure_http_url("http://cdn.example.com/w.png", "image").is_ok());
        assert!(ensure_http_url("https://cdn.example.com/w.png", "image").is_ok());
    }

    #[test]
    fn http_url_rejects_relative_and_other_schemes() {
        assert!(ensure_http_url("/images/w.png", "image").is_err());
        assert!(ensure_http_url("ftp://cdn.example.com/w.png", "image").is_err());
        assert!(ensure_http_url("not a url", "image").is_err());
    }
}
