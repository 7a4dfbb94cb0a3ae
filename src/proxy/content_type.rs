//! Content-type classification.

use crate::rewrite::RewriterKind;

/// Lower-cased MIME essence with parameters stripped.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Pick the body rewriter for an upstream content type, or `None` to stream
/// the body through untouched. JavaScript is deliberately passed through.
pub fn select_rewriter(content_type: Option<&str>) -> Option<RewriterKind> {
    match mime_essence(content_type?).as_str() {
        "text/html" | "application/xhtml+xml" => Some(RewriterKind::Html),
        "text/css" => Some(RewriterKind::Css),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_variants() {
        assert_eq!(select_rewriter(Some("text/html")), Some(RewriterKind::Html));
        assert_eq!(
            select_rewriter(Some("Text/HTML; charset=UTF-8")),
            Some(RewriterKind::Html)
        );
        assert_eq!(
            select_rewriter(Some("application/xhtml+xml")),
            Some(RewriterKind::Html)
        );
    }

    #[test]
    fn css() {
        assert_eq!(select_rewriter(Some("text/css;charset=utf-8")), Some(RewriterKind::Css));
    }

    #[test]
    fn everything_else_passes_through() {
        for ct in ["image/png", "application/javascript", "text/javascript", "application/json", ""] {
            assert_eq!(select_rewriter(Some(ct)), None, "{ct}");
        }
        assert_eq!(select_rewriter(None), None);
    }
}
