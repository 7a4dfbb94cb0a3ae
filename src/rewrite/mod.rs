//! Body rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! buffered UTF-8 text + RewriteContext
//!     → html.rs (lol_html visitor over elements, attribute-map driven)
//!     → css.rs  (scanner over url(...) and @import)
//!     → rewritten text
//! ```
//!
//! # Design Decisions
//! - Rewriters are pure functions of their inputs and never fail: anything
//!   they cannot make sense of is left exactly as it was
//! - Links that already point at this proxy are not encoded again
//! - JavaScript is not rewritten

pub mod css;
pub mod html;

use url::Url;

use crate::proxy::codec::UrlCodec;

pub use css::{rewrite_css, rewrite_css_urls};
pub use html::rewrite_html;

/// Which textual rewriter a body goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriterKind {
    Html,
    Css,
}

impl RewriterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriterKind::Html => "html",
            RewriterKind::Css => "css",
        }
    }

    pub fn rewrite(&self, text: &str, ctx: &RewriteContext) -> String {
        match self {
            RewriterKind::Html => rewrite_html(text, ctx),
            RewriterKind::Css => rewrite_css(text, ctx),
        }
    }
}

/// Everything a rewriter needs to turn a reference into a proxied link.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// Document URL relative references resolve against.
    pub base_url: Url,
    /// `scheme://host` the client used to reach the proxy.
    pub proxy_base: String,
    pub codec: UrlCodec,
}

impl RewriteContext {
    pub fn new(base_url: Url, proxy_base: impl Into<String>, codec: UrlCodec) -> Self {
        Self {
            base_url,
            proxy_base: proxy_base.into(),
            codec,
        }
    }

    /// Proxied replacement for a raw reference, or `None` to keep it.
    ///
    /// Fragments, `javascript:` and `data:` URIs, references that do not
    /// resolve to http(s), and links already routed through this proxy are
    /// all kept.
    pub fn proxy_reference(&self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() || value.starts_with('#') || has_inert_scheme(value) {
            return None;
        }
        let absolute = self.base_url.join(value).ok()?;
        if !matches!(absolute.scheme(), "http" | "https") {
            return None;
        }
        if self.codec.is_proxied(&self.proxy_base, absolute.as_str()) {
            return None;
        }
        Some(self.codec.proxied_url(&self.proxy_base, absolute.as_str()))
    }
}

fn has_inert_scheme(value: &str) -> bool {
    let head = value.get(..11).unwrap_or(value).to_ascii_lowercase();
    head.starts_with("javascript:") || head.starts_with("data:")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn context(base: &str) -> RewriteContext {
        RewriteContext::new(Url::parse(base).unwrap(), "http://proxy.test", UrlCodec::new("/go"))
    }

    #[test]
    fn resolves_relative_references() {
        let ctx = context("https://example.com/dir/page.html");
        assert_eq!(
            ctx.proxy_reference("img.png").as_deref(),
            Some("http://proxy.test/go/https%3A%2F%2Fexample.com%2Fdir%2Fimg.png")
        );
        assert_eq!(
            ctx.proxy_reference("//cdn.example.net/a.js").as_deref(),
            Some("http://proxy.test/go/https%3A%2F%2Fcdn.example.net%2Fa.js")
        );
    }

    #[test]
    fn keeps_inert_references() {
        let ctx = context("https://example.com/");
        for raw in ["", "  ", "#top", "javascript:void(0)", "JavaScript:x()", "data:image/png;base64,AA", "mailto:a@b.c"] {
            assert_eq!(ctx.proxy_reference(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn does_not_double_encode() {
        let ctx = context("https://example.com/");
        let once = ctx.proxy_reference("/about").unwrap();
        assert_eq!(ctx.proxy_reference(&once), None);
    }
}
