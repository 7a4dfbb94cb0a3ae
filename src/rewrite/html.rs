//! HTML rewriting over `lol_html`'s streaming tokenizer.
//!
//! Handlers run per element in registration order, each seeing the
//! attribute values left by the ones before it:
//!
//! 1. `<meta http-equiv="refresh">` with an absolute target
//! 2. the per-tag attribute map
//! 3. `<base href>`
//! 4. `url(...)` inside inline `style` attributes
//! 5. a sweep over any other `href` / `src` / `action`
//!
//! Attribute values are read raw from the markup, entity-decoded before
//! resolution, and escaped again on write.

use std::borrow::Cow;

use lol_html::{element, html_content::Element, HandlerResult, HtmlRewriter, Settings};

use crate::rewrite::{rewrite_css_urls, RewriteContext};

/// Attributes rewritten per tag.
const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("link", &["href"]),
    ("script", &["src"]),
    ("img", &["src", "data-src", "data-lazy-src"]),
    ("iframe", &["src"]),
    ("form", &["action"]),
    ("video", &["src", "poster"]),
    ("audio", &["src"]),
    ("source", &["src"]),
    ("track", &["src"]),
    ("embed", &["src"]),
    ("object", &["data"]),
    ("area", &["href"]),
];

const SWEEP_ATTRIBUTES: &[&str] = &["href", "src", "action"];

/// Rewrite every resource reference in `html` to its proxied form.
/// Empty input and documents the tokenizer gives up on come back unchanged.
pub fn rewrite_html(html: &str, ctx: &RewriteContext) -> String {
    if html.is_empty() {
        return String::new();
    }
    match try_rewrite(html, ctx) {
        Ok(rewritten) => rewritten,
        Err(e) => {
            tracing::warn!(error = %e, base = %ctx.base_url, "HTML rewrite failed, passing document through");
            html.to_string()
        }
    }
}

fn try_rewrite(html: &str, ctx: &RewriteContext) -> Result<String, lol_html::errors::RewritingError> {
    let mut handlers = vec![element!("meta[http-equiv]", |el| rewrite_meta_refresh(el, ctx))];

    for &(tag, attributes) in TAG_ATTRIBUTES {
        handlers.push(element!(tag, move |el| {
            for attribute in attributes {
                rewrite_attribute(el, attribute, ctx)?;
            }
            Ok(())
        }));
    }

    handlers.push(element!("base[href]", |el| rewrite_attribute(el, "href", ctx)));
    handlers.push(element!("[style]", |el| rewrite_inline_style(el, ctx)));
    handlers.push(element!("[href], [src], [action]", |el| {
        let tag = el.tag_name().to_ascii_lowercase();
        for attribute in SWEEP_ATTRIBUTES {
            if !covered_by_tag_map(&tag, attribute) {
                rewrite_attribute(el, attribute, ctx)?;
            }
        }
        Ok(())
    }));

    let mut output = Vec::with_capacity(html.len() + html.len() / 4);
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}

fn covered_by_tag_map(tag: &str, attribute: &str) -> bool {
    tag == "base" && attribute == "href"
        || TAG_ATTRIBUTES
            .iter()
            .any(|&(t, attrs)| t == tag && attrs.contains(&attribute))
}

fn rewrite_attribute(el: &mut Element, attribute: &str, ctx: &RewriteContext) -> HandlerResult {
    let Some(raw) = el.get_attribute(attribute) else {
        return Ok(());
    };
    let value = html_escape::decode_html_entities(&raw);
    if let Some(proxied) = ctx.proxy_reference(&value) {
        el.set_attribute(attribute, &escape_attribute(&proxied))?;
    }
    Ok(())
}

fn rewrite_meta_refresh(el: &mut Element, ctx: &RewriteContext) -> HandlerResult {
    let is_refresh = el
        .get_attribute("http-equiv")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"));
    if !is_refresh {
        return Ok(());
    }
    let Some(content) = el.get_attribute("content") else {
        return Ok(());
    };
    if let Some(rewritten) = refresh_content(&html_escape::decode_html_entities(&content), ctx) {
        el.set_attribute("content", &escape_attribute(&rewritten))?;
    }
    Ok(())
}

/// `N;url=<absolute>` → `N;url=<proxied>`. Relative targets are left alone.
fn refresh_content(content: &str, ctx: &RewriteContext) -> Option<String> {
    let (delay, rest) = content.split_once(|c: char| c == ';' || c == ',')?;
    let rest = rest.trim_start();
    if !rest.get(..3)?.eq_ignore_ascii_case("url") {
        return None;
    }
    let target = rest[3..]
        .trim_start()
        .strip_prefix('=')?
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim();
    if !target.get(..4)?.eq_ignore_ascii_case("http") {
        return None;
    }
    let proxied = ctx.proxy_reference(target)?;
    Some(format!("{};url={}", delay.trim(), proxied))
}

fn rewrite_inline_style(el: &mut Element, ctx: &RewriteContext) -> HandlerResult {
    let Some(raw) = el.get_attribute("style") else {
        return Ok(());
    };
    let style = html_escape::decode_html_entities(&raw);
    let rewritten = rewrite_css_urls(&style, ctx);
    if rewritten != style {
        el.set_attribute("style", &escape_attribute(&rewritten))?;
    }
    Ok(())
}

fn escape_attribute(value: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}
