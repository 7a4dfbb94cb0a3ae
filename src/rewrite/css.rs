//! CSS rewriting: `url(...)` references and `@import` rules.
//!
//! A single forward scan that understands comments and strings, so a
//! `url(` inside `/* ... */` or inside a quoted string is never touched.
//! Every replacement is emitted as `url('<proxied>')`.

use crate::rewrite::RewriteContext;

/// Rewrite `url(...)` references and `@import` rules in a stylesheet.
pub fn rewrite_css(css: &str, ctx: &RewriteContext) -> String {
    scan(css, ctx, true)
}

/// Rewrite only `url(...)` references, as found in inline `style` values.
pub fn rewrite_css_urls(css: &str, ctx: &RewriteContext) -> String {
    scan(css, ctx, false)
}

fn scan(css: &str, ctx: &RewriteContext, imports: bool) -> String {
    if css.is_empty() {
        return String::new();
    }

    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len() + css.len() / 8);
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
            }
            b'"' | b'\'' => {
                i = skip_string(bytes, i).unwrap_or(bytes.len());
            }
            b'u' | b'U' if starts_with_ignore_case(&bytes[i..], b"url(") && !follows_ident(bytes, i) => {
                let Some((end, value)) = parse_url_function(css, i + 4) else {
                    i += 4;
                    continue;
                };
                if let Some(proxied) = ctx.proxy_reference(value) {
                    out.push_str(&css[copied..i]);
                    out.push_str(&css_url(&proxied));
                    copied = end;
                }
                i = end;
            }
            b'@' if imports && starts_with_ignore_case(&bytes[i..], b"@import") => {
                let start = skip_whitespace(bytes, i + 7);
                if starts_with_ignore_case(&bytes[start..], b"url(") {
                    // left for the url() branch
                    i = start;
                    continue;
                }
                let Some((end, value)) = parse_import_target(css, start) else {
                    i = start.max(i + 7);
                    continue;
                };
                if let Some(proxied) = ctx.proxy_reference(value) {
                    out.push_str(&css[copied..i]);
                    out.push_str("@import ");
                    out.push_str(&css_url(&proxied));
                    copied = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    out.push_str(&css[copied..]);
    out
}

fn css_url(proxied: &str) -> String {
    format!("url('{}')", proxied.replace('\'', "\\'"))
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// `myurl(` or `--url(` is some other function.
fn follows_ident(bytes: &[u8], i: usize) -> bool {
    i > 0 && matches!(bytes[i - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'\\')
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index just past the string starting at `start`, honouring backslash
/// escapes. Strings end at the matching quote or an unescaped newline.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return Some(i),
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Parse the argument of `url(` starting at `start` (just past the paren).
/// Returns the index past the closing `)` and the unquoted value.
fn parse_url_function(css: &str, start: usize) -> Option<(usize, &str)> {
    let bytes = css.as_bytes();
    let i = skip_whitespace(bytes, start);
    let (value, after) = match bytes.get(i)? {
        b'"' | b'\'' => {
            let end = skip_string(bytes, i)?;
            if bytes.get(end - 1) != Some(&bytes[i]) || end - 1 == i {
                return None;
            }
            (&css[i + 1..end - 1], end)
        }
        _ => {
            let close = css[i..].find(')')? + i;
            (css[i..close].trim_end(), close)
        }
    };
    let close = skip_whitespace(bytes, after);
    (bytes.get(close) == Some(&b')')).then_some((close + 1, value))
}

/// Parse the target of `@import` when given as a string or a bare token.
/// Returns the index past the target and the unquoted value.
fn parse_import_target(css: &str, start: usize) -> Option<(usize, &str)> {
    let bytes = css.as_bytes();
    match bytes.get(start)? {
        b'"' | b'\'' => {
            let end = skip_string(bytes, start)?;
            if bytes.get(end - 1) != Some(&bytes[start]) || end - 1 == start {
                return None;
            }
            Some((end, &css[start + 1..end - 1]))
        }
        b';' => None,
        _ => {
            let len = css[start..]
                .find(|c: char| c.is_ascii_whitespace() || matches!(c, ';' | '"' | '\'' | ')'))
                .unwrap_or(css.len() - start);
            (len > 0).then(|| (start + len, &css[start..start + len]))
        }
    }
}
