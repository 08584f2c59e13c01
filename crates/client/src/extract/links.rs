//! URL fixing for links found in HTML documents.

use url::Url;

/// Resolve `href` against the page URL, returning an absolute URL.
///
/// Blank values resolve to `None`, as do values that cannot be joined.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Absolute URL for a CDN image reference.
///
/// Protocol-relative references get `https:`; everything else resolves
/// against the page URL.
pub fn resolve_image(base: &Url, src: &str) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    base.join(src).ok()
}
