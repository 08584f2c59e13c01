//! Preview metadata extraction.
//!
//! ### Priority Chain
//! 1. Domain-specific pages (Amazon) short-circuit everything below.
//! 2. Open Graph (`og:*`).
//! 3. Twitter Card (`twitter:*`), only when no Open Graph data was found.
//! 4. Plain HTML: `<title>`, `<meta name="description">`, and the first
//!    large-enough `<img>`, each filling only what is still missing.
//!
//! Relative links resolve against the final (post-redirect) URL. Extraction
//! never fails; a page with nothing usable yields a sparse `fallback` preview.

pub mod amazon;
pub mod links;
pub mod meta;

pub use links::resolve;
pub use meta::MetaFields;

use scraper::Html;
use unfurl_core::{PreviewResult, PreviewSource};
use url::Url;

/// Extract a preview from an HTML document.
///
/// `image_proxy_url` is always `None`; the prober decides it later.
pub fn extract(html: &str, final_url: &Url) -> PreviewResult {
    let document = Html::parse_document(html);

    if amazon::is_amazon_host(final_url) {
        return amazon::extract(&document, final_url);
    }

    let mut preview = PreviewResult::empty(final_url.as_str(), PreviewSource::Fallback);

    let og = meta::open_graph(&document, final_url);
    if og.is_found() {
        preview.source = PreviewSource::Og;
        apply(&mut preview, og);
    } else {
        let card = meta::twitter_card(&document, final_url);
        if card.is_found() {
            preview.source = PreviewSource::Twitter;
            apply(&mut preview, card);
        }
    }

    if preview.title.is_none() {
        preview.title = meta::title_tag(&document);
    }
    if preview.description.is_none() {
        preview.description = meta::meta_description(&document);
    }
    if preview.image.is_none() {
        preview.image = meta::large_image(&document, final_url);
    }
    preview.favicon = meta::favicon(&document, final_url);

    preview
}

fn apply(preview: &mut PreviewResult, fields: MetaFields) {
    preview.title = fields.title;
    preview.description = fields.description;
    preview.image = fields.image;
    preview.site_name = fields.site_name;
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed attribute value; blank counts as absent.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Cut `text` to `limit` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
