//! Generic metadata: Open Graph, Twitter Card, and plain HTML fallbacks.

use super::links::resolve;
use super::{collapse_whitespace, non_empty};
use scraper::{Html, Selector};
use url::Url;

/// Fields one metadata vocabulary contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
}

impl MetaFields {
    /// Whether the vocabulary is present on the page at all.
    pub fn is_found(&self) -> bool {
        self.title.is_some() || self.description.is_some() || self.image.is_some()
    }
}

/// `og:*` properties.
pub fn open_graph(document: &Html, base: &Url) -> MetaFields {
    let property = |key: &str| meta_content(document, &format!(r#"meta[property="{key}"]"#));

    MetaFields {
        title: property("og:title"),
        description: property("og:description"),
        image: property("og:image").and_then(|src| resolve(base, &src)),
        site_name: property("og:site_name"),
    }
}

/// `twitter:*` cards, declared with either `name=` or `property=`.
pub fn twitter_card(document: &Html, base: &Url) -> MetaFields {
    let card = |key: &str| meta_content(document, &format!(r#"meta[name="{key}"], meta[property="{key}"]"#));

    MetaFields {
        title: card("twitter:title"),
        description: card("twitter:description"),
        image: card("twitter:image").and_then(|src| resolve(base, &src)),
        site_name: None,
    }
}

/// `<title>` text.
pub fn title_tag(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("invalid selector");
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// `<meta name="description">` content.
pub fn meta_description(document: &Html) -> Option<String> {
    meta_content(document, r#"meta[name="description"]"#)
}

/// First `<img>` likely to be a content image.
///
/// Images declaring both dimensions must be at least 300x200; images missing
/// either dimension are accepted as-is. Unparseable dimensions skip the image.
pub fn large_image(document: &Html, base: &Url) -> Option<String> {
    let selector = Selector::parse("img[src]").expect("invalid selector");

    for img in document.select(&selector) {
        let el = img.value();
        let Some(src) = el.attr("src").filter(|s| !s.trim().is_empty()) else {
            continue;
        };

        let width = el.attr("width").filter(|w| !w.trim().is_empty());
        let height = el.attr("height").filter(|h| !h.trim().is_empty());

        if let (Some(w), Some(h)) = (width, height) {
            match (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
                (Ok(w), Ok(h)) if w >= 300 && h >= 200 => {}
                _ => continue,
            }
        }

        if let Some(image) = resolve(base, src) {
            return Some(image);
        }
    }

    None
}

/// First `<link>` whose `rel` mentions an icon.
pub fn favicon(document: &Html, base: &Url) -> Option<String> {
    let selector = Selector::parse("link[rel][href]").expect("invalid selector");

    document
        .select(&selector)
        .filter(|link| link.value().attr("rel").is_some_and(|rel| rel.to_ascii_lowercase().contains("icon")))
        .find_map(|link| link.value().attr("href").and_then(|href| resolve(base, href)))
}

/// Trimmed `content` of the first matching `<meta>` that has one.
fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).expect("invalid selector");
    document.select(&selector).find_map(|el| non_empty(el.value().attr("content")))
}
