//! Amazon product pages.
//!
//! Amazon serves little usable Open Graph data and lazy-loads its product
//! images, so its pages get their own selectors. Image URLs are rewritten to
//! the full-size asset by dropping the CDN size suffix.

use super::links::resolve_image;
use super::meta::{favicon, meta_description};
use super::{collapse_whitespace, truncate_chars};
use scraper::{ElementRef, Html, Selector};
use unfurl_core::{PreviewResult, PreviewSource};
use url::Url;

const TITLE_SELECTORS: &[&str] = &["#productTitle", "h1.a-size-large", "h1 span", "title"];

const DESCRIPTION_SELECTORS: &[&str] = &["#feature-bullets ul", "#productDescription"];

const IMAGE_SELECTORS: &[&str] = &[
    "#landingImage",
    "#imgBlkFront",
    "img[data-a-dynamic-image]",
    "img[data-old-hires]",
    "img[data-src]",
    ".imgTagWrapper img",
    "#main-image",
    "img[src*='images-amazon']",
];

const DESCRIPTION_LIMIT: usize = 200;

/// Whether `url` is served from an Amazon storefront (any host label `amazon`).
pub fn is_amazon_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host.split('.').any(|label| label.eq_ignore_ascii_case("amazon")))
}

/// Build a preview from an Amazon product page.
pub fn extract(document: &Html, base: &Url) -> PreviewResult {
    PreviewResult {
        title: title(document),
        description: description(document),
        image: image(document, base),
        site_name: Some("Amazon".to_string()),
        favicon: favicon(document, base),
        ..PreviewResult::empty(base.as_str(), PreviewSource::Amazon)
    }
}

fn title(document: &Html) -> Option<String> {
    TITLE_SELECTORS.iter().find_map(|css| first_text(document, css))
}

fn description(document: &Html) -> Option<String> {
    DESCRIPTION_SELECTORS
        .iter()
        .find_map(|css| first_text(document, css))
        .map(|text| truncate_chars(&text, DESCRIPTION_LIMIT))
        .or_else(|| meta_description(document))
}

fn image(document: &Html, base: &Url) -> Option<String> {
    for css in IMAGE_SELECTORS {
        let selector = Selector::parse(css).expect("invalid selector");
        if let Some(el) = document.select(&selector).next()
            && let Some(url) = element_image(el).and_then(|src| resolve_image(base, &src))
        {
            return Some(strip_size_suffix(url).to_string());
        }
    }

    let selector = Selector::parse("img").expect("invalid selector");
    document
        .select(&selector)
        .filter_map(|img| {
            let el = img.value();
            el.attr("src")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| el.attr("data-src"))
                .filter(|src| src.contains("images-amazon"))
        })
        .find_map(|src| resolve_image(base, src))
        .map(|url| strip_size_suffix(url).to_string())
}

/// Best image reference carried by one element.
fn element_image(el: ElementRef<'_>) -> Option<String> {
    let attrs = el.value();

    if let Some(src) = attrs.attr("data-a-dynamic-image").and_then(largest_dynamic_image) {
        return Some(src);
    }

    ["data-old-hires", "data-src", "src"]
        .iter()
        .filter_map(|name| attrs.attr(name))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Pick the largest-area entry of a `data-a-dynamic-image` map
/// (`{"<url>": [width, height], ...}`).
fn largest_dynamic_image(json: &str) -> Option<String> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json).ok()?;

    map.into_iter()
        .filter_map(|(url, dims)| {
            let dims = dims.as_array()?;
            let width = dims.first()?.as_f64()?;
            let height = dims.get(1)?.as_f64()?;
            Some((url, width * height))
        })
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(url, _)| url)
}

/// `…/71abc._AC_SX679_.jpg` → `…/71abc.jpg`.
fn strip_size_suffix(mut url: Url) -> Url {
    let path = url.path().to_string();
    let (dir, last) = path.rsplit_once('/').unwrap_or(("", path.as_str()));

    if let Some(idx) = last.find("._") {
        url.set_path(&format!("{dir}/{}.jpg", &last[..idx]));
        url.set_query(None);
        url.set_fragment(None);
    }
    url
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).expect("invalid selector");
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|t| !t.is_empty())
}
