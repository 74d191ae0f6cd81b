//! Markup cleanup for feed descriptions and article pages.
//!
//! [`clean`] reduces a feed description fragment to a short plain-text body.
//! [`fetch_full_text`] pulls the article page itself and extracts the body
//! region; an empty result tells the caller to fall back to the cleaned
//! description.

use crate::fetch::Fetcher;
use crate::scrapers::korea::CONTENT_SELECTORS;
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Cap for cleaned feed descriptions, in characters.
pub const CLEAN_MAX_CHARS: usize = 1500;
/// Cap for extracted article text, in characters.
pub const FULL_TEXT_MAX_CHARS: usize = 2000;
/// Extracted lines this short or shorter are navigation noise.
const MIN_LINE_CHARS: usize = 10;

/// Elements whose text never belongs in a description.
const DROPPED_IN_FRAGMENTS: [&str; 4] = ["a", "img", "script", "style"];
const DROPPED_IN_PAGES: [&str; 2] = ["script", "style"];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());
/// Tag-shaped markup only, so a decoded `<` in running text survives.
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").unwrap());

static CONTENT_REGIONS: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

/// Convert a markup fragment to plain text of at most
/// [`CLEAN_MAX_CHARS`] characters (plus a truncation marker).
///
/// Links, images, scripts, and styles are dropped with their text,
/// whitespace runs collapse to one space, `[...]` annotations are removed and
/// character entities decoded.
pub fn clean(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text = visible_text(fragment.root_element(), &DROPPED_IN_FRAGMENTS).join("");

    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = BRACKETED.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    // Entity decoding can turn `&lt;b&gt;` back into a tag.
    let text = TAG.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(text.trim(), " ");

    truncate_chars(&text, CLEAN_MAX_CHARS)
}

/// Fetch `url` and extract the article body text.
///
/// Returns an empty string on any network or extraction failure.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_full_text<F: Fetcher>(fetcher: &F, url: &str) -> String {
    match fetcher.get_text(url).await {
        Ok(html) => {
            let text = extract_full_text(&html);
            info!(chars = text.chars().count(), "Extracted article text");
            text
        }
        Err(e) => {
            warn!(error = %e, "Article fetch failed; caller falls back to description");
            String::new()
        }
    }
}

/// Extract the body text from an article page.
///
/// The first [`CONTENT_SELECTORS`] entry that matches wins; without a match
/// the whole document is used. Lines of [`MIN_LINE_CHARS`] characters or
/// fewer are discarded, the rest joined with single spaces and capped at
/// [`FULL_TEXT_MAX_CHARS`].
pub fn extract_full_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let region = CONTENT_REGIONS
        .iter()
        .find_map(|selector| document.select(selector).next());
    if let Some(region) = region {
        debug!(element = region.value().name(), "Matched content region");
    }
    let root = region.unwrap_or_else(|| document.root_element());

    let joined = visible_text(root, &DROPPED_IN_PAGES).join("");
    let lines: Vec<&str> = joined
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_CHARS)
        .collect();

    truncate_chars(&lines.join(" "), FULL_TEXT_MAX_CHARS)
}

/// Text nodes under `root`, skipping any inside a `dropped` element.
fn visible_text<'a>(root: ElementRef<'a>, dropped: &[&str]) -> Vec<&'a str> {
    root.descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| dropped.contains(&el.name()))
            })
        })
        .map(|(_, text)| &**text)
        .collect()
}
