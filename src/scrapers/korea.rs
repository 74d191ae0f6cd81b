//! korea.kr specifics: default feeds and article-page content regions.

/// Default feed list in priority order.
pub const DEFAULT_FEEDS: [&str; 3] = [
    "https://www.korea.kr/rss/policy.xml",
    "https://www.korea.kr/rss/president.xml",
    "https://www.korea.kr/rss/cabinet.xml",
];

/// CSS selectors for the article body, most specific first. The generic
/// `article` and `.content` entries catch layout changes on the site.
pub const CONTENT_SELECTORS: [&str; 9] = [
    ".article_body",
    ".news_content",
    ".cont_inner",
    ".view_content",
    ".article_view",
    ".content_area",
    ".news_view",
    "article",
    ".content",
];

pub fn default_feeds() -> Vec<String> {
    DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect()
}
