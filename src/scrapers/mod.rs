//! Feed sources and source-site knowledge.
//!
//! Articles come from the korea.kr policy briefing RSS feeds. Each source is
//! handled in two phases:
//!
//! 1. **Indexing**: Parse the RSS document into [`crate::models::ArticleCandidate`]s
//!    ([`rss`])
//! 2. **Fetching**: Pull the article page and extract its body text
//!    ([`crate::normalize::fetch_full_text`] using the selectors in [`korea`])
//!
//! # Default Sources
//!
//! | Feed | URL | Notes |
//! |------|-----|-------|
//! | Policy news | `https://www.korea.kr/rss/policy.xml` | Highest priority |
//! | Presidential office | `https://www.korea.kr/rss/president.xml` | |
//! | Cabinet briefings | `https://www.korea.kr/rss/cabinet.xml` | Lowest priority |
//!
//! Feeds are scanned in the order listed; once the batch quota is met the
//! remaining feeds are not requested.

pub mod korea;
pub mod rss;
