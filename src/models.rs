//! Data models that flow through one pipeline pass.
//!
//! This module defines the values exchanged between stages:
//! - [`ArticleKey`]: Stable identifier derived from an article link
//! - [`ArticleCandidate`]: Raw feed entry as parsed from a syndication feed
//! - [`NormalizedArticle`]: Feed entry with a cleaned plain-text body
//! - [`GeneratedPost`]: Blog post ready to be published
//! - [`PublishOutcome`] and [`RunSummary`]: Per-article and per-run results
//!
//! Only the set of [`ArticleKey`]s outlives a run (see [`crate::store`]);
//! everything else is discarded when the pass ends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic identifier derived from an article link.
///
/// Produced exclusively by [`crate::keys::derive_key`]. Serialized as a bare
/// JSON string so the persisted state file is a plain array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleKey(String);

impl ArticleKey {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A raw feed entry.
///
/// Text fields have already had any literal `<![CDATA[...]]>` wrapper removed
/// but are otherwise untouched; `raw_description` usually still carries markup.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCandidate {
    /// Entry headline.
    pub title: String,
    /// Entry description, typically an HTML fragment.
    pub raw_description: String,
    /// Canonical article link.
    pub link: String,
    /// Feed URL the entry was read from.
    pub source_feed: String,
}

/// A feed entry accepted by the ingester, with its body reduced to plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArticle {
    pub title: String,
    /// Plain text, at most 1500 characters plus a truncation marker.
    pub clean_body: String,
    pub link: String,
    pub source_feed: String,
    pub key: ArticleKey,
}

impl NormalizedArticle {
    /// Build the normalized form of `candidate` under an already derived key.
    pub fn from_candidate(candidate: ArticleCandidate, key: ArticleKey) -> Self {
        Self {
            clean_body: crate::normalize::clean(&candidate.raw_description),
            title: candidate.title,
            link: candidate.link,
            source_feed: candidate.source_feed,
            key,
        }
    }

    /// The generator's view of this article: headline as keyword plus the link.
    pub fn keyword_article(&self) -> KeywordArticle {
        KeywordArticle {
            keyword: self.title.clone(),
            source_url: self.link.clone(),
        }
    }
}

/// Subject of a generated post.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordArticle {
    /// Topic the post is written about, usually the article headline.
    pub keyword: String,
    /// Link back to the source article.
    pub source_url: String,
}

/// A publishable blog post.
///
/// `title` and `body` are never empty once a value leaves the generator;
/// `tags` may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    /// Markdown.
    pub body: String,
    /// Comma or space separated tag list.
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub succeeded: bool,
    pub article_key: ArticleKey,
}

/// Aggregate counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Articles handed to the publisher.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[PublishOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        Self {
            attempted: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}
