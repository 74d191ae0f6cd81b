//! Blog post generation.
//!
//! [`Generator::generate`] always returns a post with a non-empty title and
//! body. The generative reply is free text, so it is read back by a small
//! line-oriented state machine ([`ResponseParser`]); whenever the call fails
//! or the reply is missing a title or body, a deterministic templated post
//! from [`crate::prompts`] is used instead.

use crate::api::AskAsync;
use crate::models::{GeneratedPost, KeywordArticle};
use crate::prompts::{build_prompt, dummy_post, fallback_post};
use crate::utils::truncate_for_log;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());

/// Maximum number of tags recovered from hashtags in the body.
const MAX_HASHTAGS: usize = 5;
/// An unmarked line must be longer than this to start a body.
const MIN_IMPLICIT_BODY_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Before any marker; lines are ignored.
    Seeking,
    /// A title line was read; the next text line may open an implicit body.
    Title,
    Body,
    Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Title,
    Body,
    Tags,
}

const MARKERS: [(&str, Marker); 9] = [
    ("제목:", Marker::Title),
    ("본문:", Marker::Body),
    ("해시태그:", Marker::Tags),
    ("태그:", Marker::Tags),
    ("title:", Marker::Title),
    ("body:", Marker::Body),
    ("tags:", Marker::Tags),
    ("tag:", Marker::Tags),
    ("hashtags:", Marker::Tags),
];

/// Sections recovered from a generative reply. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub title: String,
    pub body: String,
    pub tags: String,
}

impl ParsedResponse {
    fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.body.is_empty()
    }
}

/// Line scanner over a reply laid out as `제목:` / `본문:` / `태그:` sections.
///
/// Markers may appear in Korean or English, in any case, optionally wrapped
/// in markdown emphasis (`**제목:**`). When the reply has a title marker but
/// no body marker, the first non-empty line after the title starts the body.
#[derive(Debug)]
pub struct ResponseParser {
    section: Section,
    title: String,
    body: Vec<String>,
    tags: Vec<String>,
}

impl ResponseParser {
    pub fn parse(content: &str) -> ParsedResponse {
        let mut parser = Self {
            section: Section::Seeking,
            title: String::new(),
            body: Vec::new(),
            tags: Vec::new(),
        };
        for line in content.lines() {
            parser.feed(line);
        }
        parser.finish()
    }

    fn feed(&mut self, raw: &str) {
        let line = raw.trim();

        if let Some((marker, rest)) = detect_marker(line) {
            match marker {
                Marker::Title => {
                    self.title = rest.to_string();
                    self.section = Section::Title;
                }
                Marker::Body => {
                    self.body.clear();
                    if !rest.is_empty() {
                        self.body.push(rest.to_string());
                    }
                    self.section = Section::Body;
                }
                Marker::Tags => {
                    self.tags = vec![rest.to_string()];
                    self.section = Section::Tags;
                }
            }
            return;
        }

        match self.section {
            Section::Seeking => {}
            Section::Title if line.is_empty() => {}
            // `제목:` alone on its line: the title follows.
            Section::Title if self.title.is_empty() => self.title = line.to_string(),
            // Headings, hashtag lines and short fragments cannot open an implicit body.
            Section::Title if line.starts_with('#') || line.chars().count() <= MIN_IMPLICIT_BODY_CHARS => {}
            Section::Title => {
                debug!(line = %truncate_for_log(line, 50), "No body marker; starting body after title");
                self.body.clear();
                self.body.push(raw.trim_end().to_string());
                self.section = Section::Body;
            }
            Section::Body => self.body.push(raw.trim_end().to_string()),
            Section::Tags if line.is_empty() => {}
            Section::Tags => self.tags.push(line.to_string()),
        }
    }

    fn finish(self) -> ParsedResponse {
        let body = self.body.join("\n").trim().to_string();
        let mut tags = strip_brackets(self.tags.join(" ").trim()).to_string();
        if tags.is_empty() && !body.is_empty() {
            tags = hashtags(&body);
        }
        ParsedResponse {
            title: strip_brackets(self.title.trim()).to_string(),
            body,
            tags,
        }
    }
}

fn detect_marker(line: &str) -> Option<(Marker, &str)> {
    let candidate = line.trim_start_matches('*');
    MARKERS.iter().find_map(|(prefix, marker)| {
        candidate
            .get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| (*marker, candidate[prefix.len()..].trim_start_matches('*').trim()))
    })
}

/// Remove one pair of `[...]` copied verbatim from the requested layout.
fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .map(str::trim)
        .unwrap_or(s)
}

/// First few distinct `#word` hashtags in `body`, comma separated.
fn hashtags(body: &str) -> String {
    HASHTAG
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .unique()
        .take(MAX_HASHTAGS)
        .join(", ")
}

/// Turns articles into posts, optionally through a generative client.
#[derive(Debug)]
pub struct Generator<C> {
    client: Option<C>,
    debug_dump: Option<PathBuf>,
}

impl<C> Generator<C>
where
    C: AskAsync<Response = String>,
{
    /// `None` means no generative client is configured; every post is
    /// templated.
    pub fn new(client: Option<C>) -> Self {
        Self { client, debug_dump: None }
    }

    /// Write unparseable replies to `path` for inspection.
    pub fn with_debug_dump(mut self, path: Option<PathBuf>) -> Self {
        self.debug_dump = path;
        self
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn prompt(&self, subject: &KeywordArticle, body_candidates: &[String]) -> String {
        build_prompt(subject, body_candidates)
    }

    #[instrument(level = "info", skip_all, fields(keyword = %subject.keyword, candidates = body_candidates.len()))]
    pub async fn generate(
        &self,
        subject: &KeywordArticle,
        body_candidates: &[String],
        use_external: bool,
    ) -> GeneratedPost {
        let client = match (&self.client, use_external) {
            (Some(client), true) => client,
            _ => {
                info!(use_external, has_client = self.has_client(), "Generating templated post");
                return offline_post(subject, body_candidates);
            }
        };

        let prompt = self.prompt(subject, body_candidates);
        let content = match client.ask(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                error!(error = %e, "Generative call failed; using fallback post");
                return offline_post(subject, body_candidates);
            }
        };
        debug!(
            chars = content.chars().count(),
            preview = %truncate_for_log(&content, 300),
            "Received generative reply"
        );

        let parsed = ResponseParser::parse(&content);
        if !parsed.is_complete() {
            warn!(
                title_empty = parsed.title.is_empty(),
                body_empty = parsed.body.is_empty(),
                "Reply is missing a title or body; using fallback post"
            );
            self.dump_reply(&content, &parsed).await;
            return offline_post(subject, body_candidates);
        }

        info!(title = %parsed.title, body_chars = parsed.body.chars().count(), tags = %parsed.tags, "Parsed generated post");
        GeneratedPost {
            title: parsed.title,
            body: parsed.body,
            tags: parsed.tags,
        }
    }

    async fn dump_reply(&self, content: &str, parsed: &ParsedResponse) {
        let Some(path) = &self.debug_dump else {
            return;
        };
        let report = format!(
            "=== RAW RESPONSE ===\n{content}\n\n=== PARSED RESULTS ===\nTitle: '{}'\nBody: '{}'\nTags: '{}'\n",
            parsed.title, parsed.body, parsed.tags
        );
        match fs::write(path, report).await {
            Ok(()) => info!(path = %path.display(), "Saved unparseable reply"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not save unparseable reply"),
        }
    }
}

/// Templated post: dummy when there is no text at all, fallback otherwise.
fn offline_post(subject: &KeywordArticle, body_candidates: &[String]) -> GeneratedPost {
    if body_candidates.iter().all(|c| c.trim().is_empty()) {
        dummy_post(subject)
    } else {
        fallback_post(subject, body_candidates)
    }
}
