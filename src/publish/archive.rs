//! Publishing to a directory of Markdown posts.
//!
//! Each post becomes `<root>/<YYYY-MM-DD>/<slug>.md` with YAML front matter,
//! ready for a static site generator. `<root>/index.md` lists every post
//! grouped by date:
//!
//! ```text
//! # Published posts
//!
//! - [**2025-05-06**](./2025-05-06/)
//!     - [청년 월세 지원 확대](./2025-05-06/청년-월세-지원-확대.md)
//! ```

use super::Publisher;
use crate::utils::{ensure_writable_dir, slugify_title};
use chrono::Local;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{error, info, instrument, warn};

const INDEX_FILE: &str = "index.md";
const INDEX_HEADER: &str = "# Published posts";
const MAX_SLUG_CHARS: usize = 80;

#[derive(Debug, Serialize)]
struct FrontMatter<'a> {
    title: &'a str,
    blog: &'a str,
    date: String,
    tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ArchivePublisher {
    root: PathBuf,
    blog_name: String,
}

/// Session state for [`ArchivePublisher`].
#[derive(Debug)]
pub struct ArchiveSession {
    authenticated: bool,
    published: usize,
    opened_at: Instant,
}

impl ArchivePublisher {
    pub fn new(root: impl Into<PathBuf>, blog_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            blog_name: blog_name.into(),
        }
    }

    async fn write_post(&self, title: &str, body: &str, tags: &str) -> Result<PathBuf, Box<dyn Error>> {
        let date = Local::now().date_naive().to_string();
        let day_dir = self.root.join(&date);
        fs::create_dir_all(&day_dir).await?;

        let front_matter = FrontMatter {
            title,
            blog: &self.blog_name,
            date: date.clone(),
            tags: split_tags(tags),
        };
        let yaml = serde_yaml::to_string(&front_matter)?;
        let document = format!("---\n{yaml}---\n\n{}\n", body.trim_end());

        let path = unique_post_path(&day_dir, title);
        fs::write(&path, document).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("post file name is not valid UTF-8")?;
        // An unindexed post must not stay behind as a published one.
        if let Err(e) = update_index(&self.root, &date, title, &format!("./{date}/{file_name}")).await {
            if let Err(rm) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %rm, "Could not remove unindexed post");
            }
            return Err(e);
        }
        Ok(path)
    }
}

impl Publisher for ArchivePublisher {
    type Session = ArchiveSession;

    async fn open_session(&self) -> Result<ArchiveSession, Box<dyn Error>> {
        info!(root = %self.root.display(), blog = %self.blog_name, "Opened archive session");
        Ok(ArchiveSession {
            authenticated: false,
            published: 0,
            opened_at: Instant::now(),
        })
    }

    async fn authenticate(&self, session: &mut ArchiveSession) -> bool {
        match ensure_writable_dir(&self.root).await {
            Ok(()) => {
                session.authenticated = true;
                true
            }
            Err(e) => {
                error!(root = %self.root.display(), error = %e, "Archive directory is not writable");
                false
            }
        }
    }

    #[instrument(level = "info", skip(self, session, body, tags))]
    async fn publish(&self, session: &mut ArchiveSession, title: &str, body: &str, tags: &str) -> bool {
        if !session.authenticated {
            warn!("Publish attempted on an unauthenticated session");
            return false;
        }
        match self.write_post(title, body, tags).await {
            Ok(path) => {
                session.published += 1;
                info!(path = %path.display(), "Published post");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to publish post");
                false
            }
        }
    }

    async fn close_session(&self, session: ArchiveSession) {
        info!(
            published = session.published,
            elapsed_ms = session.opened_at.elapsed().as_millis() as u64,
            "Closed archive session"
        );
    }
}

/// Tags from a comma or space separated list, without leading `#`.
fn split_tags(tags: &str) -> Vec<String> {
    tags.split(|c: char| c == ',' || c.is_whitespace())
        .map(|t| t.trim().trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// `<dir>/<slug>.md`, suffixed `-2`, `-3`, ... when the name is taken.
fn unique_post_path(dir: &Path, title: &str) -> PathBuf {
    let mut slug: String = slugify_title(title).chars().take(MAX_SLUG_CHARS).collect();
    if slug.is_empty() {
        slug = "post".to_string();
    }

    let mut path = dir.join(format!("{slug}.md"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{slug}-{n}.md"));
        n += 1;
    }
    path
}

/// Add a post under its date heading in `<root>/index.md`.
#[instrument(level = "debug", skip(root))]
async fn update_index(root: &Path, date: &str, title: &str, link: &str) -> Result<(), Box<dyn Error>> {
    let index_path = root.join(INDEX_FILE);
    let content = if index_path.exists() {
        fs::read_to_string(&index_path).await?
    } else {
        format!("{INDEX_HEADER}\n")
    };

    let date_heading = format!("- [**{date}**](./{date}/)");
    let post_entry = format!("    - [{title}]({link})");

    let mut lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
    match lines.iter().position(|l| l.trim() == date_heading) {
        Some(i) => {
            let mut j = i + 1;
            while j < lines.len() && lines[j].starts_with("    - ") {
                j += 1;
            }
            lines.insert(j, post_entry);
        }
        None => {
            let insert_at = lines
                .iter()
                .position(|l| l.starts_with(INDEX_HEADER))
                .map(|pos| pos + 1)
                .unwrap_or(lines.len());
            lines.insert(insert_at, String::new());
            lines.insert(insert_at + 1, date_heading);
            lines.insert(insert_at + 2, post_entry);
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(&index_path, out).await?;
    info!(path = %index_path.display(), "Updated post index");
    Ok(())
}
