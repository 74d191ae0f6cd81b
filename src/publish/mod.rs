//! Publishing boundary.
//!
//! The pipeline drives a [`Publisher`] through one session per run:
//!
//! ```text
//! open_session ─▶ authenticate ─▶ publish × N ─▶ close_session
//! ```
//!
//! Every step reports a plain success signal; the pipeline decides whether a
//! failure aborts the run (session, authentication) or only skips the
//! current article (publish). `close_session` consumes the session, so each
//! opened session is closed exactly once.
//!
//! # Implementations
//!
//! | Publisher | Module | Target |
//! |-----------|--------|--------|
//! | [`ArchivePublisher`] | [`archive`] | Markdown files with YAML front matter plus an index |

use std::error::Error;

pub mod archive;

pub use archive::ArchivePublisher;

/// A remote (or local) blogging target.
pub trait Publisher {
    /// Live connection state for one run.
    type Session;

    /// Acquire the resources a session needs.
    async fn open_session(&self) -> Result<Self::Session, Box<dyn Error>>;

    /// Log in. A `false` result ends the run without publishing.
    async fn authenticate(&self, session: &mut Self::Session) -> bool;

    /// Create one public post. `tags` is a comma or space separated list.
    async fn publish(&self, session: &mut Self::Session, title: &str, body: &str, tags: &str) -> bool;

    /// Release the session.
    async fn close_session(&self, session: Self::Session);
}
