//! Command-line interface definitions for the policy news blogger.
//!
//! Every option can also come from an environment variable (a `.env` file in
//! the working directory is loaded first), so scheduled runs need no flags.
//!
//! # Examples
//!
//! ```sh
//! # Publish up to three new articles into ./blog
//! korea_news_blogger --output-dir ./blog --max-articles 3
//!
//! # Show the prompts that would be sent, without calling the model
//! korea_news_blogger prompt
//!
//! # Check feeds, generator and publisher without consuming articles
//! korea_news_blogger --output-dir ./blog test
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// RSS feed URLs in priority order (defaults to the korea.kr policy feeds)
    #[arg(long = "feed", env = "FEED_URLS", value_delimiter = ',', global = true)]
    pub feeds: Vec<String>,

    /// JSON file holding the keys of already processed articles
    #[arg(long, env = "PROCESSED_STATE_FILE", default_value = "processed_articles.json", global = true)]
    pub state_file: PathBuf,

    /// Maximum number of new articles per run
    #[arg(short = 'n', long, env = "MAX_ARTICLES", default_value_t = 1, value_parser = parse_positive, global = true)]
    pub max_articles: usize,

    /// Seconds to wait between consecutive posts
    #[arg(long, env = "POST_DELAY_SECS", default_value_t = 5, global = true)]
    pub post_delay_secs: u64,

    /// Optional path to the generative client's config.yaml
    #[arg(short, long, env = "AJ_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Chat template holding the system instruction
    #[arg(long, env = "AJ_TEMPLATE", default_value = "blog_writer", global = true)]
    pub template: String,

    /// Never call the generative model; every post is templated
    #[arg(long, global = true)]
    pub offline: bool,

    /// Extra attempts after a failed generative call
    #[arg(long, env = "LLM_RETRIES", default_value_t = 0, global = true)]
    pub llm_retries: usize,

    /// Write replies that could not be parsed to this file
    #[arg(long, env = "LLM_DEBUG_DUMP", global = true)]
    pub debug_dump: Option<PathBuf>,

    /// Directory the Markdown archive is published into
    #[arg(short, long, env = "BLOG_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Blog name recorded in each post's front matter
    #[arg(long, env = "BLOG_NAME", default_value = "policy-briefing", global = true)]
    pub blog_name: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch, generate and publish new articles (default)
    Run,
    /// Print the prompt for each new article; nothing is generated or published
    Prompt,
    /// Check each component without consuming articles or publishing
    Test,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}
