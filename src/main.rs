//! # Korea News Blogger
//!
//! Turns Korean government policy news into blog posts. Each run pulls the
//! korea.kr RSS feeds, keeps only articles that were never seen before,
//! fetches the article pages, has an LLM write a Korean blog post and
//! publishes it.
//!
//! ## Usage
//!
//! ```sh
//! korea_news_blogger --output-dir ./blog            # run
//! korea_news_blogger prompt                         # show prompts only
//! korea_news_blogger --output-dir ./blog test       # component check
//! ```
//!
//! ## Architecture
//!
//! 1. **Ingestion**: Scan feeds in priority order and skip processed keys
//! 2. **Full text**: Fetch each article page, falling back to the feed description
//! 3. **Generation**: Ask the model for a post; template one if that fails
//! 4. **Publishing**: Post sequentially through one authenticated session

use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod fetch;
mod generator;
mod ingest;
mod keys;
mod models;
mod normalize;
mod pipeline;
mod prompts;
mod publish;
mod scrapers;
mod store;
mod utils;

use api::{AjClient, RetryAsk};
use cli::{Cli, Command};
use fetch::HttpFetcher;
use generator::Generator;
use ingest::Ingester;
use pipeline::Pipeline;
use publish::ArchivePublisher;
use store::ProcessedSetStore;

/// First retry delay for the generative client.
const LLM_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    let args = Cli::parse();
    let command = args.command();
    info!(?command, "korea_news_blogger starting up");
    debug!(?args, "Parsed CLI arguments");

    let feeds = if args.feeds.is_empty() {
        scrapers::korea::default_feeds()
    } else {
        args.feeds.clone()
    };
    info!(feeds = feeds.len(), state_file = %args.state_file.display(), "Configured ingestion");

    let ingester = Ingester::new(HttpFetcher::new()?, feeds, ProcessedSetStore::new(&args.state_file));
    let generator = Generator::new(load_client(&args).await).with_debug_dump(args.debug_dump.clone());

    // Prompt mode never publishes, so the archive directory is optional there.
    let publisher = match (&args.output_dir, command) {
        (Some(dir), _) => ArchivePublisher::new(dir, &args.blog_name),
        (None, Command::Prompt) => ArchivePublisher::new(".", &args.blog_name),
        (None, _) => {
            error!("No output directory configured; set --output-dir or BLOG_OUTPUT_DIR");
            return Err("missing publishing destination (--output-dir / BLOG_OUTPUT_DIR)".into());
        }
    };

    let pipeline = Pipeline {
        ingester,
        generator,
        publisher,
        max_articles: args.max_articles,
        post_delay: Duration::from_secs(args.post_delay_secs),
        use_external: !args.offline,
    };

    match command {
        Command::Run => {
            let summary = pipeline.run().await.map_err(|e| {
                error!(error = %e, "Run aborted");
                e
            })?;
            info!(
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Publishing summary"
            );
        }
        Command::Prompt => {
            let previews = pipeline.prompt_only().await;
            if previews.is_empty() {
                info!("No new articles; no prompts to show");
            }
            for (i, preview) in previews.iter().enumerate() {
                println!("=== [{}] {} ===", i + 1, preview.title);
                println!("{}", preview.link);
                if preview.used_description {
                    println!("(full text unavailable; using feed description)");
                }
                println!();
                println!("{}", preview.prompt);
            }
        }
        Command::Test => {
            let report = pipeline.self_test().await;
            println!("feeds:     {} article(s)", report.feed_articles);
            println!("generator: {}", if report.generator_ok { "ok" } else { "FAILED" });
            println!("publisher: {}", if report.publisher_ok { "ok" } else { "FAILED" });
            if !report.all_ok() {
                warn!(?report, "Self-test found problems");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Build the generative client unless running offline. A missing or broken
/// config is not fatal; posts are then templated.
async fn load_client(args: &Cli) -> Option<RetryAsk<AjClient>> {
    if args.offline {
        info!("Offline mode; generative client disabled");
        return None;
    }
    match AjClient::load(args.config.as_deref(), &args.template).await {
        Ok(client) => Some(RetryAsk::new(client, args.llm_retries, LLM_RETRY_BASE_DELAY)),
        Err(e) => {
            warn!(error = %e, template = %args.template, "Generative client unavailable; posts will be templated");
            None
        }
    }
}
