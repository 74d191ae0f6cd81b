//! Run orchestration: ingest → full text → generate → publish.
//!
//! A [`Pipeline`] is the explicit context for one process: it owns every
//! collaborator and passes them to each stage, so nothing is held in
//! process-wide state. Articles are handled strictly one after another with
//! a fixed pause between posts to stay under the platform's rate limits.

use crate::api::AskAsync;
use crate::fetch::Fetcher;
use crate::generator::Generator;
use crate::ingest::Ingester;
use crate::models::{KeywordArticle, NormalizedArticle, PublishOutcome, RunSummary};
use crate::normalize::fetch_full_text;
use crate::publish::Publisher;
use crate::store::ProcessedKeySet;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Articles pulled by [`Pipeline::self_test`].
const SELF_TEST_ARTICLES: usize = 2;

/// Run-ending failures. Everything else is absorbed per article.
#[derive(Debug)]
pub enum PipelineError {
    SessionOpen(Box<dyn Error>),
    Authentication,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::SessionOpen(e) => write!(f, "could not open publishing session: {e}"),
            PipelineError::Authentication => write!(f, "publishing platform rejected the login"),
        }
    }
}

impl Error for PipelineError {}

/// Prompt produced by [`Pipeline::prompt_only`].
#[derive(Debug, Clone)]
pub struct PromptPreview {
    pub title: String,
    pub link: String,
    /// True when the article page could not be fetched and the feed
    /// description was used instead.
    pub used_description: bool,
    pub prompt: String,
}

/// Component health as checked by [`Pipeline::self_test`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfTestReport {
    pub feed_articles: usize,
    pub generator_ok: bool,
    pub publisher_ok: bool,
}

impl SelfTestReport {
    pub fn all_ok(&self) -> bool {
        self.feed_articles > 0 && self.generator_ok && self.publisher_ok
    }
}

#[derive(Debug)]
pub struct Pipeline<F, C, P> {
    pub ingester: Ingester<F>,
    pub generator: Generator<C>,
    pub publisher: P,
    /// Upper bound on new articles per run.
    pub max_articles: usize,
    /// Pause between consecutive posts.
    pub post_delay: Duration,
    /// Whether to call the generative client at all.
    pub use_external: bool,
}

impl<F, C, P> Pipeline<F, C, P>
where
    F: Fetcher,
    C: AskAsync<Response = String>,
    P: Publisher,
{
    /// Full run. Returns early with an empty summary when there is nothing
    /// new; fails only when the publishing session cannot be established.
    #[instrument(level = "info", skip(self), fields(max_articles = self.max_articles))]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let articles = self.ingester.fetch_new_articles(self.max_articles).await;
        if articles.is_empty() {
            info!("No new articles found");
            return Ok(RunSummary::default());
        }
        info!(count = articles.len(), "Found new articles");

        let mut session = self
            .publisher
            .open_session()
            .await
            .map_err(PipelineError::SessionOpen)?;

        if !self.publisher.authenticate(&mut session).await {
            error!("Authentication failed; nothing will be published");
            self.publisher.close_session(session).await;
            return Err(PipelineError::Authentication);
        }
        info!("Authenticated with publishing platform");

        let total = articles.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, article) in articles.iter().enumerate() {
            info!(index = i + 1, total, title = %article.title, link = %article.link, "Processing article");

            let (subject, body_candidates, _) = self.prepare(article).await;
            let post = self
                .generator
                .generate(&subject, &body_candidates, self.use_external)
                .await;
            info!(title = %post.title, "Generated post");

            let succeeded = self
                .publisher
                .publish(&mut session, &post.title, &post.body, &post.tags)
                .await;
            if succeeded {
                info!(index = i + 1, key = %article.key, "Published article");
            } else {
                warn!(index = i + 1, key = %article.key, "Failed to publish article");
            }
            outcomes.push(PublishOutcome {
                succeeded,
                article_key: article.key.clone(),
            });

            if i + 1 < total && !self.post_delay.is_zero() {
                info!(delay_secs = self.post_delay.as_secs_f64(), "Waiting before next post");
                sleep(self.post_delay).await;
            }
        }

        self.publisher.close_session(session).await;

        let summary = RunSummary::from_outcomes(&outcomes);
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Run complete"
        );
        Ok(summary)
    }

    /// Everything up to the generative boundary. New articles are still
    /// recorded as processed.
    #[instrument(level = "info", skip(self))]
    pub async fn prompt_only(&self) -> Vec<PromptPreview> {
        let articles = self.ingester.fetch_new_articles(self.max_articles).await;
        let mut previews = Vec::with_capacity(articles.len());
        for article in &articles {
            let (subject, body_candidates, used_description) = self.prepare(article).await;
            previews.push(PromptPreview {
                title: article.title.clone(),
                link: article.link.clone(),
                used_description,
                prompt: self.generator.prompt(&subject, &body_candidates),
            });
        }
        info!(count = previews.len(), "Built prompts");
        previews
    }

    /// Exercise each component without consuming articles or publishing.
    #[instrument(level = "info", skip(self))]
    pub async fn self_test(&self) -> SelfTestReport {
        let mut working = ProcessedKeySet::new();
        let articles = self.ingester.scan(SELF_TEST_ARTICLES, &mut working).await;
        if articles.is_empty() {
            warn!("Feed check found no articles");
        } else {
            info!(count = articles.len(), first = %articles[0].title, "Feed check passed");
        }

        let subject = KeywordArticle {
            keyword: "테스트키워드".to_string(),
            source_url: String::new(),
        };
        let post = self
            .generator
            .generate(&subject, &["테스트 뉴스 내용".to_string()], false)
            .await;
        let generator_ok = !post.title.is_empty() && !post.body.is_empty();
        info!(generator_ok, title = %post.title, "Generator check");

        let publisher_ok = match self.publisher.open_session().await {
            Ok(session) => {
                self.publisher.close_session(session).await;
                true
            }
            Err(e) => {
                error!(error = %e, "Publisher session could not be opened");
                false
            }
        };
        info!(publisher_ok, "Publisher check");

        SelfTestReport {
            feed_articles: articles.len(),
            generator_ok,
            publisher_ok,
        }
    }

    /// Generator input for `article`: full page text, or the feed
    /// description when the page yields nothing.
    async fn prepare(&self, article: &NormalizedArticle) -> (KeywordArticle, Vec<String>, bool) {
        let full_text = fetch_full_text(self.ingester.fetcher(), &article.link).await;
        let used_description = full_text.is_empty();
        let content = if used_description {
            info!("Full text unavailable; using feed description");
            article.clean_body.clone()
        } else {
            full_text
        };

        let body_candidates = if content.is_empty() { Vec::new() } else { vec![content] };
        (article.keyword_article(), body_candidates, used_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedAsk;
    use crate::fetch::testing::FixtureFetcher;
    use crate::ingest::tests::{POLICY_FEED, rss};
    use crate::models::GeneratedPost;
    use crate::store::ProcessedSetStore;
    use std::cell::{Cell, RefCell};

    /// Records calls; fails publishes whose title contains `fail_marker`.
    #[derive(Debug, Default)]
    struct RecordingPublisher {
        reject_login: bool,
        fail_open: bool,
        fail_marker: Option<String>,
        opened: Cell<usize>,
        closed: Cell<usize>,
        posts: RefCell<Vec<GeneratedPost>>,
    }

    impl Publisher for RecordingPublisher {
        type Session = ();

        async fn open_session(&self) -> Result<(), Box<dyn Error>> {
            if self.fail_open {
                return Err("browser did not start".into());
            }
            self.opened.set(self.opened.get() + 1);
            Ok(())
        }

        async fn authenticate(&self, _session: &mut ()) -> bool {
            !self.reject_login
        }

        async fn publish(&self, _session: &mut (), title: &str, body: &str, tags: &str) -> bool {
            self.posts.borrow_mut().push(GeneratedPost {
                title: title.to_string(),
                body: body.to_string(),
                tags: tags.to_string(),
            });
            !self
                .fail_marker
                .as_deref()
                .is_some_and(|marker| title.contains(marker))
        }

        async fn close_session(&self, _session: ()) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    fn link(id: u64) -> String {
        format!("https://www.korea.kr/news/policyNewsView.do?newsId={id}&call_from=rsslink")
    }

    fn pipeline(
        fetcher: FixtureFetcher,
        client: Option<ScriptedAsk>,
        publisher: RecordingPublisher,
        state: &std::path::Path,
    ) -> Pipeline<FixtureFetcher, ScriptedAsk, RecordingPublisher> {
        Pipeline {
            ingester: Ingester::new(fetcher, vec![POLICY_FEED.to_string()], ProcessedSetStore::new(state)),
            generator: Generator::new(client),
            publisher,
            max_articles: 5,
            post_delay: Duration::ZERO,
            use_external: true,
        }
    }

    #[tokio::test]
    async fn test_run_publishes_each_new_article_once() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new()
            .with(POLICY_FEED, &rss(&[("첫 기사", 1), ("둘째 기사", 2)]))
            .with(&link(1), r#"<div class="article_body"><p>첫 기사 본문이 충분히 깁니다.</p></div>"#);
        let p = pipeline(fetcher, None, RecordingPublisher::default(), &tmp.path().join("s.json"));

        let summary = p.run().await.unwrap();
        assert_eq!(summary, RunSummary { attempted: 2, succeeded: 2, failed: 0 });
        assert_eq!(p.publisher.opened.get(), 1);
        assert_eq!(p.publisher.closed.get(), 1);

        let posts = p.publisher.posts.borrow();
        assert!(posts[0].body.contains("첫 기사 본문이 충분히 깁니다."));
        // Second page is missing: the feed description stands in.
        assert!(posts[1].body.contains("둘째 기사 관련 설명"));
        drop(posts);

        let again = p.run().await.unwrap();
        assert_eq!(again, RunSummary::default());
        assert_eq!(p.publisher.opened.get(), 1);
    }

    #[tokio::test]
    async fn test_run_uses_generated_post() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("기사", 1)]));
        let client = ScriptedAsk::replying("제목: 생성된 제목\n본문: 생성된 본문\n태그: a, b");
        let p = pipeline(fetcher, Some(client), RecordingPublisher::default(), &tmp.path().join("s.json"));

        p.run().await.unwrap();
        let posts = p.publisher.posts.borrow();
        assert_eq!(posts[0], GeneratedPost {
            title: "생성된 제목".to_string(),
            body: "생성된 본문".to_string(),
            tags: "a, b".to_string(),
        });
    }

    #[tokio::test]
    async fn test_publish_failure_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("나쁜 기사", 1), ("좋은 기사", 2)]));
        let publisher = RecordingPublisher {
            fail_marker: Some("나쁜".to_string()),
            ..Default::default()
        };
        let p = pipeline(fetcher, None, publisher, &tmp.path().join("s.json"));

        let summary = p.run().await.unwrap();
        assert_eq!(summary, RunSummary { attempted: 2, succeeded: 1, failed: 1 });
        assert_eq!(p.publisher.closed.get(), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_aborts_and_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("기사", 1)]));
        let publisher = RecordingPublisher {
            reject_login: true,
            ..Default::default()
        };
        let p = pipeline(fetcher, None, publisher, &tmp.path().join("s.json"));

        assert!(matches!(p.run().await, Err(PipelineError::Authentication)));
        assert!(p.publisher.posts.borrow().is_empty());
        assert_eq!(p.publisher.opened.get(), 1);
        assert_eq!(p.publisher.closed.get(), 1);
    }

    #[tokio::test]
    async fn test_session_open_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("기사", 1)]));
        let publisher = RecordingPublisher {
            fail_open: true,
            ..Default::default()
        };
        let p = pipeline(fetcher, None, publisher, &tmp.path().join("s.json"));

        assert!(matches!(p.run().await, Err(PipelineError::SessionOpen(_))));
        assert_eq!(p.publisher.closed.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_posts() {
        let delay = Duration::from_secs(30);
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("a", 1), ("b", 2), ("c", 3)]));
        let mut p = pipeline(fetcher, None, RecordingPublisher::default(), &tmp.path().join("s.json"));
        p.post_delay = delay;

        let t0 = tokio::time::Instant::now();
        assert_eq!(p.run().await.unwrap().attempted, 3);
        let elapsed = t0.elapsed();
        assert!(elapsed >= delay * 2, "slept {elapsed:?}");
        assert!(elapsed < delay * 3, "slept {elapsed:?}");

        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("only", 4)]));
        let mut p = pipeline(fetcher, None, RecordingPublisher::default(), &tmp.path().join("s.json"));
        p.post_delay = delay;

        let t0 = tokio::time::Instant::now();
        assert_eq!(p.run().await.unwrap().attempted, 1);
        assert!(t0.elapsed() < delay, "single post slept {:?}", t0.elapsed());
    }

    #[tokio::test]
    async fn test_no_articles_opens_no_session() {
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(FixtureFetcher::new(), None, RecordingPublisher::default(), &tmp.path().join("s.json"));
        assert_eq!(p.run().await.unwrap(), RunSummary::default());
        assert_eq!(p.publisher.opened.get(), 0);
    }

    #[tokio::test]
    async fn test_prompt_only_skips_generation_and_publishing() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("프롬프트 기사", 1)]));
        let client = ScriptedAsk::replying("제목: x\n본문: y");
        let p = pipeline(fetcher, Some(client), RecordingPublisher::default(), &tmp.path().join("s.json"));

        let previews = p.prompt_only().await;
        assert_eq!(previews.len(), 1);
        assert!(previews[0].used_description);
        assert!(previews[0].prompt.contains("\"프롬프트 기사\""));
        assert!(previews[0].prompt.contains("프롬프트 기사 관련 설명"));
        assert_eq!(p.publisher.opened.get(), 0);
        assert!(p.publisher.posts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_self_test_consumes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let state = tmp.path().join("s.json");
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("a", 1), ("b", 2), ("c", 3)]));
        let p = pipeline(fetcher, None, RecordingPublisher::default(), &state);

        let report = p.self_test().await;
        assert_eq!(report, SelfTestReport { feed_articles: 2, generator_ok: true, publisher_ok: true });
        assert!(report.all_ok());
        assert!(!state.exists());
        assert_eq!(p.publisher.opened.get(), 1);
        assert_eq!(p.publisher.closed.get(), 1);
    }
}
