//! Feed ingestion with duplicate suppression.
//!
//! The ingester guarantees that a key is emitted at most once over the life
//! of the [`ProcessedSetStore`], and that every unseen entry reachable during
//! a scan is emitted unless the batch quota is already full. Keys are
//! recorded as soon as an entry is accepted, before anything downstream
//! (generation, publishing) has happened.

use crate::fetch::Fetcher;
use crate::keys::derive_key;
use crate::models::NormalizedArticle;
use crate::scrapers::rss::parse_feed;
use crate::store::{ProcessedKeySet, ProcessedSetStore};
use crate::utils::truncate_for_log;
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
pub struct Ingester<F> {
    fetcher: F,
    feeds: Vec<String>,
    store: ProcessedSetStore,
}

impl<F: Fetcher> Ingester<F> {
    /// `feeds` is scanned in order; earlier feeds take priority.
    pub fn new(fetcher: F, feeds: Vec<String>, store: ProcessedSetStore) -> Self {
        Self { fetcher, feeds, store }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &ProcessedSetStore {
        &self.store
    }

    /// Collect up to `max_count` articles not seen in any earlier pass and
    /// persist their keys. Never fails; an unreachable source just yields
    /// nothing.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_new_articles(&self, max_count: usize) -> Vec<NormalizedArticle> {
        let loaded = self.store.load().await;
        let mut working = loaded.clone();

        let articles = self.scan(max_count, &mut working).await;

        if working.len() > loaded.len() {
            self.store.save(&working).await;
        } else {
            debug!("No new keys; state file left untouched");
        }

        info!(count = articles.len(), "Collected new articles");
        articles
    }

    /// Scan the configured feeds, accepting entries whose key is not in
    /// `working` and adding accepted keys to it. Does not persist.
    pub async fn scan(&self, max_count: usize, working: &mut ProcessedKeySet) -> Vec<NormalizedArticle> {
        let max_count = max_count.max(1);
        let mut accepted = Vec::new();

        for feed_url in &self.feeds {
            if accepted.len() >= max_count {
                debug!(%feed_url, "Quota filled; not visiting remaining feeds");
                break;
            }

            let xml = match self.fetcher.get_text(feed_url).await {
                Ok(xml) => xml,
                Err(e) => {
                    warn!(%feed_url, error = %e, "Feed fetch failed; skipping source");
                    continue;
                }
            };
            let entries = match parse_feed(&xml, feed_url) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        %feed_url,
                        error = %e,
                        body_preview = %truncate_for_log(&xml, 200),
                        "Feed did not parse as RSS; skipping source"
                    );
                    continue;
                }
            };
            debug!(%feed_url, entries = entries.len(), "Parsed feed");

            for entry in entries {
                if accepted.len() >= max_count {
                    break;
                }

                let key = derive_key(&entry.link);
                if working.contains(&key) {
                    debug!(%key, title = %truncate_for_log(&entry.title, 50), "Skipping already processed article");
                    continue;
                }

                working.insert(key.clone());
                info!(%key, title = %truncate_for_log(&entry.title, 50), "Accepted new article");
                accepted.push(NormalizedArticle::from_candidate(entry, key));
            }
        }

        accepted
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::testing::FixtureFetcher;

    pub const POLICY_FEED: &str = "https://www.korea.kr/rss/policy.xml";
    pub const PRESIDENT_FEED: &str = "https://www.korea.kr/rss/president.xml";
    pub const CABINET_FEED: &str = "https://www.korea.kr/rss/cabinet.xml";

    /// Build an RSS document with one item per `(title, newsId)`.
    pub fn rss(items: &[(&str, u64)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, id)| {
                format!(
                    "<item><title><![CDATA[{title}]]></title>\
                     <link><![CDATA[https://www.korea.kr/news/policyNewsView.do?newsId={id}&call_from=rsslink]]></link>\
                     <description><![CDATA[<p>{title} 관련 <b>설명</b> [사진]</p>]]></description></item>"
                )
            })
            .collect();
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>feed</title>{body}</channel></rss>"#)
    }

    fn ingester(fetcher: FixtureFetcher, feeds: &[&str], state: &std::path::Path) -> Ingester<FixtureFetcher> {
        Ingester::new(
            fetcher,
            feeds.iter().map(|s| s.to_string()).collect(),
            ProcessedSetStore::new(state),
        )
    }

    #[tokio::test]
    async fn test_second_pass_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let state = tmp.path().join("processed.json");
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("하나", 1), ("둘", 2), ("셋", 3)]));
        let ingester = ingester(fetcher, &[POLICY_FEED], &state);

        let first = ingester.fetch_new_articles(5).await;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].title, "하나");
        assert_eq!(first[0].clean_body, "하나 관련 설명");
        assert_eq!(first[2].key.as_str(), "policyNewsView_3");
        assert_eq!(ingester.store().load().await.len(), 3);

        let second = ingester.fetch_new_articles(5).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_quota_spans_feeds_in_priority_order() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new()
            .with(POLICY_FEED, &rss(&[("p1", 1), ("p2", 2)]))
            .with(PRESIDENT_FEED, &rss(&[("d1", 11), ("d2", 12)]))
            .with(CABINET_FEED, &rss(&[("c1", 21)]));
        let ingester = ingester(fetcher, &[POLICY_FEED, PRESIDENT_FEED, CABINET_FEED], &tmp.path().join("s.json"));

        let batch = ingester.fetch_new_articles(3).await;
        let titles: Vec<_> = batch.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["p1", "p2", "d1"]);
        assert!(!ingester.fetcher().requested(CABINET_FEED));

        // The unconsumed entry is still available next time.
        let next = ingester.fetch_new_articles(3).await;
        let titles: Vec<_> = next.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["d2", "c1"]);
    }

    #[tokio::test]
    async fn test_failed_source_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new()
            .with(PRESIDENT_FEED, "<html>maintenance</html>")
            .with(CABINET_FEED, &rss(&[("c1", 21)]));
        let ingester = ingester(fetcher, &[POLICY_FEED, PRESIDENT_FEED, CABINET_FEED], &tmp.path().join("s.json"));

        let batch = ingester.fetch_new_articles(5).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].source_feed, CABINET_FEED);
    }

    #[tokio::test]
    async fn test_all_sources_down_returns_empty_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let state = tmp.path().join("s.json");
        let ingester = ingester(FixtureFetcher::new(), &[POLICY_FEED, PRESIDENT_FEED], &state);

        assert!(ingester.fetch_new_articles(5).await.is_empty());
        assert!(!state.exists());
    }

    #[tokio::test]
    async fn test_same_key_across_feeds_emitted_once() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FixtureFetcher::new()
            .with(POLICY_FEED, &rss(&[("original", 7)]))
            .with(PRESIDENT_FEED, &rss(&[("repost", 7), ("other", 8)]));
        let ingester = ingester(fetcher, &[POLICY_FEED, PRESIDENT_FEED], &tmp.path().join("s.json"));

        let batch = ingester.fetch_new_articles(5).await;
        let titles: Vec<_> = batch.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["original", "other"]);
    }

    #[tokio::test]
    async fn test_scan_does_not_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let state = tmp.path().join("s.json");
        let fetcher = FixtureFetcher::new().with(POLICY_FEED, &rss(&[("a", 1), ("b", 2)]));
        let ingester = ingester(fetcher, &[POLICY_FEED], &state);

        let mut working = ProcessedKeySet::new();
        assert_eq!(ingester.scan(1, &mut working).await.len(), 1);
        assert_eq!(working.len(), 1);
        assert!(!state.exists());
        assert_eq!(ingester.fetch_new_articles(5).await.len(), 2);
    }
}
