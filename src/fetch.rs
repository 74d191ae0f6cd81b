//! HTTP access for feeds and article pages.
//!
//! Both the ingester and the normalizer only ever need "GET this URL as
//! text", so that is the whole [`Fetcher`] seam. [`HttpFetcher`] is the
//! production implementation; tests substitute in-memory fixtures.

use reqwest::Client;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Desktop browser identity; the source site serves reduced pages to
/// unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Upper bound for a single request, connect through body.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch a URL and return its body as text.
pub trait Fetcher {
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = async {
            let resp = self.client.get(url).send().await?.error_for_status()?;
            Ok::<_, reqwest::Error>(resp.text().await?)
        }
        .await;
        let dt = t0.elapsed();

        match res {
            Ok(body) => {
                debug!(elapsed_ms = dt.as_millis() as u64, bytes = body.len(), "GET succeeded");
                Ok(body)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "GET failed");
                Err(Box::new(e))
            }
        }
    }
}
