//! Generative model access with optional exponential backoff.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AjClient`]: Owns an `awful_aj` config and chat template and calls
//!   `awful_aj::api::ask`. The template's system prompt is the system
//!   instruction; the text passed to [`AskAsync::ask`] is the user prompt.
//! - [`RetryAsk`]: Decorator that re-issues failed calls
//!
//! # Retry Strategy
//!
//! Only transport failures are retried; a response that arrives but does not
//! follow the requested layout is handled by the generator's fallbacks.
//!
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// A generative model that answers one prompt at a time.
///
/// Implementors send a prompt to a model and return its reply. Decorators
/// such as [`RetryAsk`] implement it too.
pub trait AskAsync {
    /// Reply type; the pipeline uses plain `String`s.
    type Response;

    /// Send `text` as the user prompt and wait for the reply.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// With `max_retries == 0` the inner client is called exactly once.
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "Generative call failed after all retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Generative call failed; retrying after backoff"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Generative client backed by `awful_aj`.
#[derive(Debug)]
pub struct AjClient {
    /// API endpoint, key, and model settings.
    config: AwfulJadeConfig,
    /// Holds the system instruction for blog writing.
    template: ChatTemplate,
}

impl AjClient {
    /// Load the client config and the named chat template.
    ///
    /// `config_path` defaults to `config.yaml` in the `awful_aj` config
    /// directory; templates are resolved by name from the same directory.
    #[instrument(level = "info")]
    pub async fn load(config_path: Option<&Path>, template_name: &str) -> Result<Self, Box<dyn Error>> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => config_dir()?.join("config.yaml"),
        };
        let config_str = config_file
            .to_str()
            .ok_or("config path is not valid UTF-8")?;

        let config = config::load_config(config_str)?;
        let template = template::load_template(template_name).await?;
        info!(config_path = config_str, template = template_name, "Loaded generative client");
        Ok(Self { config, template })
    }
}

impl AskAsync for AjClient {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(reply) => info!(elapsed_ms = dt.as_millis() as u64, chars = reply.chars().count(), "API call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed"),
        }
        res
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedAsk;
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryAsk::new(ScriptedAsk::default(), 10, StdDuration::from_secs(1));
        assert_eq!(retry.backoff(1), StdDuration::from_secs(1));
        assert_eq!(retry.backoff(2), StdDuration::from_secs(2));
        assert_eq!(retry.backoff(5), StdDuration::from_secs(16));
        assert_eq!(retry.backoff(6), StdDuration::from_secs(30));
        assert_eq!(retry.backoff(40), StdDuration::from_secs(30));
    }

    #[tokio::test]
    async fn test_zero_retries_calls_once() {
        let retry = RetryAsk::new(ScriptedAsk::failing(), 0, StdDuration::from_millis(1));
        assert!(retry.ask("prompt").await.is_err());
        assert_eq!(retry.inner.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let inner = ScriptedAsk::new(vec![Err("timeout".to_string()), Ok("제목: ok".to_string())]);
        let retry = RetryAsk::new(inner, 2, StdDuration::from_millis(1));
        assert_eq!(retry.ask("prompt").await.unwrap(), "제목: ok");
        assert_eq!(retry.inner.calls.get(), 2);
    }
}
