use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::fetchers::FetchStrategy;
use crate::results::RawPage;
use crate::utils;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use url::Url;

/// One try at a page, owned by the controller for a single fetch
#[derive(Debug)]
struct FetchAttempt {
    index: u32,
    started: Instant,
    deadline: Instant,
    page: RawPage,
}

impl FetchAttempt {
    fn start(index: u32, budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            index,
            started,
            deadline: started + budget,
            page: RawPage::default(),
        }
    }

    fn finish(mut self, page: RawPage) -> Self {
        let finished = Instant::now();
        if finished > self.deadline {
            ::log::debug!(
                "Attempt {} overran its budget by {:.2?}",
                self.index + 1,
                finished - self.deadline
            );
        }
        self.page = page;
        self
    }

    fn len(&self) -> usize {
        self.page.html.len()
    }
}

/// Runs up to `max_retries + 1` attempts and keeps the largest capture
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    config: RetryConfig,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Fetch `url` with `strategy`, retrying retryable failures
    ///
    /// Stops early once a capture carries an html or body marker. An error is
    /// only returned when no attempt captured anything, or when the failure is
    /// not worth retrying.
    pub async fn run(
        &self,
        strategy: &dyn FetchStrategy,
        url: &Url,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<RawPage, FetchError> {
        let started = Instant::now();
        let total = max_retries.saturating_add(1);
        let mut best: Option<FetchAttempt> = None;
        let mut last_error: Option<FetchError> = None;
        let mut attempts = 0u32;

        for index in 0..total {
            if index > 0 {
                let delay = utils::random_delay(self.config.delay_min_ms, self.config.delay_max_ms);
                ::log::info!("Retrying {} in {:.2?} ({}/{})", url, delay, index + 1, total);
                sleep(delay).await;
            }

            attempts += 1;
            let attempt = FetchAttempt::start(index, timeout);
            ::log::info!("Fetching {} via {} ({}/{})", url, strategy.name(), index + 1, total);

            match strategy.fetch_raw(url, timeout).await {
                Ok(page) => {
                    let attempt = attempt.finish(page);
                    ::log::info!(
                        "Attempt {} captured {} bytes in {:.2?} (timed out: {})",
                        index + 1,
                        attempt.len(),
                        attempt.started.elapsed(),
                        attempt.page.timed_out
                    );
                    if best.as_ref().is_none_or(|b| attempt.len() > b.len()) {
                        best = Some(attempt);
                    }
                    if best.as_ref().is_some_and(|b| utils::has_html_marker(&b.page.html)) {
                        break;
                    }
                }
                Err(e) if !e.is_retryable() => {
                    ::log::warn!("Attempt {} for {} failed, not retrying: {}", index + 1, url, e);
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    ::log::warn!("Attempt {} for {} failed: {}", index + 1, url, e);
                    last_error = Some(e);
                }
            }
        }

        let elapsed = started.elapsed();
        if let Some(best) = best.filter(|b| b.len() > 0 || last_error.is_none()) {
            ::log::debug!(
                "Keeping attempt {} for {} ({} bytes) after {:.2?}",
                best.index + 1,
                url,
                best.len(),
                elapsed
            );
            return Ok(best.page);
        }

        let source = last_error.unwrap_or_else(|| FetchError::Transport("no attempt was made".to_string()));
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            elapsed,
            source: Box::new(source),
        })
    }
}
