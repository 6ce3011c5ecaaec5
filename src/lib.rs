pub mod config;
pub mod driver;
pub mod error;
pub mod fetchers;
pub mod parsers;
pub mod results;
pub mod retry;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{FetchConfig, StrategyKind};
pub use error::{ErrorKind, FetchError};
pub use fetchers::FetchStrategy;
pub use results::{Headings, OpenGraphData, PageContent, RawPage};

use config::{ExtractOptions, RetryConfig};
use fetchers::{ScriptedRenderFetch, SimpleHttpFetch};
use parsers::ContentExtractor;
use retry::RetryController;
use std::time::Duration;

/// Main entry point: fetches a page and extracts its content
///
/// A `Fetcher` is `Send + Sync`; share it behind an `Arc` to serve many
/// callers. Every call gets its own browser session.
pub struct Fetcher {
    strategy: Box<dyn FetchStrategy>,
    retry: RetryController,
    extractor: ContentExtractor,
}

impl Fetcher {
    /// Create a fetcher around `strategy` with default retry and extraction settings
    pub fn new(strategy: impl FetchStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            retry: RetryController::default(),
            extractor: ContentExtractor::default(),
        }
    }

    /// Build the strategy named in `config` along with its settings
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        config.validate()?;

        let fetcher = match config.strategy {
            StrategyKind::Http => Self::new(SimpleHttpFetch::new(&config.driver, &config.http)?),
            StrategyKind::Render => {
                Self::new(ScriptedRenderFetch::webdriver(config.driver.clone(), config.poll.clone()))
            }
        };

        Ok(fetcher
            .with_retry_config(config.retry.clone())
            .with_extract_options(config.extract.clone()))
    }

    /// Set the delays between attempts
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = RetryController::new(retry);
        self
    }

    /// Set the extraction thresholds
    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extractor = ContentExtractor::new(options);
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Fetch `url` with at most `max_retries + 1` attempts of `timeout` each
    ///
    /// A page that never finished loading still comes back, with
    /// `timed_out` set. Extraction runs after the attempts, outside the budget.
    pub async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<PageContent, FetchError> {
        let url = utils::parse_page_url(url)?;
        if timeout.is_zero() {
            return Err(FetchError::Config("timeout must be positive".to_string()));
        }

        let raw = self
            .retry
            .run(self.strategy.as_ref(), &url, timeout, max_retries)
            .await?;

        let content = self.extractor.extract(&raw.html, raw.timed_out);
        ::log::info!(
            "Extracted {} chars of text from {} (timed out: {})",
            content.text_full.chars().count(),
            url,
            content.timed_out
        );
        Ok(content)
    }
}

/// Fetch `url` through a scripted browser with default settings
pub async fn fetch(url: &str, timeout: Duration, max_retries: u32) -> Result<PageContent, FetchError> {
    Fetcher::from_config(&FetchConfig::default())?
        .fetch(url, timeout, max_retries)
        .await
}
