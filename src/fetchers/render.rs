use super::FetchStrategy;
use crate::config::{DriverConfig, PollConfig};
use crate::driver::poller::TimeBudgetedPoller;
use crate::driver::webdriver::WebDriverBackend;
use crate::driver::{BrowserBackend, DriverLifecycle};
use crate::error::FetchError;
use crate::results::RawPage;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Renders a page in a fresh browser session per attempt
///
/// The session is released on every path before the poll result is looked
/// at. Starting the browser counts against the attempt budget; a launch
/// still pending at the deadline fails the attempt.
pub struct ScriptedRenderFetch<B: BrowserBackend> {
    lifecycle: DriverLifecycle<B>,
    poller: TimeBudgetedPoller,
}

impl<B: BrowserBackend> ScriptedRenderFetch<B> {
    pub fn new(lifecycle: DriverLifecycle<B>, poller: TimeBudgetedPoller) -> Self {
        Self { lifecycle, poller }
    }
}

impl ScriptedRenderFetch<WebDriverBackend> {
    /// Render through the WebDriver server named in `driver`
    pub fn webdriver(driver: DriverConfig, poll: PollConfig) -> Self {
        let backend = WebDriverBackend::from_config(&driver);
        Self::new(DriverLifecycle::new(backend, driver), TimeBudgetedPoller::new(poll))
    }
}

#[async_trait]
impl<B: BrowserBackend> FetchStrategy for ScriptedRenderFetch<B> {
    async fn fetch_raw(&self, url: &Url, per_attempt_timeout: Duration) -> Result<RawPage, FetchError> {
        let deadline = Instant::now() + per_attempt_timeout;
        let mut session = self.lifecycle.acquire_by(deadline).await?;
        let remaining = deadline.saturating_duration_since(Instant::now());

        let outcome = match session.handle_mut() {
            Some(handle) => self.poller.run(handle, url.as_str(), remaining).await,
            None => Err(FetchError::Transport("session released before use".to_string())),
        };
        self.lifecycle.release(&mut session).await;

        let outcome = outcome?;
        Ok(RawPage::new(outcome.html, outcome.timed_out))
    }

    fn name(&self) -> &'static str {
        "render"
    }
}
