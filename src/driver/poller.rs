use crate::config::PollConfig;
use crate::driver::{BrowserHandle, Navigation};
use crate::error::FetchError;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout, timeout_at};

/// What one render attempt captured
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Last captured serialized DOM, possibly partial or empty
    pub html: String,
    /// The deadline cut the attempt short
    pub timed_out: bool,
    /// The root marker was observed
    pub marker_seen: bool,
    /// Content-size samples taken after the marker appeared
    pub samples: usize,
    pub elapsed: Duration,
}

/// Why the readiness loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Settled,
    SamplesExhausted,
    Deadline,
    SessionLost,
}

/// Drives one navigation against a wall-clock deadline
///
/// Every browser call is raced against the deadline, so a call that never
/// answers cannot hold the attempt open. Whatever markup was captured by the
/// time the loop exits is returned, even when the deadline was hit.
#[derive(Debug, Clone, Default)]
pub struct TimeBudgetedPoller {
    config: PollConfig,
}

impl TimeBudgetedPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Navigate to `url` and wait for it within `budget`
    ///
    /// Fails only when the session is unusable before anything was captured.
    pub async fn run<H: BrowserHandle + ?Sized>(
        &self,
        handle: &mut H,
        url: &str,
        budget: Duration,
    ) -> Result<PollOutcome, FetchError> {
        let started = Instant::now();
        let deadline = started + budget;

        if let Ok(Err(e)) = timeout_at(deadline, handle.set_page_load_timeout(budget)).await {
            ::log::debug!("Could not set page load timeout: {}", e);
        }

        match timeout_at(deadline, handle.navigate(url)).await {
            Ok(Ok(Navigation::Complete)) => ::log::trace!("Navigation to {} complete", url),
            Ok(Ok(Navigation::TimedOut)) => {
                ::log::debug!("Navigation to {} timed out in the browser, polling anyway", url)
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => ::log::debug!("Navigation to {} still running at the deadline", url),
        }

        let mut outcome = PollOutcome::default();
        let exit = match self.wait_for_marker(handle, deadline).await? {
            true => {
                outcome.marker_seen = true;
                self.wait_for_stability(handle, deadline, &mut outcome).await?
            }
            false => Exit::Deadline,
        };

        if exit == Exit::Deadline || (exit != Exit::SessionLost && outcome.html.is_empty()) {
            self.final_capture(handle, &mut outcome).await;
        }

        outcome.timed_out = exit == Exit::Deadline;
        outcome.elapsed = started.elapsed();
        ::log::debug!(
            "Polling {} ended ({:?}) after {:.2?}: {} bytes, marker seen: {}",
            url,
            exit,
            outcome.elapsed,
            outcome.html.len(),
            outcome.marker_seen
        );

        Ok(outcome)
    }

    /// Probe for the root marker until it shows up or the deadline passes
    async fn wait_for_marker<H: BrowserHandle + ?Sized>(
        &self,
        handle: &mut H,
        deadline: Instant,
    ) -> Result<bool, FetchError> {
        let interval = self.config.poll_interval();

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let probe_end = (now + interval).min(deadline);

            match timeout_at(probe_end, handle.has_root_marker(&self.config.root_selector)).await {
                Ok(Ok(true)) => return Ok(true),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => ::log::trace!("Marker probe exceeded {:?}", interval),
            }

            sleep_until(probe_end).await;
        }
    }

    /// Sample the DOM until its size stops growing
    ///
    /// A dead session is only an error while nothing has been captured.
    async fn wait_for_stability<H: BrowserHandle + ?Sized>(
        &self,
        handle: &mut H,
        deadline: Instant,
        outcome: &mut PollOutcome,
    ) -> Result<Exit, FetchError> {
        self.scroll_lazy_content(handle, deadline).await;

        let interval = self.config.stability_interval();
        let window = self.config.stability_window.max(1);
        let mut last_len: Option<usize> = None;
        let mut unchanged = 0usize;

        while outcome.samples < self.config.stability_max_samples {
            let now = Instant::now();
            if now >= deadline {
                return Ok(Exit::Deadline);
            }
            let sample_end = (now + interval).min(deadline);

            match timeout_at(sample_end, handle.source()).await {
                Ok(Ok(html)) => {
                    outcome.samples += 1;
                    let len = html.len();
                    unchanged = match last_len {
                        Some(prev) if len <= prev => unchanged + 1,
                        _ => 1,
                    };
                    last_len = Some(len);
                    outcome.html = html;

                    if unchanged >= window {
                        return Ok(Exit::Settled);
                    }
                }
                Ok(Err(e)) => {
                    if outcome.html.is_empty() {
                        return Err(e);
                    }
                    ::log::warn!("Session lost while sampling, keeping last capture: {}", e);
                    return Ok(Exit::SessionLost);
                }
                Err(_) => ::log::trace!("Capture exceeded {:?}", interval),
            }

            sleep_until(sample_end).await;
        }

        Ok(Exit::SamplesExhausted)
    }

    /// Scroll halfway down and back so lazily loaded content starts arriving
    ///
    /// Each step is bounded by one poll interval. A failed or slow step only
    /// skips the rest of the scrolling.
    async fn scroll_lazy_content<H: BrowserHandle + ?Sized>(&self, handle: &mut H, deadline: Instant) {
        if !self.config.scroll_lazy_content {
            return;
        }

        for (step, fraction) in [0.5, 0.0].into_iter().enumerate() {
            if step > 0 {
                sleep_until((Instant::now() + self.config.scroll_pause()).min(deadline)).await;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let step_end = (now + self.config.poll_interval()).min(deadline);

            match timeout_at(step_end, handle.scroll_to(fraction)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    ::log::debug!("Scrolling failed, sampling without it: {}", e);
                    return;
                }
                Err(_) => {
                    ::log::trace!("Scroll step exceeded {:?}", self.config.poll_interval());
                    return;
                }
            }
        }
    }

    /// One last bounded capture; keeps the previous snapshot if it fails
    async fn final_capture<H: BrowserHandle + ?Sized>(
        &self,
        handle: &mut H,
        outcome: &mut PollOutcome,
    ) {
        let grace = self.config.capture_grace();
        match timeout(grace, handle.source()).await {
            Ok(Ok(html)) if !html.is_empty() => outcome.html = html,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => ::log::debug!("Final capture failed, keeping last snapshot: {}", e),
            Err(_) => ::log::debug!("Final capture exceeded {:?}, keeping last snapshot", grace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::driver::testing::{Counters, FakeBackend, FakeHandle, MarkerBehavior, NavBehavior, Script};
    use crate::driver::{BrowserBackend, LaunchOptions};

    async fn handle_for(script: Script) -> FakeHandle {
        handle_with_counters(script).await.0
    }

    async fn handle_with_counters(script: Script) -> (FakeHandle, Counters) {
        let dir = tempfile::tempdir().unwrap();
        let options = LaunchOptions::new(&DriverConfig::default(), dir.path(), "agent");
        let backend = FakeBackend::new(vec![script]);
        let handle = backend.launch(&options).await.unwrap();
        (handle, backend.counters())
    }

    fn poller() -> TimeBudgetedPoller {
        TimeBudgetedPoller::new(PollConfig::default())
    }

    /// Budget plus one poll interval, plus timer rounding
    fn upper_bound(budget: Duration) -> Duration {
        budget + poller().config().poll_interval() + Duration::from_millis(10)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_page_settles() {
        let html = "<html><body><p>done</p></body></html>";
        let mut handle = handle_for(Script::ready(html)).await;

        let outcome = poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.html, html);
        assert!(!outcome.timed_out);
        assert!(outcome.marker_seen);
        assert_eq!(outcome.samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_growing_page_is_sampled_until_stable() {
        let script = Script::ready("").with_marker(MarkerBehavior::After(3)).with_sources(&[
            "<html><body>",
            "<html><body><p>a</p>",
            "<html><body><p>a</p><p>b</p>",
            "<html><body><p>a</p><p>b</p>",
        ]);
        let mut handle = handle_for(script).await;

        let outcome = poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(outcome.html, "<html><body><p>a</p><p>b</p>");
        assert_eq!(outcome.samples, 4);
        assert!(!outcome.timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_page_times_out_with_partial_content() {
        let partial = "<html><head><title>Loading";
        let (mut handle, counters) = handle_with_counters(Script::never_ready(partial)).await;
        let budget = Duration::from_secs(5);
        let started = Instant::now();

        let outcome = poller().run(&mut handle, "https://example.com", budget).await.unwrap();

        assert!(outcome.timed_out);
        assert!(!outcome.marker_seen);
        assert_eq!(outcome.html, partial);
        assert!(started.elapsed() <= upper_bound(budget));
        // One probe per interval, never a tight loop
        let interval = poller().config().poll_interval();
        assert!(counters.probes() <= (budget.as_millis() / interval.as_millis()) as usize + 1);
        assert_eq!(counters.scrolls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_page_is_scrolled_down_and_back() {
        let (mut handle, counters) = handle_with_counters(Script::ready("<html><body>x</body></html>")).await;

        poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(counters.scrolls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrolling_can_be_disabled() {
        let config = PollConfig {
            scroll_lazy_content: false,
            ..PollConfig::default()
        };
        let (mut handle, counters) = handle_with_counters(Script::ready("<html><body>x</body></html>")).await;

        let outcome = TimeBudgetedPoller::new(config)
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(counters.scrolls(), 0);
        assert_eq!(outcome.samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_scroll_is_skipped() {
        let html = "<html><body>lazy</body></html>";
        let (mut handle, counters) = handle_with_counters(Script::ready(html).scroll_hangs()).await;
        let started = Instant::now();

        let outcome = poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(counters.scrolls(), 1);
        assert_eq!(outcome.html, html);
        assert!(!outcome.timed_out);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_cannot_outlive_the_deadline() {
        let mut handle = handle_for(Script::hangs("<html>").with_navigate(NavBehavior::Hangs)).await;
        let budget = Duration::from_secs(5);
        let started = Instant::now();

        let outcome = poller().run(&mut handle, "https://example.com", budget).await.unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.html, "<html>");
        assert!(started.elapsed() <= upper_bound(budget));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probes_are_bounded_by_the_interval() {
        let script = Script::never_ready("").with_latency(Duration::from_secs(3));
        let mut handle = handle_for(script).await;
        let budget = Duration::from_secs(2);
        let started = Instant::now();

        let outcome = poller().run(&mut handle, "https://example.com", budget).await.unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.html, "");
        assert!(started.elapsed() <= upper_bound(budget));
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_side_navigation_timeout_is_swallowed() {
        let html = "<html><body>late</body></html>";
        let mut handle = handle_for(Script::ready(html).with_navigate(NavBehavior::TimedOut)).await;

        let outcome = poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.html, html);
        assert!(!outcome.timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_error_propagates() {
        let mut handle = handle_for(Script::navigate_fails()).await;

        let err = poller()
            .run(&mut handle, "https://example.invalid", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_session_while_probing_propagates() {
        let mut handle = handle_for(Script::ready("").with_marker(MarkerBehavior::Fails)).await;

        let result = poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_stability_keeps_capture() {
        let config = PollConfig {
            stability_interval_ms: 1_000,
            stability_max_samples: 100,
            ..PollConfig::default()
        };
        let script = Script::ready("").with_sources(&[
            "<html><body>1",
            "<html><body>12",
            "<html><body>123",
            "<html><body>1234",
            "<html><body>12345",
        ]);
        let mut handle = handle_for(script).await;
        let budget = Duration::from_millis(2_500);
        let started = Instant::now();

        let outcome = TimeBudgetedPoller::new(config)
            .run(&mut handle, "https://example.com", budget)
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(outcome.marker_seen);
        assert!(outcome.html.starts_with("<html><body>123"));
        assert!(started.elapsed() <= upper_bound(budget));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_session_before_capture_propagates() {
        let mut handle = handle_for(Script::ready("<html>").source_fails()).await;

        let err = poller()
            .run(&mut handle, "https://example.com", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
