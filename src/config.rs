use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Which strategy a [`crate::Fetcher`] uses to obtain raw HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Single plain HTTP request
    Http,
    /// Scripted browser rendering through WebDriver
    #[default]
    Render,
}

/// When the browser considers a navigation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLoadStrategy {
    /// Return once the DOM is interactive, without waiting for the load event
    #[default]
    Eager,
    /// Wait for the full load event
    Normal,
    /// Return immediately after the navigation is issued
    None,
}

impl PageLoadStrategy {
    /// WebDriver capability value
    pub fn as_str(&self) -> &'static str {
        match self {
            PageLoadStrategy::Eager => "eager",
            PageLoadStrategy::Normal => "normal",
            PageLoadStrategy::None => "none",
        }
    }
}

/// Top-level configuration for the fetch engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Fetch strategy to use
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Browser session settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Polling settings for rendered pages
    #[serde(default)]
    pub poll: PollConfig,

    /// Content extraction thresholds
    #[serde(default)]
    pub extract: ExtractOptions,

    /// Delays between attempts
    #[serde(default)]
    pub retry: RetryConfig,

    /// Plain HTTP settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl FetchConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FetchError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, FetchError> {
        let config: Self =
            serde_json::from_str(contents).map_err(|e| FetchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.driver.user_agents.is_empty() {
            return Err(FetchError::Config("user_agents must not be empty".to_string()));
        }
        if self.driver.viewport.0 == 0 || self.driver.viewport.1 == 0 {
            return Err(FetchError::Config("viewport must be non-zero".to_string()));
        }
        if self.poll.poll_interval_ms == 0 {
            return Err(FetchError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.retry.delay_min_ms > self.retry.delay_max_ms {
            return Err(FetchError::Config(
                "retry delay_min_ms must not exceed delay_max_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for one isolated browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// URL of the WebDriver server
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Block image loading
    #[serde(default = "default_true")]
    pub disable_images: bool,

    /// Window size in pixels (width, height)
    #[serde(default = "default_viewport")]
    pub viewport: (u32, u32),

    /// Accept-Language sent by the browser and the HTTP client
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Navigation completion strategy
    #[serde(default)]
    pub page_load_strategy: PageLoadStrategy,

    /// Identification strings, one is chosen at random per session
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Prefix for the per-session scratch profile directory
    #[serde(default = "default_scratch_prefix")]
    pub scratch_prefix: String,

    /// Additional browser switches
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Retry a failed headless launch once with a visible window
    #[serde(default = "default_true")]
    pub headed_fallback: bool,

    /// Bound on starting a browser session
    #[serde(default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,

    /// Bound on shutting a browser session down
    #[serde(default = "default_quit_timeout_ms")]
    pub quit_timeout_ms: u64,
}

impl DriverConfig {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            disable_images: true,
            viewport: default_viewport(),
            accept_language: default_accept_language(),
            page_load_strategy: PageLoadStrategy::default(),
            user_agents: default_user_agents(),
            scratch_prefix: default_scratch_prefix(),
            extra_args: Vec::new(),
            headed_fallback: true,
            launch_timeout_ms: default_launch_timeout_ms(),
            quit_timeout_ms: default_quit_timeout_ms(),
        }
    }
}

/// Timing of the readiness poll for rendered pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Upper bound of one readiness probe and the pause between probes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause between content-size samples once the page is ready
    #[serde(default = "default_stability_interval_ms")]
    pub stability_interval_ms: u64,

    /// Maximum number of content-size samples
    #[serde(default = "default_stability_max_samples")]
    pub stability_max_samples: usize,

    /// Consecutive equal-size samples that count as settled
    #[serde(default = "default_stability_window")]
    pub stability_window: usize,

    /// CSS selector whose presence marks the page as ready
    #[serde(default = "default_root_selector")]
    pub root_selector: String,

    /// Bound on the final capture once the deadline has passed
    #[serde(default = "default_poll_interval_ms")]
    pub capture_grace_ms: u64,

    /// Scroll halfway down and back once the page is ready, to trigger lazy loading
    #[serde(default = "default_true")]
    pub scroll_lazy_content: bool,

    /// Pause between the two scroll steps
    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,
}

impl PollConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stability_interval(&self) -> Duration {
        Duration::from_millis(self.stability_interval_ms)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    /// Never longer than one poll interval
    pub fn capture_grace(&self) -> Duration {
        Duration::from_millis(self.capture_grace_ms.min(self.poll_interval_ms))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stability_interval_ms: default_stability_interval_ms(),
            stability_max_samples: default_stability_max_samples(),
            stability_window: default_stability_window(),
            root_selector: default_root_selector(),
            capture_grace_ms: default_poll_interval_ms(),
            scroll_lazy_content: true,
            scroll_pause_ms: default_scroll_pause_ms(),
        }
    }
}

/// Thresholds for main-text extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Paragraphs shorter than this many characters are dropped
    #[serde(default = "default_min_paragraph_len")]
    pub min_paragraph_len: usize,

    /// Cap on `text_full`, in characters
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Inserted between kept paragraphs
    #[serde(default = "default_paragraph_separator")]
    pub paragraph_separator: String,

    /// Elements whose text never counts as content
    #[serde(default = "default_stripped_tags")]
    pub stripped_tags: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_paragraph_len: default_min_paragraph_len(),
            max_text_len: default_max_text_len(),
            paragraph_separator: default_paragraph_separator(),
            stripped_tags: default_stripped_tags(),
        }
    }
}

/// Randomized pause before each retry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_delay_min_ms")]
    pub delay_min_ms: u64,

    #[serde(default = "default_retry_delay_max_ms")]
    pub delay_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: default_retry_delay_min_ms(),
            delay_max_ms: default_retry_delay_max_ms(),
        }
    }
}

/// Settings for the plain HTTP strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Maximum redirects followed
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_scroll_pause_ms() -> u64 {
    500
}

/// Default value for webdriver_url (chromedriver's port)
fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_viewport() -> (u32, u32) {
    (1920, 1080)
}

fn default_accept_language() -> String {
    "pt-BR,pt;q=0.9,en;q=0.8".to_string()
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_scratch_prefix() -> String {
    "page-yield-".to_string()
}

fn default_launch_timeout_ms() -> u64 {
    30_000
}

fn default_quit_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_stability_interval_ms() -> u64 {
    500
}

fn default_stability_max_samples() -> usize {
    6
}

fn default_stability_window() -> usize {
    2
}

fn default_root_selector() -> String {
    "body".to_string()
}

fn default_min_paragraph_len() -> usize {
    40
}

fn default_max_text_len() -> usize {
    20_000
}

fn default_paragraph_separator() -> String {
    "\n\n".to_string()
}

fn default_stripped_tags() -> Vec<String> {
    ["script", "style", "noscript", "header", "footer", "nav", "form", "aside"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_retry_delay_min_ms() -> u64 {
    2_000
}

fn default_retry_delay_max_ms() -> u64 {
    5_000
}

fn default_max_redirects() -> usize {
    10
}
