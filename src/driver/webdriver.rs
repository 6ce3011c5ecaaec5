use crate::config::DriverConfig;
use crate::driver::{BrowserBackend, BrowserHandle, LaunchOptions, Navigation};
use crate::error::FetchError;
use async_trait::async_trait;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;

const SCROLL_SCRIPT: &str =
    "window.scrollTo(0, (document.body ? document.body.scrollHeight : 0) * arguments[0]);";

/// Starts Chrome sessions through a running WebDriver server (e.g. chromedriver)
#[derive(Debug, Clone)]
pub struct WebDriverBackend {
    webdriver_url: String,
}

impl WebDriverBackend {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.webdriver_url.clone())
    }

    pub fn webdriver_url(&self) -> &str {
        &self.webdriver_url
    }
}

/// Build the W3C capabilities for one session
pub fn capabilities(options: &LaunchOptions) -> Map<String, Value> {
    let mut prefs = Map::new();
    prefs.insert(
        "profile.default_content_setting_values.notifications".to_string(),
        json!(2),
    );
    if options.disable_images {
        prefs.insert(
            "profile.managed_default_content_settings.images".to_string(),
            json!(2),
        );
    }

    let mut chrome_opts = Map::new();
    chrome_opts.insert("args".to_string(), json!(options.args));
    chrome_opts.insert("excludeSwitches".to_string(), json!(["enable-automation"]));
    chrome_opts.insert("prefs".to_string(), Value::Object(prefs));

    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".to_string(), Value::Object(chrome_opts));
    caps.insert(
        "pageLoadStrategy".to_string(),
        json!(options.page_load_strategy.as_str()),
    );
    caps
}

#[async_trait]
impl BrowserBackend for WebDriverBackend {
    type Handle = WebDriverHandle;

    async fn launch(&self, options: &LaunchOptions) -> Result<WebDriverHandle, FetchError> {
        let client = ClientBuilder::native()
            .capabilities(capabilities(options))
            .connect(&self.webdriver_url)
            .await?;

        ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
        Ok(WebDriverHandle { client })
    }
}

/// One fantoccini client, i.e. one browser process
pub struct WebDriverHandle {
    client: Client,
}

#[async_trait]
impl BrowserHandle for WebDriverHandle {
    async fn set_page_load_timeout(&mut self, limit: Duration) -> Result<(), FetchError> {
        self.client
            .update_timeouts(TimeoutConfiguration::new(None, Some(limit), None))
            .await?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<Navigation, FetchError> {
        match self.client.goto(url).await {
            Ok(()) => Ok(Navigation::Complete),
            Err(e) if is_timeout(&e) => Ok(Navigation::TimedOut),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_root_marker(&mut self, selector: &str) -> Result<bool, FetchError> {
        let found = self.client.find_all(Locator::Css(selector)).await?;
        Ok(!found.is_empty())
    }

    async fn scroll_to(&mut self, fraction: f64) -> Result<(), FetchError> {
        self.client.execute(SCROLL_SCRIPT, vec![json!(fraction)]).await?;
        Ok(())
    }

    async fn source(&mut self) -> Result<String, FetchError> {
        Ok(self.client.source().await?)
    }

    async fn quit(&mut self) -> Result<(), FetchError> {
        self.client.clone().close().await?;
        Ok(())
    }
}

/// WebDriver reports page-load timeouts as a `timeout` error status
fn is_timeout(error: &CmdError) -> bool {
    match error {
        CmdError::Standard(e) => matches!(e.error, ErrorStatus::Timeout),
        _ => false,
    }
}
