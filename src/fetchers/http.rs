use super::FetchStrategy;
use crate::config::{DriverConfig, HttpConfig};
use crate::error::FetchError;
use crate::results::RawPage;
use crate::utils;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Content types that say nothing about whether the body is a page
const GENERIC_TYPES: &[&str] = &["text/plain", "application/octet-stream"];

/// Fetches a page with a single plain GET request
pub struct SimpleHttpFetch {
    client: reqwest::Client,
    user_agents: Vec<String>,
    accept_language: String,
}

impl SimpleHttpFetch {
    pub fn new(driver: &DriverConfig, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(http.max_redirects))
            .build()?;

        Ok(Self {
            client,
            user_agents: driver.user_agents.clone(),
            accept_language: driver.accept_language.clone(),
        })
    }
}

#[async_trait]
impl FetchStrategy for SimpleHttpFetch {
    async fn fetch_raw(&self, url: &Url, per_attempt_timeout: Duration) -> Result<RawPage, FetchError> {
        let user_agent = utils::pick_user_agent(&self.user_agents)?;
        ::log::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, user_agent)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .header(ACCEPT, ACCEPT_HTML)
            .timeout(per_attempt_timeout)
            .send()
            .await?
            .error_for_status()?;

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        check_content(content_type.as_deref(), &body)?;
        ::log::debug!("Fetched {} bytes from {}", body.len(), final_url);

        Ok(RawPage::new(body, false).with_final_url(final_url))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Accept html content types, or a generic type whose body looks like a page
fn check_content(content_type: Option<&str>, body: &str) -> Result<(), FetchError> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if essence.contains("html") {
        return Ok(());
    }

    let generic = essence.is_empty() || GENERIC_TYPES.contains(&essence.as_str());
    if generic && utils::has_html_marker(body) {
        return Ok(());
    }

    Err(FetchError::InvalidContentKind {
        content_type: content_type.unwrap_or("<missing>").to_string(),
    })
}
