use crate::error::FetchError;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static HTML_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(html|body)[\s>/]").unwrap());

/// True when the markup contains a literal `<html` or `<body` start tag
pub fn has_html_marker(markup: &str) -> bool {
    HTML_MARKER.is_match(markup)
}

/// Picks one identification string from the pool
pub fn pick_user_agent(pool: &[String]) -> Result<&str, FetchError> {
    let mut rng = rand::thread_rng();
    pool.choose(&mut rng)
        .map(String::as_str)
        .ok_or_else(|| FetchError::Config("user agent pool is empty".to_string()))
}

/// Uniformly random duration in `[min_ms, max_ms]`
pub fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(min_ms..=max_ms))
}

/// Parses a caller-supplied URL, accepting only http(s)
pub fn parse_page_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}
