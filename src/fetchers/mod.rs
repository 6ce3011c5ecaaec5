//! Ways of turning a URL into raw HTML for one attempt.
pub mod http;
pub mod render;

pub use crate::config::StrategyKind;
pub use http::SimpleHttpFetch;
pub use render::ScriptedRenderFetch;

use crate::error::FetchError;
use crate::results::RawPage;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// One way of obtaining a page
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Fetch `url` once, returning within roughly `per_attempt_timeout`
    ///
    /// A page cut short by the timeout is still `Ok`, with `timed_out` set.
    async fn fetch_raw(&self, url: &Url, per_attempt_timeout: Duration) -> Result<RawPage, FetchError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
