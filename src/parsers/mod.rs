pub mod html;
pub mod text;


use crate::config::ExtractOptions;
use crate::results::PageContent;

/// Turns captured markup into a [`PageContent`]
///
/// Holds no state besides its thresholds, so one extractor can serve any
/// number of fetches.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    options: ExtractOptions,
}

impl ContentExtractor {
    /// Creates an extractor with the given thresholds
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Current thresholds
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract page content, carrying the fetch's timed-out flag through
    pub fn extract(&self, raw_html: &str, timed_out: bool) -> PageContent {
        html::extract(raw_html, &self.options, timed_out)
    }
}
