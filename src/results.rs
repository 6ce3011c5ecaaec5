use serde::{Deserialize, Serialize};

/// Normalized content extracted from one fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page title (`<title>`, falling back to `og:title`)
    pub title: Option<String>,

    /// Meta description (falling back to `og:description`)
    pub description: Option<String>,

    /// Meta keywords, verbatim
    pub keywords: Option<String>,

    /// Target of `<link rel="canonical">`
    pub canonical: Option<String>,

    /// h1/h2/h3 texts in document order
    #[serde(default)]
    pub headings: Headings,

    /// Main body text, paragraphs joined and capped in length
    #[serde(default)]
    pub text_full: String,

    /// Open Graph properties
    #[serde(default)]
    pub og: OpenGraphData,

    /// True when the page never confirmed readiness before its deadline
    #[serde(default)]
    pub timed_out: bool,
}

impl PageContent {
    /// True when nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.text_full.is_empty()
            && self.headings.is_empty()
    }
}

/// Heading texts per level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headings {
    #[serde(default)]
    pub h1: Vec<String>,
    #[serde(default)]
    pub h2: Vec<String>,
    #[serde(default)]
    pub h3: Vec<String>,
}

impl Headings {
    pub fn is_empty(&self) -> bool {
        self.h1.is_empty() && self.h2.is_empty() && self.h3.is_empty()
    }
}

/// Open Graph metadata carried along with the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenGraphData {
    #[serde(rename = "type")]
    pub og_type: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

/// Raw markup produced by one fetch strategy attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    /// Captured HTML, possibly partial
    pub html: String,

    /// Whether the deadline passed before the page was confirmed ready
    pub timed_out: bool,

    /// URL the content was finally served from, when known
    pub final_url: Option<String>,
}

impl RawPage {
    /// Create a new raw page
    pub fn new(html: String, timed_out: bool) -> Self {
        Self {
            html,
            timed_out,
            final_url: None,
        }
    }

    /// Attach the final (post-redirect) URL
    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = Some(url.into());
        self
    }
}
