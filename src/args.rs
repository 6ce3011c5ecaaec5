use clap::{Parser, ValueEnum};
use page_yield::StrategyKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "page-yield")]
#[command(about = "Fetches a web page and prints its extracted content as JSON")]
#[command(version)]
pub struct Args {
    /// Page to fetch (http or https)
    pub url: String,

    /// How to obtain the page; overrides the config file
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Per-attempt budget in seconds
    #[arg(short, long, default_value_t = 30.0)]
    pub timeout: f64,

    /// Retries after the first attempt
    #[arg(short = 'r', long, default_value_t = 2)]
    pub max_retries: u32,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// WebDriver server URL (falls back to WEBDRIVER_URL)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Http,
    Render,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Http => StrategyKind::Http,
            StrategyArg::Render => StrategyKind::Render,
        }
    }
}
