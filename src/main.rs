use clap::Parser;
use page_yield::{FetchConfig, FetchError, Fetcher, PageContent};
use std::process::ExitCode;
use std::time::Duration;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let content = match run(&args).await {
        Ok(content) => content,
        Err(e) => {
            ::log::error!("Failed to fetch {}: {}", args.url, e);
            return ExitCode::FAILURE;
        }
    };

    match render_json(&content, args.pretty) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Failed to serialize the content of {}: {}", args.url, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<PageContent, FetchError> {
    let config = load_config(args)?;
    let timeout = Duration::try_from_secs_f64(args.timeout)
        .map_err(|e| FetchError::Config(format!("invalid timeout {}: {}", args.timeout, e)))?;

    let fetcher = Fetcher::from_config(&config)?;
    ::log::info!(
        "Fetching {} via {} (timeout {:?}, max retries {})",
        args.url,
        fetcher.strategy_name(),
        timeout,
        args.max_retries
    );

    fetcher.fetch(&args.url, timeout, args.max_retries).await
}

fn render_json(content: &PageContent, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(content)
    } else {
        serde_json::to_string(content)
    }
}

/// Config file, then command-line overrides, then the environment
fn load_config(args: &Args) -> Result<FetchConfig, FetchError> {
    let mut config = match &args.config {
        Some(path) => FetchConfig::from_file(path)?,
        None => FetchConfig::default(),
    };

    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }

    // Override the WebDriver URL with an environment variable if provided
    match &args.webdriver_url {
        Some(url) => config.driver.webdriver_url = url.clone(),
        None => {
            if let Ok(url) = std::env::var("WEBDRIVER_URL") {
                if !url.is_empty() {
                    config.driver.webdriver_url = url;
                }
            }
        }
    }

    Ok(config)
}
