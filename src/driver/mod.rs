//! Scripted-rendering sessions.
//!
//! - [`DriverLifecycle`]: acquires an isolated [`Session`] and guarantees its release
//! - [`BrowserBackend`] / [`BrowserHandle`]: the automation seam, see [`webdriver`]
//! - [`poller::TimeBudgetedPoller`]: drives one render attempt against a deadline
pub mod poller;
pub mod webdriver;

use crate::config::{DriverConfig, PageLoadStrategy};
use crate::error::FetchError;
use crate::utils;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::time::{Instant, timeout, timeout_at};

/// How a navigation command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The browser reported the navigation complete
    Complete,
    /// The browser gave up waiting on its own page-load timeout
    TimedOut,
}

/// One running browser, as seen by the poller
#[async_trait]
pub trait BrowserHandle: Send {
    /// Ask the browser to give up on navigations after `limit`
    async fn set_page_load_timeout(&mut self, _limit: std::time::Duration) -> Result<(), FetchError> {
        Ok(())
    }

    /// Load `url` in the current window
    async fn navigate(&mut self, url: &str) -> Result<Navigation, FetchError>;

    /// Whether an element matching `selector` exists yet
    async fn has_root_marker(&mut self, selector: &str) -> Result<bool, FetchError>;

    /// Scroll the window to `fraction` of the document height
    async fn scroll_to(&mut self, _fraction: f64) -> Result<(), FetchError> {
        Ok(())
    }

    /// Current serialized DOM
    async fn source(&mut self) -> Result<String, FetchError>;

    /// Terminate the browser process
    async fn quit(&mut self) -> Result<(), FetchError>;
}

/// Something that can start browsers
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    type Handle: BrowserHandle + 'static;

    async fn launch(&self, options: &LaunchOptions) -> Result<Self::Handle, FetchError>;
}

/// Everything a backend needs to start one isolated browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Scratch profile directory owned by the session
    pub profile_dir: PathBuf,
    /// Identification string drawn for this session
    pub user_agent: String,
    pub headless: bool,
    pub disable_images: bool,
    pub page_load_strategy: PageLoadStrategy,
    /// Complete browser command-line switches
    pub args: Vec<String>,
}

impl LaunchOptions {
    /// Build launch options for a session using `profile_dir`
    pub fn new(config: &DriverConfig, profile_dir: &Path, user_agent: &str) -> Self {
        let mut args = vec![
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--user-agent={}", user_agent),
            format!("--window-size={},{}", config.viewport.0, config.viewport.1),
            format!("--lang={}", primary_language(&config.accept_language)),
            format!("--accept-lang={}", config.accept_language),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-sandbox".to_string(),
            "--disable-extensions".to_string(),
            "--disable-notifications".to_string(),
            "--disable-infobars".to_string(),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        if config.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        args.extend(config.extra_args.iter().cloned());

        Self {
            profile_dir: profile_dir.to_path_buf(),
            user_agent: user_agent.to_string(),
            headless: config.headless,
            disable_images: config.disable_images,
            page_load_strategy: config.page_load_strategy,
            args,
        }
    }

    /// Same session, without the headless switches
    pub fn headed(&self) -> Self {
        let mut options = self.clone();
        options.headless = false;
        options
            .args
            .retain(|arg| !arg.starts_with("--headless") && arg != "--disable-gpu");
        options
    }
}

/// `pt-BR,pt;q=0.9` -> `pt-BR`
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split(',')
        .next()
        .and_then(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .unwrap_or("en-US")
}

/// An isolated rendering context owned by exactly one attempt
///
/// Release it with [`DriverLifecycle::release`]. Dropping an unreleased
/// session still removes the scratch directory and schedules a quit on the
/// current runtime, but logs a warning.
pub struct Session<H: BrowserHandle + 'static> {
    handle: Option<H>,
    scratch: Option<TempDir>,
    profile_dir: PathBuf,
    user_agent: String,
}

impl<H: BrowserHandle + 'static> Session<H> {
    /// Browser handle, `None` once released
    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Scratch profile directory of this session
    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Identification string the browser was started with
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none() && self.scratch.is_none()
    }
}

impl<H: BrowserHandle + 'static> Drop for Session<H> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            ::log::warn!(
                "Session {} dropped without release, scheduling browser shutdown",
                self.profile_dir.display()
            );
            match tokio::runtime::Handle::try_current() {
                Ok(rt) => {
                    rt.spawn(async move {
                        if let Err(e) = handle.quit().await {
                            ::log::warn!("Deferred browser shutdown failed: {}", e);
                        }
                    });
                }
                Err(_) => ::log::warn!("No runtime available to shut the browser down"),
            }
        }
        if let Some(dir) = self.scratch.take() {
            remove_scratch(dir);
        }
    }
}

/// Acquires and releases rendering sessions for one backend
pub struct DriverLifecycle<B: BrowserBackend> {
    backend: B,
    config: DriverConfig,
}

impl<B: BrowserBackend> DriverLifecycle<B> {
    pub fn new(backend: B, config: DriverConfig) -> Self {
        Self { backend, config }
    }

    /// Start a browser with its own scratch profile and a random identification string
    pub async fn acquire(&self) -> Result<Session<B::Handle>, FetchError> {
        self.acquire_by(Instant::now() + self.config.launch_timeout()).await
    }

    /// Like [`acquire`](Self::acquire), but gives up at `deadline` if that comes
    /// before the configured launch timeout
    ///
    /// A failed headless launch is retried once with a visible window when
    /// `headed_fallback` is set. Both tries share the same bound.
    pub async fn acquire_by(&self, deadline: Instant) -> Result<Session<B::Handle>, FetchError> {
        let launch_deadline = deadline.min(Instant::now() + self.config.launch_timeout());

        let scratch = tempfile::Builder::new()
            .prefix(&self.config.scratch_prefix)
            .tempdir()?;
        let profile_dir = scratch.path().to_path_buf();

        let user_agent = match utils::pick_user_agent(&self.config.user_agents) {
            Ok(ua) => ua.to_string(),
            Err(e) => {
                remove_scratch(scratch);
                return Err(e);
            }
        };

        let options = LaunchOptions::new(&self.config, &profile_dir, &user_agent);
        ::log::debug!("Launching browser with profile {}", profile_dir.display());

        let mut launched = self.launch_until(&options, launch_deadline).await;
        if let Err(e) = &launched {
            if options.headless && self.config.headed_fallback && Instant::now() < launch_deadline {
                ::log::warn!("Headless launch failed ({}), retrying with a window", e);
                launched = self.launch_until(&options.headed(), launch_deadline).await;
            }
        }

        match launched {
            Ok(handle) => {
                ::log::debug!("Acquired session {}", profile_dir.display());
                Ok(Session {
                    handle: Some(handle),
                    scratch: Some(scratch),
                    profile_dir,
                    user_agent,
                })
            }
            Err(e) => {
                ::log::warn!("Browser launch failed: {}", e);
                remove_scratch(scratch);
                Err(e)
            }
        }
    }

    async fn launch_until(&self, options: &LaunchOptions, deadline: Instant) -> Result<B::Handle, FetchError> {
        match timeout_at(deadline, self.backend.launch(options)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transport(
                "browser did not start before the launch deadline".to_string(),
            )),
        }
    }

    /// Terminate the browser and remove the scratch directory
    ///
    /// Safe to call more than once. Failures are logged and never returned.
    pub async fn release(&self, session: &mut Session<B::Handle>) {
        if let Some(mut handle) = session.handle.take() {
            match timeout(self.config.quit_timeout(), handle.quit()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => ::log::warn!(
                    "Failed to quit browser for {}: {}",
                    session.profile_dir.display(),
                    e
                ),
                Err(_) => ::log::warn!(
                    "Browser for {} did not quit within {:?}",
                    session.profile_dir.display(),
                    self.config.quit_timeout()
                ),
            }
        }
        if let Some(dir) = session.scratch.take() {
            remove_scratch(dir);
            ::log::debug!("Released session {}", session.profile_dir.display());
        }
    }
}

/// Recursively removes a scratch directory, logging instead of failing
fn remove_scratch(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        ::log::warn!("Failed to remove scratch directory {}: {}", path.display(), e);
    }
}

#[cfg(test)]
pub(crate) mod testing;
