//! In-memory browser backend for exercising the lifecycle and poller.

use super::{BrowserBackend, BrowserHandle, LaunchOptions, Navigation};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavBehavior {
    Complete,
    TimedOut,
    Fails,
    Hangs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerBehavior {
    /// Marker present after this many probes
    After(usize),
    /// Probe answers `false` forever
    Never,
    /// Probe never answers
    Hangs,
    /// Probe reports a dead session
    Fails,
}

/// How one launched browser behaves
#[derive(Debug, Clone)]
pub struct Script {
    pub launch_fails: bool,
    /// Only headless launches fail
    pub headless_launch_fails: bool,
    /// Time the browser takes to start
    pub launch_latency: Duration,
    pub navigate: NavBehavior,
    pub marker: MarkerBehavior,
    /// Successive `source()` answers, the last one repeats
    pub sources: Vec<String>,
    pub source_fails: bool,
    pub quit_fails: bool,
    pub scroll_hangs: bool,
    /// Simulated latency of every probe and capture
    pub latency: Duration,
}

impl Script {
    pub fn ready(html: &str) -> Self {
        Self {
            launch_fails: false,
            headless_launch_fails: false,
            launch_latency: Duration::ZERO,
            navigate: NavBehavior::Complete,
            marker: MarkerBehavior::After(0),
            sources: vec![html.to_string()],
            source_fails: false,
            quit_fails: false,
            scroll_hangs: false,
            latency: Duration::ZERO,
        }
    }

    pub fn never_ready(partial: &str) -> Self {
        Self {
            marker: MarkerBehavior::Never,
            ..Self::ready(partial)
        }
    }

    pub fn hangs(partial: &str) -> Self {
        Self {
            marker: MarkerBehavior::Hangs,
            ..Self::ready(partial)
        }
    }

    pub fn launch_fails() -> Self {
        Self {
            launch_fails: true,
            ..Self::ready("")
        }
    }

    pub fn navigate_fails() -> Self {
        Self {
            navigate: NavBehavior::Fails,
            ..Self::ready("")
        }
    }

    pub fn with_navigate(mut self, navigate: NavBehavior) -> Self {
        self.navigate = navigate;
        self
    }

    pub fn with_marker(mut self, marker: MarkerBehavior) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn source_fails(mut self) -> Self {
        self.source_fails = true;
        self
    }

    pub fn quit_fails(mut self) -> Self {
        self.quit_fails = true;
        self
    }

    pub fn headless_launch_fails(mut self) -> Self {
        self.headless_launch_fails = true;
        self
    }

    pub fn with_launch_latency(mut self, latency: Duration) -> Self {
        self.launch_latency = latency;
        self
    }

    pub fn scroll_hangs(mut self) -> Self {
        self.scroll_hangs = true;
        self
    }
}

#[derive(Debug, Default)]
struct CounterInner {
    launch_attempts: AtomicUsize,
    launched: AtomicUsize,
    quit: AtomicUsize,
    probes: AtomicUsize,
    scrolls: AtomicUsize,
    launch_dirs: Mutex<Vec<PathBuf>>,
    launch_headless: Mutex<Vec<bool>>,
}

/// Shared view of what the backend has done
#[derive(Debug, Clone, Default)]
pub struct Counters(Arc<CounterInner>);

impl Counters {
    pub fn launch_attempts(&self) -> usize {
        self.0.launch_attempts.load(Ordering::SeqCst)
    }

    pub fn launched(&self) -> usize {
        self.0.launched.load(Ordering::SeqCst)
    }

    pub fn quit(&self) -> usize {
        self.0.quit.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.0.probes.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.0.scrolls.load(Ordering::SeqCst)
    }

    pub fn launch_dirs(&self) -> Vec<PathBuf> {
        self.0.launch_dirs.lock().unwrap().clone()
    }

    /// Headless flag of every launch attempt, in order
    pub fn launch_headless(&self) -> Vec<bool> {
        self.0.launch_headless.lock().unwrap().clone()
    }
}

/// Backend that plays one [`Script`] per launch, repeating the last one
///
/// A second launch for the same profile directory replays the same script.
pub struct FakeBackend {
    scripts: Mutex<VecDeque<Script>>,
    last: Mutex<Option<(PathBuf, Script)>>,
    counters: Counters,
}

impl FakeBackend {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            last: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }

    fn next_script(&self, profile_dir: &Path) -> Script {
        let mut last = self.last.lock().unwrap();
        if let Some((dir, script)) = last.as_ref() {
            if dir.as_path() == profile_dir {
                return script.clone();
            }
        }

        let mut scripts = self.scripts.lock().unwrap();
        let script = if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts.front().cloned().unwrap_or_else(|| Script::ready(""))
        };
        *last = Some((profile_dir.to_path_buf(), script.clone()));
        script
    }
}

#[async_trait]
impl BrowserBackend for FakeBackend {
    type Handle = FakeHandle;

    async fn launch(&self, options: &LaunchOptions) -> Result<FakeHandle, FetchError> {
        self.counters.0.launch_attempts.fetch_add(1, Ordering::SeqCst);
        self.counters
            .0
            .launch_dirs
            .lock()
            .unwrap()
            .push(options.profile_dir.clone());
        self.counters.0.launch_headless.lock().unwrap().push(options.headless);
        assert!(options.profile_dir.exists(), "scratch dir must exist at launch");

        let script = self.next_script(&options.profile_dir);
        tokio::time::sleep(script.launch_latency).await;
        if script.launch_fails || (script.headless_launch_fails && options.headless) {
            return Err(FetchError::Transport("browser crashed on start".to_string()));
        }
        self.counters.0.launched.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            script,
            probes: 0,
            captures: 0,
            counters: self.counters.clone(),
        })
    }
}

pub struct FakeHandle {
    script: Script,
    probes: usize,
    captures: usize,
    counters: Counters,
}

#[async_trait]
impl BrowserHandle for FakeHandle {
    async fn navigate(&mut self, _url: &str) -> Result<Navigation, FetchError> {
        tokio::time::sleep(self.script.latency).await;
        match self.script.navigate {
            NavBehavior::Complete => Ok(Navigation::Complete),
            NavBehavior::TimedOut => Ok(Navigation::TimedOut),
            NavBehavior::Fails => Err(FetchError::Transport("net::ERR_NAME_NOT_RESOLVED".to_string())),
            NavBehavior::Hangs => std::future::pending().await,
        }
    }

    async fn has_root_marker(&mut self, _selector: &str) -> Result<bool, FetchError> {
        self.counters.0.probes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.script.latency).await;
        let probe = self.probes;
        self.probes += 1;
        match self.script.marker {
            MarkerBehavior::After(n) => Ok(probe >= n),
            MarkerBehavior::Never => Ok(false),
            MarkerBehavior::Hangs => std::future::pending().await,
            MarkerBehavior::Fails => Err(FetchError::Transport("session deleted".to_string())),
        }
    }

    async fn scroll_to(&mut self, _fraction: f64) -> Result<(), FetchError> {
        self.counters.0.scrolls.fetch_add(1, Ordering::SeqCst);
        if self.script.scroll_hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn source(&mut self) -> Result<String, FetchError> {
        tokio::time::sleep(self.script.latency).await;
        if self.script.source_fails {
            return Err(FetchError::Transport("session deleted".to_string()));
        }
        let idx = self.captures.min(self.script.sources.len().saturating_sub(1));
        self.captures += 1;
        Ok(self.script.sources.get(idx).cloned().unwrap_or_default())
    }

    async fn quit(&mut self) -> Result<(), FetchError> {
        self.counters.0.quit.fetch_add(1, Ordering::SeqCst);
        if self.script.quit_fails {
            return Err(FetchError::Transport("browser already gone".to_string()));
        }
        Ok(())
    }
}
