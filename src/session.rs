//! Browser session lifecycle.
//!
//! Exactly one browser process exists per request. Launch configuration is
//! selected by the deployment-mode flag alone: `Local` auto-detects an
//! installed Chrome, `Packaged` uses the fixed binary path and hardened flag
//! set of the cloud image, with per-session temporary profile and cache
//! directories. Launch failure is fatal for the request; teardown is
//! unconditional.

use std::path::{Path, PathBuf};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{AppConfig, Deployment};
use crate::{Result, SerpError};

/// Chrome binary location inside the packaged image.
const PACKAGED_CHROME: &str = "/opt/chrome/chrome";

/// Well-known command names to search in PATH for local deployments.
const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Well-known Chrome/Chromium executable paths per platform.
#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(not(target_os = "macos"))]
const KNOWN_PATHS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

/// Resolves the Chrome executable: explicit override, then PATH lookup,
/// then well-known locations.
pub fn detect_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    for command in KNOWN_COMMANDS {
        if let Ok(path) = which::which(command) {
            debug!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }
    for candidate in KNOWN_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            debug!("Found Chrome at known path: {}", path.display());
            return Ok(path.to_path_buf());
        }
    }
    Err(SerpError::Config(
        "No Chrome/Chromium installation found; set CHROME_BINARY".to_string(),
    ))
}

/// Launch arguments for the packaged deployment, mirroring the cloud image's
/// hardened flag set. The CDP debugging port is owned by the transport and
/// deliberately not pinned here.
fn packaged_launch_args(data_path: &Path, cache_dir: &Path) -> Vec<String> {
    vec![
        "--headless=new".to_string(),
        "--no-sandbox".to_string(),
        "--disable-gpu".to_string(),
        "--window-size=1280x1696".to_string(),
        "--single-process".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-dev-tools".to_string(),
        "--no-zygote".to_string(),
        format!("--data-path={}", data_path.display()),
        format!("--disk-cache-dir={}", cache_dir.display()),
    ]
}

/// A launched browser with its CDP event handler task and the temporary
/// directories backing its profile.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    _session_dirs: Vec<TempDir>,
}

impl BrowserSession {
    /// Launches a browser according to the deployment mode. Failure here is
    /// fatal for the request; no retry is attempted.
    pub async fn launch(config: &AppConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        let mut session_dirs = Vec::new();

        match config.deployment {
            Deployment::Local => {
                let chrome = detect_chrome(config.chrome_binary.as_deref())?;
                debug!("Launching local browser: {}", chrome.display());
                builder = builder.chrome_executable(chrome);
            }
            Deployment::Packaged => {
                let chrome = config
                    .chrome_binary
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(PACKAGED_CHROME));
                debug!("Launching packaged browser: {}", chrome.display());

                let user_data = tempdir()?;
                let data_path = tempdir()?;
                let cache_dir = tempdir()?;

                builder = builder
                    .chrome_executable(chrome)
                    .user_data_dir(user_data.path());
                for arg in packaged_launch_args(data_path.path(), cache_dir.path()) {
                    builder = builder.arg(arg);
                }
                session_dirs.extend([user_data, data_path, cache_dir]);
            }
        }

        let browser_config = builder
            .build()
            .map_err(|e| SerpError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SerpError::Browser(format!("Failed to launch browser: {}", e)))?;

        // Drain CDP events for the lifetime of the session.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });

        Ok(Self {
            browser,
            handler_task,
            _session_dirs: session_dirs,
        })
    }

    /// Opens a tab on the given URL and waits for navigation.
    pub async fn open(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| SerpError::Browser(format!("Failed to open tab: {}", e)))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| SerpError::Browser(format!("Navigation wait failed: {}", e)))?;
        Ok(page)
    }

    /// Terminates the browser process. Best-effort: failures are logged,
    /// never surfaced, so teardown can run on every exit path.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser did not exit cleanly: {}", e);
        }
        self.handler_task.abort();
        debug!("Browser session closed");
    }
}

fn tempdir() -> Result<TempDir> {
    TempDir::new()
        .map_err(|e| SerpError::Browser(format!("Failed to create session directory: {}", e)))
}
