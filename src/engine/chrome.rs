//! Real automation engine over Chrome DevTools Protocol
//!
//! Wraps `headless_chrome`: one launched browser per session, tabs as pages,
//! bounded element waits, and download capture via `Browser.setDownloadBehavior`
//! into a per-session temp directory.

use crate::engine::{AutomationEngine, Download, Locator, PageWatcher, UiAction};
use crate::error::{Result, ScrapeError};
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::protocol::cdp::Browser as CdpBrowser;
use headless_chrome::{Browser, Element, Tab};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TAB_POLL_INTERVAL: Duration = Duration::from_millis(200);
const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resolve a natural-language instruction to a UI action against a live tab.
///
/// This is the seam for the external instruction-following capability; the
/// engine never implements the semantic understanding itself. `Ok(false)`
/// means the capability could not map the instruction to an action.
pub trait SemanticBackend: Send + Sync {
    fn perform(&self, tab: &Arc<Tab>, instruction: &str) -> anyhow::Result<bool>;
}

/// Launch options for the Chrome engine
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            chrome_path: None,
            sandbox: true,
        }
    }
}

impl ChromeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }
}

/// One launched browser plus the directory its downloads land in
pub struct ChromeSession {
    browser: Browser,
    download_dir: Arc<TempDir>,
}

/// A tab handle that knows where its session's downloads are written
#[derive(Clone)]
pub struct ChromePage {
    tab: Arc<Tab>,
    download_dir: Arc<TempDir>,
}

impl ChromePage {
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

/// Automation engine backed by a locally launched Chrome/Chromium
pub struct ChromeEngine {
    options: ChromeOptions,
    semantic: Option<Box<dyn SemanticBackend>>,
}

impl ChromeEngine {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options, semantic: None }
    }

    /// Attach the external instruction-following capability. Without one,
    /// semantic resolution reports not-found and structural candidates carry
    /// the workflow.
    pub fn with_semantic_backend(mut self, backend: Box<dyn SemanticBackend>) -> Self {
        self.semantic = Some(backend);
        self
    }

    fn find_element<'a>(
        &self,
        tab: &'a Arc<Tab>,
        locator: &Locator,
        timeout: Duration,
    ) -> std::result::Result<Element<'a>, anyhow::Error> {
        match locator {
            Locator::Css(selector) => {
                tab.wait_for_element_with_custom_timeout(selector, timeout)
            }
            Locator::Text { text, exact } => {
                let escaped = text.replace('\'', "\\'");
                let xpath = if *exact {
                    format!("//*[normalize-space(text())='{}']", escaped)
                } else {
                    format!("//*[contains(normalize-space(text()),'{}')]", escaped)
                };
                tab.wait_for_xpath_with_custom_timeout(&xpath, timeout)
            }
        }
    }

    fn apply_action(&self, tab: &Arc<Tab>, element: &Element, action: &UiAction) -> Result<()> {
        match action {
            UiAction::Click => {
                element
                    .click()
                    .map_err(|e| ScrapeError::Engine(format!("click failed: {}", e)))?;
            }
            UiAction::Fill { text, clear } => {
                element
                    .click()
                    .map_err(|e| ScrapeError::Engine(format!("focus failed: {}", e)))?;
                if *clear {
                    element
                        .call_js_fn("function() { this.value = ''; }", vec![], false)
                        .map_err(|e| ScrapeError::Engine(format!("clear failed: {}", e)))?;
                }
                element
                    .type_into(text)
                    .map_err(|e| ScrapeError::Engine(format!("type failed: {}", e)))?;
            }
            UiAction::Press(key) => {
                element
                    .click()
                    .map_err(|e| ScrapeError::Engine(format!("focus failed: {}", e)))?;
                let (modifiers, base) = parse_key_chord(key);
                let modifiers =
                    if modifiers.is_empty() { None } else { Some(modifiers.as_slice()) };
                tab.press_key_with_modifiers(base, modifiers)
                    .map_err(|e| ScrapeError::Engine(format!("key press failed: {}", e)))?;
            }
        }
        Ok(())
    }

    /// List downloaded files (ignoring Chrome's in-progress `.crdownload`s)
    fn completed_downloads(dir: &TempDir) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir.path()).map_err(ScrapeError::Stream)? {
            let path = entry.map_err(ScrapeError::Stream)?.path();
            let in_progress = path
                .extension()
                .map(|ext| ext == OsStr::new("crdownload"))
                .unwrap_or(false);
            if path.is_file() && !in_progress {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Split a "Control+s" style chord into its modifiers and base key.
///
/// The save-shortcut fallback must arrive at the page as a modified key
/// event, not as the base character typed on its own.
fn parse_key_chord(chord: &str) -> (Vec<ModifierKey>, &str) {
    let mut modifiers = Vec::new();
    let mut base = chord;
    for part in chord.split('+') {
        match part {
            "Control" | "Ctrl" => modifiers.push(ModifierKey::Ctrl),
            "Alt" => modifiers.push(ModifierKey::Alt),
            "Shift" => modifiers.push(ModifierKey::Shift),
            "Meta" | "Command" => modifiers.push(ModifierKey::Meta),
            key => base = key,
        }
    }
    (modifiers, base)
}

impl AutomationEngine for ChromeEngine {
    type Session = ChromeSession;
    type Page = ChromePage;
    type Watcher = ChromePageWatcher;

    fn open_session(&self) -> Result<ChromeSession> {
        let download_dir = TempDir::new().map_err(ScrapeError::Stream)?;

        let mut launch_opts = headless_chrome::LaunchOptions::default();
        launch_opts.headless = self.options.headless;
        launch_opts.sandbox = self.options.sandbox;
        launch_opts.window_size = Some((self.options.window_width, self.options.window_height));
        // Record sites watch for the automation banner; run without it
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));
        // The search/select steps can sit idle for tens of seconds
        launch_opts.idle_browser_timeout = Duration::from_secs(10 * 60);
        if let Some(path) = &self.options.chrome_path {
            launch_opts.path = Some(path.clone());
        }

        let browser =
            Browser::new(launch_opts).map_err(|e| ScrapeError::Engine(format!("launch failed: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::Engine(format!("failed to create tab: {}", e)))?;

        // Route downloads from every page in this browser (popups included)
        // into the session's capture directory.
        tab.call_method(CdpBrowser::SetDownloadBehavior {
            behavior: CdpBrowser::SetDownloadBehaviorBehaviorOption::Allow,
            browser_context_id: None,
            download_path: Some(download_dir.path().to_string_lossy().into_owned()),
            events_enabled: Some(true),
        })
        .map_err(|e| ScrapeError::Engine(format!("failed to set download behavior: {}", e)))?;

        log::info!("browser session opened, downloads -> {}", download_dir.path().display());

        Ok(ChromeSession { browser, download_dir: Arc::new(download_dir) })
    }

    fn close_session(&self, session: ChromeSession) -> Result<()> {
        let tabs = session
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| ScrapeError::SessionClose(format!("tab list poisoned: {}", e)))?
            .clone();
        for tab in tabs {
            // Individual tab close failures don't matter during teardown
            let _ = tab.close(false);
        }
        log::info!("browser session closed");
        Ok(())
    }

    fn main_page(&self, session: &ChromeSession) -> Result<ChromePage> {
        let tabs = session
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| ScrapeError::Engine(format!("tab list poisoned: {}", e)))?
            .clone();
        let tab = tabs
            .first()
            .cloned()
            .ok_or_else(|| ScrapeError::Engine("session has no pages".to_string()))?;
        Ok(ChromePage { tab, download_dir: session.download_dir.clone() })
    }

    fn navigate(&self, page: &ChromePage, url: &str, timeout: Duration) -> Result<()> {
        page.tab.set_default_timeout(timeout);
        page.tab
            .navigate_to(url)
            .map_err(|e| ScrapeError::Engine(format!("failed to navigate to {}: {}", url, e)))?;
        page.tab
            .wait_until_navigated()
            .map_err(|e| ScrapeError::Engine(format!("navigation to {} did not complete: {}", url, e)))?;
        Ok(())
    }

    fn try_structural(
        &self,
        page: &ChromePage,
        locator: &Locator,
        action: &UiAction,
        timeout: Duration,
    ) -> Result<bool> {
        match self.find_element(&page.tab, locator, timeout) {
            Ok(element) => {
                self.apply_action(&page.tab, &element, action)?;
                Ok(true)
            }
            Err(e) => {
                // Absence and wait-timeout both mean "not found here"
                log::debug!("structural locator {} not found: {}", locator.key(), e);
                Ok(false)
            }
        }
    }

    fn act_semantic(&self, page: &ChromePage, instruction: &str) -> Result<bool> {
        match &self.semantic {
            Some(backend) => backend
                .perform(&page.tab, instruction)
                .map_err(|e| ScrapeError::Engine(format!("semantic backend error: {}", e))),
            None => {
                log::debug!("no semantic backend configured; cannot resolve '{}'", instruction);
                Ok(false)
            }
        }
    }

    fn press_key(&self, page: &ChromePage, key: &str) -> Result<()> {
        let (modifiers, base) = parse_key_chord(key);
        let modifiers = if modifiers.is_empty() { None } else { Some(modifiers.as_slice()) };
        page.tab
            .press_key_with_modifiers(base, modifiers)
            .map(|_| ())
            .map_err(|e| ScrapeError::Engine(format!("key press '{}' failed: {}", key, e)))
    }

    fn watch_new_pages(&self, session: &ChromeSession) -> Result<ChromePageWatcher> {
        let tabs = session.browser.get_tabs().clone();
        let baseline = tabs
            .lock()
            .map_err(|e| ScrapeError::Engine(format!("tab list poisoned: {}", e)))?
            .iter()
            .map(|tab| tab.get_target_id().clone())
            .collect();
        Ok(ChromePageWatcher { tabs, baseline, download_dir: session.download_dir.clone() })
    }

    fn await_download(&self, page: &ChromePage, timeout: Duration) -> Result<Download> {
        let dir = &page.download_dir;
        let deadline = Instant::now() + timeout;

        loop {
            let files = Self::completed_downloads(dir)?;
            if let Some(path) = files.into_iter().next() {
                // Wait for the size to hold still; Chrome renames the
                // .crdownload before the last flush on some versions.
                let first = fs::metadata(&path).map_err(ScrapeError::Stream)?.len();
                std::thread::sleep(DOWNLOAD_POLL_INTERVAL);
                let second = fs::metadata(&path).map_err(ScrapeError::Stream)?.len();
                if first == second {
                    let suggested_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned());
                    let file = fs::File::open(&path).map_err(ScrapeError::Stream)?;
                    return Ok(Download { stream: Box::new(file), suggested_name });
                }
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::DownloadTimeout);
            }
            std::thread::sleep(DOWNLOAD_POLL_INTERVAL);
        }
    }
}

/// Watches the browser's tab list for targets that were not present when the
/// watcher was registered
pub struct ChromePageWatcher {
    tabs: Arc<Mutex<Vec<Arc<Tab>>>>,
    baseline: HashSet<String>,
    download_dir: Arc<TempDir>,
}

impl PageWatcher for ChromePageWatcher {
    type Page = ChromePage;

    fn wait(&mut self, timeout: Duration) -> Result<Option<ChromePage>> {
        let deadline = Instant::now() + timeout;
        loop {
            let new_tab = {
                let tabs = self
                    .tabs
                    .lock()
                    .map_err(|e| ScrapeError::Engine(format!("tab list poisoned: {}", e)))?;
                tabs.iter()
                    .find(|tab| !self.baseline.contains(tab.get_target_id()))
                    .cloned()
            };
            if let Some(tab) = new_tab {
                return Ok(Some(ChromePage { tab, download_dir: self.download_dir.clone() }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(TAB_POLL_INTERVAL);
        }
    }
}
