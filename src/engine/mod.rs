//! Automation capability seam
//!
//! Everything the workflow engine needs from a browser automation backend is
//! expressed here as the [`AutomationEngine`] trait: session lifecycle, page
//! enumeration, navigation, structural and semantic action resolution, a
//! new-page watcher, and download capture. The engine trait has two
//! implementations:
//! - [`chrome::ChromeEngine`]: the real adapter over Chrome DevTools Protocol
//! - [`scripted::ScriptedEngine`]: a deterministic fake for tests
//!
//! Semantic (natural-language) resolution is an external capability; the
//! trait only forwards instructions and surfaces success or not-found.

pub mod chrome;
pub mod scripted;

pub use chrome::{ChromeEngine, ChromeOptions, SemanticBackend};
pub use scripted::{DownloadLocation, ScriptedEngine, ScriptedPage, SiteScript};

use crate::error::Result;
use std::io::Read;
use std::time::Duration;

/// A precise, markup-dependent reference to a UI element.
///
/// Deterministic and fast when it matches, brittle against site redesigns;
/// semantic instructions are the fallback for the brittle spots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector, e.g. `#TRG_98`
    Css(String),
    /// Visible-text match; `exact` distinguishes whole-text from substring
    Text { text: String, exact: bool },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text { text: text.into(), exact: true }
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Locator::Text { text: text.into(), exact: false }
    }

    /// Stable string form used in logs and by the scripted engine
    pub fn key(&self) -> String {
        match self {
            Locator::Css(selector) => format!("css:{}", selector),
            Locator::Text { text, exact: true } => format!("text:{}", text),
            Locator::Text { text, exact: false } => format!("text~:{}", text),
        }
    }
}

/// Concrete UI action to perform on a resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Click,
    /// Type text into the element, optionally clearing existing content first
    Fill { text: String, clear: bool },
    /// Focus the element and press a key (e.g. "Tab")
    Press(String),
}

/// A completed download: a readable byte stream plus the browser's suggested
/// file name, if any. The stream is drained exactly once by the tracker.
pub struct Download {
    pub stream: Box<dyn Read + Send>,
    pub suggested_name: Option<String>,
}

/// Watches a session for newly opened pages.
///
/// Must be obtained *before* the action that may open the page fires, so a
/// page opened synchronously during the trigger is still observed.
pub trait PageWatcher {
    type Page;

    /// Wait up to `timeout` for a page that did not exist when the watcher
    /// was created. `Ok(None)` means the window elapsed with no new page.
    fn wait(&mut self, timeout: Duration) -> Result<Option<Self::Page>>;
}

/// Browser automation capability consumed by the workflow engine.
///
/// One session per scrape run; all calls are blocking with bounded waits.
pub trait AutomationEngine {
    type Session;
    type Page: Clone;
    type Watcher: PageWatcher<Page = Self::Page>;

    /// Open a fresh browser session. The caller owns it and must pass it to
    /// [`close_session`](Self::close_session) exactly once.
    fn open_session(&self) -> Result<Self::Session>;

    /// Tear the session down, consuming the handle.
    fn close_session(&self, session: Self::Session) -> Result<()>;

    /// The session's original page (the one navigation starts on).
    fn main_page(&self, session: &Self::Session) -> Result<Self::Page>;

    fn navigate(&self, page: &Self::Page, url: &str, timeout: Duration) -> Result<()>;

    /// Attempt a structural locator within a bounded visibility check.
    /// `Ok(true)` means the element was found and the action performed;
    /// `Ok(false)` means it never appeared within `timeout`. `Err` is an
    /// action that resolved but failed to execute.
    fn try_structural(
        &self,
        page: &Self::Page,
        locator: &Locator,
        action: &UiAction,
        timeout: Duration,
    ) -> Result<bool>;

    /// Forward a natural-language instruction to the instruction-following
    /// capability. `Ok(false)` means the capability could not resolve it.
    fn act_semantic(&self, page: &Self::Page, instruction: &str) -> Result<bool>;

    /// Press a key at page scope (no target element), e.g. a save shortcut.
    fn press_key(&self, page: &Self::Page, key: &str) -> Result<()>;

    /// Register a new-page watcher. Registration must happen before the
    /// triggering action executes.
    fn watch_new_pages(&self, session: &Self::Session) -> Result<Self::Watcher>;

    /// Wait up to `timeout` for a download event on `page`.
    fn await_download(&self, page: &Self::Page, timeout: Duration) -> Result<Download>;

    /// Block for a settle delay. Real engines sleep; fakes may skip.
    fn settle(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}
