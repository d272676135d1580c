//! Deterministic fake automation engine
//!
//! Plays back scripted outcomes per locator key / instruction string, so the
//! workflow engine can be exercised without a browser. Settle delays are
//! skipped and waits return immediately, keeping tests fast. The engine also
//! counts session opens/closes and records every resolution attempt, which is
//! what the lifecycle and fallback-order properties assert against.

use crate::engine::{AutomationEngine, Download, Locator, PageWatcher, UiAction};
use crate::error::{Result, ScrapeError};
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Where the scripted site serves its download from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadLocation {
    /// Same-tab export: the download fires on the original page
    Direct,
    /// New-tab print dialog: the download only fires on the popup page
    Popup,
}

/// Scripted behavior of a fake site
#[derive(Clone, Default)]
pub struct SiteScript {
    /// Locator keys ([`Locator::key`]) that resolve on the fake site
    structural: HashSet<String>,
    /// Scripted outcome per semantic instruction; absent = resolution fails
    semantic: HashMap<String, bool>,
    /// Keys/instructions whose action opens a new page
    popup_on: HashSet<String>,
    /// Keys/instructions whose action arms the download
    arms_download: HashSet<String>,
    /// Whether a page-scope key press arms the download
    arms_on_press: bool,
    download: Option<(Vec<u8>, Option<String>, DownloadLocation)>,
    /// Fail the download stream partway through the read
    stream_fails: bool,
    close_error: Option<String>,
}

impl SiteScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structural(mut self, locator: &Locator) -> Self {
        self.structural.insert(locator.key());
        self
    }

    pub fn semantic_ok(mut self, instruction: impl Into<String>) -> Self {
        self.semantic.insert(instruction.into(), true);
        self
    }

    pub fn semantic_unresolved(mut self, instruction: impl Into<String>) -> Self {
        self.semantic.insert(instruction.into(), false);
        self
    }

    /// Acting on this key or instruction opens a new page
    pub fn popup_on(mut self, key: impl Into<String>) -> Self {
        self.popup_on.insert(key.into());
        self
    }

    /// Acting on this key or instruction makes the download available
    pub fn arms_download(mut self, key: impl Into<String>) -> Self {
        self.arms_download.insert(key.into());
        self
    }

    /// A page-scope key press (the save-shortcut fallback) arms the download
    pub fn arms_download_on_press(mut self) -> Self {
        self.arms_on_press = true;
        self
    }

    pub fn download(
        mut self,
        bytes: impl Into<Vec<u8>>,
        name: Option<&str>,
        location: DownloadLocation,
    ) -> Self {
        self.download = Some((bytes.into(), name.map(String::from), location));
        self
    }

    pub fn stream_fails(mut self) -> Self {
        self.stream_fails = true;
        self
    }

    pub fn close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }
}

/// Fake page handle; id 0 is always the session's main page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedPage {
    pub id: usize,
}

pub struct ScriptedSession {
    _id: usize,
}

#[derive(Default)]
struct EngineState {
    pages: Vec<ScriptedPage>,
    next_page_id: usize,
    download_armed: bool,
    opened: usize,
    closed: usize,
    structural_attempts: Vec<String>,
    semantic_calls: Vec<String>,
    pressed_keys: Vec<String>,
    navigations: Vec<String>,
}

/// Deterministic automation engine driven by a [`SiteScript`]
#[derive(Clone)]
pub struct ScriptedEngine {
    script: SiteScript,
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    pub fn new(script: SiteScript) -> Self {
        Self { script, state: Arc::new(Mutex::new(EngineState::default())) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_side_effects(&self, key: &str, state: &mut EngineState) {
        if self.script.popup_on.contains(key) {
            state.next_page_id += 1;
            let page = ScriptedPage { id: state.next_page_id };
            state.pages.push(page);
        }
        if self.script.arms_download.contains(key) {
            state.download_armed = true;
        }
    }

    // Introspection used by lifecycle/ordering property tests

    pub fn opened_count(&self) -> usize {
        self.lock().opened
    }

    pub fn closed_count(&self) -> usize {
        self.lock().closed
    }

    pub fn structural_attempts(&self) -> Vec<String> {
        self.lock().structural_attempts.clone()
    }

    pub fn semantic_calls(&self) -> Vec<String> {
        self.lock().semantic_calls.clone()
    }

    pub fn pressed_keys(&self) -> Vec<String> {
        self.lock().pressed_keys.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }
}

impl AutomationEngine for ScriptedEngine {
    type Session = ScriptedSession;
    type Page = ScriptedPage;
    type Watcher = ScriptedWatcher;

    fn open_session(&self) -> Result<ScriptedSession> {
        let mut state = self.lock();
        state.opened += 1;
        state.pages = vec![ScriptedPage { id: 0 }];
        state.next_page_id = 0;
        state.download_armed = false;
        Ok(ScriptedSession { _id: state.opened })
    }

    fn close_session(&self, _session: ScriptedSession) -> Result<()> {
        let mut state = self.lock();
        state.closed += 1;
        match &self.script.close_error {
            Some(message) => Err(ScrapeError::SessionClose(message.clone())),
            None => Ok(()),
        }
    }

    fn main_page(&self, _session: &ScriptedSession) -> Result<ScriptedPage> {
        Ok(ScriptedPage { id: 0 })
    }

    fn navigate(&self, _page: &ScriptedPage, url: &str, _timeout: Duration) -> Result<()> {
        self.lock().navigations.push(url.to_string());
        Ok(())
    }

    fn try_structural(
        &self,
        _page: &ScriptedPage,
        locator: &Locator,
        _action: &UiAction,
        _timeout: Duration,
    ) -> Result<bool> {
        let key = locator.key();
        let mut state = self.lock();
        state.structural_attempts.push(key.clone());
        if self.script.structural.contains(&key) {
            self.apply_side_effects(&key, &mut state);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn act_semantic(&self, _page: &ScriptedPage, instruction: &str) -> Result<bool> {
        let mut state = self.lock();
        state.semantic_calls.push(instruction.to_string());
        match self.script.semantic.get(instruction) {
            Some(true) => {
                self.apply_side_effects(instruction, &mut state);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn press_key(&self, _page: &ScriptedPage, key: &str) -> Result<()> {
        let mut state = self.lock();
        state.pressed_keys.push(key.to_string());
        if self.script.arms_on_press {
            state.download_armed = true;
        }
        Ok(())
    }

    fn watch_new_pages(&self, _session: &ScriptedSession) -> Result<ScriptedWatcher> {
        let baseline = self.lock().pages.iter().map(|p| p.id).collect();
        Ok(ScriptedWatcher { state: self.state.clone(), baseline })
    }

    fn await_download(&self, page: &ScriptedPage, _timeout: Duration) -> Result<Download> {
        let armed = self.lock().download_armed;
        let (bytes, name, location) = match &self.script.download {
            Some(configured) if armed => configured.clone(),
            _ => return Err(ScrapeError::DownloadTimeout),
        };
        let on_right_page = match location {
            DownloadLocation::Direct => page.id == 0,
            DownloadLocation::Popup => page.id != 0,
        };
        if !on_right_page {
            return Err(ScrapeError::DownloadTimeout);
        }
        let stream: Box<dyn Read + Send> = if self.script.stream_fails {
            Box::new(FailingReader { remaining: bytes })
        } else {
            Box::new(Cursor::new(bytes))
        };
        Ok(Download { stream, suggested_name: name })
    }

    // Scripted runs never sleep
    fn settle(&self, _delay: Duration) {}
}

/// Sees pages added after the watcher was registered, including pages added
/// synchronously by the triggering action itself
pub struct ScriptedWatcher {
    state: Arc<Mutex<EngineState>>,
    baseline: HashSet<usize>,
}

impl PageWatcher for ScriptedWatcher {
    type Page = ScriptedPage;

    fn wait(&mut self, _timeout: Duration) -> Result<Option<ScriptedPage>> {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(state.pages.iter().find(|p| !self.baseline.contains(&p.id)).cloned())
    }
}

/// Yields half the payload, then fails; models a connection cut mid-stream
struct FailingReader {
    remaining: Vec<u8>,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Fail before the tail of the payload is ever delivered
        if self.remaining.len() <= 1 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream cut mid-read"));
        }
        let take = (self.remaining.len() / 2).max(1).min(buf.len());
        buf[..take].copy_from_slice(&self.remaining[..take]);
        self.remaining.drain(..take);
        Ok(take)
    }
}
