//! Scrape orchestrator
//!
//! Owns the session lifecycle for one run: open, run the sequencer, upload
//! the captured document, and close the session on every exit path. The
//! session handle is consumed by the close call, so it cannot be closed twice
//! or leak past the run. Close failure is logged and never overrides the
//! primary result. Every internal error is converted to a `ScrapeResult`;
//! callers always receive a value, never a raised fault.

use crate::artifact::{ArtifactSink, BlobStore};
use crate::config::{ScrapeConfig, ScrapeResult};
use crate::engine::AutomationEngine;
use crate::error::Result;
use crate::workflow::{sequencer, SiteWorkflow};
use chrono::{DateTime, Utc};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One configured scraper: an automation engine, a blob store, and the
/// workflow for a single target site. Stateless between `execute` calls;
/// each call gets its own session.
pub struct Scraper<E: AutomationEngine, S: BlobStore> {
    engine: E,
    sink: ArtifactSink<S>,
    workflow: SiteWorkflow,
    clock: Clock,
}

impl<E: AutomationEngine, S: BlobStore> Scraper<E, S> {
    pub fn new(engine: E, store: S, workflow: SiteWorkflow) -> Self {
        let sink = ArtifactSink::new(store, workflow.storage_namespace);
        Self { engine, sink, workflow, clock: Box::new(Utc::now) }
    }

    /// Inject the clock that anchors the search window and storage keys
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run one scrape. Always returns a terminal [`ScrapeResult`]; the
    /// session opened for the run is closed exactly once on every path.
    pub fn execute(&self, config: &ScrapeConfig) -> ScrapeResult {
        if let Err(e) = config.validate() {
            log::warn!("rejecting config before session open: {}", e);
            return ScrapeResult::failure(e);
        }

        log::info!("starting scrape of {} (daysBack={})", self.workflow.id, config.days_back);
        let session = match self.engine.open_session() {
            Ok(session) => session,
            Err(e) => {
                log::error!("session open failed: {}", e);
                return ScrapeResult::failure(e);
            }
        };

        let outcome = self.run_to_upload(&session, config);

        // Guaranteed cleanup; a failed close never changes the outcome
        if let Err(e) = self.engine.close_session(session) {
            log::warn!("session close failed (result unaffected): {}", e);
        }

        match outcome {
            Ok(locator) => {
                log::info!("scrape of {} succeeded: {}", self.workflow.id, locator);
                ScrapeResult::success(locator)
            }
            Err(e) => {
                log::error!("scrape of {} failed: {}", self.workflow.id, e);
                ScrapeResult::failure(e)
            }
        }
    }

    /// Sequence and upload; any failure short-circuits before the upload
    fn run_to_upload(&self, session: &E::Session, config: &ScrapeConfig) -> Result<String> {
        let now = (self.clock)();
        let artifact =
            sequencer::run(&self.engine, session, &self.workflow, config, now.date_naive())?;
        self.sink.store_artifact(artifact, now)
    }
}
