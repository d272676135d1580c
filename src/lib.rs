//! # rod-scrape
//!
//! Automated retrieval of public land-record documents from county/clerk
//! recordkeeping sites that expose no API. The library drives a browser
//! through a site-specific, multi-step search-and-export workflow, captures
//! the resulting document, and persists it to durable storage.
//!
//! ## How a run works
//!
//! 1. The [`orchestrator::Scraper`] opens one browser session.
//! 2. The step sequencer executes the site's ordered [`workflow`] steps.
//!    Each step resolves through structural locators first (deterministic,
//!    fast) and falls back to a natural-language instruction resolved by an
//!    external automation capability when the markup has drifted.
//! 3. The step tagged with a side effect routes through the popup/download
//!    tracker, which captures the export whether the site downloads in the
//!    same tab or opens a new-tab print dialog.
//! 4. The artifact sink uploads the bytes under a collision-free key and the
//!    session is closed, on every exit path.
//!
//! ## Running a scrape
//!
//! ```rust,no_run
//! use rod_scrape::engine::{ChromeEngine, ChromeOptions};
//! use rod_scrape::artifact::FsStore;
//! use rod_scrape::orchestrator::Scraper;
//! use rod_scrape::{site_workflow, ScrapeConfig};
//!
//! let workflow = site_workflow("chatham-rod").expect("known site");
//! let engine = ChromeEngine::new(ChromeOptions::new().headless(true));
//! let scraper = Scraper::new(engine, FsStore::new("/var/records"), workflow);
//!
//! let result = scraper.execute(&ScrapeConfig::default());
//! if result.success {
//!     println!("stored at {}", result.locator.unwrap());
//! }
//! ```
//!
//! ## Testing against a fake site
//!
//! The [`engine::ScriptedEngine`] plays back scripted outcomes per locator
//! and instruction, so the whole workflow engine runs deterministically
//! without a browser:
//!
//! ```rust
//! use rod_scrape::engine::{ScriptedEngine, SiteScript};
//!
//! let engine = ScriptedEngine::new(SiteScript::new());
//! assert_eq!(engine.opened_count(), 0);
//! ```
//!
//! ## Module overview
//!
//! - [`workflow`]: site workflow definitions, date formatting, the
//!   first-match resolver, and the step sequencer
//! - [`engine`]: the automation capability seam with the Chrome adapter and
//!   the deterministic scripted fake
//! - [`artifact`]: popup/download tracking and the storage sink
//! - [`orchestrator`]: session lifecycle and the terminal result
//! - [`error`]: error taxonomy and result alias

pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod workflow;

pub use artifact::{ArtifactSink, BlobStore, DownloadArtifact, FsStore, MemoryStore};
pub use config::{ScrapeConfig, ScrapeResult, MAX_DAYS_BACK};
pub use engine::{AutomationEngine, Locator, UiAction};
pub use error::{Result, ScrapeError};
pub use orchestrator::Scraper;
pub use workflow::{site_workflow, DateStyle, SiteWorkflow, WorkflowStep};
