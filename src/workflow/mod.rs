//! Workflow definitions and the step sequencer
//!
//! A [`SiteWorkflow`] is read-only configuration for one target site: the
//! ordered step list, the date shape its search form expects, its default
//! record type, and the export policy the popup/download tracker applies at
//! the artifact step. The sequencer executes any site's workflow; per-site
//! differences live entirely in the definition.

pub mod dates;
pub mod resolve;
pub mod sequencer;
pub mod sites;

pub use dates::{window_for, DateStyle, SearchWindow};
pub use sites::site_workflow;

use crate::engine::Locator;
use std::time::Duration;

/// Bounded visibility check applied to each structural candidate
pub const STRUCTURAL_CHECK: Duration = Duration::from_secs(5);

/// Value a fill step materializes at run time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Fixed text baked into the workflow
    Literal(String),
    /// Caller's record type, passed through verbatim
    RecordType,
    /// Search-window start, formatted per the site's [`DateStyle`]
    WindowStart,
    /// Search-window end, formatted per the site's [`DateStyle`]
    WindowEnd,
}

/// What a step does once its target element resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Load a URL on the main page; needs no locator
    Navigate { url: String },
    Click,
    Fill { value: FieldValue, clear: bool },
    /// Focus the target element and press a key
    Press(String),
}

/// Expected side effect of a step; non-`None` routes the step through the
/// popup/download tracker and marks it as the artifact-producing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    OpensPopup,
    TriggersDownload,
}

/// One ordered unit of a site workflow
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub id: &'static str,
    pub action: StepAction,
    /// Structural candidates, tried in order with a bounded check each
    pub locators: Vec<Locator>,
    /// Natural-language fallback, consulted only after every candidate misses
    pub semantic: Option<&'static str>,
    /// Wait after a successful action, for page updates with no observable
    /// completion signal (AJAX re-render, calendar popups)
    pub settle: Duration,
    pub effect: SideEffect,
}

impl WorkflowStep {
    pub fn new(id: &'static str, action: StepAction) -> Self {
        Self {
            id,
            action,
            locators: Vec::new(),
            semantic: None,
            settle: Duration::ZERO,
            effect: SideEffect::None,
        }
    }

    pub fn locator(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    pub fn semantic(mut self, instruction: &'static str) -> Self {
        self.semantic = Some(instruction);
        self
    }

    pub fn settle(mut self, delay: Duration) -> Self {
        self.settle = delay;
        self
    }

    pub fn effect(mut self, effect: SideEffect) -> Self {
        self.effect = effect;
        self
    }
}

/// How the tracker obtains the document once the trigger step has fired
#[derive(Debug, Clone)]
pub struct ExportPolicy {
    /// Bounded wait for a new page after the trigger
    pub popup_window: Duration,
    /// Explicit export controls to try on the active page, in order
    pub export_locators: Vec<Locator>,
    /// Natural-language fallback for the export control
    pub export_semantic: Option<&'static str>,
    /// Visibility check per export candidate
    pub export_check: Duration,
    /// Save-shortcut key pressed when no export control is found
    pub shortcut_key: &'static str,
    /// Overall bounded wait for the download event
    pub download_timeout: Duration,
    /// Shorter wait applied after the shortcut fallback
    pub shortcut_download_timeout: Duration,
}

/// Read-only workflow configuration for one target site
#[derive(Debug, Clone)]
pub struct SiteWorkflow {
    pub id: &'static str,
    pub steps: Vec<WorkflowStep>,
    pub date_style: DateStyle,
    pub default_record_type: &'static str,
    /// Storage namespace the sink partitions this site's documents under
    pub storage_namespace: &'static str,
    pub export: ExportPolicy,
    pub navigation_timeout: Duration,
}

impl SiteWorkflow {
    /// The single artifact-producing step, if the workflow has one
    pub fn artifact_step(&self) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| step.effect != SideEffect::None)
    }
}
