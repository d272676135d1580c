//! Step sequencer
//!
//! Executes a site workflow's steps strictly in order against one session.
//! Each step resolves through the first-match helper (structural candidates,
//! then the semantic fallback), waits out its settle delay, and aborts the
//! sequence on failure; there is no retry or resume. The step tagged with a
//! side effect is handed to the popup/download tracker together with the
//! export policy, and its captured document is the sequencer's result.

use crate::artifact::{tracker, DownloadArtifact};
use crate::config::ScrapeConfig;
use crate::engine::AutomationEngine;
use crate::engine::UiAction;
use crate::error::{Result, ScrapeError};
use crate::workflow::resolve::resolve_step;
use crate::workflow::{
    window_for, FieldValue, SearchWindow, SideEffect, SiteWorkflow, StepAction, WorkflowStep,
    STRUCTURAL_CHECK,
};
use chrono::NaiveDate;

/// Run every step of `workflow` in order and return the captured document.
///
/// `today` anchors the search window; callers inject it so runs are
/// reproducible.
pub fn run<E: AutomationEngine>(
    engine: &E,
    session: &E::Session,
    workflow: &SiteWorkflow,
    config: &ScrapeConfig,
    today: NaiveDate,
) -> Result<DownloadArtifact> {
    if workflow.artifact_step().is_none() {
        return Err(ScrapeError::Config(format!(
            "workflow {} has no artifact-producing step",
            workflow.id
        )));
    }

    let page = engine.main_page(session)?;
    let window = window_for(config.days_back, today);
    log::info!(
        "running workflow {} ({} steps), window {} .. {}",
        workflow.id,
        workflow.steps.len(),
        workflow.date_style.format(window.start),
        workflow.date_style.format(window.end),
    );

    let mut artifact: Option<DownloadArtifact> = None;

    for (index, step) in workflow.steps.iter().enumerate() {
        log::info!("step {}/{}: {}", index + 1, workflow.steps.len(), step.id);

        match &step.action {
            StepAction::Navigate { url } => {
                engine
                    .navigate(&page, url, workflow.navigation_timeout)
                    .map_err(|e| step_failure(step, e))?;
            }
            action => {
                let ui_action = materialize(action, config, workflow, &window);
                if step.effect == SideEffect::None {
                    resolve_step(
                        engine,
                        &page,
                        step.id,
                        &step.locators,
                        step.semantic,
                        &ui_action,
                        STRUCTURAL_CHECK,
                    )?;
                } else {
                    if artifact.is_some() {
                        return Err(ScrapeError::Step {
                            step: step.id.to_string(),
                            reason: "workflow already produced an artifact".to_string(),
                        });
                    }
                    let expect_popup = step.effect == SideEffect::OpensPopup;
                    let captured = tracker::await_artifact(
                        engine,
                        session,
                        &page,
                        || {
                            resolve_step(
                                engine,
                                &page,
                                step.id,
                                &step.locators,
                                step.semantic,
                                &ui_action,
                                STRUCTURAL_CHECK,
                            )
                        },
                        &workflow.export,
                        expect_popup,
                    )?;
                    artifact = Some(captured);
                }
            }
        }

        engine.settle(step.settle);
    }

    // Guarded by the artifact_step check above
    artifact.ok_or_else(|| ScrapeError::Step {
        step: workflow.id.to_string(),
        reason: "sequence completed without capturing a document".to_string(),
    })
}

/// Wrap an engine-level failure as a typed step failure
fn step_failure(step: &WorkflowStep, error: ScrapeError) -> ScrapeError {
    match error {
        // Already step-scoped; keep the original identification
        ScrapeError::ActionNotFound { .. } | ScrapeError::Step { .. } => error,
        other => ScrapeError::Step { step: step.id.to_string(), reason: other.to_string() },
    }
}

/// Materialize a step action into the concrete UI action for this run
fn materialize(
    action: &StepAction,
    config: &ScrapeConfig,
    workflow: &SiteWorkflow,
    window: &SearchWindow,
) -> UiAction {
    match action {
        StepAction::Click => UiAction::Click,
        StepAction::Press(key) => UiAction::Press(key.clone()),
        StepAction::Fill { value, clear } => {
            let text = match value {
                FieldValue::Literal(text) => text.clone(),
                // Verbatim pass-through; site-level quoting quirks are the
                // caller's responsibility
                FieldValue::RecordType => {
                    config.record_type_or(workflow.default_record_type).to_string()
                }
                FieldValue::WindowStart => workflow.date_style.format(window.start),
                FieldValue::WindowEnd => workflow.date_style.format(window.end),
            };
            UiAction::Fill { text, clear: *clear }
        }
        StepAction::Navigate { .. } => unreachable!("navigation handled by the sequencer"),
    }
}
