//! First-match action resolution
//!
//! The same pattern recurs at every fragile point of a site workflow: try an
//! ordered list of structural locators first (deterministic and fast), and
//! only when every one of them misses, hand the natural-language instruction
//! to the semantic capability. This module is the single implementation of
//! that precedence; steps and the export policy both go through it.

use crate::engine::{AutomationEngine, Locator, UiAction};
use crate::error::{Result, ScrapeError};
use std::time::Duration;

/// Try structural candidates in order, then the semantic fallback.
///
/// Returns `Ok(true)` once any path performs the action, `Ok(false)` when
/// every candidate missed and the semantic instruction (if any) could not be
/// resolved either. Execution failures of a *resolved* action propagate.
pub fn first_match<E: AutomationEngine>(
    engine: &E,
    page: &E::Page,
    candidates: &[Locator],
    semantic: Option<&str>,
    action: &UiAction,
    check: Duration,
) -> Result<bool> {
    for locator in candidates {
        if engine.try_structural(page, locator, action, check)? {
            log::debug!("resolved structurally via {}", locator.key());
            return Ok(true);
        }
    }
    if let Some(instruction) = semantic {
        log::debug!("structural candidates exhausted, trying semantic: {}", instruction);
        if engine.act_semantic(page, instruction)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// First-match resolution for a workflow step; a miss on both paths is a
/// typed failure naming the step.
pub fn resolve_step<E: AutomationEngine>(
    engine: &E,
    page: &E::Page,
    step_id: &str,
    candidates: &[Locator],
    semantic: Option<&str>,
    action: &UiAction,
    check: Duration,
) -> Result<()> {
    if first_match(engine, page, candidates, semantic, action, check)? {
        Ok(())
    } else {
        Err(ScrapeError::ActionNotFound { step: step_id.to_string() })
    }
}
