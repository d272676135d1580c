//! Popup/download tracker
//!
//! Drives the window between "the trigger step fires" and "we hold the full
//! document bytes". Target sites split two ways here: some export via a
//! same-tab download, others open a new-tab print dialog and download from
//! there. The tracker covers both with one path: register a new-page watcher,
//! fire the trigger, attach to whichever page is active, find an export
//! control (or fall back to the save shortcut), and drain the download.
//!
//! The watcher is registered strictly before the trigger executes; a popup
//! opened synchronously during the trigger would otherwise be lost.

use crate::artifact::DownloadArtifact;
use crate::engine::{AutomationEngine, PageWatcher, UiAction};
use crate::error::{Result, ScrapeError};
use crate::workflow::resolve::first_match;
use crate::workflow::ExportPolicy;
use std::io::Read;

/// Tracker progress, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitingTrigger,
    WaitingPopupOrDirect,
    WaitingDownloadOnPopup,
    WaitingDownloadDirect,
    DownloadReceived,
    Streamed,
}

/// Execute the trigger and capture the document it produces.
///
/// `expect_popup` is set for trigger steps tagged as popup-opening: for
/// those, a missing popup is a [`ScrapeError::PopupTimeout`] rather than a
/// fall-through to the original page.
pub fn await_artifact<E: AutomationEngine>(
    engine: &E,
    session: &E::Session,
    page: &E::Page,
    trigger: impl FnOnce() -> Result<()>,
    policy: &ExportPolicy,
    expect_popup: bool,
) -> Result<DownloadArtifact> {
    let mut phase = Phase::WaitingTrigger;
    log::debug!("tracker: {:?}", phase);

    // Registration before trigger is mandatory
    let mut watcher = engine.watch_new_pages(session)?;
    trigger()?;

    phase = Phase::WaitingPopupOrDirect;
    log::debug!("tracker: {:?}", phase);
    let popup = watcher.wait(policy.popup_window)?;
    if popup.is_none() && expect_popup {
        return Err(ScrapeError::PopupTimeout);
    }

    let from_popup = popup.is_some();
    let active = match popup {
        Some(new_page) => {
            log::info!("new page opened by trigger; attaching download wait to it");
            new_page
        }
        None => {
            log::info!("no new page within the popup window; attaching to the original page");
            page.clone()
        }
    };

    phase = if from_popup { Phase::WaitingDownloadOnPopup } else { Phase::WaitingDownloadDirect };
    log::debug!("tracker: {:?}", phase);

    let export_found = first_match(
        engine,
        &active,
        &policy.export_locators,
        policy.export_semantic,
        &UiAction::Click,
        policy.export_check,
    )?;

    let download = if export_found {
        engine.await_download(&active, policy.download_timeout)?
    } else {
        log::info!("no export control found; falling back to {}", policy.shortcut_key);
        engine.press_key(&active, policy.shortcut_key)?;
        engine
            .await_download(&active, policy.shortcut_download_timeout)
            .map_err(|e| match e {
                // Control never found and the shortcut produced nothing
                ScrapeError::DownloadTimeout => ScrapeError::NoArtifact,
                other => other,
            })?
    };

    phase = Phase::DownloadReceived;
    log::debug!("tracker: {:?}", phase);

    let mut stream = download.stream;
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).map_err(ScrapeError::Stream)?;

    phase = Phase::Streamed;
    log::debug!("tracker: {:?} ({} bytes)", phase, bytes.len());

    Ok(DownloadArtifact { bytes, file_name: download.suggested_name, from_popup })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DownloadLocation, Locator, ScriptedEngine, SiteScript};
    use std::time::Duration;

    fn policy() -> ExportPolicy {
        ExportPolicy {
            popup_window: Duration::from_millis(10),
            export_locators: vec![Locator::text("Download"), Locator::text("Save")],
            export_semantic: Some("click the download button"),
            export_check: Duration::from_millis(10),
            shortcut_key: "Control+s",
            download_timeout: Duration::from_millis(10),
            shortcut_download_timeout: Duration::from_millis(10),
        }
    }

    fn trigger_locator() -> Locator {
        Locator::text("Print Checked")
    }

    fn run_trigger<'a>(
        engine: &'a ScriptedEngine,
        page: &'a crate::engine::scripted::ScriptedPage,
    ) -> impl FnOnce() -> Result<()> + 'a {
        move || {
            engine
                .try_structural(page, &trigger_locator(), &UiAction::Click, Duration::ZERO)
                .map(|_| ())
        }
    }

    #[test]
    fn test_popup_path_with_export_control() {
        let export = Locator::text("Download");
        let engine = ScriptedEngine::new(
            SiteScript::new()
                .structural(&trigger_locator())
                .popup_on(trigger_locator().key())
                .structural(&export)
                .arms_download(export.key())
                .download(b"%PDF-popup".to_vec(), Some("export.pdf"), DownloadLocation::Popup),
        );
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let artifact =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), false)
                .unwrap();

        assert_eq!(artifact.bytes, b"%PDF-popup");
        assert_eq!(artifact.file_name.as_deref(), Some("export.pdf"));
        assert!(artifact.from_popup);
    }

    #[test]
    fn test_direct_path_when_no_popup_appears() {
        let export = Locator::text("Download");
        let engine = ScriptedEngine::new(
            SiteScript::new()
                .structural(&trigger_locator())
                .structural(&export)
                .arms_download(export.key())
                .download(b"%PDF-direct".to_vec(), Some("doc.pdf"), DownloadLocation::Direct),
        );
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let artifact =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), false)
                .unwrap();

        assert_eq!(artifact.bytes, b"%PDF-direct");
        assert!(!artifact.from_popup);
    }

    #[test]
    fn test_expected_popup_missing_is_popup_timeout() {
        let engine = ScriptedEngine::new(SiteScript::new().structural(&trigger_locator()));
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let err =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), true)
                .unwrap_err();
        assert!(matches!(err, ScrapeError::PopupTimeout));
    }

    #[test]
    fn test_shortcut_fallback_when_no_export_control() {
        let engine = ScriptedEngine::new(
            SiteScript::new()
                .structural(&trigger_locator())
                .arms_download_on_press()
                .download(b"%PDF-shortcut".to_vec(), None, DownloadLocation::Direct),
        );
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let artifact =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), false)
                .unwrap();

        assert_eq!(engine.pressed_keys(), vec!["Control+s"]);
        assert_eq!(artifact.bytes, b"%PDF-shortcut");
        assert!(artifact.file_name.is_none());
    }

    #[test]
    fn test_no_control_and_dead_shortcut_is_no_artifact() {
        let engine = ScriptedEngine::new(SiteScript::new().structural(&trigger_locator()));
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let err =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), false)
                .unwrap_err();
        assert!(matches!(err, ScrapeError::NoArtifact));
    }

    #[test]
    fn test_export_control_found_but_no_download_is_timeout() {
        let export = Locator::text("Download");
        let engine =
            ScriptedEngine::new(SiteScript::new().structural(&trigger_locator()).structural(&export));
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let err =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), false)
                .unwrap_err();
        assert!(matches!(err, ScrapeError::DownloadTimeout));
    }

    #[test]
    fn test_partial_stream_surfaces_stream_error() {
        let export = Locator::text("Download");
        let engine = ScriptedEngine::new(
            SiteScript::new()
                .structural(&trigger_locator())
                .structural(&export)
                .arms_download(export.key())
                .download(b"%PDF-cut".to_vec(), Some("doc.pdf"), DownloadLocation::Direct)
                .stream_fails(),
        );
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let err =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), false)
                .unwrap_err();
        assert!(matches!(err, ScrapeError::Stream(_)));
    }

    #[test]
    fn test_watcher_registered_before_synchronous_popup() {
        // The trigger opens the popup synchronously inside the closure; the
        // tracker must still observe it.
        let trigger = trigger_locator();
        let engine = ScriptedEngine::new(
            SiteScript::new()
                .structural(&trigger)
                .popup_on(trigger.key())
                .structural(&Locator::text("Download"))
                .arms_download(Locator::text("Download").key())
                .download(b"%PDF".to_vec(), Some("doc.pdf"), DownloadLocation::Popup),
        );
        let session = engine.open_session().unwrap();
        let page = engine.main_page(&session).unwrap();

        let artifact =
            await_artifact(&engine, &session, &page, run_trigger(&engine, &page), &policy(), true)
                .unwrap();
        assert!(artifact.from_popup);
    }
}
