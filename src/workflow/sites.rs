//! Built-in site workflow definitions
//!
//! Each county recordkeeping site gets one [`SiteWorkflow`]; the sequencer is
//! shared. Settle delays here are calibrated against the live sites: the
//! post-search table render and the select-all repopulation are the known
//! slow, signal-free operations and carry the long waits.

use crate::engine::Locator;
use crate::workflow::{
    DateStyle, ExportPolicy, FieldValue, SideEffect, SiteWorkflow, StepAction, WorkflowStep,
};
use std::time::Duration;

/// Look up a built-in workflow by site identifier
pub fn site_workflow(site: &str) -> Option<SiteWorkflow> {
    match site {
        "chatham-rod" => Some(chatham_rod()),
        _ => None,
    }
}

/// Identifiers of all built-in sites
pub fn known_sites() -> &'static [&'static str] {
    &["chatham-rod"]
}

/// Chatham County (NC) Register of Deeds full-system search and export.
///
/// The form fields keep stable element ids (`TRG_*`) across sessions, so
/// structural locators lead; the navigation links and buttons are text-matched
/// and carry semantic fallbacks since their markup has shifted before.
pub fn chatham_rod() -> SiteWorkflow {
    let steps = vec![
        WorkflowStep::new(
            "navigate",
            StepAction::Navigate { url: "https://www.chathamncrod.org/".to_string() },
        )
        .settle(Duration::from_secs(2)),
        WorkflowStep::new("acknowledge-disclaimer", StepAction::Click)
            .locator(Locator::text_contains("Acknowledge Disclaimer"))
            .semantic("click the link that acknowledges the disclaimer and enters the site")
            .settle(Duration::from_secs(3)),
        WorkflowStep::new("full-system", StepAction::Click)
            .locator(Locator::text("Full System"))
            .semantic("click the Full System search link")
            .settle(Duration::from_secs(3)),
        WorkflowStep::new(
            "start-date",
            StepAction::Fill { value: FieldValue::WindowStart, clear: true },
        )
        .locator(Locator::css("#TRG_98"))
        .semantic("enter the start date into the recorded-date From field"),
        // Tabbing out of the field commits the typed date
        WorkflowStep::new("start-date-commit", StepAction::Press("Tab".to_string()))
            .locator(Locator::css("#TRG_98"))
            .settle(Duration::from_secs(1)),
        // The site defaults the end date to today when tabbed through
        WorkflowStep::new("end-date-commit", StepAction::Press("Tab".to_string()))
            .locator(Locator::css("#TRG_99"))
            .settle(Duration::from_millis(500)),
        WorkflowStep::new(
            "record-type",
            StepAction::Fill { value: FieldValue::RecordType, clear: false },
        )
        .locator(Locator::css("#TRG_95"))
        .semantic("enter the instrument type into the instrument type field")
        .settle(Duration::from_millis(1500)),
        WorkflowStep::new("search", StepAction::Click)
            .locator(Locator::text("Search"))
            .semantic("click the Search button to run the search")
            // Results table renders via AJAX with no completion signal
            .settle(Duration::from_secs(15)),
        WorkflowStep::new("select-all", StepAction::Click)
            .locator(Locator::css("#TRG_171 td"))
            .semantic("click the header cell that selects every result row")
            // Checking hundreds of rows repopulates the table slowly
            .settle(Duration::from_secs(20)),
        WorkflowStep::new("print-checked", StepAction::Click)
            .locator(Locator::text("Print Checked"))
            .semantic("click the Print Checked button to export the selected documents")
            .effect(SideEffect::TriggersDownload),
    ];

    SiteWorkflow {
        id: "chatham-rod",
        steps,
        date_style: DateStyle::MonthDayYear,
        default_record_type: "DEED",
        storage_namespace: "chatham-rod",
        export: ExportPolicy {
            popup_window: Duration::from_secs(15),
            export_locators: vec![
                Locator::text("Download"),
                Locator::text("Save"),
                Locator::text("Print"),
            ],
            export_semantic: Some("click the download or save button on the print preview"),
            export_check: Duration::from_secs(5),
            shortcut_key: "Control+s",
            download_timeout: Duration::from_secs(60),
            shortcut_download_timeout: Duration::from_secs(30),
        },
        navigation_timeout: Duration::from_secs(60),
    }
}
