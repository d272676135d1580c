//! End-to-end runs of the Chatham workflow against scripted fake sites.
//!
//! Every test drives the real sequencer, tracker, sink, and orchestrator;
//! only the browser is faked.

use chrono::{DateTime, TimeZone, Utc};
use rod_scrape::artifact::MemoryStore;
use rod_scrape::engine::{DownloadLocation, Locator, ScriptedEngine, SiteScript};
use rod_scrape::orchestrator::Scraper;
use rod_scrape::{site_workflow, ScrapeConfig};

const PDF_BYTES: &[u8] = b"%PDF-1.4 scripted chatham export";

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

/// A fake Chatham ROD site where every step resolves structurally, the
/// Print Checked step opens a print-preview popup, and the popup's Download
/// button produces the document.
fn chatham_script() -> SiteScript {
    SiteScript::new()
        .structural(&Locator::text_contains("Acknowledge Disclaimer"))
        .structural(&Locator::text("Full System"))
        .structural(&Locator::css("#TRG_98"))
        .structural(&Locator::css("#TRG_99"))
        .structural(&Locator::css("#TRG_95"))
        .structural(&Locator::text("Search"))
        .structural(&Locator::css("#TRG_171 td"))
        .structural(&Locator::text("Print Checked"))
        .popup_on(Locator::text("Print Checked").key())
        .structural(&Locator::text("Download"))
        .arms_download(Locator::text("Download").key())
        .download(PDF_BYTES.to_vec(), Some("chatham-export.pdf"), DownloadLocation::Popup)
}

fn make_scraper(
    script: SiteScript,
) -> (Scraper<ScriptedEngine, MemoryStore>, ScriptedEngine, MemoryStore) {
    let engine = ScriptedEngine::new(script);
    let store = MemoryStore::new("records");
    let workflow = site_workflow("chatham-rod").expect("built-in site");
    let scraper =
        Scraper::new(engine.clone(), store.clone(), workflow).with_clock(fixed_now);
    (scraper, engine, store)
}

fn deed_config() -> ScrapeConfig {
    ScrapeConfig { days_back: 30, record_type: Some("DEED".to_string()) }
}

#[test]
fn scenario_a_successful_run_stores_the_document() {
    let (scraper, engine, store) = make_scraper(chatham_script());

    let result = scraper.execute(&deed_config());

    assert!(result.success, "error: {:?}", result.error);
    let locator = result.locator.expect("locator present on success");
    assert!(
        locator.starts_with("store://records/chatham-rod/2024-03-15/"),
        "unexpected locator {locator}"
    );
    assert!(locator.ends_with("-chatham-export.pdf"), "unexpected locator {locator}");
    assert!(result.error.is_none());

    // The stored object is byte-identical to the download
    let keys = store.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(store.object(&keys[0]).as_deref(), Some(PDF_BYTES));

    assert_eq!(engine.navigations(), vec!["https://www.chathamncrod.org/"]);
    assert_eq!(engine.closed_count(), 1);
}

#[test]
fn scenario_b_unrendered_results_table_aborts_at_that_step() {
    // The select-all cell never appears and its semantic fallback resolves
    // nothing either; everything before it works.
    let script = SiteScript::new()
        .structural(&Locator::text_contains("Acknowledge Disclaimer"))
        .structural(&Locator::text("Full System"))
        .structural(&Locator::css("#TRG_98"))
        .structural(&Locator::css("#TRG_99"))
        .structural(&Locator::css("#TRG_95"))
        .structural(&Locator::text("Search"));
    let (scraper, engine, store) = make_scraper(script);

    let result = scraper.execute(&deed_config());

    assert!(!result.success);
    let error = result.error.expect("error present on failure");
    assert!(error.contains("step select-all failed"), "unexpected error: {error}");
    assert!(result.locator.is_none());
    assert!(store.is_empty());
    assert_eq!(engine.closed_count(), 1);

    // The export step was never reached
    assert!(!engine
        .structural_attempts()
        .contains(&Locator::text("Print Checked").key()));
}

#[test]
fn scenario_c_download_never_fires_maps_to_timeout() {
    // Export control exists but clicking it never produces a download event
    let script = SiteScript::new()
        .structural(&Locator::text_contains("Acknowledge Disclaimer"))
        .structural(&Locator::text("Full System"))
        .structural(&Locator::css("#TRG_98"))
        .structural(&Locator::css("#TRG_99"))
        .structural(&Locator::css("#TRG_95"))
        .structural(&Locator::text("Search"))
        .structural(&Locator::css("#TRG_171 td"))
        .structural(&Locator::text("Print Checked"))
        .popup_on(Locator::text("Print Checked").key())
        .structural(&Locator::text("Download"));
    let (scraper, engine, store) = make_scraper(script);

    let result = scraper.execute(&deed_config());

    assert!(!result.success);
    let error = result.error.expect("error present on failure");
    assert!(error.contains("timeout"), "unexpected error: {error}");
    assert!(store.is_empty());
    assert_eq!(engine.closed_count(), 1);
}

#[test]
fn session_closed_exactly_once_on_every_exit_path() {
    // Success
    let (scraper, engine, _) = make_scraper(chatham_script());
    assert!(scraper.execute(&deed_config()).success);
    assert_eq!(engine.closed_count(), 1);

    // Step failure (nothing on the fake site resolves)
    let (scraper, engine, _) = make_scraper(SiteScript::new());
    assert!(!scraper.execute(&deed_config()).success);
    assert_eq!(engine.closed_count(), 1);

    // Download timeout (export control dead)
    let script = SiteScript::new()
        .structural(&Locator::text_contains("Acknowledge Disclaimer"))
        .structural(&Locator::text("Full System"))
        .structural(&Locator::css("#TRG_98"))
        .structural(&Locator::css("#TRG_99"))
        .structural(&Locator::css("#TRG_95"))
        .structural(&Locator::text("Search"))
        .structural(&Locator::css("#TRG_171 td"))
        .structural(&Locator::text("Print Checked"))
        .popup_on(Locator::text("Print Checked").key())
        .structural(&Locator::text("Download"));
    let (scraper, engine, _) = make_scraper(script);
    assert!(!scraper.execute(&deed_config()).success);
    assert_eq!(engine.closed_count(), 1);

    // Upload failure after a complete capture
    let (scraper, engine, store) = make_scraper(chatham_script());
    store.fail_uploads("bucket gone");
    let result = scraper.execute(&deed_config());
    assert!(!result.success);
    assert!(result.error.expect("error").contains("upload failed"));
    assert_eq!(engine.closed_count(), 1);

    // Invalid config never opens, so nothing to close
    let (scraper, engine, _) = make_scraper(chatham_script());
    let result = scraper.execute(&ScrapeConfig { days_back: 400, record_type: None });
    assert!(!result.success);
    assert_eq!(engine.opened_count(), 0);
    assert_eq!(engine.closed_count(), 0);
}

#[test]
fn semantic_fallback_carries_a_drifted_step() {
    // The select-all cell's markup changed; the natural-language instruction
    // still resolves it. Everything else stays structural.
    let script = SiteScript::new()
        .structural(&Locator::text_contains("Acknowledge Disclaimer"))
        .structural(&Locator::text("Full System"))
        .structural(&Locator::css("#TRG_98"))
        .structural(&Locator::css("#TRG_99"))
        .structural(&Locator::css("#TRG_95"))
        .structural(&Locator::text("Search"))
        .semantic_ok("click the header cell that selects every result row")
        .structural(&Locator::text("Print Checked"))
        .popup_on(Locator::text("Print Checked").key())
        .structural(&Locator::text("Download"))
        .arms_download(Locator::text("Download").key())
        .download(PDF_BYTES.to_vec(), Some("chatham-export.pdf"), DownloadLocation::Popup);
    let (scraper, engine, _) = make_scraper(script);

    let result = scraper.execute(&deed_config());

    assert!(result.success, "error: {:?}", result.error);
    // The semantic path ran for exactly the drifted step
    assert_eq!(
        engine.semantic_calls(),
        vec!["click the header cell that selects every result row"]
    );
    // And only after its structural candidate was probed first
    assert!(engine.structural_attempts().contains(&"css:#TRG_171 td".to_string()));
}

#[test]
fn repeated_execution_is_idempotent_with_distinct_locators() {
    let (scraper, engine, store) = make_scraper(chatham_script());
    let config = deed_config();

    let first = scraper.execute(&config);
    let second = scraper.execute(&config);

    assert!(first.success && second.success);
    let first_locator = first.locator.expect("locator");
    let second_locator = second.locator.expect("locator");
    assert_ne!(first_locator, second_locator, "uniqueness token must differ");

    // Identical content under both keys
    let keys = store.keys();
    assert_eq!(keys.len(), 2);
    assert_eq!(store.object(&keys[0]).as_deref(), Some(PDF_BYTES));
    assert_eq!(store.object(&keys[1]).as_deref(), Some(PDF_BYTES));

    // Two sessions, two closes
    assert_eq!(engine.opened_count(), 2);
    assert_eq!(engine.closed_count(), 2);
}

#[test]
fn record_type_is_sent_verbatim() {
    let (scraper, _engine, _store) = make_scraper(chatham_script());
    // Odd spacing and quoting are passed through untouched; the run still
    // succeeds because the fake field accepts any text.
    let config = ScrapeConfig {
        days_back: 30,
        record_type: Some(" DEED OF TRUST\" ".to_string()),
    };
    assert!(scraper.execute(&config).success);
}
