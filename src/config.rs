//! Run configuration and the terminal result value

use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};

/// Widest search window a caller may request, in days
pub const MAX_DAYS_BACK: u32 = 365;

fn default_days_back() -> u32 {
    30
}

/// Caller-supplied configuration for one scrape run.
///
/// Immutable once a run starts. `record_type` is passed through to the site
/// verbatim; quoting or format quirks are the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeConfig {
    /// How many days back the search window reaches (1..=365, default 30)
    #[serde(default = "default_days_back")]
    pub days_back: u32,

    /// Instrument/record type filter; site default used when absent
    #[serde(default)]
    pub record_type: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self { days_back: default_days_back(), record_type: None }
    }
}

impl ScrapeConfig {
    /// Validate caller input; rejected configs never open a browser session
    pub fn validate(&self) -> Result<()> {
        if self.days_back == 0 {
            return Err(ScrapeError::Config("daysBack must be at least 1".to_string()));
        }
        if self.days_back > MAX_DAYS_BACK {
            return Err(ScrapeError::Config(format!(
                "daysBack must be at most {}, got {}",
                MAX_DAYS_BACK, self.days_back
            )));
        }
        if let Some(rt) = &self.record_type {
            if rt.trim().is_empty() {
                return Err(ScrapeError::Config("recordType must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Effective record type, falling back to the site default
    pub fn record_type_or<'a>(&'a self, site_default: &'a str) -> &'a str {
        self.record_type.as_deref().unwrap_or(site_default)
    }
}

/// Terminal value returned to the caller for every run.
///
/// `locator` is present iff `success`; `error` is present iff not. The
/// constructors are the only way to build one, which keeps the fields
/// mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub success: bool,

    /// Durable storage locator of the uploaded document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,

    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn success(locator: String) -> Self {
        Self { success: true, locator: Some(locator), error: None }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self { success: false, locator: None, error: Some(error.to_string()) }
    }
}
