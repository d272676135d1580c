//! Error types for the scrape workflow engine

use thiserror::Error;

/// Errors produced while running a scrape workflow
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Caller-supplied configuration was rejected before a session opened
    #[error("invalid config: {0}")]
    Config(String),

    /// A step's instruction could not be resolved, structurally or semantically
    #[error("step {step} failed: no structural candidate matched and semantic resolution failed")]
    ActionNotFound { step: String },

    /// A step's action resolved but its execution failed or timed out
    #[error("step {step} failed: {reason}")]
    Step { step: String, reason: String },

    /// No new page appeared within the bounded popup window
    #[error("popup window elapsed without a new page")]
    PopupTimeout,

    /// No download event fired within the bounded download wait
    #[error("download timeout: no download event within the bounded wait")]
    DownloadTimeout,

    /// The export control was never found and the shortcut fallback produced nothing
    #[error("no artifact: export control not found and save shortcut produced no download")]
    NoArtifact,

    /// The download byte stream failed before it was fully drained
    #[error("download stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// The durable store rejected or failed the upload
    #[error("upload failed: {0}")]
    Upload(String),

    /// Browser/automation engine failure outside any single step
    #[error("automation engine error: {0}")]
    Engine(String),

    /// Session cleanup failure; logged by the orchestrator, never fails a run
    #[error("session close failed: {0}")]
    SessionClose(String),
}

/// Result type alias for scrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_names_the_step() {
        let err = ScrapeError::Step {
            step: "select-all".to_string(),
            reason: "results table never rendered".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("step select-all failed"));
        assert!(msg.contains("results table never rendered"));
    }

    #[test]
    fn test_download_timeout_mentions_timeout() {
        assert!(ScrapeError::DownloadTimeout.to_string().contains("timeout"));
    }

    #[test]
    fn test_stream_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "cut short");
        let err: ScrapeError = io.into();
        assert!(matches!(err, ScrapeError::Stream(_)));
    }
}
