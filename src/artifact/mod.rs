//! Download artifact capture and persistence
//!
//! The tracker turns a trigger step into a fully buffered document; the sink
//! derives a collision-free storage key and hands the bytes to the durable
//! blob store.

pub mod sink;
pub mod tracker;

pub use sink::{ArtifactSink, BlobStore, FsStore, MemoryStore};
pub use tracker::await_artifact;

/// The downloaded document produced by a successful workflow run.
///
/// Produced at most once per run; ownership moves straight to the sink, which
/// either uploads it or fails the run. It is never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub bytes: Vec<u8>,
    /// File name the browser suggested, when it suggested one
    pub file_name: Option<String>,
    /// Whether the download came off a popup page rather than the main page
    pub from_popup: bool,
}
