//! Artifact sink: key derivation and the durable blob store seam
//!
//! Keys follow the layout the downstream pipeline expects:
//! `{namespace}/{YYYY-MM-DD}/{token}-{file}` with a clock-derived uniqueness
//! token, so concurrent uploads never contend on a key. The store itself is
//! a capability behind [`BlobStore`]; production wires a real object-store
//! client, tests and local runs use the in-memory and filesystem stores here.

use crate::artifact::DownloadArtifact;
use crate::error::{Result, ScrapeError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Content type of the documents the target sites produce
pub const ARTIFACT_CONTENT_TYPE: &str = "application/pdf";

// Tie-breaker for uploads landing within the same millisecond
static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Durable blob store accepting bytes + key, returning a locator.
///
/// Must tolerate concurrent uploads without coordination; every key carries
/// its own uniqueness token.
pub trait BlobStore: Send + Sync {
    fn upload(&self, bytes: &[u8], key: &str, content_type: &str) -> Result<String>;
}

/// Streams a completed download to the blob store under a derived key
pub struct ArtifactSink<S: BlobStore> {
    store: S,
    namespace: String,
}

impl<S: BlobStore> ArtifactSink<S> {
    pub fn new(store: S, namespace: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into() }
    }

    /// Upload the artifact, returning the store's locator
    pub fn store_artifact(&self, artifact: DownloadArtifact, now: DateTime<Utc>) -> Result<String> {
        let token = uniqueness_token(now);
        let file_name = artifact
            .file_name
            .unwrap_or_else(|| format!("{}-{}.pdf", self.namespace, token));
        let key = format!("{}/{}/{}-{}", self.namespace, now.format("%Y-%m-%d"), token, file_name);

        log::info!("uploading {} bytes to {}", artifact.bytes.len(), key);
        let locator = self.store.upload(&artifact.bytes, &key, ARTIFACT_CONTENT_TYPE)?;
        log::info!("uploaded to {}", locator);
        Ok(locator)
    }
}

fn uniqueness_token(now: DateTime<Utc>) -> String {
    let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{}{:03}", now.timestamp_millis(), seq)
}

/// In-memory store for tests; locators use the `store://` scheme
#[derive(Clone)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every subsequent upload fail with the given message
    pub fn fail_uploads(&self, message: impl Into<String>) {
        *self.fail_with.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.into());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap_or_else(|p| p.into_inner()).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> =
            self.objects.lock().unwrap_or_else(|p| p.into_inner()).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryStore {
    fn upload(&self, bytes: &[u8], key: &str, _content_type: &str) -> Result<String> {
        if let Some(message) = self.fail_with.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Err(ScrapeError::Upload(message));
        }
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("store://{}/{}", self.bucket, key))
    }
}

/// Filesystem store for local runs; locators are absolute paths
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for FsStore {
    fn upload(&self, bytes: &[u8], key: &str, _content_type: &str) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScrapeError::Upload(format!("create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(&path, bytes)
            .map_err(|e| ScrapeError::Upload(format!("write {}: {}", path.display(), e)))?;
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn artifact(name: Option<&str>) -> DownloadArtifact {
        DownloadArtifact {
            bytes: b"%PDF-1.4 fake".to_vec(),
            file_name: name.map(String::from),
            from_popup: true,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_key_layout() {
        let store = MemoryStore::new("records");
        let sink = ArtifactSink::new(store.clone(), "chatham-rod");

        let locator = sink.store_artifact(artifact(Some("export.pdf")), fixed_now()).unwrap();

        assert!(locator.starts_with("store://records/chatham-rod/2024-03-15/"));
        assert!(locator.ends_with("-export.pdf"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fallback_file_name_when_none_suggested() {
        let store = MemoryStore::new("records");
        let sink = ArtifactSink::new(store.clone(), "chatham-rod");

        let locator = sink.store_artifact(artifact(None), fixed_now()).unwrap();
        assert!(locator.contains("-chatham-rod-"));
        assert!(locator.ends_with(".pdf"));
    }

    #[test]
    fn test_same_instant_uploads_get_distinct_keys() {
        let store = MemoryStore::new("records");
        let sink = ArtifactSink::new(store.clone(), "chatham-rod");

        let first = sink.store_artifact(artifact(Some("a.pdf")), fixed_now()).unwrap();
        let second = sink.store_artifact(artifact(Some("a.pdf")), fixed_now()).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_upload_failure_propagates() {
        let store = MemoryStore::new("records");
        store.fail_uploads("access denied");
        let sink = ArtifactSink::new(store, "chatham-rod");

        let err = sink.store_artifact(artifact(Some("a.pdf")), fixed_now()).unwrap_err();
        assert!(matches!(err, ScrapeError::Upload(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let sink = ArtifactSink::new(FsStore::new(dir.path()), "chatham-rod");

        let locator = sink.store_artifact(artifact(Some("export.pdf")), fixed_now()).unwrap();
        let written = std::fs::read(&locator).expect("read back");
        assert_eq!(written, b"%PDF-1.4 fake");
    }
}
