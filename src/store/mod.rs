//! Collaborator contracts.
//!
//! The storage collaborator persists records with per-record atomic
//! writes and nothing more: no locking, no versioning, no
//! compare-and-set. Staleness is detected entirely by the persistence
//! client, which re-reads and compares `updated_at` tokens. The image
//! collaborator turns uploaded bytes into serving URLs; records only
//! ever store the URL.

mod in_memory;

pub use in_memory::{InMemoryImageStore, InMemoryRecordStore};

use std::fmt;

use async_trait::async_trait;

use crate::record::{CaseStudyDraft, CaseStudyRecord, RecordPatch};

/// Error type for collaborator operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure, upstream outage, or timeout. The client
    /// retries these with backoff.
    Unavailable(String),
    /// A lock guarding an in-process backend was poisoned. Not retried.
    LockPoisoned(&'static str),
}

impl StoreError {
    /// Whether the client should retry the call.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            StoreError::LockPoisoned(op) => write!(f, "lock poisoned during {op}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The persistent record service.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record. The store assigns the id and echoes the
    /// stamps it was given.
    async fn create_record(
        &self,
        draft: &CaseStudyDraft,
        created_at: &str,
        updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError>;

    /// Apply a sparse patch to an existing record, returning the stored
    /// result, or `None` when no record has that id.
    async fn update_record(
        &self,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError>;

    /// Fetch the currently stored record, if any.
    async fn get_record(&self, id: &str) -> Result<Option<CaseStudyRecord>, StoreError>;
}

/// An image ready for upload. The bytes are opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        ImageUpload {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// A stored image: where the CDN serves it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
}

/// The image CDN.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload_image(&self, upload: &ImageUpload) -> Result<UploadedImage, StoreError>;
}
