//! casebook: persistence core for case-study content.
//!
//! A storage-agnostic optimistic-concurrency layer: records carry their
//! last-write timestamp as a lock token, every write is verified by
//! re-reading it back, concurrent edits are detected and three-way
//! merged, and every durable change is announced on a notification bus.
//!
//! ```ignore
//! use casebook::{CaseStudyDraft, InMemoryRecordStore, PersistenceClient, WriteOutcome};
//!
//! let client = PersistenceClient::new(InMemoryRecordStore::new());
//! match client.create(&CaseStudyDraft::new("Acme rebrand")).await? {
//!     WriteOutcome::Saved(record) => println!("saved as {}", record.id),
//!     WriteOutcome::Invalid(report) => eprintln!("rejected: {report}"),
//!     WriteOutcome::Conflict { .. } => unreachable!("creates cannot conflict"),
//! }
//! ```

mod bus;
mod client;
pub mod conflict;
mod record;
mod store;
pub mod timestamp;
pub mod validate;

pub use bus::{EventBus, Subscription};
pub use client::{
    topics, ChangeEvent, ClientConfig, PersistError, PersistenceClient, WriteOutcome,
};
pub use conflict::{ConflictField, ConflictPolicy, ConflictReport, FieldConflict};
pub use record::{
    CaseStudyDraft, CaseStudyRecord, FieldEdit, RecordPatch, Section, SectionKey, Status,
    UnknownSectionKey, UnknownStatus,
};
pub use store::{
    ImageStore, ImageUpload, InMemoryImageStore, InMemoryRecordStore, RecordStore, StoreError,
    UploadedImage,
};
pub use validate::{FieldError, ValidationReport};
