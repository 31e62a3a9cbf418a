//! The persistence client.
//!
//! Every write follows one spine: validate, stamp, submit, re-fetch,
//! verify. The re-fetch step exists because the system this replaces
//! lost content to writes that were acknowledged and then not there on
//! the next read; the client refuses to report success until storage
//! reads back what it was given. A stale `updated_at` token means
//! another session wrote first; those writes go through three-way
//! resolution. Clean merges are rebased and retried on the spot, while
//! true conflicts fall to the configured [`ConflictPolicy`]. Every
//! durable change and every detected race is announced on the
//! notification bus.

mod error;
mod events;

pub use error::PersistError;
pub use events::{topics, ChangeEvent};

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::bus::EventBus;
use crate::conflict::{self, ConflictPolicy, ConflictReport};
use crate::record::{CaseStudyDraft, CaseStudyRecord, RecordPatch};
use crate::store::{ImageStore, ImageUpload, RecordStore, StoreError};
use crate::timestamp;
use crate::validate::{self, ValidationReport};

/// Tunables for timeouts, retries, and conflict handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Ceiling on a single collaborator call before it counts as
    /// unavailable.
    pub request_timeout: Duration,
    /// Attempts per collaborator call, first try included.
    pub transport_attempts: u32,
    /// Delay before the second transport attempt; doubles each retry,
    /// plateauing at 2^16 times the base.
    pub backoff_base: Duration,
    /// Submit, re-fetch and compare cycles before a write is declared
    /// unverifiable.
    pub verify_attempts: u32,
    /// Times a stale write is rebased and retried before the latest
    /// report is handed back.
    pub merge_retries: u32,
    /// How true conflicts are settled when no user is in the loop.
    pub conflict_policy: ConflictPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_timeout: Duration::from_secs(10),
            transport_attempts: 3,
            backoff_base: Duration::from_millis(300),
            verify_attempts: 3,
            merge_retries: 3,
            conflict_policy: ConflictPolicy::Manual,
        }
    }
}

impl ClientConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_transport_attempts(mut self, attempts: u32) -> Self {
        self.transport_attempts = attempts;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_verify_attempts(mut self, attempts: u32) -> Self {
        self.verify_attempts = attempts;
        self
    }

    pub fn with_merge_retries(mut self, retries: u32) -> Self {
        self.merge_retries = retries;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

/// Outcome of a `create` or `update`. Only `Saved` means the write
/// landed; the other arms are expected states the caller branches on,
/// not errors.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    /// The write landed and verification read it back. The record is
    /// the re-fetched copy; its `updated_at` is the caller's next
    /// token.
    Saved(CaseStudyRecord),
    /// Validation rejected the content before any write left the
    /// process.
    Invalid(ValidationReport),
    /// A concurrent edit needs a decision, or the record kept moving
    /// through every merge retry. `current` is the collaborator's
    /// record and the base for any retry.
    Conflict {
        current: CaseStudyRecord,
        report: ConflictReport,
    },
}

impl WriteOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, WriteOutcome::Saved(_))
    }

    /// The saved record, when there is one.
    pub fn saved(&self) -> Option<&CaseStudyRecord> {
        match self {
            WriteOutcome::Saved(record) => Some(record),
            _ => None,
        }
    }
}

/// Client for one storage collaborator plus a notification bus.
pub struct PersistenceClient<S> {
    store: S,
    bus: EventBus<ChangeEvent>,
    config: ClientConfig,
}

impl<S: RecordStore> PersistenceClient<S> {
    /// Client with the default configuration and a fresh bus.
    pub fn new(store: S) -> Self {
        PersistenceClient::with_config(store, ClientConfig::default())
    }

    pub fn with_config(store: S, config: ClientConfig) -> Self {
        PersistenceClient {
            store,
            bus: EventBus::new(),
            config,
        }
    }

    /// Publish on an existing bus instead of this client's own, so
    /// several clients can share one subscriber set.
    pub fn with_bus(mut self, bus: EventBus<ChangeEvent>) -> Self {
        self.bus = bus;
        self
    }

    /// The bus this client announces changes on.
    pub fn bus(&self) -> &EventBus<ChangeEvent> {
        &self.bus
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The wrapped storage collaborator.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a record from a draft: validate, stamp, submit, then
    /// verify by re-fetching until storage reads back what was sent.
    pub async fn create(&self, draft: &CaseStudyDraft) -> Result<WriteOutcome, PersistError> {
        let report = validate::validate_draft(draft);
        if !report.is_valid() {
            tracing::debug!("create of '{}' rejected: {}", draft.title, report);
            return Ok(WriteOutcome::Invalid(report));
        }

        let (created_at, updated_at) = timestamp::draft_stamps(draft);
        let verify_attempts = self.config.verify_attempts.max(1);
        let mut last_id = String::new();

        for attempt in 1..=verify_attempts {
            let submitted = self
                .with_retry("create_record", || {
                    self.store.create_record(draft, &created_at, &updated_at)
                })
                .await?;

            let fetched = self
                .with_retry("get_record", || self.store.get_record(&submitted.id))
                .await?;
            match fetched {
                Some(record) if draft_matches(&record, draft) => {
                    self.announce(ChangeEvent::Created(record.clone()));
                    return Ok(WriteOutcome::Saved(record));
                }
                _ => tracing::warn!(
                    "create of record {} did not read back (attempt {}/{}), resubmitting",
                    submitted.id,
                    attempt,
                    verify_attempts
                ),
            }
            last_id = submitted.id;
        }

        tracing::error!(
            "create of record {} failed verification after {} attempts",
            last_id,
            verify_attempts
        );
        Err(PersistError::VerificationFailed {
            id: last_id,
            attempts: verify_attempts,
        })
    }

    /// Update the record `base` was read from. `base` is the snapshot
    /// the patch was authored against; its `updated_at` is the
    /// optimistic-lock token. When the stored token has moved on, the
    /// write is resolved three-ways against the current record: clean
    /// merges are rebased and retried here, true conflicts come back as
    /// [`WriteOutcome::Conflict`] unless a policy settles them.
    pub async fn update(
        &self,
        base: &CaseStudyRecord,
        patch: &RecordPatch,
    ) -> Result<WriteOutcome, PersistError> {
        let mut base = base.clone();
        let mut patch = patch.clone();
        let mut merge_rounds = 0u32;

        loop {
            let current = self.fetch_current(&base.id).await?;

            let report = validate::validate_record(&patch.apply_to(&current));
            if !report.is_valid() {
                tracing::debug!("update of record {} rejected: {}", current.id, report);
                return Ok(WriteOutcome::Invalid(report));
            }

            if current.updated_at == base.updated_at {
                return self.submit_update(&current, &patch).await;
            }

            // another session wrote since this patch's base was read
            let conflict_report = conflict::resolve(&base, &current, &patch);
            self.announce(ChangeEvent::Conflict {
                id: current.id.clone(),
                report: conflict_report.clone(),
            });

            let next_patch = if !conflict_report.has_conflicts {
                tracing::debug!(
                    "update of record {} rebased cleanly onto revision {}",
                    current.id,
                    current.updated_at
                );
                conflict_report.auto_merged_patch.clone()
            } else {
                match self.config.conflict_policy {
                    ConflictPolicy::Manual => {
                        return Ok(WriteOutcome::Conflict {
                            current,
                            report: conflict_report,
                        });
                    }
                    ConflictPolicy::ServerWins => conflict_report.server_wins_patch(),
                    ConflictPolicy::ClientWins => conflict_report.client_wins_patch(&patch),
                }
            };

            if merge_rounds >= self.config.merge_retries {
                tracing::warn!(
                    "update of record {} kept racing newer revisions, giving up after {} merge rounds",
                    current.id,
                    merge_rounds
                );
                return Ok(WriteOutcome::Conflict {
                    current,
                    report: conflict_report,
                });
            }
            merge_rounds += 1;
            base = current;
            patch = next_patch;
        }
    }

    /// Read the current stored record.
    pub async fn fetch(&self, id: &str) -> Result<CaseStudyRecord, PersistError> {
        self.fetch_current(id).await
    }

    /// Upload image bytes to the image collaborator and hand back the
    /// serving URL, checked non-blank and ready to store in
    /// `hero_image_ref`. The bytes themselves are never validated here.
    pub async fn upload_hero_image<I: ImageStore>(
        &self,
        images: &I,
        upload: &ImageUpload,
    ) -> Result<String, PersistError> {
        let uploaded = self
            .with_retry("upload_image", || images.upload_image(upload))
            .await?;
        let url = uploaded.url.trim();
        if url.is_empty() {
            tracing::error!("image upload of {} came back with a blank url", upload.file_name);
            return Err(PersistError::BadImageUrl {
                file_name: upload.file_name.clone(),
            });
        }
        Ok(url.to_string())
    }

    /// Submit a token-checked update and verify it by re-fetching. The
    /// stamp advances past the newest one seen on every resubmission, so
    /// `updated_at` never moves backwards.
    async fn submit_update(
        &self,
        current: &CaseStudyRecord,
        patch: &RecordPatch,
    ) -> Result<WriteOutcome, PersistError> {
        let expected = patch.apply_to(current);
        let verify_attempts = self.config.verify_attempts.max(1);
        let mut token = current.updated_at.clone();

        for attempt in 1..=verify_attempts {
            let mut stamped = patch.clone();
            token = timestamp::next_after(&token);
            stamped.updated_at = Some(token.clone());

            let written = self
                .with_retry("update_record", || {
                    self.store.update_record(&current.id, &stamped)
                })
                .await?;
            if written.is_none() {
                return Err(PersistError::NotFound {
                    id: current.id.clone(),
                });
            }

            let fetched = self
                .with_retry("get_record", || self.store.get_record(&current.id))
                .await?;
            match fetched {
                Some(record) if record.content_eq(&expected) => {
                    self.announce(ChangeEvent::Updated(record.clone()));
                    return Ok(WriteOutcome::Saved(record));
                }
                _ => tracing::warn!(
                    "update of record {} did not read back (attempt {}/{}), resubmitting",
                    current.id,
                    attempt,
                    verify_attempts
                ),
            }
        }

        tracing::error!(
            "update of record {} failed verification after {} attempts",
            current.id,
            verify_attempts
        );
        Err(PersistError::VerificationFailed {
            id: current.id.clone(),
            attempts: verify_attempts,
        })
    }

    async fn fetch_current(&self, id: &str) -> Result<CaseStudyRecord, PersistError> {
        self.with_retry("get_record", || self.store.get_record(id))
            .await?
            .ok_or_else(|| PersistError::NotFound { id: id.to_string() })
    }

    /// Run one collaborator call under the request timeout, retrying
    /// transient failures with doubling backoff.
    async fn with_retry<T, Fut>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Fut,
    ) -> Result<T, PersistError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.config.transport_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                // doubles per retry, plateauing once the exponent hits 16
                let delay = self
                    .config
                    .backoff_base
                    .saturating_mul(2u32.pow((attempt - 2).min(16)));
                sleep(delay).await;
            }
            let outcome = match timeout(self.config.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Unavailable(format!(
                    "{operation} timed out after {:?}",
                    self.config.request_timeout
                ))),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    tracing::warn!("{} attempt {}/{} failed: {}", operation, attempt, attempts, err);
                    last = Some(err);
                }
                Err(err) => return Err(PersistError::Store(err)),
            }
        }

        let last =
            last.unwrap_or_else(|| StoreError::Unavailable("no attempt made".to_string()));
        tracing::error!("{} unavailable after {} attempts: {}", operation, attempts, last);
        Err(PersistError::StorageUnavailable {
            operation,
            attempts,
            last,
        })
    }

    fn announce(&self, event: ChangeEvent) {
        self.bus.publish(event.topic(), &event);
    }
}

fn draft_matches(record: &CaseStudyRecord, draft: &CaseStudyDraft) -> bool {
    record.title == draft.title
        && record.description == draft.description
        && record.hero_image_ref == draft.hero_image_ref
        && record.sections == draft.sections
        && record.status == draft.status
}
