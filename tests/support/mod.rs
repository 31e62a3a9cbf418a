//! Instrumented collaborators for driving the failure paths.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use casebook::{
    topics, CaseStudyDraft, CaseStudyRecord, ChangeEvent, EventBus, ImageStore, ImageUpload,
    InMemoryRecordStore, RecordPatch, RecordStore, Section, SectionKey, StoreError, UploadedImage,
};

/// A draft most tests start from.
pub fn draft() -> CaseStudyDraft {
    CaseStudyDraft::new("Acme rebrand")
        .with_description("Full identity refresh for Acme Co")
        .with_section(
            SectionKey::Overview,
            Section::enabled().with_body("Where the brand started"),
        )
        .with_section(
            SectionKey::Problem,
            Section::enabled().with_body("Nobody could find the portfolio"),
        )
}

/// Subscribe to every client topic, recording topic names in delivery
/// order.
pub fn record_topics(bus: &EventBus<ChangeEvent>) -> Arc<Mutex<Vec<&'static str>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for topic in [
        topics::RECORD_CREATED,
        topics::RECORD_UPDATED,
        topics::RECORD_CONFLICT,
    ] {
        let seen = Arc::clone(&seen);
        bus.subscribe(topic, move |event: &ChangeEvent| {
            seen.lock().unwrap().push(event.topic());
        });
    }
    seen
}

/// Store whose first `drops` creates are acknowledged and then vanish,
/// the way the old dashboard lost case studies.
pub struct VanishingStore {
    inner: InMemoryRecordStore,
    drops_remaining: Mutex<u32>,
    pub create_calls: AtomicU32,
}

impl VanishingStore {
    pub fn dropping(drops: u32) -> Self {
        VanishingStore {
            inner: InMemoryRecordStore::new(),
            drops_remaining: Mutex::new(drops),
            create_calls: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }

    fn should_drop(&self) -> bool {
        let mut remaining = self.drops_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl RecordStore for VanishingStore {
    async fn create_record(
        &self,
        draft: &CaseStudyDraft,
        created_at: &str,
        updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let record = self
            .inner
            .create_record(draft, created_at, updated_at)
            .await?;
        if self.should_drop() {
            self.inner.remove(&record.id);
        }
        Ok(record)
    }

    async fn update_record(
        &self,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.inner.update_record(id, patch).await
    }

    async fn get_record(&self, id: &str) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.inner.get_record(id).await
    }
}

/// Store whose reads lag its writes: once a record has been updated,
/// `get_record` keeps serving the pre-update revision for the next
/// `stale_reads` calls.
pub struct StaleReadStore {
    inner: InMemoryRecordStore,
    stale: Mutex<Option<CaseStudyRecord>>,
    stale_reads_remaining: Mutex<u32>,
    pub update_calls: AtomicU32,
    pub get_calls: AtomicU32,
}

impl StaleReadStore {
    pub fn lagging_by(stale_reads: u32) -> Self {
        StaleReadStore {
            inner: InMemoryRecordStore::new(),
            stale: Mutex::new(None),
            stale_reads_remaining: Mutex::new(stale_reads),
            update_calls: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
        }
    }

    pub fn lagging_forever() -> Self {
        StaleReadStore::lagging_by(u32::MAX)
    }

    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }
}

#[async_trait]
impl RecordStore for StaleReadStore {
    async fn create_record(
        &self,
        draft: &CaseStudyDraft,
        created_at: &str,
        updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError> {
        self.inner.create_record(draft, created_at, updated_at).await
    }

    async fn update_record(
        &self,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let before = self.inner.get_record(id).await?;
        let result = self.inner.update_record(id, patch).await?;
        if result.is_some() {
            // keep the revision from before the first write; the lagging
            // replica never catches up mid-test
            let mut stale = self.stale.lock().unwrap();
            if stale.is_none() {
                *stale = before;
            }
        }
        Ok(result)
    }

    async fn get_record(&self, id: &str) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = self.stale_reads_remaining.lock().unwrap();
            if *remaining > 0 {
                let stale = self.stale.lock().unwrap();
                if let Some(record) = stale.as_ref().filter(|record| record.id == id) {
                    *remaining -= 1;
                    return Ok(Some(record.clone()));
                }
            }
        }
        self.inner.get_record(id).await
    }
}

/// Store whose first `failures` calls, whatever the operation, fail as
/// unavailable, then recover.
pub struct FlakyStore {
    inner: InMemoryRecordStore,
    failures_remaining: Mutex<u32>,
    pub calls: AtomicU32,
}

impl FlakyStore {
    pub fn failing(failures: u32) -> Self {
        FlakyStore {
            inner: InMemoryRecordStore::new(),
            failures_remaining: Mutex::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }

    fn gate(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.failures_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            Err(StoreError::Unavailable("injected outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create_record(
        &self,
        draft: &CaseStudyDraft,
        created_at: &str,
        updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError> {
        self.gate()?;
        self.inner.create_record(draft, created_at, updated_at).await
    }

    async fn update_record(
        &self,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.gate()?;
        self.inner.update_record(id, patch).await
    }

    async fn get_record(&self, id: &str) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.gate()?;
        self.inner.get_record(id).await
    }
}

/// Store that never answers. Pair with a paused clock to drive the
/// request timeout.
#[derive(Default)]
pub struct HangingStore;

#[async_trait]
impl RecordStore for HangingStore {
    async fn create_record(
        &self,
        _draft: &CaseStudyDraft,
        _created_at: &str,
        _updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError> {
        std::future::pending().await
    }

    async fn update_record(
        &self,
        _id: &str,
        _patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError> {
        std::future::pending().await
    }

    async fn get_record(&self, _id: &str) -> Result<Option<CaseStudyRecord>, StoreError> {
        std::future::pending().await
    }
}

/// Store that fails every call with a poisoned lock, which must surface
/// immediately instead of being retried.
#[derive(Default)]
pub struct BrokenLockStore {
    pub calls: AtomicU32,
}

#[async_trait]
impl RecordStore for BrokenLockStore {
    async fn create_record(
        &self,
        _draft: &CaseStudyDraft,
        _created_at: &str,
        _updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::LockPoisoned("create_record"))
    }

    async fn update_record(
        &self,
        _id: &str,
        _patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::LockPoisoned("update_record"))
    }

    async fn get_record(&self, _id: &str) -> Result<Option<CaseStudyRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::LockPoisoned("get_record"))
    }
}

/// Image store that answers with a blank serving URL.
#[derive(Default)]
pub struct BlankUrlImageStore;

#[async_trait]
impl ImageStore for BlankUrlImageStore {
    async fn upload_image(&self, _upload: &ImageUpload) -> Result<UploadedImage, StoreError> {
        Ok(UploadedImage {
            url: "   ".to_string(),
        })
    }
}
