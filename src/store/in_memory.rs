//! In-memory collaborators for tests and single-process use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::record::{CaseStudyDraft, CaseStudyRecord, RecordPatch};

use super::{ImageStore, ImageUpload, RecordStore, StoreError, UploadedImage};

/// HashMap-backed record store. Clones share storage, so several
/// clients holding clones behave like several sessions talking to one
/// service.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, CaseStudyRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        InMemoryRecordStore::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a record directly, bypassing the client. Stands in for
    /// another actor (a second tab, a SQL console) mutating storage.
    pub fn put(&self, record: CaseStudyRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.id.clone(), record);
        }
    }

    /// Drop a record outright. Deletion has no conflict semantics, so
    /// it lives on the store rather than the client.
    pub fn remove(&self, id: &str) -> bool {
        self.records
            .write()
            .map(|mut records| records.remove(id).is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_record(
        &self,
        draft: &CaseStudyDraft,
        created_at: &str,
        updated_at: &str,
    ) -> Result<CaseStudyRecord, StoreError> {
        let record = CaseStudyRecord {
            id: Uuid::new_v4().to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            hero_image_ref: draft.hero_image_ref.clone(),
            sections: draft.sections.clone(),
            status: draft.status,
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
        };
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("create_record"))?;
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<CaseStudyRecord>, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("update_record"))?;
        match records.get(id) {
            Some(stored) => {
                let next = patch.apply_to(stored);
                records.insert(id.to_string(), next.clone());
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    async fn get_record(&self, id: &str) -> Result<Option<CaseStudyRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("get_record"))?;
        Ok(records.get(id).cloned())
    }
}

/// Image store handing back deterministic fake CDN URLs. Keeps every
/// upload so tests can assert on what went over the wire.
#[derive(Clone, Default)]
pub struct InMemoryImageStore {
    uploads: Arc<RwLock<Vec<ImageUpload>>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        InMemoryImageStore::default()
    }

    /// Everything uploaded so far, oldest first.
    pub fn uploads(&self) -> Vec<ImageUpload> {
        self.uploads.read().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn upload_image(&self, upload: &ImageUpload) -> Result<UploadedImage, StoreError> {
        let url = format!("https://images.test/{}/{}", Uuid::new_v4(), upload.file_name);
        let mut uploads = self
            .uploads
            .write()
            .map_err(|_| StoreError::LockPoisoned("upload_image"))?;
        uploads.push(upload.clone());
        Ok(UploadedImage { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Section, SectionKey};

    fn draft() -> CaseStudyDraft {
        CaseStudyDraft::new("Acme rebrand")
            .with_description("Identity refresh")
            .with_section(SectionKey::Overview, Section::enabled().with_body("Before"))
    }

    #[tokio::test]
    async fn create_assigns_distinct_ids_and_echoes_stamps() {
        let store = InMemoryRecordStore::new();
        let a = store
            .create_record(&draft(), "2026-08-01T09:00:00.000Z", "2026-08-01T09:00:00.000Z")
            .await
            .unwrap();
        let b = store
            .create_record(&draft(), "2026-08-01T09:00:01.000Z", "2026-08-01T09:00:01.000Z")
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, "2026-08-01T09:00:00.000Z");
        assert_eq!(a.updated_at, "2026-08-01T09:00:00.000Z");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn update_applies_the_patch_to_the_stored_record() {
        let store = InMemoryRecordStore::new();
        let created = store
            .create_record(&draft(), "2026-08-01T09:00:00.000Z", "2026-08-01T09:00:00.000Z")
            .await
            .unwrap();

        let patch = RecordPatch::new().with_title("Acme rebrand, year two");
        let updated = store.update_record(&created.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.title, "Acme rebrand, year two");
        assert_eq!(updated.description, created.description);

        let fetched = store.get_record(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn missing_records_come_back_as_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.get_record("nope").await.unwrap().is_none());
        assert!(store
            .update_record("nope", &RecordPatch::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = InMemoryRecordStore::new();
        let other_session = store.clone();

        let created = store
            .create_record(&draft(), "2026-08-01T09:00:00.000Z", "2026-08-01T09:00:00.000Z")
            .await
            .unwrap();

        let seen = other_session.get_record(&created.id).await.unwrap();
        assert_eq!(seen, Some(created));
    }

    #[tokio::test]
    async fn remove_drops_the_record() {
        let store = InMemoryRecordStore::new();
        let created = store
            .create_record(&draft(), "2026-08-01T09:00:00.000Z", "2026-08-01T09:00:00.000Z")
            .await
            .unwrap();

        assert!(store.remove(&created.id));
        assert!(!store.remove(&created.id));
        assert!(store.get_record(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn image_uploads_return_distinct_urls() {
        let images = InMemoryImageStore::new();
        let upload = ImageUpload::new("hero.png", "image/png", vec![1, 2, 3]);

        let a = images.upload_image(&upload).await.unwrap();
        let b = images.upload_image(&upload).await.unwrap();

        assert_ne!(a.url, b.url);
        assert!(a.url.ends_with("/hero.png"));
        assert_eq!(images.uploads().len(), 2);
    }
}
