//! Canonical shapes for case-study content.
//!
//! One typed record replaces the ad-hoc per-page field mappings of a
//! content dashboard: new records enter as a [`CaseStudyDraft`], edits
//! travel as a sparse [`RecordPatch`], and everything read back from
//! storage is a [`CaseStudyRecord`]. The `updated_at` stamp on a record
//! doubles as the optimistic-lock token: writers submit the stamp they
//! last read, and a mismatch means another session got there first.

mod section;

pub use section::{Section, SectionKey, UnknownSectionKey};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Publication state of a case study.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
    Archived,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Draft, Status::Published, Status::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Published => "published",
            Status::Archived => "archived",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Status::Draft),
            "published" => Ok(Status::Published),
            "archived" => Ok(Status::Archived),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Error returned when a status string is not one of the known states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// A persisted case study, exactly as the storage collaborator returns
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudyRecord {
    /// Storage-assigned identifier, opaque to this crate.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Serving URL of the hero image, if one was uploaded.
    pub hero_image_ref: Option<String>,
    pub sections: BTreeMap<SectionKey, Section>,
    pub status: Status,
    /// ISO-8601, set once at creation.
    pub created_at: String,
    /// ISO-8601, refreshed on every successful write. The lock token.
    pub updated_at: String,
}

impl CaseStudyRecord {
    /// Field-wise equality over content, ignoring `id`, `created_at`
    /// and `updated_at`. Post-write verification compares the submitted
    /// shape against the re-fetched record with this.
    pub fn content_eq(&self, other: &CaseStudyRecord) -> bool {
        self.title == other.title
            && self.description == other.description
            && self.hero_image_ref == other.hero_image_ref
            && self.sections == other.sections
            && self.status == other.status
    }

    /// Sections that should appear in rendered output, in page order.
    /// Disabled sections are held back but never dropped from the data.
    pub fn visible_sections(&self) -> impl Iterator<Item = (SectionKey, &Section)> {
        self.sections
            .iter()
            .filter(|(_, section)| section.enabled)
            .map(|(key, section)| (*key, section))
    }
}

/// Input for creating a record. Carries no `id` (storage assigns one)
/// and no `updated_at` (the client stamps every write). `created_at` is
/// honored when an import flow supplies it and minted otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStudyDraft {
    pub title: String,
    pub description: String,
    pub hero_image_ref: Option<String>,
    pub sections: BTreeMap<SectionKey, Section>,
    pub status: Status,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl CaseStudyDraft {
    pub fn new(title: impl Into<String>) -> Self {
        CaseStudyDraft {
            title: title.into(),
            ..CaseStudyDraft::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hero_image(mut self, url: impl Into<String>) -> Self {
        self.hero_image_ref = Some(url.into());
        self
    }

    pub fn with_section(mut self, key: SectionKey, section: Section) -> Self {
        self.sections.insert(key, section);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}

/// Three-state edit for a clearable field: leave it alone, set a value,
/// or clear it. A plain `Option` cannot say "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEdit<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> FieldEdit<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldEdit::Keep)
    }

    /// The value this edit would leave behind, given what is stored now.
    pub fn resolve(&self, stored: &Option<T>) -> Option<T>
    where
        T: Clone,
    {
        match self {
            FieldEdit::Keep => stored.clone(),
            FieldEdit::Set(value) => Some(value.clone()),
            FieldEdit::Clear => None,
        }
    }
}

/// A sparse edit against one record. `None` fields are untouched.
/// Sections are replaced whole per key and never removed; hiding a
/// section is an edit that keeps its content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hero_image_ref: FieldEdit<String>,
    #[serde(default)]
    pub sections: BTreeMap<SectionKey, Section>,
    #[serde(default)]
    pub status: Option<Status>,
    /// Stamped by the persistence client just before submission; never
    /// set by callers.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RecordPatch {
    pub fn new() -> Self {
        RecordPatch::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_hero_image(mut self, url: impl Into<String>) -> Self {
        self.hero_image_ref = FieldEdit::Set(url.into());
        self
    }

    pub fn clearing_hero_image(mut self) -> Self {
        self.hero_image_ref = FieldEdit::Clear;
        self
    }

    pub fn with_section(mut self, key: SectionKey, section: Section) -> Self {
        self.sections.insert(key, section);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// True when the patch edits nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.hero_image_ref.is_keep()
            && self.sections.is_empty()
            && self.status.is_none()
    }

    /// The record this patch would leave behind when applied to
    /// `record`. Untouched fields carry over; patched sections replace
    /// their key whole; `updated_at` is taken from the patch when
    /// stamped.
    pub fn apply_to(&self, record: &CaseStudyRecord) -> CaseStudyRecord {
        let mut next = record.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        next.hero_image_ref = self.hero_image_ref.resolve(&record.hero_image_ref);
        for (key, section) in &self.sections {
            next.sections.insert(*key, section.clone());
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(updated_at) = &self.updated_at {
            next.updated_at = updated_at.clone();
        }
        next
    }
}
