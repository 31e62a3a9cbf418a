//! Three-way conflict detection for concurrent edits.
//!
//! Two sessions editing one record race at write time: each holds the
//! snapshot it last read (`base`), submits a sparse `patch`, and may
//! find the collaborator already carrying someone else's write
//! (`current`). [`resolve`] compares the three shapes field by field:
//!
//! - the server changed a field the patch leaves alone: the server's
//!   value is folded into the merged patch;
//! - the patch changes a field the server left alone: the edit applies
//!   cleanly;
//! - both changed it, to different values: a true conflict, reported
//!   with all three values;
//! - both changed it to the same value: agreement, not a conflict.
//!
//! The `sections` map gets the same rule key by key, one level deep, so
//! two sessions editing different sections merge without anyone
//! choosing. Timestamps are stamping machinery, not content; they never
//! participate in the merge. `resolve` is a pure function of its three
//! snapshots; retrying and persisting are the client's business.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{CaseStudyRecord, FieldEdit, RecordPatch, Section, SectionKey};

/// How true conflicts are settled when no user is in the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Hand the report back; the caller decides.
    #[default]
    Manual,
    /// Conflicted fields keep the collaborator's current values.
    ServerWins,
    /// Conflicted fields take the patch's values.
    ClientWins,
}

/// Names the field a conflict was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictField {
    Title,
    Description,
    HeroImageRef,
    Status,
    Section(SectionKey),
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Title => f.write_str("title"),
            ConflictField::Description => f.write_str("description"),
            ConflictField::HeroImageRef => f.write_str("hero_image_ref"),
            ConflictField::Status => f.write_str("status"),
            ConflictField::Section(key) => write!(f, "sections.{key}"),
        }
    }
}

/// One field whose base, current and patch values all diverge. Values
/// are carried as JSON so a resolution UI can show any field the same
/// way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: ConflictField,
    pub base_value: Value,
    pub current_value: Value,
    pub patch_value: Value,
}

impl FieldConflict {
    fn of<T: Serialize>(field: ConflictField, base: &T, current: &T, patch: &T) -> Self {
        FieldConflict {
            field,
            base_value: to_value(base),
            current_value: to_value(current),
            patch_value: to_value(patch),
        }
    }
}

/// What three-way comparison found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// False means every divergence merged cleanly and
    /// `auto_merged_patch` can be resubmitted as-is.
    pub has_conflicts: bool,
    /// The clean part of the merge: the patch's unconflicted edits plus
    /// the server's newer values for fields the patch left alone.
    pub auto_merged_patch: RecordPatch,
    /// True conflicts needing a decision, in field order.
    pub conflicts: Vec<FieldConflict>,
}

impl ConflictReport {
    /// The merge with every true conflict settled in the server's
    /// favor. Conflicted fields drop out of the patch, so what is
    /// stored stays.
    pub fn server_wins_patch(&self) -> RecordPatch {
        self.auto_merged_patch.clone()
    }

    /// The merge with every true conflict settled in the client's
    /// favor, restoring the conflicted edits from `original`.
    pub fn client_wins_patch(&self, original: &RecordPatch) -> RecordPatch {
        let mut patch = self.auto_merged_patch.clone();
        for conflict in &self.conflicts {
            match conflict.field {
                ConflictField::Title => patch.title = original.title.clone(),
                ConflictField::Description => patch.description = original.description.clone(),
                ConflictField::HeroImageRef => {
                    patch.hero_image_ref = original.hero_image_ref.clone();
                }
                ConflictField::Status => patch.status = original.status,
                ConflictField::Section(key) => {
                    if let Some(section) = original.sections.get(&key) {
                        patch.sections.insert(key, section.clone());
                    }
                }
            }
        }
        patch
    }
}

/// Compare `base` (what the patch author last read), `current` (what
/// storage holds now) and `patch` (the author's edits), producing the
/// merged patch and any true conflicts.
pub fn resolve(
    base: &CaseStudyRecord,
    current: &CaseStudyRecord,
    patch: &RecordPatch,
) -> ConflictReport {
    let mut merged = RecordPatch::new();
    let mut conflicts = Vec::new();

    merged.title = three_way(
        ConflictField::Title,
        &base.title,
        &current.title,
        patch.title.as_ref(),
        &mut conflicts,
    );
    merged.description = three_way(
        ConflictField::Description,
        &base.description,
        &current.description,
        patch.description.as_ref(),
        &mut conflicts,
    );

    let hero_edit: Option<Option<String>> = match &patch.hero_image_ref {
        FieldEdit::Keep => None,
        FieldEdit::Set(url) => Some(Some(url.clone())),
        FieldEdit::Clear => Some(None),
    };
    merged.hero_image_ref = match three_way(
        ConflictField::HeroImageRef,
        &base.hero_image_ref,
        &current.hero_image_ref,
        hero_edit.as_ref(),
        &mut conflicts,
    ) {
        Some(Some(url)) => FieldEdit::Set(url),
        Some(None) => FieldEdit::Clear,
        None => FieldEdit::Keep,
    };

    merged.status = three_way(
        ConflictField::Status,
        &base.status,
        &current.status,
        patch.status.as_ref(),
        &mut conflicts,
    );

    let keys: BTreeSet<SectionKey> = base
        .sections
        .keys()
        .chain(current.sections.keys())
        .chain(patch.sections.keys())
        .copied()
        .collect();
    for key in keys {
        let base_section = base.sections.get(&key).cloned();
        let current_section = current.sections.get(&key).cloned();
        let patched: Option<Option<Section>> = patch.sections.get(&key).map(|s| Some(s.clone()));
        match three_way(
            ConflictField::Section(key),
            &base_section,
            &current_section,
            patched.as_ref(),
            &mut conflicts,
        ) {
            Some(Some(section)) => {
                merged.sections.insert(key, section);
            }
            // nothing to carry: untouched, or already absent from the
            // stored record
            Some(None) | None => {}
        }
    }

    ConflictReport {
        has_conflicts: !conflicts.is_empty(),
        auto_merged_patch: merged,
        conflicts,
    }
}

/// One field's verdict. `patched` is `None` when the patch leaves the
/// field alone. Returns what the merged patch should carry for it, or
/// `None` with a recorded conflict.
fn three_way<T>(
    field: ConflictField,
    base: &T,
    current: &T,
    patched: Option<&T>,
    conflicts: &mut Vec<FieldConflict>,
) -> Option<T>
where
    T: Clone + PartialEq + Serialize,
{
    let server_changed = current != base;
    match patched {
        None => {
            if server_changed {
                Some(current.clone())
            } else {
                None
            }
        }
        Some(value) => {
            if !server_changed || value == current {
                Some(value.clone())
            } else if value == base {
                // the patch re-states what its author last read; the
                // server's newer value wins
                Some(current.clone())
            } else {
                conflicts.push(FieldConflict::of(field, base, current, value));
                None
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
