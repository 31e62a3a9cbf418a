//! Pre-submission validation.
//!
//! The shape rules of the original dashboard (status must be a known
//! state, sections must carry an `enabled` flag) are enforced here by
//! the type system at the serde boundary; what remains are the data
//! rules a type cannot express. Validation is pure: no I/O, input never
//! mutated, same report for the same value every time. A failed report
//! never aborts the process; callers branch on it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{CaseStudyDraft, CaseStudyRecord, Section, SectionKey};
use crate::timestamp;

/// Longest accepted title, in characters.
pub const TITLE_MAX_CHARS: usize = 200;

/// One failed rule, naming the field it failed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Everything wrong with a draft or record, one entry per failed rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("valid");
        }
        let joined: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&joined.join("; "))
    }
}

/// Check a draft before creation.
pub fn validate_draft(draft: &CaseStudyDraft) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_title(&draft.title, &mut report);
    check_hero_image_ref(draft.hero_image_ref.as_deref(), &mut report);
    check_sections(&draft.sections, &mut report);
    if let Some(ts) = &draft.created_at {
        if !timestamp::is_valid(ts) {
            report.push("created_at", "is not a valid ISO-8601 timestamp");
        }
    }
    report
}

/// Check a full record shape, e.g. the merged form an update would
/// leave behind.
pub fn validate_record(record: &CaseStudyRecord) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_title(&record.title, &mut report);
    check_hero_image_ref(record.hero_image_ref.as_deref(), &mut report);
    check_sections(&record.sections, &mut report);
    report
}

fn check_title(title: &str, report: &mut ValidationReport) {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        report.push("title", "is required and must not be empty");
    } else if trimmed.chars().count() > TITLE_MAX_CHARS {
        report.push(
            "title",
            format!("must be at most {TITLE_MAX_CHARS} characters"),
        );
    }
}

fn check_hero_image_ref(url: Option<&str>, report: &mut ValidationReport) {
    if let Some(url) = url {
        if url.trim().is_empty() {
            report.push("hero_image_ref", "must not be blank when present");
        }
    }
}

fn check_sections(sections: &BTreeMap<SectionKey, Section>, report: &mut ValidationReport) {
    for (key, section) in sections {
        for (index, entry) in section.media.iter().enumerate() {
            if entry.trim().is_empty() {
                report.push(
                    format!("sections.{key}.media[{index}]"),
                    "must not be blank",
                );
            }
        }
    }
}
