//! ISO-8601 timestamp tokens.
//!
//! Records carry their stamps as strings end to end, matching what the
//! storage collaborator serves. `updated_at` doubles as the
//! optimistic-lock token: a writer hands back the stamp it last read,
//! and the client treats any mismatch as a concurrent edit. Comparison
//! parses both sides and treats anything unparseable as "not newer", so
//! a corrupt stamp can never get a record judged stale and overwritten.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::record::CaseStudyDraft;

/// Current UTC time as an ISO-8601 string with millisecond precision,
/// e.g. `2026-08-22T14:03:07.512Z`.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether `ts` parses as an ISO-8601 instant.
pub fn is_valid(ts: &str) -> bool {
    parse(ts).is_some()
}

/// Whether `a` strictly post-dates `b`. False when either side fails to
/// parse.
pub fn is_newer(a: &str, b: &str) -> bool {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// A stamp strictly newer than `prev`: the current time, or `prev` plus
/// one millisecond when the clock has not moved past it. Keeps
/// `updated_at` advancing even for writes that land within one
/// millisecond of each other.
pub fn next_after(prev: &str) -> String {
    let candidate = now();
    if is_newer(&candidate, prev) {
        return candidate;
    }
    match parse(prev) {
        Some(instant) => {
            (instant + Duration::milliseconds(1)).to_rfc3339_opts(SecondsFormat::Millis, true)
        }
        None => candidate,
    }
}

/// The `(created_at, updated_at)` pair for a draft submission.
/// `created_at` is reused when the draft carries one (import flows) and
/// minted otherwise; `updated_at` is always fresh.
pub fn draft_stamps(draft: &CaseStudyDraft) -> (String, String) {
    let updated_at = now();
    let created_at = draft
        .created_at
        .clone()
        .unwrap_or_else(|| updated_at.clone());
    (created_at, updated_at)
}

fn parse(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
