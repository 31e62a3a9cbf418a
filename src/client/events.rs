//! What the client announces on the notification bus.

use crate::conflict::ConflictReport;
use crate::record::CaseStudyRecord;

/// Topic names the persistence client publishes on.
pub mod topics {
    /// A record was created and verified.
    pub const RECORD_CREATED: &str = "RecordCreated";
    /// A record was updated and verified.
    pub const RECORD_UPDATED: &str = "RecordUpdated";
    /// A stale write was detected; the payload carries the report.
    pub const RECORD_CONFLICT: &str = "RecordConflict";
}

/// Payload published on the notification bus.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A new record exists. Carries the verified, re-fetched record.
    Created(CaseStudyRecord),
    /// An existing record changed. Carries the verified, re-fetched
    /// record.
    Updated(CaseStudyRecord),
    /// A write raced another session. `report.has_conflicts` is false
    /// for silently merged races and true when a decision is needed.
    Conflict { id: String, report: ConflictReport },
}

impl ChangeEvent {
    /// The topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            ChangeEvent::Created(_) => topics::RECORD_CREATED,
            ChangeEvent::Updated(_) => topics::RECORD_UPDATED,
            ChangeEvent::Conflict { .. } => topics::RECORD_CONFLICT,
        }
    }

    /// Id of the record involved.
    pub fn record_id(&self) -> &str {
        match self {
            ChangeEvent::Created(record) | ChangeEvent::Updated(record) => &record.id,
            ChangeEvent::Conflict { id, .. } => id,
        }
    }
}
