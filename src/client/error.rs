use std::fmt;

use crate::store::StoreError;

/// Fatal persistence failures. Every variant here means retries are
/// already exhausted or the precondition can never hold; the expected,
/// recoverable outcomes (validation failures and unresolved conflicts)
/// are [`WriteOutcome`](super::WriteOutcome) values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// A write was acknowledged but re-reads kept disagreeing with what
    /// was submitted.
    VerificationFailed { id: String, attempts: u32 },
    /// The storage collaborator stayed unreachable through the whole
    /// backoff schedule.
    StorageUnavailable {
        operation: &'static str,
        attempts: u32,
        last: StoreError,
    },
    /// No record has the targeted id.
    NotFound { id: String },
    /// A non-transient collaborator failure surfaced mid-operation.
    Store(StoreError),
    /// The image collaborator answered with a blank serving URL.
    BadImageUrl { file_name: String },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::VerificationFailed { id, attempts } => write!(
                f,
                "write to record {id} could not be verified after {attempts} attempts"
            ),
            PersistError::StorageUnavailable {
                operation,
                attempts,
                last,
            } => write!(
                f,
                "storage unavailable during {operation} after {attempts} attempts: {last}"
            ),
            PersistError::NotFound { id } => write!(f, "record {id} not found"),
            PersistError::Store(err) => write!(f, "storage error: {err}"),
            PersistError::BadImageUrl { file_name } => {
                write!(f, "image upload of {file_name} returned a blank url")
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::StorageUnavailable { last, .. } => Some(last),
            PersistError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PersistError {
    fn from(err: StoreError) -> Self {
        PersistError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_operation_and_attempts() {
        let err = PersistError::StorageUnavailable {
            operation: "get_record",
            attempts: 3,
            last: StoreError::Unavailable("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "storage unavailable during get_record after 3 attempts: store unavailable: connection refused"
        );
    }

    #[test]
    fn store_errors_convert_and_keep_their_source() {
        use std::error::Error;

        let err: PersistError = StoreError::LockPoisoned("get_record").into();
        assert!(matches!(err, PersistError::Store(_)));
        assert!(err.source().is_some());
    }
}
