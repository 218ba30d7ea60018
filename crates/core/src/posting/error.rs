//! Posting error types.
//!
//! Per-entry validation rejections travel as data (`BatchValidation`);
//! everything here terminates the current transaction with full rollback.

use chrono::NaiveDate;
use postbook_shared::error::AppError;
use thiserror::Error;

use super::store::StoreError;
use super::validation::RejectedEntry;

/// Errors that can occur during posting operations.
#[derive(Debug, Error)]
pub enum PostingError {
    /// One or more entries in the requested close failed validation.
    ///
    /// The whole batch is aborted: partial period-close is rarely desirable,
    /// so the caller gets the full rejection list and nothing changes.
    #[error("validation failed for {} entries", .0.len())]
    ValidationFailed(Vec<RejectedEntry>),

    /// A committed posting batch already exists for this ledger date.
    #[error("ledger date {0} has already been posted")]
    AlreadyPostedForDate(NaiveDate),

    /// No pending entries exist on or before the requested cutoff.
    #[error("no pending entries on or before {0}")]
    NoPendingEntries(NaiveDate),

    /// No posted entries exist for the requested date.
    #[error("no posted entries to reverse for {0}")]
    NothingToUnpost(NaiveDate),

    /// A concurrent close won the race for an overlapping account or date.
    #[error("concurrent posting conflict: {0}")]
    Conflict(String),

    /// Storage failed after internal retries were exhausted.
    #[error("posting failed: {0}")]
    PostingFailed(#[from] StoreError),

    /// Invariant breach inside the engine (e.g. a posted entry that no
    /// longer re-admits during reversal).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PostingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::AlreadyPostedForDate(_) => "ALREADY_POSTED_FOR_DATE",
            Self::NoPendingEntries(_) => "NO_PENDING_ENTRIES",
            Self::NothingToUnpost(_) => "NOTHING_TO_UNPOST",
            Self::Conflict(_) => "CONFLICT",
            Self::PostingFailed(_) => "POSTING_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 422 Unprocessable - the rejection list is returned as data
            Self::ValidationFailed(_) => 422,

            // 409 Conflict - concurrency / double-close
            Self::AlreadyPostedForDate(_) | Self::Conflict(_) => 409,

            // 400 Bad Request - invalid state transitions requested
            Self::NoPendingEntries(_) | Self::NothingToUnpost(_) => 400,

            // 500 Internal Server Error
            Self::PostingFailed(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if the caller may retry the operation as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        match err {
            PostingError::ValidationFailed(_) => Self::BusinessRule(err.to_string()),
            PostingError::AlreadyPostedForDate(_) | PostingError::Conflict(_) => {
                Self::Conflict(err.to_string())
            }
            PostingError::NoPendingEntries(_) | PostingError::NothingToUnpost(_) => {
                Self::InvalidState(err.to_string())
            }
            PostingError::PostingFailed(_) => Self::Database(err.to_string()),
            PostingError::Internal(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::validation::RejectionReason;
    use postbook_shared::types::LedgerEntryId;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PostingError::AlreadyPostedForDate(date()).error_code(),
            "ALREADY_POSTED_FOR_DATE"
        );
        assert_eq!(
            PostingError::NoPendingEntries(date()).error_code(),
            "NO_PENDING_ENTRIES"
        );
        assert_eq!(
            PostingError::NothingToUnpost(date()).error_code(),
            "NOTHING_TO_UNPOST"
        );
        assert_eq!(
            PostingError::ValidationFailed(vec![]).error_code(),
            "VALIDATION_FAILED"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(PostingError::ValidationFailed(vec![]).http_status_code(), 422);
        assert_eq!(PostingError::AlreadyPostedForDate(date()).http_status_code(), 409);
        assert_eq!(PostingError::Conflict(String::new()).http_status_code(), 409);
        assert_eq!(PostingError::NoPendingEntries(date()).http_status_code(), 400);
        assert_eq!(PostingError::NothingToUnpost(date()).http_status_code(), 400);
        assert_eq!(
            PostingError::PostingFailed(StoreError::Backend("x".into())).http_status_code(),
            500
        );
    }

    #[test]
    fn test_retryable() {
        assert!(PostingError::Conflict(String::new()).is_retryable());
        assert!(!PostingError::AlreadyPostedForDate(date()).is_retryable());
        assert!(!PostingError::NoPendingEntries(date()).is_retryable());
    }

    #[test]
    fn test_app_error_mapping_keeps_status_parity() {
        let err = PostingError::AlreadyPostedForDate(date());
        let status = err.http_status_code();
        let app: AppError = err.into();
        assert_eq!(app.status_code(), status);

        let err = PostingError::NothingToUnpost(date());
        let app: AppError = err.into();
        assert_eq!(app.status_code(), 400);
    }

    #[test]
    fn test_display_includes_rejection_count() {
        let err = PostingError::ValidationFailed(vec![RejectedEntry {
            id: LedgerEntryId::new(),
            reason: RejectionReason::AccountNotFound,
        }]);
        assert_eq!(err.to_string(), "validation failed for 1 entries");
    }
}
