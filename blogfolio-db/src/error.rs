//! Error types for blogfolio-db
//!
//! - [`QueryError`]: the request was composed incorrectly; raised before any SQL runs
//! - [`PageError`]: everything a page fetch can fail with, including I/O

use thiserror::Error;

use crate::models::ValidationError;

/// Invalid query composition, rejected before any query executes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("conflicting filters: at most one of [{}] may be set", .fields.join(", "))]
    ConflictingFilters { fields: Vec<&'static str> },

    #[error("unknown sort strategy '{value}'")]
    UnknownStrategy { value: String },

    #[error("'{field}' is not a sortable field for {resource}")]
    UnknownSortField { resource: &'static str, field: String },

    #[error("sort field '{field}' appears more than once")]
    DuplicateSortField { field: &'static str },

    #[error("composite sort requires at least one field")]
    EmptyComposite,

    #[error("{resource} cannot be sorted by {strategy}")]
    UnsupportedSort {
        resource: &'static str,
        strategy: &'static str,
    },

    #[error("relevance sort on {resource} requires a search term")]
    RelevanceWithoutSearch { resource: &'static str },

    #[error("malformed cursor: {reason}")]
    MalformedCursor { reason: String },

    #[error("cursor was issued for sort '{found}' but this request sorts by '{expected}'")]
    CursorMismatch { expected: String, found: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure of a page fetch
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The row named by the cursor no longer exists. The caller should
    /// restart the listing.
    #[error("cursor '{id}' no longer refers to a {resource}; refresh the listing")]
    StaleCursor { resource: &'static str, id: String },

    /// Connection loss, timeout or cancellation. Safe to retry.
    #[error("temporary database failure, try again: {0}")]
    Transient(#[source] sqlx::Error),

    /// Anything else the database reports. Not retried.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl PageError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the failure was caused by the request itself.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}

impl PageError {
    /// Classify a failed statement, logging it first when it is fatal.
    ///
    /// Transient failures are left to the caller's retry policy and are not
    /// logged here.
    pub(crate) fn from_statement(
        resource: &'static str,
        statement: &'static str,
        err: sqlx::Error,
    ) -> Self {
        let err = Self::from(err);
        if !err.is_retryable() {
            tracing::error!(resource, statement, error = %err, "statement failed");
        }
        err
    }
}

impl From<ValidationError> for PageError {
    fn from(e: ValidationError) -> Self {
        Self::Query(QueryError::Validation(e))
    }
}

impl From<sqlx::Error> for PageError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient(&e) {
            Self::Transient(e)
        } else {
            Self::Database(e)
        }
    }
}

/// SQLSTATE codes worth retrying: connection exceptions (class 08),
/// operator intervention (57014 cancel, 57P01..57P03 shutdown) and
/// serialization/deadlock failures.
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code == "57014"
        || code.starts_with("57P0")
        || code == "40001"
        || code == "40P01"
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|c| is_transient_sqlstate(&c)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn conflicting_filters_names_every_field() {
        let err = QueryError::ConflictingFilters {
            fields: vec!["followerId", "searchAny"],
        };
        assert_eq!(
            err.to_string(),
            "conflicting filters: at most one of [followerId, searchAny] may be set"
        );
    }

    #[test]
    fn pool_timeout_is_retryable() {
        let err = PageError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(!err.is_caller_error());
    }

    #[test]
    fn io_error_is_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = PageError::from(sqlx::Error::Io(io));
        assert!(matches!(err, PageError::Transient(_)));
    }

    #[test]
    fn decode_error_is_fatal() {
        let err = PageError::from(sqlx::Error::ColumnNotFound("sort_k0".into()));
        assert!(matches!(err, PageError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn sqlstate_classes() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("57014"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("42703"));
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, logs.text())
    }

    #[test]
    fn fatal_statement_failure_is_logged() {
        let (err, logs) = capture(|| {
            PageError::from_statement(
                "post",
                "cursor lookup",
                sqlx::Error::ColumnNotFound("sort_k0".into()),
            )
        });
        assert!(matches!(err, PageError::Database(_)));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("statement=\"cursor lookup\""));
        assert!(logs.contains("resource=\"post\""));
    }

    #[test]
    fn transient_statement_failure_is_not_logged() {
        let (err, logs) = capture(|| {
            PageError::from_statement("user", "page query", sqlx::Error::PoolTimedOut)
        });
        assert!(err.is_retryable());
        assert!(logs.is_empty());
    }

    #[test]
    fn validation_errors_are_caller_errors() {
        let err = PageError::from(ValidationError::EmptyId);
        assert!(err.is_caller_error());
        assert_eq!(err.to_string(), "id cannot be empty");
    }
}
