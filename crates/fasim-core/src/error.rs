//! Error taxonomy shared by the mapper and every repository.
//!
//! [`RepoError`] is what library callers match on. [`ErrorCode`] is the
//! stable, machine-readable projection of it used by the CLI renderer.

use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    ConstraintViolation,
    StorageFailure,
    Cancelled,
    DeadlineExceeded,
    ConfigParseError,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidInput => "E2001",
            Self::NotFound => "E2002",
            Self::ConstraintViolation => "E2003",
            Self::StorageFailure => "E3001",
            Self::Cancelled => "E4001",
            Self::DeadlineExceeded => "E4002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidInput => "Invalid input",
            Self::NotFound => "Entity not found",
            Self::ConstraintViolation => "Constraint violation",
            Self::StorageFailure => "Storage failure",
            Self::Cancelled => "Operation cancelled",
            Self::DeadlineExceeded => "Deadline exceeded",
        }
    }

    /// Optional remediation hint surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in fasim.toml and retry."),
            Self::InvalidInput => Some("Check names, quantities and node references in the payload."),
            Self::NotFound => Some("Use `list` to see existing identities."),
            Self::ConstraintViolation => {
                Some("Names must be unique and referenced entities must exist and stay referenced.")
            }
            Self::StorageFailure => Some("Retry once. If persistent, run `fasim migrate` and check the database file."),
            Self::Cancelled => None,
            Self::DeadlineExceeded => Some("Raise --timeout-ms or [request] timeout_ms."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The kind of entity an identity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Item,
    Facility,
    Pipeline,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Item => "item",
            Self::Facility => "facility",
            Self::Pipeline => "pipeline",
        })
    }
}

/// Errors returned by the persistence mapper and the repositories.
///
/// Engine failures are never swallowed: the original `rusqlite` error is
/// kept as the source of [`RepoError::Storage`] or
/// [`RepoError::ConstraintViolation`].
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Malformed input rejected before any statement ran.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced identity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    /// A uniqueness, reference, or check rule was violated.
    #[error("constraint violation: {reason}")]
    ConstraintViolation {
        reason: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Transport or engine failure; the transaction was rolled back.
    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    /// The caller cancelled the request; the transaction was rolled back.
    #[error("operation cancelled")]
    Cancelled,

    /// The request deadline passed; the transaction was rolled back.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl RepoError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub(crate) fn constraint(reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            reason: reason.into(),
            source: None,
        }
    }

    /// Returns the stable error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidInput,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ConstraintViolation { .. } => ErrorCode::ConstraintViolation,
            Self::Storage(_) => ErrorCode::StorageFailure,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::DeadlineExceeded => ErrorCode::DeadlineExceeded,
        }
    }

    /// Returns `true` for [`RepoError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(error: rusqlite::Error) -> Self {
        let reason = match &error {
            rusqlite::Error::SqliteFailure(failure, detail)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Some(detail.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => None,
        };

        match reason {
            Some(reason) => Self::ConstraintViolation {
                reason,
                source: Some(error),
            },
            None => Self::Storage(error),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = RepoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::InvalidInput,
            ErrorCode::NotFound,
            ErrorCode::ConstraintViolation,
            ErrorCode::StorageFailure,
            ErrorCode::Cancelled,
            ErrorCode::DeadlineExceeded,
            ErrorCode::ConfigParseError,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ConstraintViolation.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn unique_violation_maps_to_constraint() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .expect("setup");
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .expect_err("duplicate insert must fail");

        let mapped = RepoError::from(err);
        assert!(
            matches!(mapped, RepoError::ConstraintViolation { source: Some(_), .. }),
            "unexpected mapping: {mapped:?}"
        );
        assert_eq!(mapped.error_code(), ErrorCode::ConstraintViolation);
    }

    #[test]
    fn other_engine_failures_map_to_storage() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        let err = conn
            .execute("INSERT INTO missing_table VALUES (1)", [])
            .expect_err("missing table must fail");

        assert!(matches!(RepoError::from(err), RepoError::Storage(_)));
    }

    #[test]
    fn not_found_display_names_entity() {
        let err = RepoError::NotFound {
            entity: EntityKind::Pipeline,
            id: 12,
        };
        assert_eq!(err.to_string(), "pipeline 12 not found");
        assert!(err.is_not_found());
    }
}
