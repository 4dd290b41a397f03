//! Database-specific error types and conversions.

use clinicore_core::error::ClinicError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A unique index rejected the write.
    #[error("Unique constraint violated on {field}: {message}")]
    Conflict { field: String, message: String },
}

impl From<DbError> for ClinicError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ClinicError::NotFound { entity, id },
            DbError::Conflict { field, message } => ClinicError::validation(field, message),
            other => ClinicError::Database(other.to_string()),
        }
    }
}

/// A unique index on the table the write targeted.
pub(crate) struct UniqueIndex {
    pub index: &'static str,
    pub field: &'static str,
    pub message: &'static str,
}

/// Map a failed statement to [`DbError::Conflict`] when one of the
/// given unique indexes rejected it.
pub(crate) fn check_unique(message: String, indexes: &[UniqueIndex]) -> DbError {
    match indexes.iter().find(|idx| message.contains(idx.index)) {
        Some(idx) => DbError::Conflict {
            field: idx.field.into(),
            message: idx.message.into(),
        },
        None => DbError::Query(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEXES: &[UniqueIndex] = &[UniqueIndex {
        index: "idx_patient_clinic_national_id",
        field: "national_id",
        message: "taken",
    }];

    #[test]
    fn unique_violation_becomes_field_error() {
        let err = check_unique(
            "Database index `idx_patient_clinic_national_id` already contains ['x', 'y']".into(),
            INDEXES,
        );
        match ClinicError::from(err) {
            ClinicError::Validation { errors } => {
                assert_eq!(errors.get("national_id"), Some(&["taken".to_string()][..]));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn other_failures_stay_database_errors() {
        let err = check_unique("parse error".into(), INDEXES);
        assert!(matches!(ClinicError::from(err), ClinicError::Database(_)));
    }
}
