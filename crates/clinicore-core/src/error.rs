//! Error types for the Clinicore system.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::models::patient::DuplicateCandidate;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded against `field`, if any.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when no errors were collected, otherwise a
    /// [`ClinicError::Validation`] carrying them.
    pub fn into_result(self) -> ClinicResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClinicError::Validation { errors: self })
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// The actor is signed in but belongs to no clinic and is not a
    /// platform operator. The session has already been flushed.
    #[error("Tenant unresolved: {reason_code}")]
    TenantUnresolved {
        reason_code: &'static str,
        redirect_to: String,
    },

    /// Also returned for rows that exist under another clinic.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {errors}")]
    Validation { errors: FieldErrors },

    #[error("Possible duplicate patients found ({} candidates)", candidates.len())]
    DuplicateCandidates { candidates: Vec<DuplicateCandidate> },

    #[error("{field}: {message}")]
    Guard { field: String, message: String },

    #[error("Tenant context missing or invalid")]
    TenantContext,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClinicError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            errors: FieldErrors::single(field, message),
        }
    }

    pub fn guard(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Guard {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("full_name", "This field is required.");
        errors.add("phone", "Too long.");
        errors.add("phone", "Invalid characters.");

        assert_eq!(errors.get("phone").map(<[String]>::len), Some(2));
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["full_name", "phone"]);
        assert!(matches!(
            errors.into_result(),
            Err(ClinicError::Validation { .. })
        ));
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
