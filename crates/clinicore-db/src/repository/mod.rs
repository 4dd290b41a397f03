//! SurrealDB repository implementations.
//!
//! Every query against a clinic-owned table carries a `$clinic_id`
//! binding and the filter produced by [`scope_filter`], so a row outside
//! the caller's scope is indistinguishable from a missing one.

mod attachment;
mod audit;
mod clinic;
mod patient;
mod staff;
mod visit;

pub use attachment::SurrealAttachmentRepository;
pub use audit::SurrealAuditRepository;
pub use clinic::SurrealClinicRepository;
pub use patient::SurrealPatientRepository;
pub use staff::SurrealStaffRepository;
pub use visit::SurrealVisitRepository;

use chrono::NaiveDate;
use clinicore_core::TenantScope;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

/// Row struct for owner lookups that bypass the scope filter.
#[derive(Debug, SurrealValue)]
pub(crate) struct ClinicIdRow {
    pub clinic_id: Option<String>,
}

/// The `WHERE` predicate restricting a query to `scope`.
pub(crate) fn scope_filter(scope: TenantScope) -> &'static str {
    match scope {
        TenantScope::Clinic(_) => "clinic_id = $clinic_id",
        TenantScope::Global => "true",
    }
}

/// The value bound to `$clinic_id` for `scope`.
pub(crate) fn scope_binding(scope: TenantScope) -> String {
    scope.clinic_id().map(|id| id.to_string()).unwrap_or_default()
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(field: &str, raw: Option<String>) -> Result<Option<Uuid>, DbError> {
    raw.as_deref().map(|s| parse_uuid(field, s)).transpose()
}

/// Calendar dates are stored as `YYYY-MM-DD` strings.
pub(crate) fn parse_date(field: &str, raw: Option<String>) -> Result<Option<NaiveDate>, DbError> {
    raw.as_deref()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| DbError::Corrupt(format!("invalid {field} date: {e}")))
        })
        .transpose()
}

pub(crate) fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

pub(crate) fn opt_uuid_string(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}
