//! Audit trail domain model.
//!
//! Audit events are append-only: there is no update or delete path.
//! The owning clinic is resolved once, when the event is recorded.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClinicError;
use crate::tenancy::Tenanted;

/// The closed set of audited actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PatientCreated,
    PatientViewed,
    PatientEdited,
    VisitCreated,
    VisitEdited,
    FileUploaded,
    FileDownloaded,
    FileDeleted,
    UserCreated,
    UserEdited,
    UserDeactivated,
    ClinicUpdated,
}

impl AuditAction {
    pub const ALL: [AuditAction; 12] = [
        AuditAction::PatientCreated,
        AuditAction::PatientViewed,
        AuditAction::PatientEdited,
        AuditAction::VisitCreated,
        AuditAction::VisitEdited,
        AuditAction::FileUploaded,
        AuditAction::FileDownloaded,
        AuditAction::FileDeleted,
        AuditAction::UserCreated,
        AuditAction::UserEdited,
        AuditAction::UserDeactivated,
        AuditAction::ClinicUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::PatientCreated => "patient_created",
            AuditAction::PatientViewed => "patient_viewed",
            AuditAction::PatientEdited => "patient_edited",
            AuditAction::VisitCreated => "visit_created",
            AuditAction::VisitEdited => "visit_edited",
            AuditAction::FileUploaded => "file_uploaded",
            AuditAction::FileDownloaded => "file_downloaded",
            AuditAction::FileDeleted => "file_deleted",
            AuditAction::UserCreated => "user_created",
            AuditAction::UserEdited => "user_edited",
            AuditAction::UserDeactivated => "user_deactivated",
            AuditAction::ClinicUpdated => "clinic_updated",
        }
    }

    /// Read actions that may be rate-limited; writes never are.
    pub fn is_read(self) -> bool {
        matches!(self, AuditAction::PatientViewed | AuditAction::FileDownloaded)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ClinicError::validation("action", format!("unknown audit action: {s}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// `None` when no clinic could be resolved at record time.
    pub clinic_id: Option<Uuid>,
    /// `None` for anonymous or system-triggered events.
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    /// Qualified type name of the acted-on object, e.g. `patients.Patient`.
    pub object_type: String,
    pub object_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub metadata: serde_json::Value,
    pub display: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEvent {
    pub clinic_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub object_type: String,
    pub object_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub metadata: serde_json::Value,
}

impl CreateAuditEvent {
    pub fn display(&self) -> String {
        format!("{} {}:{}", self.action, self.object_type, self.object_id)
    }
}

/// Optional narrowing for audit listings.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub patient_id: Option<Uuid>,
}

impl Tenanted for AuditEvent {
    fn clinic_id(&self) -> Option<Uuid> {
        self.clinic_id
    }
}
