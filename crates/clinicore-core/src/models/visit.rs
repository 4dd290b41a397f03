//! Visit domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenancy::{AuditTarget, Tenanted};

/// A clinical encounter. `clinic_id` always equals the patient's clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub visit_datetime: DateTime<Utc>,
    pub chief_complaint: String,
    pub clinical_notes: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateVisit {
    /// Ignored: the stored clinic is always the patient's clinic.
    pub clinic_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    /// Defaults to the time of creation.
    pub visit_datetime: Option<DateTime<Utc>>,
    pub chief_complaint: String,
    pub clinical_notes: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateVisit {
    /// Ignored: the stored clinic is re-derived from the patient.
    pub clinic_id: Option<Uuid>,
    pub visit_datetime: Option<DateTime<Utc>>,
    pub chief_complaint: Option<String>,
    pub clinical_notes: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    /// `Some(Some(d))` = set, `Some(None)` = clear, `None` = no change.
    pub follow_up_date: Option<Option<NaiveDate>>,
}

impl Tenanted for Visit {
    fn clinic_id(&self) -> Option<Uuid> {
        Some(self.clinic_id)
    }
}

impl AuditTarget for Visit {
    fn object_type(&self) -> &'static str {
        "visits.Visit"
    }

    fn object_id(&self) -> Uuid {
        self.id
    }
}
