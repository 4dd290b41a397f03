//! Clinic (tenant) domain model.
//!
//! Clinics are the root of tenancy. They are referenced by every other
//! entity and reference nothing themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenancy::{AuditTarget, Tenanted};

/// An isolated customer boundary. All clinical data belongs to
/// exactly one clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClinic {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Clinic settings that an admin may change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateClinic {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A clinic is its own tenant.
impl Tenanted for Clinic {
    fn clinic_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

impl AuditTarget for Clinic {
    fn object_type(&self) -> &'static str {
        "clinics.Clinic"
    }

    fn object_id(&self) -> Uuid {
        self.id
    }
}
