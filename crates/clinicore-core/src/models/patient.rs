//! Patient domain model.
//!
//! Patients anchor all clinical data: visits and attachments take
//! their clinic from the patient they belong to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClinicError;
use crate::tenancy::{AuditTarget, Tenanted};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "U")]
    Unknown,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "U",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" => Ok(Sex::Male),
            "F" => Ok(Sex::Female),
            "U" => Ok(Sex::Unknown),
            other => Err(ClinicError::validation("sex", format!("unknown sex: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub full_name: String,
    /// Lowercased, whitespace-collapsed `full_name`. Derived on every
    /// write; never set directly.
    pub normalized_name: String,
    pub phone: String,
    pub national_id: String,
    pub sex: Sex,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when registering a patient. The clinic is stamped
/// from the request scope.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreatePatient {
    pub full_name: String,
    pub phone: String,
    pub national_id: String,
    pub sex: Sex,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePatient {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub sex: Option<Sex>,
    /// `Some(Some(d))` = set, `Some(None)` = clear, `None` = no change.
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Which identity field matched during duplicate detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateField {
    NationalId,
    Phone,
}

/// An existing patient that may be the same person as a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub patient: Patient,
    pub matched: Vec<DuplicateField>,
}

impl Tenanted for Patient {
    fn clinic_id(&self) -> Option<Uuid> {
        Some(self.clinic_id)
    }
}

impl AuditTarget for Patient {
    fn object_type(&self) -> &'static str {
        "patients.Patient"
    }

    fn object_id(&self) -> Uuid {
        self.id
    }
}
