//! Staff account domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClinicError;
use crate::tenancy::{AuditTarget, Tenanted};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    #[default]
    Assistant,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Assistant => "assistant",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Role::Doctor),
            "assistant" => Ok(Role::Assistant),
            "admin" => Ok(Role::Admin),
            other => Err(ClinicError::validation(
                "role",
                format!("unknown role: {other}"),
            )),
        }
    }
}

/// A staff member. `clinic_id` is `None` only for platform operators
/// (`is_superuser`) and system accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn is_active_admin(&self) -> bool {
        self.is_active && self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStaff {
    pub username: String,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub role: Role,
}

/// Fields an admin may change on an existing account.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateStaff {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UpdateStaff {
    /// Whether the edit leaves an active admin as an active admin.
    pub fn keeps_active_admin(&self) -> bool {
        self.role.is_none_or(|r| r == Role::Admin) && self.is_active.is_none_or(|a| a)
    }
}

impl Tenanted for Staff {
    fn clinic_id(&self) -> Option<Uuid> {
        self.clinic_id
    }
}

impl AuditTarget for Staff {
    fn object_type(&self) -> &'static str {
        "accounts.User"
    }

    fn object_id(&self) -> Uuid {
        self.id
    }
}
