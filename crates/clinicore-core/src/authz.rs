//! Role authorization gate.
//!
//! Every mutating or sensitive-read operation names a [`Capability`]
//! and calls [`authorize`] before touching any repository.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{ClinicError, ClinicResult};
use crate::models::staff::Role;
use crate::tenancy::Principal;

const ALL_STAFF: &[Role] = &[Role::Doctor, Role::Assistant, Role::Admin];
const CLINICIANS: &[Role] = &[Role::Doctor, Role::Admin];
const ADMINS: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// List, search, create, edit and view patients.
    AccessPatients,
    CreateVisit,
    EditVisit,
    UploadFile,
    DownloadFile,
    DeleteFile,
    /// Read the audit trail.
    ViewAudit,
    /// Create, edit and (de)activate staff accounts.
    ManageAccounts,
    ManageClinic,
}

impl Capability {
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Capability::AccessPatients
            | Capability::CreateVisit
            | Capability::UploadFile
            | Capability::DownloadFile => ALL_STAFF,
            Capability::EditVisit | Capability::DeleteFile | Capability::ViewAudit => CLINICIANS,
            Capability::ManageAccounts | Capability::ManageClinic => ADMINS,
        }
    }

    /// Role check only; superuser bypass is applied by [`authorize`].
    pub fn allows(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

/// Check that the context's principal holds `capability`.
///
/// Anonymous or inactive principals fail with
/// [`ClinicError::AuthenticationRequired`] before any role check.
/// Superusers pass unconditionally.
pub fn authorize(ctx: &RequestContext, capability: Capability) -> ClinicResult<&Principal> {
    let principal = ctx
        .principal()
        .filter(|p| p.is_active)
        .ok_or(ClinicError::AuthenticationRequired)?;

    if principal.is_superuser || capability.allows(principal.role) {
        return Ok(principal);
    }

    warn!(
        staff_id = %principal.staff_id,
        role = %principal.role,
        capability = ?capability,
        "Authorization denied"
    );
    Err(ClinicError::AuthorizationDenied {
        reason: "You do not have permission to perform this action.".into(),
    })
}
