use clinicore_core::error::ClinicResult;
use clinicore_core::models::audit::AuditAction;
use clinicore_core::models::clinic::{Clinic, UpdateClinic};
use clinicore_core::repository::{ClinicRepository, Repositories};
use clinicore_core::storage::BlobStore;
use clinicore_core::{Capability, RequestContext, authorize};
use serde_json::json;
use tracing::info;

use super::{ClinicService, require_text, scope_of};
use crate::audit::AuditEntry;

impl<R: Repositories, B: BlobStore> ClinicService<R, B> {
    /// The acting clinic's settings.
    pub async fn clinic_settings(&self, ctx: &RequestContext) -> ClinicResult<Clinic> {
        authorize(ctx, Capability::ManageClinic)?;
        let clinic_id = scope_of(ctx)?.require_clinic()?;
        self.repos.clinics().get_by_id(clinic_id).await
    }

    pub async fn update_clinic_settings(
        &self,
        ctx: &RequestContext,
        input: UpdateClinic,
    ) -> ClinicResult<Clinic> {
        authorize(ctx, Capability::ManageClinic)?;
        let clinic_id = scope_of(ctx)?.require_clinic()?;
        if let Some(name) = &input.name {
            require_text("name", name)?;
        }

        let clinic = self.repos.clinics().update(clinic_id, input).await?;
        info!(clinic_id = %clinic.id, "Clinic settings updated");

        let entry = AuditEntry::new(AuditAction::ClinicUpdated, &clinic).metadata(json!({
            "name": clinic.name,
            "phone": clinic.phone,
            "address": clinic.address,
        }));
        self.audit(ctx, entry).await;
        Ok(clinic)
    }
}
