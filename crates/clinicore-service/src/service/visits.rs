use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::models::audit::AuditAction;
use clinicore_core::models::staff::Role;
use clinicore_core::models::visit::{CreateVisit, UpdateVisit, Visit};
use clinicore_core::repository::{Repositories, StaffRepository, VisitRepository};
use clinicore_core::storage::BlobStore;
use clinicore_core::{Capability, RequestContext, authorize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{ClinicService, scope_of};
use crate::audit::AuditEntry;

impl<R: Repositories, B: BlobStore> ClinicService<R, B> {
    /// Record a visit. The visit's clinic is always the patient's; a
    /// doctor creating a visit becomes its doctor.
    pub async fn create_visit(&self, ctx: &RequestContext, mut input: CreateVisit) -> ClinicResult<Visit> {
        let actor = authorize(ctx, Capability::CreateVisit)?;
        let scope = scope_of(ctx)?;

        if actor.role == Role::Doctor && !actor.is_superuser {
            input.doctor_id = Some(actor.staff_id);
        } else if let Some(doctor_id) = input.doctor_id {
            let doctor = self
                .repos
                .staff()
                .get_by_id(scope, doctor_id)
                .await
                .map_err(|e| {
                    if e.is_not_found() {
                        ClinicError::validation("doctor_id", "Unknown doctor.")
                    } else {
                        e
                    }
                })?;
            if doctor.role != Role::Doctor || !doctor.is_active {
                return Err(ClinicError::validation(
                    "doctor_id",
                    "Selected staff member is not an active doctor.",
                ));
            }
        }

        let visit = self.repos.visits().create(scope, input).await?;
        info!(visit_id = %visit.id, patient_id = %visit.patient_id, "Visit created");

        let entry = AuditEntry::new(AuditAction::VisitCreated, &visit)
            .patient(visit.patient_id)
            .visit(visit.id)
            .metadata(json!({
                "visit_datetime": visit.visit_datetime.to_rfc3339(),
                "chief_complaint": visit.chief_complaint,
            }));
        self.audit(ctx, entry).await;
        Ok(visit)
    }

    pub async fn edit_visit(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdateVisit,
    ) -> ClinicResult<Visit> {
        authorize(ctx, Capability::EditVisit)?;
        let scope = scope_of(ctx)?;

        let visit = self.repos.visits().update(scope, id, input).await?;
        let entry = AuditEntry::new(AuditAction::VisitEdited, &visit)
            .patient(visit.patient_id)
            .visit(visit.id);
        self.audit(ctx, entry).await;
        Ok(visit)
    }
}
