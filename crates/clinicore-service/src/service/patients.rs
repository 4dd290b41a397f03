use chrono::Utc;
use clinicore_core::error::ClinicResult;
use clinicore_core::models::attachment::Attachment;
use clinicore_core::models::audit::{AuditAction, AuditEvent, AuditFilter};
use clinicore_core::models::patient::{CreatePatient, Patient, UpdatePatient};
use clinicore_core::models::visit::Visit;
use clinicore_core::repository::{
    AttachmentRepository, AuditRepository, PaginatedResult, Pagination, PatientRepository,
    Repositories, VisitRepository,
};
use clinicore_core::storage::BlobStore;
use clinicore_core::{Capability, RequestContext, authorize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ClinicService, require_text, scope_of};
use crate::audit::AuditEntry;
use crate::guard;

/// Everything shown on a patient's chart.
#[derive(Debug, Clone)]
pub struct PatientDetail {
    pub patient: Patient,
    /// Newest first.
    pub visits: Vec<Visit>,
    /// Newest first.
    pub attachments: Vec<Attachment>,
    /// Recent events for this patient; empty unless the actor may read
    /// the audit trail.
    pub audit_events: Vec<AuditEvent>,
    pub can_add_visit: bool,
    pub can_view_audit: bool,
}

impl<R: Repositories, B: BlobStore> ClinicService<R, B> {
    /// Free-text search over name, phone, and national ID.
    pub async fn list_patients(
        &self,
        ctx: &RequestContext,
        query: &str,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<Patient>> {
        authorize(ctx, Capability::AccessPatients)?;
        let scope = scope_of(ctx)?;
        self.repos.patients().search(scope, query, pagination).await
    }

    /// Create a patient.
    ///
    /// Unless `confirm_duplicate` is set, a submission whose national ID
    /// or normalized phone matches an existing patient in the clinic is
    /// suspended with [`clinicore_core::ClinicError::DuplicateCandidates`].
    pub async fn create_patient(
        &self,
        ctx: &RequestContext,
        input: CreatePatient,
        confirm_duplicate: bool,
    ) -> ClinicResult<Patient> {
        authorize(ctx, Capability::AccessPatients)?;
        let scope = scope_of(ctx)?;
        require_text("full_name", &input.full_name)?;

        let candidates = self
            .repos
            .patients()
            .find_duplicates(
                scope,
                &input.national_id,
                &input.phone,
                self.config.duplicate_candidate_limit,
            )
            .await?;
        if !candidates.is_empty() {
            debug!(count = candidates.len(), confirm_duplicate, "Duplicate candidates found");
        }
        guard::check_duplicates(candidates, confirm_duplicate)?;

        let patient = self.repos.patients().create(scope, input).await?;
        info!(patient_id = %patient.id, clinic_id = %patient.clinic_id, "Patient created");

        self.audit(
            ctx,
            AuditEntry::new(AuditAction::PatientCreated, &patient).patient(patient.id),
        )
        .await;
        Ok(patient)
    }

    pub async fn edit_patient(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdatePatient,
    ) -> ClinicResult<Patient> {
        authorize(ctx, Capability::AccessPatients)?;
        let scope = scope_of(ctx)?;
        if let Some(full_name) = &input.full_name {
            require_text("full_name", full_name)?;
        }

        let patient = self.repos.patients().update(scope, id, input).await?;
        self.audit(
            ctx,
            AuditEntry::new(AuditAction::PatientEdited, &patient).patient(patient.id),
        )
        .await;
        Ok(patient)
    }

    /// Open a patient's chart, recording a throttled `patient_viewed`
    /// event.
    pub async fn view_patient(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<PatientDetail> {
        let actor = authorize(ctx, Capability::AccessPatients)?;
        let scope = scope_of(ctx)?;
        let can_view_audit = actor.is_superuser || Capability::ViewAudit.allows(actor.role);
        let can_add_visit = actor.is_superuser || Capability::CreateVisit.allows(actor.role);

        let patient = self.repos.patients().get_by_id(scope, id).await?;
        let visits = self.repos.visits().list_for_patient(scope, id).await?;
        let attachments = self.repos.attachments().list_for_patient(scope, id).await?;

        let now = Utc::now();
        if self.throttle.should_record(ctx.session(), id, now) {
            let entry = AuditEntry::new(AuditAction::PatientViewed, &patient).patient(id);
            if self.audit(ctx, entry).await.is_some() {
                self.throttle.mark(ctx.session(), id, now);
            }
        }

        let audit_events = if can_view_audit {
            let filter = AuditFilter {
                action: None,
                patient_id: Some(id),
            };
            let page = Pagination {
                offset: 0,
                limit: self.config.patient_audit_limit,
            };
            self.repos.audit().list(scope, filter, page).await?.items
        } else {
            Vec::new()
        };

        Ok(PatientDetail {
            patient,
            visits,
            attachments,
            audit_events,
            can_add_visit,
            can_view_audit,
        })
    }
}
