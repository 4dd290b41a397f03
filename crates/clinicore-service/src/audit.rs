//! Audit recording.
//!
//! Callers record an event only after the primary write has committed.
//! Recording itself is best-effort: a failed append is logged and
//! swallowed, never surfaced to the caller.

use clinicore_core::RequestContext;
use clinicore_core::models::audit::{AuditAction, AuditEvent, CreateAuditEvent};
use clinicore_core::repository::{
    AuditRepository, PatientRepository, Repositories, VisitRepository,
};
use clinicore_core::tenancy::AuditTarget;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// One event to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    action: AuditAction,
    object_type: &'static str,
    object_id: Uuid,
    target_clinic: Option<Uuid>,
    patient_id: Option<Uuid>,
    visit_id: Option<Uuid>,
    metadata: Value,
}

impl AuditEntry {
    pub fn new(action: AuditAction, target: &impl AuditTarget) -> Self {
        Self {
            action,
            object_type: target.object_type(),
            object_id: target.object_id(),
            target_clinic: target.clinic_id(),
            patient_id: None,
            visit_id: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn patient(mut self, patient_id: Uuid) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn visit(mut self, visit_id: Uuid) -> Self {
        self.visit_id = Some(visit_id);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }
}

/// Where an event's clinic may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    /// The acted-on object's own clinic.
    Target,
    /// The clinic owning the correlated patient.
    Patient,
    /// The clinic owning the correlated visit.
    Visit,
    /// The acting staff member's clinic.
    Actor,
}

/// First source that yields a clinic wins.
pub const RESOLUTION_ORDER: [TenantSource; 4] = [
    TenantSource::Target,
    TenantSource::Patient,
    TenantSource::Visit,
    TenantSource::Actor,
];

/// Appends audit events through a repository bundle.
pub struct AuditRecorder<'a, R: Repositories> {
    repos: &'a R,
}

impl<'a, R: Repositories> AuditRecorder<'a, R> {
    pub fn new(repos: &'a R) -> Self {
        Self { repos }
    }

    /// The clinic an event belongs to, or `None` when no source yields
    /// one. Lookup failures skip to the next source.
    pub async fn resolve_clinic(&self, ctx: &RequestContext, entry: &AuditEntry) -> Option<Uuid> {
        for source in RESOLUTION_ORDER {
            let found = match source {
                TenantSource::Target => entry.target_clinic,
                TenantSource::Patient => match entry.patient_id {
                    Some(id) => self
                        .repos
                        .patients()
                        .owning_clinic(id)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(patient_id = %id, error = %e, "Audit patient lookup failed");
                            None
                        }),
                    None => None,
                },
                TenantSource::Visit => match entry.visit_id {
                    Some(id) => self
                        .repos
                        .visits()
                        .owning_clinic(id)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(visit_id = %id, error = %e, "Audit visit lookup failed");
                            None
                        }),
                    None => None,
                },
                TenantSource::Actor => ctx.principal().and_then(|p| p.clinic_id),
            };
            if found.is_some() {
                debug!(source = ?source, "Resolved audit clinic");
                return found;
            }
        }
        None
    }

    /// Record `entry`. Returns the stored event, or `None` if the append
    /// failed.
    pub async fn record(&self, ctx: &RequestContext, entry: AuditEntry) -> Option<AuditEvent> {
        let clinic_id = self.resolve_clinic(ctx, &entry).await;
        let client = ctx.client();
        let action = entry.action;

        let input = CreateAuditEvent {
            clinic_id,
            actor_id: ctx.principal().map(|p| p.staff_id),
            action,
            object_type: entry.object_type.to_string(),
            object_id: entry.object_id,
            patient_id: entry.patient_id,
            visit_id: entry.visit_id,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            metadata: entry.metadata,
        };

        match self.repos.audit().append(input).await {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(action = %action, error = %e, "Audit write failed; continuing");
                None
            }
        }
    }
}
