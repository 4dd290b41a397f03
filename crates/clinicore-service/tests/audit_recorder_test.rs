mod common;

use std::sync::Arc;

use clinicore_core::context::{ClientMeta, IncomingRequest};
use clinicore_core::error::ClinicResult;
use clinicore_core::models::audit::{AuditAction, AuditEvent, AuditFilter, CreateAuditEvent};
use clinicore_core::models::clinic::CreateClinic;
use clinicore_core::models::patient::CreatePatient;
use clinicore_core::models::staff::{CreateStaff, Role};
use clinicore_core::models::visit::CreateVisit;
use clinicore_core::repository::{
    AuditRepository, ClinicRepository, PaginatedResult, Pagination, PatientRepository,
    Repositories, StaffRepository, VisitRepository,
};
use clinicore_core::session::{MemorySession, SessionStore};
use clinicore_core::{
    AuditTarget, ClinicError, Principal, RequestContext, TenantScope, Tenanted,
};
use clinicore_db::SurrealStore;
use clinicore_service::{
    AuditEntry, AuditRecorder, ClinicService, LocalBlobStore, ServiceConfig, ViewThrottle,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// An audited object that carries no clinic of its own.
struct Unowned(Uuid);

impl Tenanted for Unowned {
    fn clinic_id(&self) -> Option<Uuid> {
        None
    }
}

impl AuditTarget for Unowned {
    fn object_type(&self) -> &'static str {
        "system.Job"
    }

    fn object_id(&self) -> Uuid {
        self.0
    }
}

fn operator_ctx(fx: &common::Fixture) -> RequestContext {
    fx.service
        .resolve(IncomingRequest {
            path: "/audit/".into(),
            principal: Some(Principal {
                staff_id: Uuid::new_v4(),
                clinic_id: None,
                role: Role::Admin,
                is_active: true,
                is_superuser: true,
            }),
            client: ClientMeta::default(),
            session: Arc::new(MemorySession::new()),
        })
        .unwrap()
}

#[tokio::test]
async fn resolution_walks_target_patient_visit_actor() {
    let fx = common::setup().await;
    let repos = fx.service.repositories();
    let scope_a = TenantScope::Clinic(fx.clinic_a);
    let patient = repos
        .patients()
        .create(
            scope_a,
            CreatePatient {
                full_name: "Rana Zaki".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let visit = repos
        .visits()
        .create(
            scope_a,
            CreateVisit {
                patient_id: patient.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // The actor belongs to clinic B throughout.
    let actor = fx.staff(fx.clinic_b, "dr_b", Role::Doctor).await;
    let ctx = fx.ctx(&actor);
    let recorder = AuditRecorder::new(repos);
    let job = Unowned(Uuid::new_v4());

    // The target's own clinic wins over every correlation.
    let entry = AuditEntry::new(AuditAction::PatientViewed, &patient).visit(visit.id);
    assert_eq!(recorder.resolve_clinic(&ctx, &entry).await, Some(fx.clinic_a));

    let by_patient = AuditEntry::new(AuditAction::PatientEdited, &job)
        .patient(patient.id)
        .visit(Uuid::new_v4());
    assert_eq!(recorder.resolve_clinic(&ctx, &by_patient).await, Some(fx.clinic_a));

    let by_visit = AuditEntry::new(AuditAction::VisitEdited, &job)
        .patient(Uuid::new_v4())
        .visit(visit.id);
    assert_eq!(recorder.resolve_clinic(&ctx, &by_visit).await, Some(fx.clinic_a));

    let by_actor = AuditEntry::new(AuditAction::UserEdited, &job).patient(Uuid::new_v4());
    assert_eq!(recorder.resolve_clinic(&ctx, &by_actor).await, Some(fx.clinic_b));
}

#[tokio::test]
async fn unresolvable_events_are_still_recorded() {
    let fx = common::setup().await;
    let ctx = operator_ctx(&fx);
    let recorder = AuditRecorder::new(fx.service.repositories());

    let entry = AuditEntry::new(AuditAction::UserCreated, &Unowned(Uuid::new_v4()))
        .patient(Uuid::new_v4());
    let event = recorder.record(&ctx, entry).await.unwrap();
    assert_eq!(event.clinic_id, None);
    assert_eq!(event.object_type, "system.Job");
    assert!(event.actor_id.is_some());

    let all = fx
        .service
        .list_audit_events(&ctx, AuditFilter::default(), fx.service.first_page())
        .await
        .unwrap();
    assert!(all.items.iter().any(|e| e.id == event.id));
}

#[tokio::test]
async fn anonymous_events_have_no_actor() {
    let fx = common::setup().await;
    let recorder = AuditRecorder::new(fx.service.repositories());
    let clinic = fx
        .service
        .repositories()
        .clinics()
        .get_by_id(fx.clinic_a)
        .await
        .unwrap();

    let event = recorder
        .record(&fx.anonymous(), AuditEntry::new(AuditAction::ClinicUpdated, &clinic))
        .await
        .unwrap();
    assert_eq!(event.actor_id, None);
    assert_eq!(event.clinic_id, Some(fx.clinic_a));
}

// ---------------------------------------------------------------------------
// A store whose audit log rejects every append
// ---------------------------------------------------------------------------

struct OfflineAudit;

impl AuditRepository for OfflineAudit {
    async fn append(&self, _input: CreateAuditEvent) -> ClinicResult<AuditEvent> {
        Err(ClinicError::Database("audit log offline".into()))
    }

    async fn list(
        &self,
        _scope: TenantScope,
        _filter: AuditFilter,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<AuditEvent>> {
        Ok(PaginatedResult {
            items: Vec::new(),
            total: 0,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

struct WithOfflineAudit {
    inner: SurrealStore<Db>,
    audit: OfflineAudit,
}

impl Repositories for WithOfflineAudit {
    type Clinics = <SurrealStore<Db> as Repositories>::Clinics;
    type Staff = <SurrealStore<Db> as Repositories>::Staff;
    type Patients = <SurrealStore<Db> as Repositories>::Patients;
    type Visits = <SurrealStore<Db> as Repositories>::Visits;
    type Attachments = <SurrealStore<Db> as Repositories>::Attachments;
    type Audit = OfflineAudit;

    fn clinics(&self) -> &Self::Clinics {
        self.inner.clinics()
    }

    fn staff(&self) -> &Self::Staff {
        self.inner.staff()
    }

    fn patients(&self) -> &Self::Patients {
        self.inner.patients()
    }

    fn visits(&self) -> &Self::Visits {
        self.inner.visits()
    }

    fn attachments(&self) -> &Self::Attachments {
        self.inner.attachments()
    }

    fn audit(&self) -> &Self::Audit {
        &self.audit
    }
}

#[tokio::test]
async fn failed_audit_append_does_not_fail_the_action() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db);

    let clinic = store
        .clinics()
        .create(CreateClinic {
            name: "Nile Clinic".into(),
            phone: String::new(),
            address: String::new(),
        })
        .await
        .unwrap()
        .id;
    let doctor = store
        .staff()
        .create(
            TenantScope::Clinic(clinic),
            CreateStaff {
                username: "dr_amal".into(),
                email: "amal@clinic.test".into(),
                password: "correct horse battery".into(),
                role: Role::Doctor,
            },
        )
        .await
        .unwrap();

    let blob_root = std::env::temp_dir().join(format!("clinicore-test-{}", Uuid::new_v4()));
    let service = ClinicService::new(
        WithOfflineAudit {
            inner: store,
            audit: OfflineAudit,
        },
        LocalBlobStore::new(&blob_root),
        ServiceConfig::default(),
    );
    let session = Arc::new(MemorySession::new());
    let ctx = service
        .resolve(IncomingRequest {
            path: "/patients/".into(),
            principal: Some(Principal::from(&doctor)),
            client: ClientMeta::default(),
            session: session.clone(),
        })
        .unwrap();

    let patient = service
        .create_patient(
            &ctx,
            CreatePatient {
                full_name: "Samy Fawzy".into(),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();
    let stored = service
        .repositories()
        .patients()
        .get_by_id(TenantScope::Clinic(clinic), patient.id)
        .await
        .unwrap();
    assert_eq!(stored.full_name, "Samy Fawzy");

    // An unrecorded view leaves the throttle open for the next one.
    service.view_patient(&ctx, patient.id).await.unwrap();
    assert!(session.get(&ViewThrottle::session_key(patient.id)).is_none());

    let _ = std::fs::remove_dir_all(&blob_root);
}
