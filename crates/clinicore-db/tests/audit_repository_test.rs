//! Integration tests for the append-only audit store.

use clinicore_core::TenantScope;
use clinicore_core::models::audit::{AuditAction, AuditFilter, CreateAuditEvent};
use clinicore_core::repository::{AuditRepository, Pagination};
use clinicore_db::repository::SurrealAuditRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (SurrealAuditRepository<Db>, Surreal<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();
    (SurrealAuditRepository::new(db.clone()), db)
}

fn event(clinic_id: Option<Uuid>, action: AuditAction, patient_id: Option<Uuid>) -> CreateAuditEvent {
    CreateAuditEvent {
        clinic_id,
        actor_id: None,
        action,
        object_type: "patients.Patient".into(),
        object_id: patient_id.unwrap_or_else(Uuid::new_v4),
        patient_id,
        visit_id: None,
        ip_address: Some("10.0.0.1".into()),
        user_agent: "test-agent".into(),
        metadata: serde_json::json!({"source": "test"}),
    }
}

#[tokio::test]
async fn append_stores_display_and_metadata() {
    let (repo, _) = setup().await;
    let clinic = Uuid::new_v4();
    let patient = Uuid::new_v4();

    let stored = repo
        .append(event(Some(clinic), AuditAction::PatientCreated, Some(patient)))
        .await
        .unwrap();

    assert_eq!(stored.display, format!("patient_created patients.Patient:{patient}"));
    assert_eq!(stored.metadata["source"], "test");
    assert_eq!(stored.ip_address.as_deref(), Some("10.0.0.1"));
}

#[tokio::test]
async fn list_is_scoped_and_filterable() {
    let (repo, _) = setup().await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let patient = Uuid::new_v4();

    repo.append(event(Some(a), AuditAction::PatientCreated, Some(patient)))
        .await
        .unwrap();
    repo.append(event(Some(a), AuditAction::PatientViewed, Some(patient)))
        .await
        .unwrap();
    repo.append(event(Some(a), AuditAction::PatientViewed, None))
        .await
        .unwrap();
    repo.append(event(Some(b), AuditAction::PatientViewed, None))
        .await
        .unwrap();
    repo.append(event(None, AuditAction::UserCreated, None))
        .await
        .unwrap();

    let in_a = repo
        .list(TenantScope::Clinic(a), AuditFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(in_a.total, 3);
    assert!(in_a.items.iter().all(|e| e.clinic_id == Some(a)));

    let viewed = repo
        .list(
            TenantScope::Clinic(a),
            AuditFilter {
                action: Some(AuditAction::PatientViewed),
                patient_id: Some(patient),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(viewed.total, 1);

    let global = repo
        .list(TenantScope::Global, AuditFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(global.total, 5);
}

#[tokio::test]
async fn stored_events_are_read_only() {
    let (repo, db) = setup().await;
    let stored = repo
        .append(event(Some(Uuid::new_v4()), AuditAction::FileDeleted, None))
        .await
        .unwrap();

    let result = db
        .query("UPDATE type::record('audit_event', $id) SET display = 'tampered'")
        .bind(("id", stored.id.to_string()))
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "READONLY fields must reject updates");
}
