//! Cross-clinic isolation tests for the clinic-owned repositories.

use chrono::NaiveDate;
use clinicore_core::TenantScope;
use clinicore_core::models::attachment::{CreateAttachment, FileType};
use clinicore_core::models::clinic::CreateClinic;
use clinicore_core::models::patient::{CreatePatient, UpdatePatient};
use clinicore_core::models::visit::{CreateVisit, UpdateVisit};
use clinicore_core::repository::{
    AttachmentRepository, ClinicRepository, Pagination, PatientRepository, Repositories,
    VisitRepository,
};
use clinicore_core::ClinicError;
use clinicore_db::SurrealStore;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: in-memory DB with two clinics.
async fn setup() -> (SurrealStore<Db>, Uuid, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();

    let store = SurrealStore::new(db);
    let a = store
        .clinics()
        .create(CreateClinic {
            name: "Nile Clinic".into(),
            phone: String::new(),
            address: String::new(),
        })
        .await
        .unwrap();
    let b = store
        .clinics()
        .create(CreateClinic {
            name: "Delta Clinic".into(),
            phone: String::new(),
            address: String::new(),
        })
        .await
        .unwrap();
    (store, a.id, b.id)
}

fn patient(name: &str, national_id: &str, phone: &str) -> CreatePatient {
    CreatePatient {
        full_name: name.into(),
        phone: phone.into(),
        national_id: national_id.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn patient_is_invisible_from_other_clinic() {
    let (store, a, b) = setup().await;
    let created = store
        .patients()
        .create(TenantScope::Clinic(a), patient("Mona Adel", "", ""))
        .await
        .unwrap();
    assert_eq!(created.clinic_id, a);

    let err = store
        .patients()
        .get_by_id(TenantScope::Clinic(b), created.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let listed = store
        .patients()
        .search(TenantScope::Clinic(b), "", Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 0);

    let global = store
        .patients()
        .get_by_id(TenantScope::Global, created.id)
        .await
        .unwrap();
    assert_eq!(global.id, created.id);
}

#[tokio::test]
async fn update_from_other_clinic_is_not_found() {
    let (store, a, b) = setup().await;
    let created = store
        .patients()
        .create(TenantScope::Clinic(a), patient("Mona Adel", "", ""))
        .await
        .unwrap();

    let err = store
        .patients()
        .update(
            TenantScope::Clinic(b),
            created.id,
            UpdatePatient {
                notes: Some("hijacked".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let unchanged = store
        .patients()
        .get_by_id(TenantScope::Clinic(a), created.id)
        .await
        .unwrap();
    assert_eq!(unchanged.notes, "");
}

#[tokio::test]
async fn create_without_clinic_scope_is_tenant_error() {
    let (store, _, _) = setup().await;
    let err = store
        .patients()
        .create(TenantScope::Global, patient("Nobody", "", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::TenantContext));
}

#[tokio::test]
async fn visit_takes_clinic_from_patient() {
    let (store, a, b) = setup().await;
    let p = store
        .patients()
        .create(TenantScope::Clinic(a), patient("Omar Said", "", ""))
        .await
        .unwrap();

    let visit = store
        .visits()
        .create(
            TenantScope::Clinic(a),
            CreateVisit {
                clinic_id: Some(b),
                patient_id: p.id,
                chief_complaint: "cough".into(),
                follow_up_date: NaiveDate::from_ymd_opt(2025, 1, 15),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(visit.clinic_id, a);
    assert_eq!(visit.follow_up_date, NaiveDate::from_ymd_opt(2025, 1, 15));

    let edited = store
        .visits()
        .update(
            TenantScope::Clinic(a),
            visit.id,
            UpdateVisit {
                clinic_id: Some(b),
                diagnosis: Some("bronchitis".into()),
                follow_up_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.clinic_id, a);
    assert_eq!(edited.diagnosis, "bronchitis");
    assert_eq!(edited.follow_up_date, None);

    assert_eq!(
        store.visits().owning_clinic(visit.id).await.unwrap(),
        Some(a)
    );
}

#[tokio::test]
async fn visit_for_foreign_patient_is_rejected() {
    let (store, a, b) = setup().await;
    let p = store
        .patients()
        .create(TenantScope::Clinic(a), patient("Omar Said", "", ""))
        .await
        .unwrap();

    let err = store
        .visits()
        .create(
            TenantScope::Clinic(b),
            CreateVisit {
                patient_id: p.id,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn attachment_visit_must_belong_to_same_patient() {
    let (store, a, _) = setup().await;
    let scope = TenantScope::Clinic(a);
    let first = store
        .patients()
        .create(scope, patient("First", "", ""))
        .await
        .unwrap();
    let second = store
        .patients()
        .create(scope, patient("Second", "", ""))
        .await
        .unwrap();
    let visit = store
        .visits()
        .create(
            scope,
            CreateVisit {
                patient_id: first.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let id = Uuid::new_v4();
    let err = store
        .attachments()
        .create(
            scope,
            CreateAttachment {
                id,
                clinic_id: None,
                patient_id: second.id,
                visit_id: Some(visit.id),
                uploaded_by: None,
                stored_path: format!("clinic_{a}/patient_{}/{id}_scan.png", second.id),
                original_filename: "scan.png".into(),
                file_type: FileType::Xray,
                file_size: 4,
                mime_type: "image/png".into(),
                sha256: "00".into(),
                title: String::new(),
                notes: String::new(),
            },
        )
        .await
        .unwrap_err();
    match err {
        ClinicError::Validation { errors } => assert!(errors.get("visit").is_some()),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn attachment_delete_is_scoped() {
    let (store, a, b) = setup().await;
    let p = store
        .patients()
        .create(TenantScope::Clinic(a), patient("Laila", "", ""))
        .await
        .unwrap();

    let id = Uuid::new_v4();
    let created = store
        .attachments()
        .create(
            TenantScope::Clinic(a),
            CreateAttachment {
                id,
                clinic_id: Some(b),
                patient_id: p.id,
                visit_id: None,
                uploaded_by: None,
                stored_path: format!("clinic_{a}/patient_{}/{id}_lab.pdf", p.id),
                original_filename: "lab.pdf".into(),
                file_type: FileType::LabResult,
                file_size: 1024,
                mime_type: "application/pdf".into(),
                sha256: "ab".into(),
                title: "CBC".into(),
                notes: String::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.clinic_id, a);

    let err = store
        .attachments()
        .delete(TenantScope::Clinic(b), id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    store
        .attachments()
        .delete(TenantScope::Clinic(a), id)
        .await
        .unwrap();
    let listed = store
        .attachments()
        .list_for_patient(TenantScope::Clinic(a), p.id)
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn clinic_with_patients_cannot_be_deleted() {
    let (store, a, b) = setup().await;
    store
        .patients()
        .create(TenantScope::Clinic(a), patient("Laila", "", ""))
        .await
        .unwrap();

    let err = store.clinics().delete(a).await.unwrap_err();
    assert!(matches!(err, ClinicError::Guard { .. }));

    store.clinics().delete(b).await.unwrap();
    assert!(store.clinics().get_by_id(b).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn deleting_a_patient_cascades_and_deleting_a_visit_unlinks() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();
    let store = SurrealStore::new(db.clone());

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
    let scope = TenantScope::Clinic(clinic);
    let patient = store
        .patients()
        .create(
            scope,
            CreatePatient {
                full_name: "Ola Magdy".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let visit = store
        .visits()
        .create(
            scope,
            CreateVisit {
                patient_id: patient.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let id = Uuid::new_v4();
    store
        .attachments()
        .create(
            scope,
            CreateAttachment {
                id,
                clinic_id: None,
                patient_id: patient.id,
                visit_id: Some(visit.id),
                uploaded_by: None,
                stored_path: format!("clinic_{clinic}/patient_{}/{id}_scan.png", patient.id),
                original_filename: "scan.png".into(),
                file_type: FileType::Xray,
                file_size: 4,
                mime_type: "image/png".into(),
                sha256: "00".into(),
                title: String::new(),
                notes: String::new(),
            },
        )
        .await
        .unwrap();

    db.query("DELETE type::record('visit', $id)")
        .bind(("id", visit.id.to_string()))
        .await
        .unwrap()
        .check()
        .unwrap();
    let unlinked = store.attachments().get_by_id(scope, id).await.unwrap();
    assert_eq!(unlinked.visit_id, None);

    db.query("DELETE type::record('patient', $id)")
        .bind(("id", patient.id.to_string()))
        .await
        .unwrap()
        .check()
        .unwrap();
    let err = store.attachments().get_by_id(scope, id).await.unwrap_err();
    assert!(matches!(err, ClinicError::NotFound { .. }));
}
