//! Shared fixtures: an in-memory store, a scratch blob directory, and
//! contexts for staff members.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clinicore_core::context::{ClientMeta, IncomingRequest};
use clinicore_core::models::clinic::CreateClinic;
use clinicore_core::models::staff::{CreateStaff, Role, Staff};
use clinicore_core::repository::{ClinicRepository, Repositories, StaffRepository};
use clinicore_core::session::{MemorySession, SessionStore};
use clinicore_core::{Principal, RequestContext, TenantScope};
use clinicore_db::SurrealStore;
use clinicore_service::{ClinicService, LocalBlobStore, ServiceConfig};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub type Service = ClinicService<SurrealStore<Db>, LocalBlobStore>;

pub struct Fixture {
    pub service: Service,
    pub blob_root: PathBuf,
    pub clinic_a: Uuid,
    pub clinic_b: Uuid,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.blob_root);
    }
}

/// Helper: in-memory DB with migrations and two clinics.
pub async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();

    let store = SurrealStore::new(db);
    let clinic_a = store
        .clinics()
        .create(CreateClinic {
            name: "Nile Clinic".into(),
            phone: "0223456789".into(),
            address: "Cairo".into(),
        })
        .await
        .unwrap()
        .id;
    let clinic_b = store
        .clinics()
        .create(CreateClinic {
            name: "Delta Clinic".into(),
            phone: String::new(),
            address: "Tanta".into(),
        })
        .await
        .unwrap()
        .id;

    let blob_root = std::env::temp_dir().join(format!("clinicore-test-{}", Uuid::new_v4()));
    let service = ClinicService::new(
        store,
        LocalBlobStore::new(&blob_root),
        ServiceConfig::default(),
    );

    Fixture {
        service,
        blob_root,
        clinic_a,
        clinic_b,
    }
}

impl Fixture {
    pub async fn staff(&self, clinic_id: Uuid, username: &str, role: Role) -> Staff {
        self.service
            .repositories()
            .staff()
            .create(
                TenantScope::Clinic(clinic_id),
                CreateStaff {
                    username: username.into(),
                    email: format!("{username}@clinic.test"),
                    password: "correct horse battery".into(),
                    role,
                },
            )
            .await
            .unwrap()
    }

    /// A resolved context for `staff` with a fresh session.
    pub fn ctx(&self, staff: &Staff) -> RequestContext {
        self.ctx_with_session(staff, Arc::new(MemorySession::new()))
    }

    pub fn ctx_with_session(&self, staff: &Staff, session: Arc<dyn SessionStore>) -> RequestContext {
        self.service
            .resolve(IncomingRequest {
                path: "/patients/".into(),
                principal: Some(Principal::from(staff)),
                client: ClientMeta::from_headers(
                    Some("203.0.113.9, 10.0.0.1"),
                    Some("127.0.0.1"),
                    Some("integration-test"),
                ),
                session,
            })
            .unwrap()
    }

    pub fn anonymous(&self) -> RequestContext {
        self.service
            .resolve(IncomingRequest {
                path: "/patients/".into(),
                principal: None,
                client: ClientMeta::default(),
                session: Arc::new(MemorySession::new()),
            })
            .unwrap()
    }
}
