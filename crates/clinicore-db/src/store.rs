//! A [`Repositories`] bundle over one SurrealDB handle.

use clinicore_core::repository::Repositories;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealAttachmentRepository, SurrealAuditRepository, SurrealClinicRepository,
    SurrealPatientRepository, SurrealStaffRepository, SurrealVisitRepository,
};

/// All SurrealDB repositories sharing a single connection.
#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    clinics: SurrealClinicRepository<C>,
    staff: SurrealStaffRepository<C>,
    patients: SurrealPatientRepository<C>,
    visits: SurrealVisitRepository<C>,
    attachments: SurrealAttachmentRepository<C>,
    audit: SurrealAuditRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::build(db, None)
    }

    /// Like [`SurrealStore::new`], with a server-side password pepper.
    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self::build(db, Some(pepper))
    }

    fn build(db: Surreal<C>, pepper: Option<String>) -> Self {
        let staff = match pepper {
            Some(pepper) => SurrealStaffRepository::with_pepper(db.clone(), pepper),
            None => SurrealStaffRepository::new(db.clone()),
        };
        Self {
            clinics: SurrealClinicRepository::new(db.clone()),
            staff,
            patients: SurrealPatientRepository::new(db.clone()),
            visits: SurrealVisitRepository::new(db.clone()),
            attachments: SurrealAttachmentRepository::new(db.clone()),
            audit: SurrealAuditRepository::new(db),
        }
    }
}

impl<C: Connection> Repositories for SurrealStore<C> {
    type Clinics = SurrealClinicRepository<C>;
    type Staff = SurrealStaffRepository<C>;
    type Patients = SurrealPatientRepository<C>;
    type Visits = SurrealVisitRepository<C>;
    type Attachments = SurrealAttachmentRepository<C>;
    type Audit = SurrealAuditRepository<C>;

    fn clinics(&self) -> &Self::Clinics {
        &self.clinics
    }

    fn staff(&self) -> &Self::Staff {
        &self.staff
    }

    fn patients(&self) -> &Self::Patients {
        &self.patients
    }

    fn visits(&self) -> &Self::Visits {
        &self.visits
    }

    fn attachments(&self) -> &Self::Attachments {
        &self.attachments
    }

    fn audit(&self) -> &Self::Audit {
        &self.audit
    }
}
