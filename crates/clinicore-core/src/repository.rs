//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Every accessor for a
//! clinic-owned entity takes a [`TenantScope`]; implementations filter
//! reads by it and stamp writes from it (or from the parent patient,
//! for visits and attachments). Primary keys are not clinic-unique:
//! `(clinic, id)` is the effective identity, and a row outside the
//! scope is reported as [`crate::ClinicError::NotFound`].

use uuid::Uuid;

use crate::error::ClinicResult;
use crate::models::{
    attachment::{Attachment, CreateAttachment},
    audit::{AuditEvent, AuditFilter, CreateAuditEvent},
    clinic::{Clinic, CreateClinic, UpdateClinic},
    patient::{CreatePatient, DuplicateCandidate, Patient, UpdatePatient},
    staff::{CreateStaff, Staff, UpdateStaff},
    visit::{CreateVisit, UpdateVisit, Visit},
};
use crate::tenancy::TenantScope;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Clinic (tenancy root)
// ---------------------------------------------------------------------------

pub trait ClinicRepository: Send + Sync {
    fn create(&self, input: CreateClinic) -> impl Future<Output = ClinicResult<Clinic>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ClinicResult<Clinic>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateClinic,
    ) -> impl Future<Output = ClinicResult<Clinic>> + Send;
    /// Refused with a guard error while anything still references the
    /// clinic.
    fn delete(&self, id: Uuid) -> impl Future<Output = ClinicResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<Clinic>>> + Send;
}

// ---------------------------------------------------------------------------
// Clinic-scoped repositories
// ---------------------------------------------------------------------------

pub trait StaffRepository: Send + Sync {
    /// Creates a staff account in the scope's clinic.
    fn create(
        &self,
        scope: TenantScope,
        input: CreateStaff,
    ) -> impl Future<Output = ClinicResult<Staff>> + Send;
    /// Creates a platform operator with no clinic.
    fn create_superuser(
        &self,
        input: CreateStaff,
    ) -> impl Future<Output = ClinicResult<Staff>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<Staff>> + Send;
    fn get_by_username(
        &self,
        scope: TenantScope,
        username: &str,
    ) -> impl Future<Output = ClinicResult<Staff>> + Send;
    /// Applies the edit atomically, refusing it with a guard error if it
    /// would leave the account's clinic without an active admin.
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateStaff,
    ) -> impl Future<Output = ClinicResult<Staff>> + Send;
    fn count_active_admins(&self, clinic_id: Uuid) -> impl Future<Output = ClinicResult<u64>> + Send;
    /// Ordered by username.
    fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<Staff>>> + Send;
}

pub trait PatientRepository: Send + Sync {
    /// Creates a patient in the scope's clinic. A second patient with the
    /// same national ID in the same clinic is rejected with a field error.
    fn create(
        &self,
        scope: TenantScope,
        input: CreatePatient,
    ) -> impl Future<Output = ClinicResult<Patient>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<Patient>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdatePatient,
    ) -> impl Future<Output = ClinicResult<Patient>> + Send;
    /// Free-text search over normalized name, phone, and national ID,
    /// ordered by full name. An empty query lists everything in scope.
    fn search(
        &self,
        scope: TenantScope,
        query: &str,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<Patient>>> + Send;
    /// Patients in scope matching the national ID (case-insensitive) or
    /// the normalized phone. Empty inputs never match.
    fn find_duplicates(
        &self,
        scope: TenantScope,
        national_id: &str,
        phone: &str,
        limit: u64,
    ) -> impl Future<Output = ClinicResult<Vec<DuplicateCandidate>>> + Send;
    /// The clinic owning a patient, used to resolve audit tenants.
    fn owning_clinic(&self, id: Uuid) -> impl Future<Output = ClinicResult<Option<Uuid>>> + Send;
}

pub trait VisitRepository: Send + Sync {
    /// The stored clinic is the patient's, whatever `input.clinic_id` says.
    fn create(
        &self,
        scope: TenantScope,
        input: CreateVisit,
    ) -> impl Future<Output = ClinicResult<Visit>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<Visit>> + Send;
    /// Re-derives the clinic from the patient on every save.
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateVisit,
    ) -> impl Future<Output = ClinicResult<Visit>> + Send;
    /// Newest first.
    fn list_for_patient(
        &self,
        scope: TenantScope,
        patient_id: Uuid,
    ) -> impl Future<Output = ClinicResult<Vec<Visit>>> + Send;
    fn owning_clinic(&self, id: Uuid) -> impl Future<Output = ClinicResult<Option<Uuid>>> + Send;
}

pub trait AttachmentRepository: Send + Sync {
    /// The stored clinic is the patient's, whatever `input.clinic_id` says.
    fn create(
        &self,
        scope: TenantScope,
        input: CreateAttachment,
    ) -> impl Future<Output = ClinicResult<Attachment>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<Attachment>> + Send;
    fn delete(&self, scope: TenantScope, id: Uuid) -> impl Future<Output = ClinicResult<()>> + Send;
    /// Newest first.
    fn list_for_patient(
        &self,
        scope: TenantScope,
        patient_id: Uuid,
    ) -> impl Future<Output = ClinicResult<Vec<Attachment>>> + Send;
}

/// Append-only audit storage: events are never updated or deleted.
pub trait AuditRepository: Send + Sync {
    fn append(
        &self,
        input: CreateAuditEvent,
    ) -> impl Future<Output = ClinicResult<AuditEvent>> + Send;
    /// Newest first.
    fn list(
        &self,
        scope: TenantScope,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<AuditEvent>>> + Send;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// All repositories backed by one store.
pub trait Repositories: Send + Sync {
    type Clinics: ClinicRepository;
    type Staff: StaffRepository;
    type Patients: PatientRepository;
    type Visits: VisitRepository;
    type Attachments: AttachmentRepository;
    type Audit: AuditRepository;

    fn clinics(&self) -> &Self::Clinics;
    fn staff(&self) -> &Self::Staff;
    fn patients(&self) -> &Self::Patients;
    fn visits(&self) -> &Self::Visits;
    fn attachments(&self) -> &Self::Attachments;
    fn audit(&self) -> &Self::Audit;
}
