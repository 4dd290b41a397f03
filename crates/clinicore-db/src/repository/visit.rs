//! SurrealDB implementation of [`VisitRepository`].
//!
//! A visit's clinic is never taken from the caller: it is copied from
//! the visit's patient on create and re-derived on every update.

use chrono::{DateTime, Utc};
use clinicore_core::TenantScope;
use clinicore_core::error::ClinicResult;
use clinicore_core::models::visit::{CreateVisit, UpdateVisit, Visit};
use clinicore_core::repository::VisitRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{
    ClinicIdRow, format_date, opt_uuid_string, parse_date, parse_opt_uuid, parse_uuid,
    scope_binding, scope_filter,
};
use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct VisitRowWithId {
    record_id: String,
    clinic_id: String,
    patient_id: String,
    doctor_id: Option<String>,
    visit_datetime: DateTime<Utc>,
    chief_complaint: String,
    clinical_notes: String,
    diagnosis: String,
    treatment_plan: String,
    follow_up_date: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VisitRowWithId {
    fn try_into_visit(self) -> Result<Visit, DbError> {
        Ok(Visit {
            id: parse_uuid("visit", &self.record_id)?,
            clinic_id: parse_uuid("clinic", &self.clinic_id)?,
            patient_id: parse_uuid("patient", &self.patient_id)?,
            doctor_id: parse_opt_uuid("doctor", self.doctor_id)?,
            visit_datetime: self.visit_datetime,
            chief_complaint: self.chief_complaint,
            clinical_notes: self.clinical_notes,
            diagnosis: self.diagnosis,
            treatment_plan: self.treatment_plan,
            follow_up_date: parse_date("follow_up_date", self.follow_up_date)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// The clinic of a patient visible in `scope`.
pub(crate) async fn patient_clinic<C: Connection>(
    db: &Surreal<C>,
    scope: TenantScope,
    patient_id: Uuid,
) -> ClinicResult<String> {
    let id_str = patient_id.to_string();
    let query = format!(
        "SELECT clinic_id FROM type::record('patient', $id) WHERE {}",
        scope_filter(scope)
    );

    let mut result = db
        .query(&query)
        .bind(("id", id_str.clone()))
        .bind(("clinic_id", scope_binding(scope)))
        .await
        .map_err(DbError::from)?;

    let rows: Vec<ClinicIdRow> = result.take(0).map_err(DbError::from)?;
    let clinic = rows
        .into_iter()
        .next()
        .and_then(|r| r.clinic_id)
        .ok_or_else(|| DbError::NotFound {
            entity: "patient".into(),
            id: id_str,
        })?;
    Ok(clinic)
}

/// SurrealDB implementation of the Visit repository.
#[derive(Clone)]
pub struct SurrealVisitRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealVisitRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> VisitRepository for SurrealVisitRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreateVisit) -> ClinicResult<Visit> {
        let clinic_id = patient_clinic(&self.db, scope, input.patient_id).await?;
        if input.clinic_id.is_some_and(|c| c.to_string() != clinic_id) {
            debug!(clinic_id, "Ignoring caller-supplied visit clinic");
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let visit_datetime = input.visit_datetime.unwrap_or_else(Utc::now);

        let result = self
            .db
            .query(
                "CREATE type::record('visit', $id) SET \
                 clinic_id = $clinic_id, patient_id = $patient_id, \
                 doctor_id = $doctor_id, visit_datetime = $visit_datetime, \
                 chief_complaint = $chief_complaint, \
                 clinical_notes = $clinical_notes, \
                 diagnosis = $diagnosis, treatment_plan = $treatment_plan, \
                 follow_up_date = $follow_up_date",
            )
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", clinic_id))
            .bind(("patient_id", input.patient_id.to_string()))
            .bind(("doctor_id", opt_uuid_string(input.doctor_id)))
            .bind(("visit_datetime", visit_datetime))
            .bind(("chief_complaint", input.chief_complaint))
            .bind(("clinical_notes", input.clinical_notes))
            .bind(("diagnosis", input.diagnosis))
            .bind(("treatment_plan", input.treatment_plan))
            .bind(("follow_up_date", format_date(input.follow_up_date)))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(scope, id).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> ClinicResult<Visit> {
        let id_str = id.to_string();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM type::record('visit', $id) WHERE {}",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VisitRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "visit".into(),
            id: id_str,
        })?;

        Ok(row.try_into_visit()?)
    }

    async fn update(&self, scope: TenantScope, id: Uuid, input: UpdateVisit) -> ClinicResult<Visit> {
        let current = self.get_by_id(scope, id).await?;
        let patient_clinic = patient_clinic(&self.db, scope, current.patient_id).await?;
        let id_str = id.to_string();

        let mut sets = vec!["clinic_id = $patient_clinic"];
        if input.visit_datetime.is_some() {
            sets.push("visit_datetime = $visit_datetime");
        }
        if input.chief_complaint.is_some() {
            sets.push("chief_complaint = $chief_complaint");
        }
        if input.clinical_notes.is_some() {
            sets.push("clinical_notes = $clinical_notes");
        }
        if input.diagnosis.is_some() {
            sets.push("diagnosis = $diagnosis");
        }
        if input.treatment_plan.is_some() {
            sets.push("treatment_plan = $treatment_plan");
        }
        if input.follow_up_date.is_some() {
            sets.push("follow_up_date = $follow_up_date");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('visit', $id) SET {} WHERE {}",
            sets.join(", "),
            scope_filter(scope)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)))
            .bind(("patient_clinic", patient_clinic));

        if let Some(visit_datetime) = input.visit_datetime {
            builder = builder.bind(("visit_datetime", visit_datetime));
        }
        if let Some(chief_complaint) = input.chief_complaint {
            builder = builder.bind(("chief_complaint", chief_complaint));
        }
        if let Some(clinical_notes) = input.clinical_notes {
            builder = builder.bind(("clinical_notes", clinical_notes));
        }
        if let Some(diagnosis) = input.diagnosis {
            builder = builder.bind(("diagnosis", diagnosis));
        }
        if let Some(treatment_plan) = input.treatment_plan {
            builder = builder.bind(("treatment_plan", treatment_plan));
        }
        if let Some(follow_up_date) = input.follow_up_date {
            builder = builder.bind(("follow_up_date", format_date(follow_up_date)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ClinicIdRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "visit".into(),
                id: id_str,
            }
            .into());
        }

        self.get_by_id(scope, id).await
    }

    async fn list_for_patient(&self, scope: TenantScope, patient_id: Uuid) -> ClinicResult<Vec<Visit>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM visit \
             WHERE {} AND patient_id = $patient_id \
             ORDER BY visit_datetime DESC",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("clinic_id", scope_binding(scope)))
            .bind(("patient_id", patient_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VisitRowWithId> = result.take(0).map_err(DbError::from)?;
        let visits = rows
            .into_iter()
            .map(|row| row.try_into_visit())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(visits)
    }

    async fn owning_clinic(&self, id: Uuid) -> ClinicResult<Option<Uuid>> {
        let mut result = self
            .db
            .query("SELECT clinic_id FROM type::record('visit', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClinicIdRow> = result.take(0).map_err(DbError::from)?;
        let clinic = rows.into_iter().next().and_then(|r| r.clinic_id);
        Ok(parse_opt_uuid("clinic", clinic)?)
    }
}
