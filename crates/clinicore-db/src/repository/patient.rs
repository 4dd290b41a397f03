//! SurrealDB implementation of [`PatientRepository`].
//!
//! Besides the display fields, each row stores three derived keys:
//! `normalized_name` for search, `phone_normalized` for duplicate
//! detection, and `national_id_key`, which backs the per-clinic unique
//! index on national IDs.

use chrono::{DateTime, Utc};
use clinicore_core::TenantScope;
use clinicore_core::error::ClinicResult;
use clinicore_core::models::patient::{
    CreatePatient, DuplicateCandidate, DuplicateField, Patient, Sex, UpdatePatient,
};
use clinicore_core::normalize::{national_id_key, normalize_name, normalize_phone};
use clinicore_core::repository::{PaginatedResult, Pagination, PatientRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    ClinicIdRow, CountRow, format_date, parse_date, parse_opt_uuid, parse_uuid, scope_binding,
    scope_filter,
};
use crate::error::{DbError, UniqueIndex, check_unique};

const PATIENT_INDEXES: &[UniqueIndex] = &[UniqueIndex {
    index: "idx_patient_clinic_national_id",
    field: "national_id",
    message: "A patient with this national ID already exists in this clinic.",
}];

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct PatientRowWithId {
    record_id: String,
    clinic_id: String,
    full_name: String,
    normalized_name: String,
    phone: String,
    phone_normalized: String,
    national_id: String,
    sex: String,
    date_of_birth: Option<String>,
    address: String,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PatientRowWithId {
    fn try_into_patient(self) -> Result<Patient, DbError> {
        let id = parse_uuid("patient", &self.record_id)?;
        let clinic_id = parse_uuid("clinic", &self.clinic_id)?;
        let sex: Sex = self
            .sex
            .parse()
            .map_err(|_| DbError::Corrupt(format!("unknown sex code: {}", self.sex)))?;
        Ok(Patient {
            id,
            clinic_id,
            full_name: self.full_name,
            normalized_name: self.normalized_name,
            phone: self.phone,
            national_id: self.national_id,
            sex,
            date_of_birth: parse_date("date_of_birth", self.date_of_birth)?,
            address: self.address,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// Which identity fields of this row match the submitted values.
    fn matched_fields(&self, nid_key: &str, phone: &str) -> Vec<DuplicateField> {
        let mut matched = Vec::new();
        if !nid_key.is_empty() && national_id_key(&self.national_id) == nid_key {
            matched.push(DuplicateField::NationalId);
        }
        if !phone.is_empty() && self.phone_normalized == phone {
            matched.push(DuplicateField::Phone);
        }
        matched
    }
}

/// The unique-index key for a national ID. Blank IDs get a per-row key
/// so any number of patients may omit it.
fn uniqueness_key(id: Uuid, national_id: &str) -> String {
    let key = national_id_key(national_id);
    if key.is_empty() { format!("~{id}") } else { key }
}

/// SurrealDB implementation of the Patient repository.
#[derive(Clone)]
pub struct SurrealPatientRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPatientRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, scope: TenantScope, id: Uuid) -> ClinicResult<Patient> {
        let id_str = id.to_string();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM type::record('patient', $id) WHERE {}",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PatientRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "patient".into(),
            id: id_str,
        })?;

        Ok(row.try_into_patient()?)
    }
}

impl<C: Connection> PatientRepository for SurrealPatientRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreatePatient) -> ClinicResult<Patient> {
        let clinic_id = scope.require_clinic()?;
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let full_name = input.full_name.trim().to_string();
        let phone = input.phone.trim().to_string();
        let national_id = input.national_id.trim().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('patient', $id) SET \
                 clinic_id = $clinic_id, \
                 full_name = $full_name, normalized_name = $normalized_name, \
                 phone = $phone, phone_normalized = $phone_normalized, \
                 national_id = $national_id, national_id_key = $national_id_key, \
                 sex = $sex, date_of_birth = $date_of_birth, \
                 address = $address, notes = $notes",
            )
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", clinic_id.to_string()))
            .bind(("normalized_name", normalize_name(&full_name)))
            .bind(("full_name", full_name))
            .bind(("phone_normalized", normalize_phone(&phone)))
            .bind(("phone", phone))
            .bind(("national_id_key", uniqueness_key(id, &national_id)))
            .bind(("national_id", national_id))
            .bind(("sex", input.sex.as_str().to_string()))
            .bind(("date_of_birth", format_date(input.date_of_birth)))
            .bind(("address", input.address))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| check_unique(e.to_string(), PATIENT_INDEXES))?;

        self.fetch(scope, id).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> ClinicResult<Patient> {
        self.fetch(scope, id).await
    }

    async fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdatePatient,
    ) -> ClinicResult<Patient> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
            sets.push("normalized_name = $normalized_name");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
            sets.push("phone_normalized = $phone_normalized");
        }
        if input.national_id.is_some() {
            sets.push("national_id = $national_id");
            sets.push("national_id_key = $national_id_key");
        }
        if input.sex.is_some() {
            sets.push("sex = $sex");
        }
        if input.date_of_birth.is_some() {
            sets.push("date_of_birth = $date_of_birth");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('patient', $id) SET {} WHERE {}",
            sets.join(", "),
            scope_filter(scope)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)));

        if let Some(full_name) = input.full_name {
            let full_name = full_name.trim().to_string();
            builder = builder
                .bind(("normalized_name", normalize_name(&full_name)))
                .bind(("full_name", full_name));
        }
        if let Some(phone) = input.phone {
            let phone = phone.trim().to_string();
            builder = builder
                .bind(("phone_normalized", normalize_phone(&phone)))
                .bind(("phone", phone));
        }
        if let Some(national_id) = input.national_id {
            let national_id = national_id.trim().to_string();
            builder = builder
                .bind(("national_id_key", uniqueness_key(id, &national_id)))
                .bind(("national_id", national_id));
        }
        if let Some(sex) = input.sex {
            builder = builder.bind(("sex", sex.as_str().to_string()));
        }
        if let Some(date_of_birth) = input.date_of_birth {
            // Some(None) clears the stored date.
            builder = builder.bind(("date_of_birth", format_date(date_of_birth)));
        }
        if let Some(address) = input.address {
            builder = builder.bind(("address", address));
        }
        if let Some(notes) = input.notes {
            builder = builder.bind(("notes", notes));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| check_unique(e.to_string(), PATIENT_INDEXES))?;

        let rows: Vec<ClinicIdRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "patient".into(),
                id: id_str,
            }
            .into());
        }

        self.fetch(scope, id).await
    }

    async fn search(
        &self,
        scope: TenantScope,
        query: &str,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<Patient>> {
        let query = query.trim();
        let mut filter = scope_filter(scope).to_string();
        if !query.is_empty() {
            filter.push_str(
                " AND (string::contains(normalized_name, $q_name) \
                 OR string::contains(string::lowercase(phone), $q_lower) \
                 OR string::contains(string::lowercase(national_id), $q_lower) \
                 OR ($q_phone != '' AND string::contains(phone_normalized, $q_phone)))",
            );
        }
        let clinic_id = scope_binding(scope);
        let q_name = normalize_name(query);
        let q_lower = query.to_lowercase();
        let q_phone = normalize_phone(query);

        let count_query = format!("SELECT count() AS total FROM patient WHERE {filter} GROUP ALL");
        let mut count_result = self
            .db
            .query(&count_query)
            .bind(("clinic_id", clinic_id.clone()))
            .bind(("q_name", q_name.clone()))
            .bind(("q_lower", q_lower.clone()))
            .bind(("q_phone", q_phone.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let list_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM patient \
             WHERE {filter} \
             ORDER BY full_name ASC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&list_query)
            .bind(("clinic_id", clinic_id))
            .bind(("q_name", q_name))
            .bind(("q_lower", q_lower))
            .bind(("q_phone", q_phone))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PatientRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_patient())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn find_duplicates(
        &self,
        scope: TenantScope,
        national_id: &str,
        phone: &str,
        limit: u64,
    ) -> ClinicResult<Vec<DuplicateCandidate>> {
        let nid_key = national_id_key(national_id);
        let phone = normalize_phone(phone);
        if nid_key.is_empty() && phone.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM patient \
             WHERE {} AND (($nid_key != '' AND national_id_key = $nid_key) \
             OR ($phone != '' AND phone_normalized = $phone)) \
             ORDER BY full_name ASC \
             LIMIT $limit",
            scope_filter(scope)
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("clinic_id", scope_binding(scope)))
            .bind(("nid_key", nid_key.clone()))
            .bind(("phone", phone.clone()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PatientRowWithId> = result.take(0).map_err(DbError::from)?;

        let candidates = rows
            .into_iter()
            .map(|row| {
                let matched = row.matched_fields(&nid_key, &phone);
                row.try_into_patient()
                    .map(|patient| DuplicateCandidate { patient, matched })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(candidates)
    }

    async fn owning_clinic(&self, id: Uuid) -> ClinicResult<Option<Uuid>> {
        let mut result = self
            .db
            .query("SELECT clinic_id FROM type::record('patient', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClinicIdRow> = result.take(0).map_err(DbError::from)?;
        let clinic = rows.into_iter().next().and_then(|r| r.clinic_id);
        Ok(parse_opt_uuid("clinic", clinic)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_national_ids_get_distinct_keys() {
        let a = uniqueness_key(Uuid::new_v4(), "  ");
        let b = uniqueness_key(Uuid::new_v4(), "");
        assert_ne!(a, b);
        assert!(a.starts_with('~'));
    }

    #[test]
    fn national_id_key_ignores_case() {
        let id = Uuid::new_v4();
        assert_eq!(uniqueness_key(id, " AB123 "), uniqueness_key(id, "ab123"));
    }
}
