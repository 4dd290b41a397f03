//! SurrealDB implementation of [`ClinicRepository`].

use chrono::{DateTime, Utc};
use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::models::clinic::{Clinic, CreateClinic, UpdateClinic};
use clinicore_core::repository::{ClinicRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ClinicRow {
    name: String,
    phone: String,
    address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ClinicRowWithId {
    record_id: String,
    name: String,
    phone: String,
    address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClinicRow {
    fn into_clinic(self, id: Uuid) -> Clinic {
        Clinic {
            id,
            name: self.name,
            phone: self.phone,
            address: self.address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ClinicRowWithId {
    fn try_into_clinic(self) -> Result<Clinic, DbError> {
        let id = parse_uuid("clinic", &self.record_id)?;
        Ok(Clinic {
            id,
            name: self.name,
            phone: self.phone,
            address: self.address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Tables whose rows pin a clinic in place.
const DEPENDENT_TABLES: [&str; 5] = ["staff", "patient", "visit", "attachment", "audit_event"];

/// SurrealDB implementation of the Clinic repository.
#[derive(Clone)]
pub struct SurrealClinicRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealClinicRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ClinicRepository for SurrealClinicRepository<C> {
    async fn create(&self, input: CreateClinic) -> ClinicResult<Clinic> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('clinic', $id) SET \
                 name = $name, phone = $phone, address = $address",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("phone", input.phone))
            .bind(("address", input.address))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ClinicRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "clinic".into(),
            id: id_str,
        })?;

        Ok(row.into_clinic(id))
    }

    async fn get_by_id(&self, id: Uuid) -> ClinicResult<Clinic> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('clinic', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClinicRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "clinic".into(),
            id: id_str,
        })?;

        Ok(row.into_clinic(id))
    }

    async fn update(&self, id: Uuid, input: UpdateClinic) -> ClinicResult<Clinic> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('clinic', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(address) = input.address {
            builder = builder.bind(("address", address));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ClinicRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "clinic".into(),
            id: id_str,
        })?;

        Ok(row.into_clinic(id))
    }

    async fn delete(&self, id: Uuid) -> ClinicResult<()> {
        let id_str = id.to_string();

        // Existence first, so deleting an unknown clinic is NotFound.
        self.get_by_id(id).await?;

        for table in DEPENDENT_TABLES {
            let query =
                format!("SELECT count() AS total FROM {table} WHERE clinic_id = $id GROUP ALL");
            let mut result = self
                .db
                .query(&query)
                .bind(("id", id_str.clone()))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
            let total = rows.first().map(|r| r.total).unwrap_or(0);
            if total > 0 {
                warn!(clinic_id = %id, table, total, "Refusing to delete referenced clinic");
                return Err(ClinicError::guard(
                    "clinic",
                    format!("clinic still has {total} {table} record(s)"),
                ));
            }
        }

        self.db
            .query("DELETE type::record('clinic', $id)")
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> ClinicResult<PaginatedResult<Clinic>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM clinic GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM clinic \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClinicRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_clinic())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
