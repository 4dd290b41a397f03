//! SurrealDB implementation of [`AuditRepository`].
//!
//! Audit events are append-only. This repository exposes no update or
//! delete path, and every field of `audit_event` is `READONLY`.

use chrono::{DateTime, Utc};
use clinicore_core::TenantScope;
use clinicore_core::error::ClinicResult;
use clinicore_core::models::audit::{AuditAction, AuditEvent, AuditFilter, CreateAuditEvent};
use clinicore_core::repository::{AuditRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, opt_uuid_string, parse_opt_uuid, parse_uuid, scope_binding, scope_filter};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AuditEventRow {
    clinic_id: Option<String>,
    actor_id: Option<String>,
    action: String,
    object_type: String,
    object_id: String,
    patient_id: Option<String>,
    visit_id: Option<String>,
    ip_address: Option<String>,
    user_agent: String,
    metadata: serde_json::Value,
    display: String,
    created_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AuditEventRowWithId {
    record_id: String,
    clinic_id: Option<String>,
    actor_id: Option<String>,
    action: String,
    object_type: String,
    object_id: String,
    patient_id: Option<String>,
    visit_id: Option<String>,
    ip_address: Option<String>,
    user_agent: String,
    metadata: serde_json::Value,
    display: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_event(self, id: Uuid) -> Result<AuditEvent, DbError> {
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|_| DbError::Corrupt(format!("unknown audit action: {}", self.action)))?;
        Ok(AuditEvent {
            id,
            clinic_id: parse_opt_uuid("clinic", self.clinic_id)?,
            actor_id: parse_opt_uuid("actor", self.actor_id)?,
            action,
            object_type: self.object_type,
            object_id: parse_uuid("object", &self.object_id)?,
            patient_id: parse_opt_uuid("patient", self.patient_id)?,
            visit_id: parse_opt_uuid("visit", self.visit_id)?,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: self.metadata,
            display: self.display,
            created_at: self.created_at,
        })
    }
}

impl AuditEventRowWithId {
    fn try_into_event(self) -> Result<AuditEvent, DbError> {
        let id = parse_uuid("audit event", &self.record_id)?;
        AuditEventRow {
            clinic_id: self.clinic_id,
            actor_id: self.actor_id,
            action: self.action,
            object_type: self.object_type,
            object_id: self.object_id,
            patient_id: self.patient_id,
            visit_id: self.visit_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: self.metadata,
            display: self.display,
            created_at: self.created_at,
        }
        .into_event(id)
    }
}

/// SurrealDB implementation of the Audit repository.
#[derive(Clone)]
pub struct SurrealAuditRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditRepository for SurrealAuditRepository<C> {
    async fn append(&self, input: CreateAuditEvent) -> ClinicResult<AuditEvent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let display = input.display();
        let metadata = if input.metadata.is_object() {
            input.metadata
        } else {
            serde_json::Value::Object(Default::default())
        };

        let result = self
            .db
            .query(
                "CREATE type::record('audit_event', $id) SET \
                 clinic_id = $clinic_id, actor_id = $actor_id, \
                 action = $action, object_type = $object_type, \
                 object_id = $object_id, patient_id = $patient_id, \
                 visit_id = $visit_id, ip_address = $ip_address, \
                 user_agent = $user_agent, metadata = $metadata, \
                 display = $display",
            )
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", opt_uuid_string(input.clinic_id)))
            .bind(("actor_id", opt_uuid_string(input.actor_id)))
            .bind(("action", input.action.as_str().to_string()))
            .bind(("object_type", input.object_type))
            .bind(("object_id", input.object_id.to_string()))
            .bind(("patient_id", opt_uuid_string(input.patient_id)))
            .bind(("visit_id", opt_uuid_string(input.visit_id)))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("metadata", metadata))
            .bind(("display", display))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<AuditEventRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_event".into(),
            id: id_str,
        })?;

        Ok(row.into_event(id)?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<AuditEvent>> {
        let mut conditions = vec![scope_filter(scope)];
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.patient_id.is_some() {
            conditions.push("patient_id = $patient_id");
        }
        let where_clause = conditions.join(" AND ");
        let clinic_id = scope_binding(scope);
        let action = filter.action.map(|a| a.as_str().to_string());
        let patient_id = opt_uuid_string(filter.patient_id);

        let count_query =
            format!("SELECT count() AS total FROM audit_event WHERE {where_clause} GROUP ALL");
        let mut count_result = self
            .db
            .query(&count_query)
            .bind(("clinic_id", clinic_id.clone()))
            .bind(("action", action.clone()))
            .bind(("patient_id", patient_id.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_event \
             WHERE {where_clause} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("clinic_id", clinic_id))
            .bind(("action", action))
            .bind(("patient_id", patient_id))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditEventRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
