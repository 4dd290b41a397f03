//! SurrealDB implementation of [`AttachmentRepository`].

use chrono::{DateTime, Utc};
use clinicore_core::TenantScope;
use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::models::attachment::{Attachment, CreateAttachment, FileType};
use clinicore_core::repository::AttachmentRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::visit::patient_clinic;
use super::{opt_uuid_string, parse_opt_uuid, parse_uuid, scope_binding, scope_filter};
use crate::error::{DbError, UniqueIndex, check_unique};

const ATTACHMENT_INDEXES: &[UniqueIndex] = &[UniqueIndex {
    index: "idx_attachment_stored_path",
    field: "file",
    message: "A file is already stored at this path.",
}];

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AttachmentRowWithId {
    record_id: String,
    clinic_id: String,
    patient_id: String,
    visit_id: Option<String>,
    uploaded_by: Option<String>,
    stored_path: String,
    original_filename: String,
    file_type: String,
    file_size: u64,
    mime_type: String,
    sha256: String,
    title: String,
    notes: String,
    uploaded_at: DateTime<Utc>,
}

impl AttachmentRowWithId {
    fn try_into_attachment(self) -> Result<Attachment, DbError> {
        let file_type: FileType = self
            .file_type
            .parse()
            .map_err(|_| DbError::Corrupt(format!("unknown file type: {}", self.file_type)))?;
        Ok(Attachment {
            id: parse_uuid("attachment", &self.record_id)?,
            clinic_id: parse_uuid("clinic", &self.clinic_id)?,
            patient_id: parse_uuid("patient", &self.patient_id)?,
            visit_id: parse_opt_uuid("visit", self.visit_id)?,
            uploaded_by: parse_opt_uuid("uploader", self.uploaded_by)?,
            stored_path: self.stored_path,
            original_filename: self.original_filename,
            file_type,
            file_size: self.file_size,
            mime_type: self.mime_type,
            sha256: self.sha256,
            title: self.title,
            notes: self.notes,
            uploaded_at: self.uploaded_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct VisitPatientRow {
    patient_id: String,
}

/// SurrealDB implementation of the Attachment repository.
#[derive(Clone)]
pub struct SurrealAttachmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAttachmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Rejects a visit that is out of scope or belongs to another patient.
    async fn check_visit(
        &self,
        scope: TenantScope,
        visit_id: Uuid,
        patient_id: Uuid,
    ) -> ClinicResult<()> {
        let query = format!(
            "SELECT patient_id FROM type::record('visit', $id) WHERE {}",
            scope_filter(scope)
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", visit_id.to_string()))
            .bind(("clinic_id", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VisitPatientRow> = result.take(0).map_err(DbError::from)?;
        match rows.first() {
            Some(row) if row.patient_id == patient_id.to_string() => Ok(()),
            Some(_) => Err(ClinicError::validation(
                "visit",
                "The visit belongs to a different patient.",
            )),
            None => Err(ClinicError::not_found("visit", visit_id)),
        }
    }
}

impl<C: Connection> AttachmentRepository for SurrealAttachmentRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreateAttachment) -> ClinicResult<Attachment> {
        let clinic_id = patient_clinic(&self.db, scope, input.patient_id).await?;
        if let Some(visit_id) = input.visit_id {
            self.check_visit(scope, visit_id, input.patient_id).await?;
        }

        let id_str = input.id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('attachment', $id) SET \
                 clinic_id = $clinic_id, patient_id = $patient_id, \
                 visit_id = $visit_id, uploaded_by = $uploaded_by, \
                 stored_path = $stored_path, \
                 original_filename = $original_filename, \
                 file_type = $file_type, file_size = $file_size, \
                 mime_type = $mime_type, sha256 = $sha256, \
                 title = $title, notes = $notes",
            )
            .bind(("id", id_str))
            .bind(("clinic_id", clinic_id))
            .bind(("patient_id", input.patient_id.to_string()))
            .bind(("visit_id", opt_uuid_string(input.visit_id)))
            .bind(("uploaded_by", opt_uuid_string(input.uploaded_by)))
            .bind(("stored_path", input.stored_path))
            .bind(("original_filename", input.original_filename))
            .bind(("file_type", input.file_type.as_str().to_string()))
            .bind(("file_size", input.file_size))
            .bind(("mime_type", input.mime_type))
            .bind(("sha256", input.sha256))
            .bind(("title", input.title))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| check_unique(e.to_string(), ATTACHMENT_INDEXES))?;

        self.get_by_id(scope, input.id).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> ClinicResult<Attachment> {
        let id_str = id.to_string();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM type::record('attachment', $id) WHERE {}",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttachmentRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attachment".into(),
            id: id_str,
        })?;

        Ok(row.try_into_attachment()?)
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> ClinicResult<()> {
        let id_str = id.to_string();
        let query = format!(
            "DELETE type::record('attachment', $id) WHERE {} RETURN BEFORE",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("clinic_id", scope_binding(scope)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<VisitPatientRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "attachment".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn list_for_patient(
        &self,
        scope: TenantScope,
        patient_id: Uuid,
    ) -> ClinicResult<Vec<Attachment>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM attachment \
             WHERE {} AND patient_id = $patient_id \
             ORDER BY uploaded_at DESC",
            scope_filter(scope)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("clinic_id", scope_binding(scope)))
            .bind(("patient_id", patient_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttachmentRowWithId> = result.take(0).map_err(DbError::from)?;
        let attachments = rows
            .into_iter()
            .map(|row| row.try_into_attachment())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(attachments)
    }
}
