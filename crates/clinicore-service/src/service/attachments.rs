use clinicore_core::error::ClinicResult;
use clinicore_core::models::attachment::{Attachment, CreateAttachment, FileType};
use clinicore_core::models::audit::AuditAction;
use clinicore_core::repository::{AttachmentRepository, PatientRepository, Repositories};
use clinicore_core::storage::BlobStore;
use clinicore_core::{Capability, RequestContext, authorize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ClinicService, scope_of};
use crate::audit::AuditEntry;
use crate::upload;

/// A file submitted for a patient.
#[derive(Debug, Clone)]
pub struct UploadAttachment {
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub file_type: FileType,
    pub title: String,
    pub notes: String,
    /// Name as supplied by the client; only used for display and the
    /// sanitized stored name.
    pub filename: String,
    pub content: Vec<u8>,
}

/// How a download should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// A file ready to be served.
#[derive(Debug, Clone)]
pub struct Download {
    pub attachment: Attachment,
    pub content: Vec<u8>,
    pub disposition: Disposition,
}

impl Download {
    /// The `Content-Disposition` header value.
    pub fn content_disposition(&self) -> String {
        let kind = match self.disposition {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };
        let name: String = self
            .attachment
            .original_filename
            .chars()
            .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        format!("{kind}; filename=\"{name}\"")
    }

    pub fn content_type(&self) -> &str {
        if self.attachment.mime_type.is_empty() {
            "application/octet-stream"
        } else {
            &self.attachment.mime_type
        }
    }
}

impl<R: Repositories, B: BlobStore> ClinicService<R, B> {
    /// Store a file for a patient. Size, MIME type and checksum come from
    /// the content itself.
    pub async fn upload_attachment(
        &self,
        ctx: &RequestContext,
        input: UploadAttachment,
    ) -> ClinicResult<Attachment> {
        let actor = authorize(ctx, Capability::UploadFile)?;
        let scope = scope_of(ctx)?;

        let patient = self.repos.patients().get_by_id(scope, input.patient_id).await?;
        let inspected = upload::inspect(&self.config, &input.filename, &input.content)?;

        let id = Uuid::new_v4();
        let stored_path = upload::stored_path(patient.clinic_id, patient.id, id, &inspected);
        self.blobs.put(&stored_path, &input.content).await?;

        let create = CreateAttachment {
            id,
            clinic_id: None,
            patient_id: patient.id,
            visit_id: input.visit_id,
            uploaded_by: Some(actor.staff_id),
            stored_path: stored_path.clone(),
            original_filename: input.filename,
            file_type: input.file_type,
            file_size: inspected.size,
            mime_type: inspected.mime_type,
            sha256: inspected.sha256,
            title: input.title,
            notes: input.notes,
        };
        let attachment = match self.repos.attachments().create(scope, create).await {
            Ok(attachment) => attachment,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&stored_path).await {
                    warn!(path = %stored_path, error = %cleanup, "Orphaned blob after failed upload");
                }
                return Err(e);
            }
        };
        info!(
            attachment_id = %attachment.id,
            patient_id = %attachment.patient_id,
            bytes = attachment.file_size,
            "File uploaded"
        );

        let mut entry = AuditEntry::new(AuditAction::FileUploaded, &attachment)
            .patient(attachment.patient_id)
            .metadata(json!({
                "filename": attachment.original_filename,
                "file_type": attachment.file_type.as_str(),
                "file_size": attachment.file_size,
            }));
        if let Some(visit_id) = attachment.visit_id {
            entry = entry.visit(visit_id);
        }
        self.audit(ctx, entry).await;
        Ok(attachment)
    }

    /// Fetch a file. Images and PDFs are served inline, everything else
    /// as a download.
    pub async fn download_attachment(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<Download> {
        authorize(ctx, Capability::DownloadFile)?;
        let scope = scope_of(ctx)?;

        let attachment = self.repos.attachments().get_by_id(scope, id).await?;
        let content = self.blobs.get(&attachment.stored_path).await?;

        let entry = AuditEntry::new(AuditAction::FileDownloaded, &attachment)
            .patient(attachment.patient_id)
            .metadata(json!({ "filename": attachment.original_filename }));
        self.audit(ctx, entry).await;

        let disposition = if attachment.serves_inline() {
            Disposition::Inline
        } else {
            Disposition::Attachment
        };
        Ok(Download {
            attachment,
            content,
            disposition,
        })
    }

    /// Remove a file: the stored content first (best-effort), then the
    /// record, then the audit event.
    pub async fn delete_attachment(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<()> {
        authorize(ctx, Capability::DeleteFile)?;
        let scope = scope_of(ctx)?;

        let attachment = self.repos.attachments().get_by_id(scope, id).await?;
        if let Err(e) = self.blobs.delete(&attachment.stored_path).await {
            warn!(attachment_id = %id, error = %e, "Could not remove stored file");
        }
        self.repos.attachments().delete(scope, id).await?;
        info!(attachment_id = %id, "File deleted");

        let entry = AuditEntry::new(AuditAction::FileDeleted, &attachment)
            .patient(attachment.patient_id)
            .metadata(json!({
                "filename": attachment.original_filename,
                "file_type": attachment.file_type.as_str(),
            }));
        self.audit(ctx, entry).await;
        Ok(())
    }
}
