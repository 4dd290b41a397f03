//! File attachment domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClinicError;
use crate::tenancy::{AuditTarget, Tenanted};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Xray,
    #[serde(rename = "lab")]
    LabResult,
    Prescription,
    Report,
    #[default]
    Other,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Xray => "xray",
            FileType::LabResult => "lab",
            FileType::Prescription => "prescription",
            FileType::Report => "report",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xray" => Ok(FileType::Xray),
            "lab" => Ok(FileType::LabResult),
            "prescription" => Ok(FileType::Prescription),
            "report" => Ok(FileType::Report),
            "other" => Ok(FileType::Other),
            other => Err(ClinicError::validation(
                "file_type",
                format!("unknown file type: {other}"),
            )),
        }
    }
}

/// A stored document (x-ray, lab report, ...) attached to a patient
/// and optionally to one of the patient's visits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    /// Always the patient's clinic.
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    /// Blob-store path, namespaced by clinic and patient.
    pub stored_path: String,
    pub original_filename: String,
    pub file_type: FileType,
    /// Measured from the uploaded content.
    pub file_size: u64,
    /// Sniffed from the uploaded content.
    pub mime_type: String,
    /// Hex-encoded SHA-256 of the uploaded content.
    pub sha256: String,
    pub title: String,
    pub notes: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Attachment {
    /// Images and PDFs are rendered by the browser; everything else is
    /// offered as a download.
    pub fn serves_inline(&self) -> bool {
        self.mime_type.starts_with("image/") || self.mime_type == "application/pdf"
    }

    /// Human-readable size, e.g. `"1.5 MB"`.
    pub fn size_display(&self) -> String {
        let mut size = self.file_size as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{size:.1} {unit}");
            }
            size /= 1024.0;
        }
        format!("{size:.1} TB")
    }
}

/// Storage-layer input. Built by the upload operation after the
/// content has been measured and written to the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttachment {
    /// Pre-assigned so the blob path can embed it.
    pub id: Uuid,
    /// Ignored: the stored clinic is always the patient's clinic.
    pub clinic_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub stored_path: String,
    pub original_filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub mime_type: String,
    pub sha256: String,
    pub title: String,
    pub notes: String,
}

impl Tenanted for Attachment {
    fn clinic_id(&self) -> Option<Uuid> {
        Some(self.clinic_id)
    }
}

impl AuditTarget for Attachment {
    fn object_type(&self) -> &'static str {
        "files.Attachment"
    }

    fn object_id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime: &str, size: u64) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            visit_id: None,
            uploaded_by: None,
            stored_path: "clinic_x/patient_y/file.bin".into(),
            original_filename: "file.bin".into(),
            file_type: FileType::Other,
            file_size: size,
            mime_type: mime.into(),
            sha256: String::new(),
            title: String::new(),
            notes: String::new(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn images_and_pdfs_serve_inline() {
        assert!(attachment("image/png", 1).serves_inline());
        assert!(attachment("application/pdf", 1).serves_inline());
        assert!(!attachment("application/msword", 1).serves_inline());
    }

    #[test]
    fn size_display_scales_units() {
        assert_eq!(attachment("x", 512).size_display(), "512.0 B");
        assert_eq!(attachment("x", 1536).size_display(), "1.5 KB");
        assert_eq!(attachment("x", 10 * 1024 * 1024).size_display(), "10.0 MB");
    }

    #[test]
    fn file_type_parses_wire_names() {
        assert_eq!("lab".parse::<FileType>().unwrap(), FileType::LabResult);
        assert_eq!(FileType::Xray.to_string(), "xray");
        assert!("scan".parse::<FileType>().is_err());
    }
}
