//! Upload policy, content inspection, and blob path layout.

use clinicore_core::normalize::sanitize_filename;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// Facts about an upload derived from its content, never from
/// client-declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedUpload {
    pub stem: String,
    pub extension: String,
    pub size: u64,
    pub mime_type: String,
    pub sha256: String,
}

/// Check `content` against the upload policy and derive its metadata.
pub fn inspect(
    config: &ServiceConfig,
    filename: &str,
    content: &[u8],
) -> Result<InspectedUpload, ServiceError> {
    let size = content.len() as u64;
    if size == 0 {
        return Err(ServiceError::EmptyUpload);
    }
    if size > config.max_upload_bytes {
        return Err(ServiceError::UploadTooLarge {
            size,
            limit: config.max_upload_bytes,
        });
    }

    let (stem, extension) = sanitize_filename(filename);
    if !config.allows_extension(&extension) {
        let shown = if extension.is_empty() { "(none)".to_string() } else { extension };
        return Err(ServiceError::ExtensionNotAllowed(shown));
    }

    Ok(InspectedUpload {
        mime_type: sniff_mime(content, &extension).to_string(),
        sha256: hex::encode(Sha256::digest(content)),
        stem,
        extension,
        size,
    })
}

/// Relative blob path: `clinic_<clinic>/patient_<patient>/<attachment>_<stem><ext>`.
///
/// The attachment id prefix keeps two uploads with the same name apart.
pub fn stored_path(
    clinic_id: Uuid,
    patient_id: Uuid,
    attachment_id: Uuid,
    upload: &InspectedUpload,
) -> String {
    let name = if upload.stem.is_empty() {
        format!("{attachment_id}{}", upload.extension)
    } else {
        format!("{attachment_id}_{}{}", upload.stem, upload.extension)
    };
    format!("clinic_{clinic_id}/patient_{patient_id}/{name}")
}

/// Identify the content type from leading magic bytes, falling back to
/// the extension.
pub fn sniff_mime(content: &[u8], extension: &str) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"%PDF-", "application/pdf"),
        (b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1", "application/msword"),
    ];

    if content.len() >= 12 && &content[..4] == b"RIFF" && &content[8..12] == b"WEBP" {
        return "image/webp";
    }
    if content.starts_with(b"PK\x03\x04") && extension == ".docx" {
        return "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    }
    if let Some(&(_, mime)) = SIGNATURES.iter().find(|(magic, _)| content.starts_with(magic)) {
        return mime;
    }

    match extension {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".bmp" => "image/bmp",
        ".webp" => "image/webp",
        ".pdf" => "application/pdf",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
