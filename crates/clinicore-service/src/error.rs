//! Service-layer error types.

use clinicore_core::error::ClinicError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("blob storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is {size} bytes; the limit is {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("the uploaded file is empty")]
    EmptyUpload,

    #[error("files of type '{0}' are not allowed")]
    ExtensionNotAllowed(String),

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("invalid blob path: {0}")]
    InvalidPath(String),
}

impl From<ServiceError> for ClinicError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UploadTooLarge { .. }
            | ServiceError::EmptyUpload
            | ServiceError::ExtensionNotAllowed(_) => ClinicError::validation("file", err.to_string()),
            ServiceError::PasswordTooShort { .. } => {
                ClinicError::validation("password", err.to_string())
            }
            ServiceError::Io(_) | ServiceError::InvalidPath(_) => {
                ClinicError::Storage(err.to_string())
            }
        }
    }
}
