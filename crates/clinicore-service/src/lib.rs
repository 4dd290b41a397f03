//! Clinicore Service: tenant-scoped clinic operations with role
//! authorization, integrity guards, and audit recording.

pub mod audit;
pub mod blob;
pub mod config;
pub mod error;
pub mod guard;
pub mod service;
pub mod throttle;
pub mod upload;

pub use audit::{AuditEntry, AuditRecorder, TenantSource};
pub use blob::LocalBlobStore;
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use service::{ClinicService, Disposition, Download, PatientDetail, UploadAttachment};
pub use throttle::ViewThrottle;
