//! Clinicore Core: domain models, repository traits, tenant scoping,
//! role authorization, and shared error types.
//!
//! Every clinical record belongs to exactly one clinic (the tenant).
//! This crate defines the contracts that keep reads and writes confined
//! to the acting user's clinic; `clinicore-db` implements them and
//! `clinicore-service` composes them into operations.

pub mod authz;
pub mod context;
pub mod error;
pub mod models;
pub mod normalize;
pub mod repository;
pub mod session;
pub mod storage;
pub mod tenancy;

pub use authz::{Capability, authorize};
pub use context::{ClientMeta, IncomingRequest, RequestContext};
pub use error::{ClinicError, ClinicResult, FieldErrors};
pub use tenancy::{AuditTarget, ExemptPaths, Principal, TenantResolver, TenantScope, Tenanted};
