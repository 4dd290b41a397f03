//! Clinic operations.
//!
//! Every operation follows the same order: check the capability, take
//! the scope from the already-resolved context, go through the scoped
//! repositories, and record an audit event once the write has
//! committed.

mod accounts;
mod attachments;
mod clinic;
mod patients;
mod visits;

pub use attachments::{Disposition, Download, UploadAttachment};
pub use patients::PatientDetail;

use clinicore_core::context::IncomingRequest;
use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::models::audit::{AuditEvent, AuditFilter};
use clinicore_core::repository::{AuditRepository, PaginatedResult, Pagination, Repositories};
use clinicore_core::storage::BlobStore;
use clinicore_core::{Capability, RequestContext, TenantResolver, TenantScope, authorize};

use crate::audit::{AuditEntry, AuditRecorder};
use crate::config::ServiceConfig;
use crate::throttle::ViewThrottle;

/// The clinic records service.
///
/// Generic over the repository bundle and blob store so that the
/// service layer has no dependency on the database crate.
pub struct ClinicService<R: Repositories, B: BlobStore> {
    repos: R,
    blobs: B,
    config: ServiceConfig,
    resolver: TenantResolver,
    throttle: ViewThrottle,
}

impl<R: Repositories, B: BlobStore> ClinicService<R, B> {
    pub fn new(repos: R, blobs: B, config: ServiceConfig) -> Self {
        Self {
            resolver: config.resolver(),
            throttle: ViewThrottle::new(config.view_throttle_secs),
            repos,
            blobs,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn repositories(&self) -> &R {
        &self.repos
    }

    /// Resolve the tenant of an incoming operation. Call once per
    /// operation and pass the context to every call that follows.
    pub fn resolve(&self, request: IncomingRequest) -> ClinicResult<RequestContext> {
        self.resolver.resolve(request)
    }

    /// First page using the configured page size.
    pub fn first_page(&self) -> Pagination {
        Pagination {
            offset: 0,
            limit: self.config.default_page_size,
        }
    }

    /// Tenant-scoped audit trail, newest first.
    pub async fn list_audit_events(
        &self,
        ctx: &RequestContext,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<AuditEvent>> {
        authorize(ctx, Capability::ViewAudit)?;
        let scope = scope_of(ctx)?;
        self.repos.audit().list(scope, filter, pagination).await
    }

    fn recorder(&self) -> AuditRecorder<'_, R> {
        AuditRecorder::new(&self.repos)
    }

    async fn audit(&self, ctx: &RequestContext, entry: AuditEntry) -> Option<AuditEvent> {
        self.recorder().record(ctx, entry).await
    }
}

/// The operation's scope. Exempt paths and anonymous callers have none.
fn scope_of(ctx: &RequestContext) -> ClinicResult<TenantScope> {
    ctx.scope().ok_or(ClinicError::TenantContext)
}

/// Reject blank required text fields.
fn require_text(field: &str, value: &str) -> ClinicResult<()> {
    if value.trim().is_empty() {
        return Err(ClinicError::validation(field, "This field is required."));
    }
    Ok(())
}
