use clinicore_core::error::ClinicResult;
use clinicore_core::models::audit::AuditAction;
use clinicore_core::models::staff::{CreateStaff, Staff, UpdateStaff};
use clinicore_core::repository::{PaginatedResult, Pagination, Repositories, StaffRepository};
use clinicore_core::storage::BlobStore;
use clinicore_core::{Capability, RequestContext, authorize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{ClinicService, require_text, scope_of};
use crate::audit::AuditEntry;
use crate::error::ServiceError;
use crate::guard;

impl<R: Repositories, B: BlobStore> ClinicService<R, B> {
    /// Staff of the acting clinic, ordered by username.
    pub async fn list_staff(
        &self,
        ctx: &RequestContext,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<Staff>> {
        authorize(ctx, Capability::ManageAccounts)?;
        let scope = scope_of(ctx)?;
        self.repos.staff().list(scope, pagination).await
    }

    pub async fn create_staff(&self, ctx: &RequestContext, input: CreateStaff) -> ClinicResult<Staff> {
        authorize(ctx, Capability::ManageAccounts)?;
        let scope = scope_of(ctx)?;
        require_text("username", &input.username)?;
        if input.password.chars().count() < self.config.min_password_length {
            return Err(ServiceError::PasswordTooShort {
                min: self.config.min_password_length,
            }
            .into());
        }

        let staff = self.repos.staff().create(scope, input).await?;
        info!(staff_id = %staff.id, role = %staff.role, "Staff account created");

        let entry = AuditEntry::new(AuditAction::UserCreated, &staff).metadata(json!({
            "username": staff.username,
            "role": staff.role.as_str(),
        }));
        self.audit(ctx, entry).await;
        Ok(staff)
    }

    /// Edit email, role or active flag. Admins cannot demote themselves
    /// and a clinic always keeps an active admin.
    pub async fn edit_staff(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdateStaff,
    ) -> ClinicResult<Staff> {
        let actor = authorize(ctx, Capability::ManageAccounts)?;
        let scope = scope_of(ctx)?;

        let target = self.repos.staff().get_by_id(scope, id).await?;
        let active_admins = self.active_admins_for(&target).await?;
        guard::check_staff_edit(actor, &target, &input, active_admins)?;

        let staff = self.repos.staff().update(scope, id, input).await?;
        let entry = AuditEntry::new(AuditAction::UserEdited, &staff).metadata(json!({
            "username": staff.username,
            "role": staff.role.as_str(),
        }));
        self.audit(ctx, entry).await;
        Ok(staff)
    }

    /// Flip an account between active and inactive.
    pub async fn toggle_staff_active(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<Staff> {
        let actor = authorize(ctx, Capability::ManageAccounts)?;
        let scope = scope_of(ctx)?;

        let target = self.repos.staff().get_by_id(scope, id).await?;
        let active_admins = self.active_admins_for(&target).await?;
        guard::check_toggle(actor, &target, active_admins)?;

        let edit = UpdateStaff {
            is_active: Some(!target.is_active),
            ..Default::default()
        };
        let staff = self.repos.staff().update(scope, id, edit).await?;
        info!(staff_id = %staff.id, is_active = staff.is_active, "Staff active flag toggled");

        let entry = AuditEntry::new(AuditAction::UserDeactivated, &staff).metadata(json!({
            "username": staff.username,
            "is_active": staff.is_active,
        }));
        self.audit(ctx, entry).await;
        Ok(staff)
    }

    /// Active admins in the target's clinic. Accounts without a clinic
    /// are never subject to the last-admin rule.
    async fn active_admins_for(&self, target: &Staff) -> ClinicResult<u64> {
        match target.clinic_id {
            Some(clinic_id) => self.repos.staff().count_active_admins(clinic_id).await,
            None => Ok(u64::MAX),
        }
    }
}
