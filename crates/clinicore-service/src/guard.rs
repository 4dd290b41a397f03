//! Integrity guards evaluated before a write.
//!
//! These checks produce field-specific, actionable messages. The storage
//! layer remains the final authority: the national-ID unique index and
//! the transactional last-admin condition hold even if two writes race
//! past these checks.

use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::models::patient::DuplicateCandidate;
use clinicore_core::models::staff::{Role, Staff, UpdateStaff};
use clinicore_core::tenancy::Principal;
use tracing::warn;

/// Suspend a patient creation while candidates exist and the caller has
/// not confirmed.
pub fn check_duplicates(candidates: Vec<DuplicateCandidate>, confirmed: bool) -> ClinicResult<()> {
    if candidates.is_empty() || confirmed {
        return Ok(());
    }
    Err(ClinicError::DuplicateCandidates { candidates })
}

/// Guards for an admin editing a staff account.
///
/// `active_admins` is the current number of active admins in the
/// target's clinic.
pub fn check_staff_edit(
    actor: &Principal,
    target: &Staff,
    edit: &UpdateStaff,
    active_admins: u64,
) -> ClinicResult<()> {
    let demotes = edit.role.is_some_and(|r| r != Role::Admin);

    if target.id == actor.staff_id && target.role == Role::Admin && demotes {
        warn!(staff_id = %target.id, "Refusing self-demotion");
        return Err(ClinicError::guard(
            "role",
            "You cannot change your own admin role.",
        ));
    }

    if target.is_active_admin() && active_admins <= 1 {
        if demotes {
            return Err(ClinicError::guard(
                "role",
                "Cannot change role: this is the only active admin in the clinic.",
            ));
        }
        if edit.is_active == Some(false) {
            return Err(ClinicError::guard(
                "is_active",
                "Cannot deactivate: this is the only active admin in the clinic.",
            ));
        }
    }

    Ok(())
}

/// Guards for the activate/deactivate toggle.
pub fn check_toggle(actor: &Principal, target: &Staff, active_admins: u64) -> ClinicResult<()> {
    if target.id == actor.staff_id {
        warn!(staff_id = %target.id, "Refusing self-deactivation");
        return Err(ClinicError::guard(
            "is_active",
            "You cannot deactivate your own account.",
        ));
    }
    if target.is_active_admin() && active_admins <= 1 {
        return Err(ClinicError::guard(
            "is_active",
            "Cannot deactivate: this is the only active admin in the clinic.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn staff(role: Role, is_active: bool) -> Staff {
        Staff {
            id: Uuid::new_v4(),
            clinic_id: Some(Uuid::new_v4()),
            username: "someone".into(),
            email: String::new(),
            password_hash: String::new(),
            role,
            is_active,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn field(err: ClinicError) -> String {
        match err {
            ClinicError::Guard { field, .. } => field,
            other => panic!("expected guard error, got {other:?}"),
        }
    }

    #[test]
    fn self_demotion_is_rejected_even_with_other_admins() {
        let me = staff(Role::Admin, true);
        let actor = Principal::from(&me);
        let edit = UpdateStaff {
            role: Some(Role::Doctor),
            ..Default::default()
        };
        assert_eq!(field(check_staff_edit(&actor, &me, &edit, 5).unwrap_err()), "role");
    }

    #[test]
    fn last_admin_cannot_be_demoted_or_deactivated() {
        let actor = Principal::from(&staff(Role::Admin, true));
        let target = staff(Role::Admin, true);

        let demote = UpdateStaff {
            role: Some(Role::Assistant),
            ..Default::default()
        };
        assert_eq!(field(check_staff_edit(&actor, &target, &demote, 1).unwrap_err()), "role");

        let deactivate = UpdateStaff {
            is_active: Some(false),
            ..Default::default()
        };
        assert_eq!(
            field(check_staff_edit(&actor, &target, &deactivate, 1).unwrap_err()),
            "is_active"
        );

        assert!(check_staff_edit(&actor, &target, &demote, 2).is_ok());
    }

    #[test]
    fn inactive_admin_edits_are_not_guarded() {
        let actor = Principal::from(&staff(Role::Admin, true));
        let target = staff(Role::Admin, false);
        let edit = UpdateStaff {
            role: Some(Role::Doctor),
            ..Default::default()
        };
        assert!(check_staff_edit(&actor, &target, &edit, 1).is_ok());
    }

    #[test]
    fn toggle_rejects_self_and_last_admin() {
        let me = staff(Role::Admin, true);
        let actor = Principal::from(&me);
        assert_eq!(field(check_toggle(&actor, &me, 3).unwrap_err()), "is_active");

        let other_admin = staff(Role::Admin, true);
        assert!(check_toggle(&actor, &other_admin, 2).is_ok());
        assert!(check_toggle(&actor, &other_admin, 1).is_err());

        let doctor = staff(Role::Doctor, true);
        assert!(check_toggle(&actor, &doctor, 1).is_ok());
    }

    #[test]
    fn confirmed_duplicates_proceed() {
        assert!(check_duplicates(Vec::new(), false).is_ok());
    }
}
