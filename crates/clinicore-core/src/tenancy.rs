//! Tenant context resolution.
//!
//! Each incoming operation is resolved to a [`TenantScope`] exactly
//! once, by [`TenantResolver::resolve`]. The scope is frozen inside the
//! returned [`RequestContext`] and threaded explicitly through every
//! repository call; there is no ambient per-thread tenant.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::{IncomingRequest, RequestContext};
use crate::error::{ClinicError, ClinicResult};
use crate::models::staff::{Role, Staff};

/// Reason code attached to the sign-in redirect when an actor has no
/// clinic.
pub const NO_CLINIC_REASON: &str = "no_clinic";

/// The clinic boundary an operation runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenantScope {
    /// Rows are restricted to this clinic.
    Clinic(Uuid),
    /// Platform-operator scope: no clinic filter is applied. Only the
    /// resolver grants this, and only to superusers.
    Global,
}

impl TenantScope {
    pub fn clinic_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Clinic(id) => Some(*id),
            TenantScope::Global => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, TenantScope::Global)
    }

    /// Whether a row owned by `clinic_id` is visible in this scope.
    pub fn permits(&self, clinic_id: Option<Uuid>) -> bool {
        match self {
            TenantScope::Clinic(id) => clinic_id == Some(*id),
            TenantScope::Global => true,
        }
    }

    /// The concrete clinic, for writes that stamp a tenant directly.
    pub fn require_clinic(&self) -> ClinicResult<Uuid> {
        self.clinic_id().ok_or(ClinicError::TenantContext)
    }
}

/// Anything that belongs to a clinic.
pub trait Tenanted {
    fn clinic_id(&self) -> Option<Uuid>;
}

/// An object that audit events can point at.
pub trait AuditTarget: Tenanted {
    fn object_type(&self) -> &'static str;
    fn object_id(&self) -> Uuid;
}

/// The authenticated actor, as supplied by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub staff_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub role: Role,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<&Staff> for Principal {
    fn from(staff: &Staff) -> Self {
        Self {
            staff_id: staff.id,
            clinic_id: staff.clinic_id,
            role: staff.role,
            is_active: staff.is_active,
            is_superuser: staff.is_superuser,
        }
    }
}

/// Paths that are served without tenant resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptPaths {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl Default for ExemptPaths {
    fn default() -> Self {
        Self::new(
            ["/"],
            [
                "/login/", "/logout/", "/admin/", "/static/", "/media/", "/privacy/", "/terms/",
            ],
        )
    }
}

impl ExemptPaths {
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exact(&self) -> &[String] {
        &self.exact
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path) || self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Derives the acting clinic for each incoming operation.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    exempt: ExemptPaths,
    sign_in_path: String,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(ExemptPaths::default(), "/login/")
    }
}

impl TenantResolver {
    pub fn new(exempt: ExemptPaths, sign_in_path: impl Into<String>) -> Self {
        Self {
            exempt,
            sign_in_path: sign_in_path.into(),
        }
    }

    pub fn exempt_paths(&self) -> &ExemptPaths {
        &self.exempt
    }

    /// Resolve the tenant for one operation.
    ///
    /// - anonymous actors and exempt paths get no scope;
    /// - superusers get [`TenantScope::Global`];
    /// - actors with a clinic get that clinic;
    /// - anyone else is signed out (their session is flushed) and
    ///   receives [`ClinicError::TenantUnresolved`] with a redirect to
    ///   the sign-in page.
    pub fn resolve(&self, request: IncomingRequest) -> ClinicResult<RequestContext> {
        let IncomingRequest {
            path,
            principal,
            client,
            session,
        } = request;

        let exempt = self.exempt.is_exempt(&path);
        let scope = match &principal {
            None => None,
            Some(_) if exempt => None,
            Some(p) if p.is_superuser => Some(TenantScope::Global),
            Some(p) => match p.clinic_id {
                Some(clinic_id) => Some(TenantScope::Clinic(clinic_id)),
                None => {
                    warn!(
                        staff_id = %p.staff_id,
                        path = %path,
                        "Actor has no clinic; signing out"
                    );
                    session.flush();
                    return Err(ClinicError::TenantUnresolved {
                        reason_code: NO_CLINIC_REASON,
                        redirect_to: format!("{}?{}=1", self.sign_in_path, NO_CLINIC_REASON),
                    });
                }
            },
        };

        debug!(path = %path, exempt, scope = ?scope, "Resolved tenant scope");

        Ok(RequestContext {
            principal,
            scope,
            exempt,
            client,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ClientMeta;
    use crate::session::{MemorySession, SessionStore};

    fn principal(clinic_id: Option<Uuid>, is_superuser: bool) -> Principal {
        Principal {
            staff_id: Uuid::new_v4(),
            clinic_id,
            role: Role::Doctor,
            is_active: true,
            is_superuser,
        }
    }

    fn request(
        path: &str,
        principal: Option<Principal>,
        session: Arc<MemorySession>,
    ) -> IncomingRequest {
        IncomingRequest {
            path: path.into(),
            principal,
            client: ClientMeta::default(),
            session,
        }
    }

    #[test]
    fn default_exempt_paths_match_exact_and_prefix() {
        let exempt = ExemptPaths::default();
        assert!(exempt.is_exempt("/"));
        assert!(exempt.is_exempt("/login/"));
        assert!(exempt.is_exempt("/static/css/site.css"));
        assert!(!exempt.is_exempt("/patients/"));
        assert!(!exempt.is_exempt("/loginx"));
        assert!(exempt.exact().contains(&"/".to_string()));
        assert_eq!(exempt.prefixes().len(), 7);
    }

    #[test]
    fn clinic_member_gets_clinic_scope() {
        let clinic = Uuid::new_v4();
        let ctx = TenantResolver::default()
            .resolve(request(
                "/patients/",
                Some(principal(Some(clinic), false)),
                Arc::new(MemorySession::new()),
            ))
            .unwrap();
        assert_eq!(ctx.scope(), Some(TenantScope::Clinic(clinic)));
    }

    #[test]
    fn superuser_gets_global_scope_even_with_clinic() {
        let ctx = TenantResolver::default()
            .resolve(request(
                "/patients/",
                Some(principal(Some(Uuid::new_v4()), true)),
                Arc::new(MemorySession::new()),
            ))
            .unwrap();
        assert_eq!(ctx.scope(), Some(TenantScope::Global));
    }

    #[test]
    fn clinicless_actor_is_signed_out_and_redirected() {
        let session = Arc::new(MemorySession::new());
        session.set("seen", serde_json::json!(1));

        let err = TenantResolver::default()
            .resolve(request(
                "/patients/",
                Some(principal(None, false)),
                Arc::clone(&session),
            ))
            .unwrap_err();

        match err {
            ClinicError::TenantUnresolved {
                reason_code,
                redirect_to,
            } => {
                assert_eq!(reason_code, NO_CLINIC_REASON);
                assert_eq!(redirect_to, "/login/?no_clinic=1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.get("seen").is_none(), "session must be flushed");
    }

    #[test]
    fn exempt_path_skips_resolution() {
        let ctx = TenantResolver::default()
            .resolve(request(
                "/static/app.js",
                Some(principal(None, false)),
                Arc::new(MemorySession::new()),
            ))
            .unwrap();
        assert!(ctx.is_exempt());
        assert_eq!(ctx.scope(), None);
    }

    #[test]
    fn anonymous_actor_has_no_scope() {
        let ctx = TenantResolver::default()
            .resolve(request("/patients/", None, Arc::new(MemorySession::new())))
            .unwrap();
        assert!(ctx.principal().is_none());
        assert_eq!(ctx.scope(), None);
    }

    #[test]
    fn scope_permits_only_own_clinic() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(TenantScope::Clinic(a).permits(Some(a)));
        assert!(!TenantScope::Clinic(a).permits(Some(b)));
        assert!(!TenantScope::Clinic(a).permits(None));
        assert!(TenantScope::Global.permits(Some(b)));
        assert!(TenantScope::Global.require_clinic().is_err());
    }
}
