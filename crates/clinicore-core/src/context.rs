//! Per-operation request context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::SessionStore;
use crate::tenancy::{Principal, TenantScope};

/// Best-effort network metadata about the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: String,
}

impl ClientMeta {
    /// Build from raw header values. The left-most entry of
    /// `X-Forwarded-For` wins over the socket address.
    pub fn from_headers(
        forwarded_for: Option<&str>,
        remote_addr: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        let forwarded = forwarded_for
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        let ip_address = forwarded
            .or_else(|| remote_addr.map(str::trim).filter(|ip| !ip.is_empty()))
            .map(str::to_string);

        Self {
            ip_address,
            user_agent: user_agent.unwrap_or_default().to_string(),
        }
    }
}

/// What the surrounding system knows about an incoming operation
/// before tenant resolution.
pub struct IncomingRequest {
    pub path: String,
    /// `None` for anonymous callers.
    pub principal: Option<Principal>,
    pub client: ClientMeta,
    pub session: Arc<dyn SessionStore>,
}

/// The resolved, immutable context of one operation.
///
/// Only [`crate::tenancy::TenantResolver`] constructs this, so the
/// scope cannot be swapped mid-operation.
#[derive(Clone)]
pub struct RequestContext {
    pub(crate) principal: Option<Principal>,
    pub(crate) scope: Option<TenantScope>,
    pub(crate) exempt: bool,
    pub(crate) client: ClientMeta,
    pub(crate) session: Arc<dyn SessionStore>,
}

impl RequestContext {
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// `None` for anonymous callers and exempt paths.
    pub fn scope(&self) -> Option<TenantScope> {
        self.scope
    }

    pub fn is_exempt(&self) -> bool {
        self.exempt
    }

    pub fn client(&self) -> &ClientMeta {
        &self.client
    }

    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("principal", &self.principal)
            .field("scope", &self.scope)
            .field("exempt", &self.exempt)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
