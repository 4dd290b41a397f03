//! Service configuration.

use clinicore_core::{ExemptPaths, TenantResolver};
use serde::Deserialize;

/// Configuration for [`crate::ClinicService`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upload ceiling in bytes (default: 10 MiB).
    pub max_upload_bytes: u64,
    /// Lowercase extensions, including the dot, accepted for uploads.
    pub allowed_extensions: Vec<String>,
    /// Rolling window for throttled `patient_viewed` events
    /// (default: 600 = 10 minutes).
    pub view_throttle_secs: u64,
    /// How many duplicate candidates to surface (default: 10).
    pub duplicate_candidate_limit: u64,
    /// Audit events shown on a patient detail (default: 50).
    pub patient_audit_limit: u64,
    /// Page size used when a caller does not supply one (default: 50).
    pub default_page_size: u64,
    /// Minimum password length for new staff accounts (default: 8).
    pub min_password_length: usize,
    /// Paths served without tenant resolution, matched exactly.
    pub exempt_exact: Vec<String>,
    /// Paths served without tenant resolution, matched by prefix.
    pub exempt_prefixes: Vec<String>,
    /// Where actors without a clinic are sent to sign in again.
    pub sign_in_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let exempt = ExemptPaths::default();
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_extensions: [
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".pdf", ".doc", ".docx",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            view_throttle_secs: 600,
            duplicate_candidate_limit: 10,
            patient_audit_limit: 50,
            default_page_size: 50,
            min_password_length: 8,
            exempt_exact: exempt.exact().to_vec(),
            exempt_prefixes: exempt.prefixes().to_vec(),
            sign_in_path: "/login/".into(),
        }
    }
}

impl ServiceConfig {
    /// The tenant resolver for the configured exempt paths.
    pub fn resolver(&self) -> TenantResolver {
        TenantResolver::new(
            ExemptPaths::new(self.exempt_exact.clone(), self.exempt_prefixes.clone()),
            self.sign_in_path.clone(),
        )
    }

    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}
