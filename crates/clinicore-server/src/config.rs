//! Server configuration: an optional `clinicore.toml`, overridden by
//! `CLINICORE__`-prefixed environment variables.
//!
//! `CLINICORE__DB__URL=db:8000` sets `db.url`;
//! `CLINICORE__SERVICE__MAX_UPLOAD_BYTES=5242880` sets the upload ceiling;
//! `CLINICORE__DB__PASSWORD_PEPPER` enables peppered password hashes.

use std::path::PathBuf;

use clinicore_db::DbConfig;
use clinicore_service::ServiceConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub service: ServiceConfig,
    /// Directory that holds uploaded files.
    pub media_root: PathBuf,
    /// Default tracing directive when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            service: ServiceConfig::default(),
            media_root: PathBuf::from("media"),
            log_filter: "clinicore=info".into(),
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("clinicore").required(false))
            .add_source(
                Environment::with_prefix("CLINICORE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: ServerConfig = Config::builder()
            .set_override("media_root", "/srv/clinicore/media")
            .unwrap()
            .set_override("service.view_throttle_secs", 60)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.media_root, PathBuf::from("/srv/clinicore/media"));
        assert_eq!(config.service.view_throttle_secs, 60);
        assert_eq!(config.service.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.db.namespace, "clinicore");
        assert_eq!(config.log_filter, "clinicore=info");
        assert!(config.db.password_pepper.is_none());
    }
}
