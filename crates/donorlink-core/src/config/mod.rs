//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod api;
pub mod logging;
pub mod matching;
pub mod realtime;
pub mod session;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::api::ApiConfig;
pub use self::logging::LoggingConfig;
pub use self::matching::MatchingConfig;
pub use self::realtime::RealtimeConfig;
pub use self::session::SessionConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML files
/// (base file + environment overlay) and `DONORLINK__*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// REST backend settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Push channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Match confirmation input rules.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// `path` may be given with or without the `.toml` extension. When an
    /// environment name is supplied, `config/{env}.toml` is layered on top.
    /// Variables prefixed with `DONORLINK__` override both, using `__` as the
    /// section separator (e.g. `DONORLINK__API__BASE_URL`).
    pub fn load(path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let base = path.strip_suffix(".toml").unwrap_or(path);
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(base).required(false));

        if let Some(env) = env {
            let overlay = Path::new(base)
                .parent()
                .map(|dir| dir.join(env))
                .unwrap_or_else(|| Path::new(env).to_path_buf());
            builder = builder.add_source(
                config::File::with_name(&overlay.to_string_lossy()).required(false),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("DONORLINK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
