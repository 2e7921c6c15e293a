//! Engine configuration loaded via OrthoConfig.
//!
//! Values come from `FEEDBACK_ENGINE_*` environment variables, configuration
//! files, and command-line flags in the usual OrthoConfig precedence.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::outbound::persistence::PoolConfig;

/// Settings for the engine binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FEEDBACK_ENGINE")]
pub struct EngineSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Connections kept open while idle.
    #[ortho_config(default = 2)]
    pub pool_min_idle: u32,
    /// Seconds to wait for a pooled connection.
    #[ortho_config(default = 30)]
    pub connection_timeout_secs: u64,
    /// Emit logs as JSON lines instead of human-readable text.
    #[ortho_config(default = true)]
    pub log_json: bool,
}

/// Raised when the settings cannot describe a usable pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("FEEDBACK_ENGINE_DATABASE_URL is not set")]
pub struct MissingDatabaseUrl;

impl EngineSettings {
    /// Build the connection pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`MissingDatabaseUrl`] when no database URL was configured.
    pub fn pool_config(&self) -> Result<PoolConfig, MissingDatabaseUrl> {
        let url = self.database_url.as_deref().ok_or(MissingDatabaseUrl)?;
        Ok(PoolConfig::new(url)
            .with_max_size(self.pool_max_size)
            .with_min_idle(Some(self.pool_min_idle))
            .with_connection_timeout(Duration::from_secs(self.connection_timeout_secs)))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for engine configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 5] = [
        "FEEDBACK_ENGINE_DATABASE_URL",
        "FEEDBACK_ENGINE_POOL_MAX_SIZE",
        "FEEDBACK_ENGINE_POOL_MIN_IDLE",
        "FEEDBACK_ENGINE_CONNECTION_TIMEOUT_SECS",
        "FEEDBACK_ENGINE_LOG_JSON",
    ];

    fn load_from_empty_args() -> EngineSettings {
        EngineSettings::load_from_iter([OsString::from("feedback-engine")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert!(settings.database_url.is_none());
        assert_eq!(settings.pool_max_size, 10);
        assert_eq!(settings.pool_min_idle, 2);
        assert_eq!(settings.connection_timeout_secs, 30);
        assert!(settings.log_json);
        assert_eq!(settings.pool_config(), Err(MissingDatabaseUrl));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "FEEDBACK_ENGINE_DATABASE_URL",
                Some("postgres://db/feedback".to_owned()),
            ),
            ("FEEDBACK_ENGINE_POOL_MAX_SIZE", Some("4".to_owned())),
            ("FEEDBACK_ENGINE_POOL_MIN_IDLE", Some("1".to_owned())),
            ("FEEDBACK_ENGINE_CONNECTION_TIMEOUT_SECS", Some("5".to_owned())),
            ("FEEDBACK_ENGINE_LOG_JSON", Some("false".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert!(!settings.log_json);

        let pool = settings.pool_config().expect("database url is set");
        assert_eq!(pool.database_url(), "postgres://db/feedback");
        assert_eq!(pool.max_size(), 4);
        assert_eq!(pool.min_idle(), Some(1));
        assert_eq!(pool.connection_timeout(), Duration::from_secs(5));
    }
}
