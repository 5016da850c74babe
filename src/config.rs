use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Permitflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermitflowConfig {
    /// Record store settings (optional; in-memory store needs none)
    pub store: Option<StoreConfig>,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Workflow engine settings
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Bound on guarded write retries before a conflict surfaces
    pub max_write_attempts: u32,
}

impl Default for PermitflowConfig {
    fn default() -> Self {
        Self {
            store: Some(StoreConfig {
                url: ".permitflow/permitflow.db".to_string(),
                max_connections: 10,
                auto_migrate: true,
            }),
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
            engine: EngineConfig {
                max_write_attempts: 3,
            },
        }
    }
}

impl PermitflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (permitflow.toml, .permitflow-rc)
    /// 3. Environment variables (prefixed with PERMITFLOW_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("permitflow.toml").exists() {
            builder = builder.add_source(File::with_name("permitflow"));
        }

        if Path::new(".permitflow-rc").exists() {
            builder = builder.add_source(File::with_name(".permitflow-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("PERMITFLOW")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let permitflow_config: PermitflowConfig = config.try_deserialize()?;

        Ok(permitflow_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    /// Retry policy for the concurrency guard, from engine settings.
    pub fn retry_policy(&self) -> crate::engine::RetryPolicy {
        crate::engine::RetryPolicy {
            max_write_attempts: self.engine.max_write_attempts.max(1),
        }
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<PermitflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = PermitflowConfig::load_env_file();
        PermitflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static PermitflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_at_least_one_write_attempt() {
        let mut config = PermitflowConfig::default();
        config.engine.max_write_attempts = 0;
        assert_eq!(config.retry_policy().max_write_attempts, 1);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PermitflowConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: PermitflowConfig = toml::from_str(&text).unwrap();
        assert_eq!(
            parsed.engine.max_write_attempts,
            config.engine.max_write_attempts
        );
        assert_eq!(parsed.store.unwrap().url, config.store.unwrap().url);
    }
}
