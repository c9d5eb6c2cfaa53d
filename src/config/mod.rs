pub mod database;

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,
    pub token_ttl_hours: i64,
    pub frontend_url: String,
    pub upload_cooldown_secs: u64,
}

impl Config {
    /// Loads `.env` (if present) and then the process environment on top of
    /// the built-in defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("database_max_connections", 10_i64)?
            .set_default("port", 5000_i64)?
            .set_default("upload_dir", "./uploads")?
            .set_default("max_upload_size", 50_i64 * 1024 * 1024)?
            .set_default("token_ttl_hours", 24_i64)?
            .set_default("frontend_url", "http://localhost:5173")?
            .set_default("upload_cooldown_secs", 5_i64)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read configuration: {}", e))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(config)
    }

    /// Configuration used by tests and local tooling.
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: None,
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            port: 0,
            upload_dir: upload_dir.into(),
            max_upload_size: 50 * 1024 * 1024,
            token_ttl_hours: 24,
            frontend_url: "http://localhost:5173".to_string(),
            upload_cooldown_secs: 0,
        }
    }
}
