use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // HTTP server config
    pub http_host: String,
    pub http_port: u16,

    // PostgreSQL (interaction logs)
    pub database_url: String,
    pub database_max_connections: u32,

    // Feature extraction
    pub lookback_days: i64,
    pub extraction_timeout_ms: u64,
    pub extraction_concurrency: usize,
    pub significant_hover_ms: u32,
    pub binge_gap_minutes: i64,

    // Cohort and candidate sizing
    pub cohort_sample_size: usize,
    pub candidate_pool_size: usize,

    // Clustering defaults
    pub default_max_clusters: usize,
    pub default_min_cluster_size: usize,

    // Cohort result cache
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,

    // Observability
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8014)?
            .set_default("database_max_connections", 10)?
            .set_default("lookback_days", 90)?
            .set_default("extraction_timeout_ms", 5000)?
            .set_default("extraction_concurrency", 8)?
            .set_default("significant_hover_ms", 1500)?
            .set_default("binge_gap_minutes", 30)?
            .set_default("cohort_sample_size", 500)?
            .set_default("candidate_pool_size", 200)?
            .set_default("default_max_clusters", 10)?
            .set_default("default_min_cluster_size", 2)?
            .set_default("cache_enabled", true)?
            .set_default("cache_ttl_seconds", 300)? // 5 minutes
            .set_default("log_level", "info")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(anyhow!("HTTP port must be greater than 0"));
        }

        if self.database_url.is_empty() {
            return Err(anyhow!("Database URL is required"));
        }

        if self.extraction_timeout_ms == 0 {
            return Err(anyhow!("Extraction timeout must be greater than 0"));
        }

        if self.extraction_concurrency == 0 {
            return Err(anyhow!("Extraction concurrency must be greater than 0"));
        }

        if self.lookback_days <= 0 {
            return Err(anyhow!("Lookback window must be at least one day"));
        }

        if self.default_min_cluster_size == 0 {
            return Err(anyhow!("Minimum cluster size must be at least 1"));
        }

        if self.default_max_clusters < 2 {
            return Err(anyhow!("Maximum clusters must be at least 2"));
        }

        if self.cohort_sample_size < 2 {
            return Err(anyhow!("Cohort sample size must be at least 2"));
        }

        Ok(())
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Filter directives used when `RUST_LOG` is unset
    pub fn log_filter(&self) -> String {
        format!("{},actix_web=info,sqlx=warn", self.log_level.trim())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8014,
            database_url: "postgres://localhost/learning".to_string(),
            database_max_connections: 10,
            lookback_days: 90,
            extraction_timeout_ms: 5000,
            extraction_concurrency: 8,
            significant_hover_ms: 1500,
            binge_gap_minutes: 30,
            cohort_sample_size: 500,
            candidate_pool_size: 200,
            default_max_clusters: 10,
            default_min_cluster_size: 2,
            cache_enabled: true,
            cache_ttl_seconds: 300,
            log_level: "info".to_string(),
        }
    }
}
