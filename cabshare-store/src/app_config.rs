use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Upper bound on `per_page` for transaction listings.
    #[serde(default = "default_per_page_cap")]
    pub transactions_per_page_cap: u32,
    #[serde(default = "default_compensation_attempts")]
    pub compensation_attempts: u32,
    #[serde(default = "default_compensation_backoff_ms")]
    pub compensation_backoff_ms: u64,
}

fn default_per_page_cap() -> u32 {
    100
}

fn default_compensation_attempts() -> u32 {
    3
}

fn default_compensation_backoff_ms() -> u64 {
    50
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. CABSHARE__AUTH__JWT_SECRET
            .add_source(config::Environment::with_prefix("CABSHARE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
