use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Reads `APP__SERVER__PORT`-style variables on top of the defaults.
/// `DATABASE_URL` wins over `APP__DATABASE__URL` when both are set.
pub fn load() -> Result<AppConfig, ConfigError> {
    from_sources(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
        std::env::var("DATABASE_URL").ok(),
    )
}

fn from_sources(
    environment: Environment,
    database_url: Option<String>,
) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("database.max_connections", 10)?
        .add_source(environment)
        .set_override_option("database.url", database_url)?
        .build()?
        .try_deserialize()
}
