use std::env;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CourierConfig {
    pub log_level: String,
    pub message_db_config: MessageDbConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDbConfig {
    pub db_url: String,
    pub db_user: String,
    pub db_password: String,
    pub db_keyspace: String,
    pub replication_factor: u8,
    pub with_db_init: bool,
}

impl CourierConfig {
    pub fn new_config() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config = Config::builder()
            .add_source(File::with_name("default.config.toml"))
            .add_source(File::with_name(&format!("{run_mode}.config.toml")).required(false))
            .add_source(Environment::default())
            .build()?;
        config.try_deserialize()
    }
}
