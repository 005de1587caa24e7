//! Service configuration.
//!
//! Defaults, then an optional file (`CONFIG_FILE`, or `config/<ENVIRONMENT>`),
//! then `POOLSPLIT__SECTION__KEY` environment variables. `MONGODB_URI` and
//! `BOT_API_TOKEN` are honoured as shortcuts.

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::auth::AuthKeys;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub settlement: SettlementConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub service_token: String,
    pub signing_secret: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub summary_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SettlementConfig {
    /// Hand back the pool's pending transactions instead of suggesting new
    /// ones while any are still open.
    pub reuse_pending: bool,
}

impl CacheConfig {
    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_ttl_secs)
    }
}

impl From<&AuthConfig> for AuthKeys {
    fn from(auth: &AuthConfig) -> Self {
        AuthKeys {
            service_token: auth.service_token.clone(),
            signing_secret: auth.signing_secret.clone(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("mongodb.uri", "")?
            .set_default("mongodb.database", "PoolSplit")?
            .set_default("auth.service_token", "")?
            .set_default("auth.signing_secret", "")?
            .set_default("cache.summary_ttl_secs", 300)?
            .set_default("settlement.reuse_pending", false)?;

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder
                .add_source(File::with_name(&format!("config/{environment}")).required(false));
        }

        builder = builder.add_source(Environment::with_prefix("POOLSPLIT").separator("__"));

        if let Ok(uri) = env::var("MONGODB_URI") {
            builder = builder.set_override("mongodb.uri", uri)?;
        }
        if let Ok(token) = env::var("BOT_API_TOKEN") {
            builder = builder.set_override("auth.service_token", token)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server port cannot be 0".to_string()));
        }
        if self.server.workers == 0 {
            return Err(Error::Config("at least one worker is required".to_string()));
        }
        if self.mongodb.uri.is_empty() {
            return Err(Error::Config("MongoDB URI is required".to_string()));
        }
        if self.auth.service_token.is_empty() || self.auth.signing_secret.is_empty() {
            return Err(Error::Config(
                "both the service token and the signing secret are required".to_string(),
            ));
        }
        if self.auth.service_token == self.auth.signing_secret {
            return Err(Error::Config(
                "the service token must differ from the signing secret".to_string(),
            ));
        }
        Ok(())
    }
}
