use crate::error::{Error, Result};
use crate::utils::token::{MAX_ACCESS_TOKEN_LENGTH, MIN_ACCESS_TOKEN_LENGTH};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub counselor_rps: u32,
    pub public_rps: u32,
    pub access_token_length: usize,
    pub analytics_cache_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret: get_env("JWT_SECRET")?,
            counselor_rps: get_env_parse("COUNSELOR_RPS")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            access_token_length: get_env_parse_or("ACCESS_TOKEN_LENGTH", 32)?,
            analytics_cache_ttl_seconds: get_env_parse_or("ANALYTICS_CACHE_TTL_SECONDS", 300)?,
            sweep_interval_seconds: get_env_parse_or("SWEEP_INTERVAL_SECONDS", 60)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_ACCESS_TOKEN_LENGTH..=MAX_ACCESS_TOKEN_LENGTH).contains(&self.access_token_length) {
            return Err(Error::Config(format!(
                "ACCESS_TOKEN_LENGTH must be between {} and {}, got {}",
                MIN_ACCESS_TOKEN_LENGTH, MAX_ACCESS_TOKEN_LENGTH, self.access_token_length
            )));
        }
        Ok(())
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(_) => get_env_parse(name),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token_length(access_token_length: usize) -> Config {
        Config {
            server_address: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            jwt_secret: "secret".to_string(),
            counselor_rps: 10,
            public_rps: 10,
            access_token_length,
            analytics_cache_ttl_seconds: 300,
            sweep_interval_seconds: 60,
        }
    }

    #[test]
    fn token_length_must_fit_public_links() {
        assert!(config_with_token_length(32).validate().is_ok());
        assert!(matches!(
            config_with_token_length(200).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_with_token_length(8).validate(),
            Err(Error::Config(_))
        ));
    }
}
