use std::{env, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub postal_lookup_url: String,
    pub postal_lookup_timeout: Duration,
    pub db_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let postal_lookup_url = env::var("POSTAL_LOOKUP_URL")
            .unwrap_or_else(|_| "https://viacep.com.br/ws".to_string());
        let postal_lookup_timeout = millis_var("POSTAL_LOOKUP_TIMEOUT_MS", 3000);
        let db_timeout = millis_var("DB_TIMEOUT_MS", 5000);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            postal_lookup_url,
            postal_lookup_timeout,
            db_timeout,
        })
    }
}

fn millis_var(name: &str, default: u64) -> Duration {
    let millis = env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}
