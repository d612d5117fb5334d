use std::env;

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} is not valid: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub frontend_login_url: Url,
    pub db_max_connections: u32,
    pub page_size: i64,
    pub max_page_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup, `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let frontend = lookup("FRONTEND_LOGIN_URL")
            .unwrap_or_else(|| "http://localhost:3000/login-handler".to_string());
        let frontend_login_url = Url::parse(&frontend).map_err(|e| ConfigError::Invalid {
            name: "FRONTEND_LOGIN_URL",
            message: e.to_string(),
        })?;

        let db_max_connections = parse_number(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        let page_size = parse_number(&lookup, "PAGE_SIZE", 10)?;
        let max_page_size = parse_number(&lookup, "MAX_PAGE_SIZE", 100)?;

        if page_size < 1 || max_page_size < page_size {
            return Err(ConfigError::Invalid {
                name: "PAGE_SIZE",
                message: format!("must be between 1 and MAX_PAGE_SIZE ({})", max_page_size),
            });
        }

        Ok(Config {
            database_url,
            bind_addr,
            frontend_login_url,
            db_max_connections,
            page_size,
            max_page_size,
        })
    }
}

fn parse_number<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
