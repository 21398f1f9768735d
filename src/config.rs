use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

/// Year the dataset treats as "current" when no explicit range is given.
pub const DEFAULT_CURRENT_YEAR: i32 = 2021;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub dataset_path: PathBuf,
    pub countries_api_url: String,
    pub current_year: i32,
    pub cache_ttl: chrono::Duration,
    pub purge_interval: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", 8080u16)?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let dataset_path = env::var("DATASET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/energyData.csv"));
        let countries_api_url = env::var("COUNTRIES_API_URL")
            .unwrap_or_else(|_| "https://restcountries.com/v3.1".to_string())
            .trim_end_matches('/')
            .to_string();

        let cache_ttl_days = parse_var("CACHE_TTL_DAYS", 2i64)?;
        if cache_ttl_days <= 0 {
            return Err(AppError::ConfigError("CACHE_TTL_DAYS must be positive".to_string()));
        }
        let purge_interval_secs = parse_var("CACHE_PURGE_INTERVAL_SECS", 3600u64)?;
        if purge_interval_secs == 0 {
            return Err(AppError::ConfigError("CACHE_PURGE_INTERVAL_SECS must be positive".to_string()));
        }

        let http_timeout_secs = parse_var("HTTP_TIMEOUT_SECS", 10u64)?;
        if http_timeout_secs == 0 {
            return Err(AppError::ConfigError("HTTP_TIMEOUT_SECS must be positive".to_string()));
        }

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            dataset_path,
            countries_api_url,
            current_year: parse_var("CURRENT_YEAR", DEFAULT_CURRENT_YEAR)?,
            cache_ttl: chrono::Duration::days(cache_ttl_days),
            purge_interval: Duration::from_secs(purge_interval_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
