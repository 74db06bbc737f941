use anyhow::{anyhow, Context};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use url::Url;

/// `DATABASE_URL` value that selects the process-local session store.
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Dev,
    Prod,
}

impl FromStr for AppEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(AppEnv::Local),
            "dev" => Ok(AppEnv::Dev),
            "prod" => Ok(AppEnv::Prod),
            other => Err(anyhow!("Invalid APP_ENV value: {}", other)),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppEnv::Local => "local",
            AppEnv::Dev => "dev",
            AppEnv::Prod => "prod",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub webhook_url: Url,
    pub webhook_timeout_ms: u64,
    pub store_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub trust_proxy_headers: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = lookup("APP_ENV")
            .unwrap_or_else(|| "local".to_string())
            .parse()?;

        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "APP_PORT", 8080)?;

        let database_url = required(&lookup, "DATABASE_URL")?;
        let jwt_secret = required(&lookup, "JWT_SECRET")?;

        let access_token_ttl = ttl_or(
            &lookup,
            "ACCESS_TOKEN_TTL_MINUTES",
            15,
            chrono::Duration::try_minutes,
        )?;
        let refresh_token_ttl = ttl_or(
            &lookup,
            "REFRESH_TOKEN_TTL_HOURS",
            72,
            chrono::Duration::try_hours,
        )?;

        let webhook_url = required(&lookup, "WEBHOOK_URL")?;
        let webhook_url = Url::parse(&webhook_url)
            .with_context(|| format!("Invalid WEBHOOK_URL value: {}", webhook_url))?;
        let webhook_timeout_ms = parse_or(&lookup, "WEBHOOK_TIMEOUT_MS", 2000)?;

        let store_timeout_secs = parse_or(&lookup, "STORE_TIMEOUT_SECS", 4)?;
        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 4)?;
        let shutdown_grace_secs = parse_or(&lookup, "SHUTDOWN_GRACE_SECS", 5)?;
        let trust_proxy_headers = parse_or(&lookup, "TRUST_PROXY_HEADERS", false)?;

        Ok(Config {
            app_env,
            host,
            port,
            database_url,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            webhook_url,
            webhook_timeout_ms,
            store_timeout_secs,
            request_timeout_secs,
            shutdown_grace_secs,
            trust_proxy_headers,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn webhook_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.webhook_timeout_ms)
    }

    pub fn store_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.store_timeout_secs)
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> StdDuration {
        StdDuration::from_secs(self.shutdown_grace_secs)
    }
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("{} must be set", key))
}

/// Parses a whole-unit TTL and rejects values chrono cannot represent.
fn ttl_or<F>(
    lookup: &F,
    key: &str,
    default: u32,
    to_duration: fn(i64) -> Option<chrono::Duration>,
) -> anyhow::Result<chrono::Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let units: u32 = parse_or(lookup, key, default)?;
    to_duration(i64::from(units)).ok_or_else(|| anyhow!("{} is out of range: {}", key, units))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        None => Ok(default),
    }
}
