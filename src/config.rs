use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use std::env;

pub const DEFAULT_JWT_SECRET: &str = "insecure-development-secret-change-me";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub password_hash_cost: u32,

    // Bootstrap admin
    pub default_admin_username: String,
    pub default_admin_password: String,

    // Rate limiting, 0 disables
    pub rate_api_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            database_url: "mysql://root@localhost:3306/billbook".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            session_ttl: Duration::hours(24),
            password_hash_cost: 10,
            default_admin_username: "admin".to_string(),
            default_admin_password: "admin123".to_string(),
            rate_api_per_min: 100,
            api_prefix: "/api".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

fn var_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        Err(_) => Ok(default),
    }
}

/// Accepts `90`, `90s`, `30m`, `24h` and `7d`.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: i64 = digits.parse().ok()?;

    let duration = match unit.trim() {
        "" | "s" => Duration::try_seconds(n)?,
        "m" => Duration::try_minutes(n)?,
        "h" => Duration::try_hours(n)?,
        "d" => Duration::try_days(n)?,
        _ => return None,
    };
    (duration > Duration::zero()).then_some(duration)
}

impl Config {
    /// Reads the environment (after `.env`), falling back to the defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let session_ttl = match env::var("SESSION_TIMEOUT") {
            Ok(raw) => parse_duration(&raw)
                .ok_or_else(|| anyhow!("SESSION_TIMEOUT has an invalid value `{raw}`"))?,
            Err(_) => defaults.session_ttl,
        };

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", defaults.server_addr),
            database_url: var_or("DATABASE_URL", defaults.database_url),
            jwt_secret: var_or("JWT_SECRET", defaults.jwt_secret),
            session_ttl,
            password_hash_cost: parsed_or("PASSWORD_HASH_COST", defaults.password_hash_cost)?,
            default_admin_username: var_or("DEFAULT_ADMIN_USERNAME", defaults.default_admin_username),
            default_admin_password: var_or("DEFAULT_ADMIN_PASSWORD", defaults.default_admin_password),
            rate_api_per_min: parsed_or("RATE_API_PER_MIN", defaults.rate_api_per_min)?,
            api_prefix: var_or("API_PREFIX", defaults.api_prefix),
            log_dir: var_or("LOG_DIR", defaults.log_dir),
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}
