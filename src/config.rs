use std::{str::FromStr, time::Duration};

use anyhow::Context;
use secrecy::SecretString;

pub const ENV_SERVER_HOST: &str = "AUTH_SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "AUTH_SERVER_PORT";
pub const ENV_SHUTDOWN_TIMEOUT_SECS: &str = "AUTH_SHUTDOWN_TIMEOUT_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AUTH_SERVER_REQUEST_TIMEOUT_SECS";

pub const ENV_DB_HOST: &str = "AUTH_DB_HOST";
pub const ENV_DB_PORT: &str = "AUTH_DB_PORT";
pub const ENV_DB_USER: &str = "AUTH_DB_USER";
pub const ENV_DB_PASSWORD: &str = "AUTH_DB_PASSWORD";
pub const ENV_DB_NAME: &str = "AUTH_DB_NAME";
pub const ENV_DB_MAX_OPEN_CONNS: &str = "AUTH_DB_MAX_OPEN_CONNS";
pub const ENV_DB_MAX_LIFETIME_MIN: &str = "AUTH_DB_MAX_LIFETIME_MIN";
pub const ENV_DB_TIMEOUT_SECS: &str = "AUTH_DB_TIMEOUT_SECS";

pub const ENV_JWT_SECRET: &str = "AUTH_JWT_SECRET";
pub const ENV_JWT_TTL_HOURS: &str = "AUTH_JWT_TTL_HOURS";
pub const ENV_JWT_ISSUER: &str = "AUTH_JWT_ISSUER";
pub const ENV_JWT_AUDIENCE: &str = "AUTH_JWT_AUDIENCE";

pub const ENV_HASH_MEMORY_KIB: &str = "AUTH_HASH_MEMORY_KIB";
pub const ENV_HASH_ITERATIONS: &str = "AUTH_HASH_ITERATIONS";
pub const ENV_HASH_PARALLELISM: &str = "AUTH_HASH_PARALLELISM";

/// Variables that must be set; startup fails if any is missing or empty.
pub const REQUIRED_ENV_VARS: &[&str] = &[ENV_DB_USER, ENV_DB_PASSWORD, ENV_DB_NAME, ENV_JWT_SECRET];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on handling a single request; slower requests get `408`.
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    pub max_connections: u32,
    pub max_lifetime: Duration,
    /// Bounds pool acquisition and every store call.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_ENV_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let defaults = HashingConfig::default();

        let ttl_hours: u64 = parse_or(get(ENV_JWT_TTL_HOURS), 24);
        let ttl_secs = ttl_hours
            .checked_mul(60 * 60)
            .filter(|secs| i64::try_from(*secs).is_ok())
            .with_context(|| format!("{ENV_JWT_TTL_HOURS}={ttl_hours} is out of range"))?;

        Ok(Self {
            server: ServerConfig {
                host: or(ENV_SERVER_HOST, "0.0.0.0"),
                port: parse_or(get(ENV_SERVER_PORT), 8081),
                request_timeout: Duration::from_secs(parse_or(get(ENV_REQUEST_TIMEOUT_SECS), 10)),
                shutdown_timeout: Duration::from_secs(parse_or(get(ENV_SHUTDOWN_TIMEOUT_SECS), 30)),
            },
            database: DatabaseConfig {
                host: or(ENV_DB_HOST, "localhost"),
                port: parse_or(get(ENV_DB_PORT), 5432),
                user: required(ENV_DB_USER),
                password: SecretString::from(required(ENV_DB_PASSWORD)),
                name: required(ENV_DB_NAME),
                max_connections: parse_or(get(ENV_DB_MAX_OPEN_CONNS), 25),
                max_lifetime: Duration::from_secs(parse_or(get(ENV_DB_MAX_LIFETIME_MIN), 5u64) * 60),
                timeout: Duration::from_secs(parse_or(get(ENV_DB_TIMEOUT_SECS), 5)),
            },
            jwt: JwtConfig {
                secret: SecretString::from(required(ENV_JWT_SECRET)),
                issuer: or(ENV_JWT_ISSUER, "auth-service"),
                audience: or(ENV_JWT_AUDIENCE, "auth-service-users"),
                ttl: Duration::from_secs(ttl_secs),
            },
            hashing: HashingConfig {
                memory_kib: parse_or(get(ENV_HASH_MEMORY_KIB), defaults.memory_kib),
                iterations: parse_or(get(ENV_HASH_ITERATIONS), defaults.iterations),
                parallelism: parse_or(get(ENV_HASH_PARALLELISM), defaults.parallelism),
            },
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
