/// Configuration management
///
/// Everything is read from the environment once at startup. `main` seeds the
/// environment from a `.env` file first when one is present.
use anyhow::{bail, Context, Result};
use chrono::Duration;
use db_pool::env_utils::{parse_env_optional, parse_env_required, parse_env_with_default};
use db_pool::DbConfig;
use jwt_security::{
    SigningSecret, TokenError, TokenManager, DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
    DEFAULT_REFRESH_TOKEN_TTL_DAYS,
};
use std::fmt;

pub const SERVICE_NAME: &str = "hospital-auth-service";
/// Longest password validity accepted from the environment
pub const MAX_PASSWORD_EXPIRY_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub jwt: JwtConfig,
    pub password: PasswordPolicyConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    /// Seconds between background database probes
    pub health_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SigningSecret,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PasswordPolicyConfig {
    pub expiry_days: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            expiry_days: 90,
            argon2_memory_kib: argon2::Params::DEFAULT_M_COST,
            argon2_iterations: argon2::Params::DEFAULT_T_COST,
            argon2_parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordPolicyConfig {
    pub fn expiry(&self) -> Duration {
        Duration::days(self.expiry_days)
    }
}

/// First administrator, created only when the user table is empty.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: parse_env_with_default("SERVER_HOST", "0.0.0.0".to_string()),
            port: parse_env_with_default("SERVER_PORT", 8000),
        };

        let database = DbConfig::from_env(SERVICE_NAME).context("Invalid database configuration")?;

        let secret: String = parse_env_required("JWT_SECRET").context("JWT_SECRET is required")?;
        let jwt = JwtConfig {
            secret: SigningSecret::new(secret),
            access_token_expire_minutes: parse_env_with_default(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            ),
            refresh_token_expire_days: parse_env_with_default(
                "REFRESH_TOKEN_EXPIRE_DAYS",
                DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            ),
        };

        let defaults = PasswordPolicyConfig::default();
        let password = PasswordPolicyConfig {
            expiry_days: parse_env_with_default("PASSWORD_EXPIRY_DAYS", defaults.expiry_days),
            argon2_memory_kib: parse_env_with_default(
                "ARGON2_MEMORY_KIB",
                defaults.argon2_memory_kib,
            ),
            argon2_iterations: parse_env_with_default(
                "ARGON2_ITERATIONS",
                defaults.argon2_iterations,
            ),
            argon2_parallelism: parse_env_with_default(
                "ARGON2_PARALLELISM",
                defaults.argon2_parallelism,
            ),
        };
        if !(1..=MAX_PASSWORD_EXPIRY_DAYS).contains(&password.expiry_days) {
            bail!(
                "PASSWORD_EXPIRY_DAYS must be between 1 and {}",
                MAX_PASSWORD_EXPIRY_DAYS
            );
        }

        let bootstrap_admin = match (
            parse_env_optional::<String>("BOOTSTRAP_ADMIN_USERNAME"),
            parse_env_optional::<String>("BOOTSTRAP_ADMIN_EMAIL"),
            parse_env_optional::<String>("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(BootstrapAdmin {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => bail!(
                "BOOTSTRAP_ADMIN_USERNAME, BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            server,
            database,
            jwt,
            password,
            bootstrap_admin,
            health_interval_secs: parse_env_with_default("DB_HEALTH_INTERVAL_SECS", 30),
        })
    }

    /// Build the token manager; a weak secret or inverted TTLs are fatal.
    pub fn token_manager(&self) -> Result<TokenManager, TokenError> {
        let access_ttl = Duration::try_minutes(self.jwt.access_token_expire_minutes)
            .ok_or_else(|| {
                TokenError::InvalidTtl("ACCESS_TOKEN_EXPIRE_MINUTES is out of range".to_string())
            })?;
        let refresh_ttl = Duration::try_days(self.jwt.refresh_token_expire_days).ok_or_else(|| {
            TokenError::InvalidTtl("REFRESH_TOKEN_EXPIRE_DAYS is out of range".to_string())
        })?;

        TokenManager::new(&self.jwt.secret, access_ttl, refresh_ttl)
    }
}
