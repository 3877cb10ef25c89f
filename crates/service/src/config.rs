use std::time::Duration;

use crate::auth::jwt::JwtConfig;
use crate::telemetry::LogFormat;

/// Default pool size.
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
/// Default minimum password length for registration.
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
/// Default TTL for course-scoped reports (60 minutes).
const DEFAULT_COURSE_REPORT_TTL_SECS: u64 = 3600;
/// Default TTL for student-scoped reports (15 minutes).
const DEFAULT_STUDENT_REPORT_TTL_SECS: u64 = 900;

/// Failure to load [`EngineConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// JWT validation settings (secret, issued token lifetime).
    pub jwt: JwtConfig,
    pub password_min_length: usize,
    /// How long course analytics reports stay cached.
    pub course_report_ttl: Duration,
    /// How long student reports and dashboards stay cached.
    pub student_report_ttl: Duration,
    pub log_format: LogFormat,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// Reads a `.env` file first when one is present.
    ///
    /// | Env Var                   | Default    |
    /// |---------------------------|------------|
    /// | `DATABASE_URL`            | required   |
    /// | `DB_MAX_CONNECTIONS`      | `20`       |
    /// | `JWT_SECRET`              | required   |
    /// | `JWT_ACCESS_EXPIRY_MINS`  | `15`       |
    /// | `PASSWORD_MIN_LENGTH`     | `8`        |
    /// | `COURSE_REPORT_TTL_SECS`  | `3600`     |
    /// | `STUDENT_REPORT_TTL_SECS` | `900`      |
    /// | `LOG_FORMAT`              | `text`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let db_max_connections = parsed("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let jwt = JwtConfig::from_env()?;
        let password_min_length = parsed("PASSWORD_MIN_LENGTH", DEFAULT_PASSWORD_MIN_LENGTH)?;
        let course_report_ttl = Duration::from_secs(parsed(
            "COURSE_REPORT_TTL_SECS",
            DEFAULT_COURSE_REPORT_TTL_SECS,
        )?);
        let student_report_ttl = Duration::from_secs(parsed(
            "STUDENT_REPORT_TTL_SECS",
            DEFAULT_STUDENT_REPORT_TTL_SECS,
        )?);

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(value) => LogFormat::from_str_value(&value).ok_or(ConfigError::Invalid {
                name: "LOG_FORMAT",
                value,
            })?,
            Err(_) => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            jwt,
            password_min_length,
            course_report_ttl,
            student_report_ttl,
            log_format,
        })
    }
}

/// Read a variable that must be present and non-empty.
pub(crate) fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
pub(crate) fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
