//! Process configuration, read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use kidsbook_observability::LogFormat;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

/// The first teacher account, created at startup if missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapTeacher {
    pub username: String,
    pub email_address: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub log_format: LogFormat,
    pub token_ttl: chrono::Duration,
    pub bootstrap_teacher: Option<BootstrapTeacher>,
    /// Postgres connection string; `None` keeps everything in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Problems worth a warning, held until logging is up.
    pub warnings: Vec<&'static str>,
}

impl ApiConfig {
    /// Read `KIDSBOOK_BIND_ADDR`, `JWT_SECRET`, `KIDSBOOK_LOG_FORMAT`,
    /// `KIDSBOOK_TOKEN_TTL_MINUTES`, `KIDSBOOK_BOOTSTRAP_TEACHER`
    /// (`username:email`), `DATABASE_URL` and `KIDSBOOK_DATABASE_MAX_CONNECTIONS`.
    ///
    /// Nothing is logged here; call [`ApiConfig::log_warnings`] once tracing
    /// is initialized.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut warnings = Vec::new();

        let bind_addr = lookup("KIDSBOOK_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("KIDSBOOK_BIND_ADDR", format!("{e}")))?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            warnings.push("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let log_format = lookup("KIDSBOOK_LOG_FORMAT")
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()
            .map_err(|e| ConfigError::invalid("KIDSBOOK_LOG_FORMAT", e.to_string()))?
            .unwrap_or_default();

        let ttl_minutes = match lookup("KIDSBOOK_TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| ConfigError::invalid("KIDSBOOK_TOKEN_TTL_MINUTES", "expected a positive integer"))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        let token_ttl = chrono::Duration::try_minutes(ttl_minutes)
            .ok_or_else(|| ConfigError::invalid("KIDSBOOK_TOKEN_TTL_MINUTES", "value out of range"))?;

        let bootstrap_teacher = match lookup("KIDSBOOK_BOOTSTRAP_TEACHER") {
            Some(raw) => Some(parse_bootstrap(&raw)?),
            None => {
                warnings.push("KIDSBOOK_BOOTSTRAP_TEACHER not set; no account can register users");
                None
            }
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() {
            warnings.push("DATABASE_URL not set; data lives in memory and is lost on restart");
        }

        let database_max_connections = match lookup("KIDSBOOK_DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::invalid("KIDSBOOK_DATABASE_MAX_CONNECTIONS", "expected a positive integer")
            })?,
            None => DEFAULT_DATABASE_MAX_CONNECTIONS,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            log_format,
            token_ttl,
            bootstrap_teacher,
            database_url,
            database_max_connections,
            warnings,
        })
    }

    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            tracing::warn!("{warning}");
        }
    }
}

fn parse_bootstrap(raw: &str) -> Result<BootstrapTeacher, ConfigError> {
    let (username, email_address) = raw
        .split_once(':')
        .map(|(u, e)| (u.trim(), e.trim()))
        .filter(|(u, e)| !u.is_empty() && !e.is_empty())
        .ok_or_else(|| ConfigError::invalid("KIDSBOOK_BOOTSTRAP_TEACHER", "expected 'username:email'"))?;
    Ok(BootstrapTeacher {
        username: username.to_string(),
        email_address: email_address.to_string(),
    })
}
