use std::env;
use std::net::IpAddr;

use chrono::Duration;

use crate::engagement::ViewCounter;
use crate::oauth::OAuthConfig;
use crate::policy::{RestrictionPolicy, StaffPolicy, DEFAULT_RESTRICTED_SUB_BOARDS, DEFAULT_STAFF_ROLES};
use crate::rate_limit::RateLimitConfig;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN)]
    WeakSecret,
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub staff: StaffPolicy,
    pub restrictions: RestrictionPolicy,
    pub view_window: Duration,
    pub rate_limit: Option<RateLimitConfig>,
    pub oauth: Option<OAuthConfig>,
    /// Peers whose `Forwarded` / `X-Forwarded-For` headers name the real client.
    pub trusted_proxies: Vec<IpAddr>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

pub(crate) fn flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }

        let window_hours = var_or("VIEW_DEDUP_WINDOW_HOURS", &ViewCounter::DEFAULT_WINDOW_HOURS.to_string());
        let window_hours: i64 = window_hours
            .parse()
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| ConfigError::Invalid("VIEW_DEDUP_WINDOW_HOURS", window_hours.clone()))?;

        let trusted_proxies = env::var("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<IpAddr>().map_err(|_| ConfigError::Invalid("TRUSTED_PROXIES", s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:5173"),
            jwt_secret,
            database_url: env::var("DATABASE_URL").ok(),
            staff: StaffPolicy::parse(&var_or("STAFF_ROLES", &DEFAULT_STAFF_ROLES.join(","))),
            restrictions: RestrictionPolicy::parse(&var_or("RESTRICTED_SUB_BOARDS", DEFAULT_RESTRICTED_SUB_BOARDS)),
            view_window: Duration::hours(window_hours),
            rate_limit: flag("RL_ENABLED", true).then(RateLimitConfig::from_env),
            oauth: OAuthConfig::from_env(),
            trusted_proxies,
        })
    }

    /// Defaults suitable for tests and local runs; OAuth and rate limiting disabled.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            frontend_url: "http://localhost:5173".into(),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            staff: StaffPolicy::default(),
            restrictions: RestrictionPolicy::default(),
            view_window: Duration::hours(ViewCounter::DEFAULT_WINDOW_HOURS),
            rate_limit: None,
            oauth: None,
            trusted_proxies: Vec::new(),
        }
    }
}
