//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::HeaderValue;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:3001";
/// Origin of the browser client during development.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CAREPORTAL_BIND is not a socket address: {0}")]
    InvalidBind(String),

    #[error("CAREPORTAL_CORS_ORIGIN is not a valid origin: {0}")]
    InvalidCorsOrigin(String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    /// JSON seed for the in-memory directory; a default group pool is used without one.
    pub directory_seed: Option<PathBuf>,
    /// Provider selections go to Postgres when set (requires the `postgres` feature).
    pub database_url: Option<String>,
    /// The one browser origin allowed to call the API cross-origin.
    pub cors_origin: HeaderValue,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = get("CAREPORTAL_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind.parse().map_err(|_| ConfigError::InvalidBind(bind))?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let origin = get("CAREPORTAL_CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        let cors_origin = parse_origin(&origin).ok_or(ConfigError::InvalidCorsOrigin(origin))?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER"),
            jwt_audience: get("JWT_AUDIENCE"),
            directory_seed: get("CAREPORTAL_DIRECTORY_SEED").map(PathBuf::from),
            database_url: get("DATABASE_URL"),
            cors_origin,
        })
    }
}

/// `scheme://host[:port]`, with no path and no trailing slash.
fn parse_origin(origin: &str) -> Option<HeaderValue> {
    let (scheme, rest) = origin.split_once("://")?;
    if !matches!(scheme, "http" | "https") || rest.is_empty() || rest.contains('/') {
        return None;
    }
    HeaderValue::from_str(origin).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND.parse().unwrap());
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert!(cfg.jwt_issuer.is_none());
        assert!(cfg.directory_seed.is_none());
        assert_eq!(cfg.cors_origin, DEFAULT_CORS_ORIGIN);
    }

    #[test]
    fn cors_origin_is_configurable() {
        let cfg = config(&[("CAREPORTAL_CORS_ORIGIN", "https://portal.clinic.test")]).unwrap();
        assert_eq!(cfg.cors_origin, "https://portal.clinic.test");

        for bad in ["portal.clinic.test", "https://portal.clinic.test/", "ftp://portal", "http://"] {
            let err = config(&[("CAREPORTAL_CORS_ORIGIN", bad)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidCorsOrigin(v) if v == bad), "{bad}");
        }
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("JWT_AUDIENCE", "  "), ("JWT_SECRET", "s3cret")]).unwrap();
        assert!(cfg.jwt_audience.is_none());
        assert_eq!(cfg.jwt_secret, "s3cret");
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let err = config(&[("CAREPORTAL_BIND", "localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBind(v) if v == "localhost"));
    }
}
