use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Minimum accepted length for the HS256 shared secret.
const MIN_JWT_SECRET_LEN: usize = 16;

/// Relay connection settings
///
/// Everything the upgrade gate and the per-connection actor need to know.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Path on which protocol upgrades are accepted
    pub path: String,
    /// How often the server pings each connection
    pub heartbeat_interval: Duration,
    /// Silence after which a connection is considered dead
    pub client_timeout: Duration,
    /// Per-user connection cap (`None` = unbounded)
    pub max_connections_per_user: Option<usize>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
            max_connections_per_user: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub ws: WsConfig,
    pub internal_api_key: Option<String>,
}

impl Config {
    fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
        match env::var(name) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
            _ => Ok(None),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = Self::parse_var::<u16>("PORT")?.unwrap_or(5000);

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;

        let defaults = WsConfig::default();
        let path = env::var("WS_PATH").unwrap_or(defaults.path);
        let heartbeat_interval = Self::parse_var::<u64>("WS_HEARTBEAT_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval);
        let client_timeout = Self::parse_var::<u64>("WS_CLIENT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.client_timeout);
        // 0 means "no cap", same as leaving it unset
        let max_connections_per_user =
            Self::parse_var::<usize>("WS_MAX_CONNECTIONS_PER_USER")?.filter(|cap| *cap > 0);

        let internal_api_key = env::var("INTERNAL_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let config = Self {
            host,
            port,
            jwt_secret,
            ws: WsConfig {
                path,
                heartbeat_interval,
                client_timeout,
                max_connections_per_user,
            },
            internal_api_key,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::Config(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if !self.ws.path.starts_with('/') {
            return Err(AppError::Config(format!(
                "WS_PATH must start with '/': {}",
                self.ws.path
            )));
        }
        if self.ws.heartbeat_interval.is_zero() {
            return Err(AppError::Config(
                "WS_HEARTBEAT_INTERVAL_SECS must be greater than zero".into(),
            ));
        }
        if self.ws.client_timeout <= self.ws.heartbeat_interval {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Config used by unit and integration tests
    pub fn test_defaults() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret-key-min-32-chars-long!!!".to_string(),
            ws: WsConfig::default(),
            internal_api_key: None,
        }
    }
}
