//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use crate::chat::DEFAULT_HISTORY_SIZE;
use crate::connection::DEFAULT_WRITE_TIMEOUT;

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Where users and library entries are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    /// aurora-db files under `path`.
    Aurora { path: String },
    /// Process memory; lost on restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub tcp_addr: SocketAddr,
    pub udp_addr: SocketAddr,
    pub storage: StorageMode,
    pub chat_history: usize,
    pub write_timeout: Duration,
    pub auth: AuthConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid socket address {value:?}")]
    InvalidAddr { var: &'static str, value: String },
    #[error("MANGAHUB_STORAGE: unknown backend {0:?} (expected aurora or memory)")]
    UnknownStorage(String),
}

impl ServerConfig {
    /// Environment variables:
    /// - `MANGAHUB_HTTP_ADDR` / `MANGAHUB_TCP_ADDR` / `MANGAHUB_UDP_ADDR`
    /// - `MANGAHUB_STORAGE`: "aurora" | "memory" (default: "aurora")
    /// - `MANGAHUB_DB_PATH`: aurora data directory (default: "mangahub_data")
    /// - `MANGAHUB_CHAT_HISTORY`, `MANGAHUB_WRITE_TIMEOUT_MS`
    /// - `MANGAHUB_JWT_SECRET`, `MANGAHUB_JWT_ISSUER`, `MANGAHUB_JWT_TTL_HOURS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_addr = addr(&lookup, "MANGAHUB_HTTP_ADDR", "0.0.0.0:8080")?;
        let tcp_addr = addr(&lookup, "MANGAHUB_TCP_ADDR", "0.0.0.0:7070")?;
        let udp_addr = addr(&lookup, "MANGAHUB_UDP_ADDR", "0.0.0.0:6060")?;

        let storage = match lookup("MANGAHUB_STORAGE")
            .unwrap_or_else(|| "aurora".to_string())
            .to_lowercase()
            .as_str()
        {
            "aurora" => StorageMode::Aurora {
                path: lookup("MANGAHUB_DB_PATH").unwrap_or_else(|| "mangahub_data".to_string()),
            },
            "memory" => StorageMode::Memory,
            other => return Err(ConfigError::UnknownStorage(other.to_string())),
        };

        let chat_history = match number(&lookup, "MANGAHUB_CHAT_HISTORY", DEFAULT_HISTORY_SIZE as u64) {
            0 => DEFAULT_HISTORY_SIZE,
            n => n as usize,
        };

        let write_timeout = match number(
            &lookup,
            "MANGAHUB_WRITE_TIMEOUT_MS",
            DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
        ) {
            0 => DEFAULT_WRITE_TIMEOUT,
            ms => Duration::from_millis(ms),
        };

        let secret = lookup("MANGAHUB_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("MANGAHUB_JWT_SECRET not set; using the development secret");
                DEFAULT_JWT_SECRET.to_string()
            });
        let issuer = lookup("MANGAHUB_JWT_ISSUER").unwrap_or_else(|| "mangahub".to_string());
        let ttl_hours = match number(&lookup, "MANGAHUB_JWT_TTL_HOURS", 24) {
            0 => 24,
            h => h,
        };

        Ok(Self {
            http_addr,
            tcp_addr,
            udp_addr,
            storage,
            chat_history,
            write_timeout,
            auth: AuthConfig {
                secret,
                issuer,
                ttl: chrono::Duration::hours(ttl_hours.min(24 * 365) as i64),
            },
        })
    }
}

fn addr<F>(lookup: &F, var: &'static str, default: &str) -> Result<SocketAddr, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(var).unwrap_or_else(|| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::InvalidAddr { var, value })
}

/// Falls back to `default` (with a warning) when the value does not parse.
fn number<F>(lookup: &F, var: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{}: ignoring invalid value {:?}", var, raw);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.http_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.tcp_addr, "0.0.0.0:7070".parse().unwrap());
        assert_eq!(config.udp_addr, "0.0.0.0:6060".parse().unwrap());
        assert_eq!(
            config.storage,
            StorageMode::Aurora {
                path: "mangahub_data".to_string()
            }
        );
        assert_eq!(config.chat_history, 50);
        assert_eq!(config.write_timeout, Duration::from_secs(2));
        assert_eq!(config.auth.issuer, "mangahub");
        assert_eq!(config.auth.ttl, chrono::Duration::hours(24));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("MANGAHUB_STORAGE", "Memory"),
            ("MANGAHUB_CHAT_HISTORY", "10"),
            ("MANGAHUB_WRITE_TIMEOUT_MS", "250"),
            ("MANGAHUB_JWT_SECRET", "s3cret"),
            ("MANGAHUB_JWT_TTL_HOURS", "2"),
        ])
        .unwrap();
        assert_eq!(config.storage, StorageMode::Memory);
        assert_eq!(config.chat_history, 10);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(config.auth.secret, "s3cret");
        assert_eq!(config.auth.ttl, chrono::Duration::hours(2));
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = config(&[
            ("MANGAHUB_CHAT_HISTORY", "lots"),
            ("MANGAHUB_WRITE_TIMEOUT_MS", "0"),
        ])
        .unwrap();
        assert_eq!(config.chat_history, 50);
        assert_eq!(config.write_timeout, DEFAULT_WRITE_TIMEOUT);
    }

    #[test]
    fn bad_addresses_and_backends_are_fatal() {
        assert!(matches!(
            config(&[("MANGAHUB_TCP_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddr {
                var: "MANGAHUB_TCP_ADDR",
                ..
            })
        ));
        assert!(matches!(
            config(&[("MANGAHUB_STORAGE", "postgres")]),
            Err(ConfigError::UnknownStorage(_))
        ));
    }
}
