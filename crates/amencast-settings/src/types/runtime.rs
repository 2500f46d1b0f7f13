//! Process-level settings: logging, bus transport and the health server.

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Which message bus transport a worker uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process bus. All stages must run in the same process.
    Memory,
    /// Redis pub/sub.
    #[default]
    Redis,
}

/// Message bus settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusSettings {
    /// Transport kind.
    pub kind: BusKind,
    /// Redis connection URL.
    pub redis_url: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            kind: BusKind::default(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Health server and shutdown settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Health check HTTP port.
    pub health_port: u16,
    /// Upper bound on waiting for stage tasks during shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            health_port: 8080,
            shutdown_timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_kind_lowercase() {
        assert_eq!(serde_json::to_string(&BusKind::Memory).unwrap(), "\"memory\"");
        let k: BusKind = serde_json::from_str("\"redis\"").unwrap();
        assert_eq!(k, BusKind::Redis);
    }

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.health_port, 8080);
        assert_eq!(s.shutdown_timeout_ms, 10_000);
    }
}
