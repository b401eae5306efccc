//! TOML configuration for the three binaries.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Deserializer, de::DeserializeOwned};

use crate::storage::StorageKind;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggerConf {
    pub level: String,
}

impl Default for LoggerConf {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConf {
    pub db: StorageKind,
    /// Database path for `sqlite`; ignored by `in-memory`.
    pub dsn: String,
}

impl Default for StorageConf {
    fn default() -> Self {
        Self {
            db: StorageKind::InMemory,
            dsn: "calendar.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConf {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl HttpConf {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrokerConf {
    /// Path of the shared queue database.
    pub url: String,
    #[serde(deserialize_with = "human_duration")]
    pub poll_interval: Duration,
}

impl Default for BrokerConf {
    fn default() -> Self {
        Self {
            url: "queue.db".to_string(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConf {
    #[serde(deserialize_with = "human_duration")]
    pub period: Duration,
}

impl Default for SchedulerConf {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub logger: LoggerConf,
    pub storage: StorageConf,
    pub http: HttpConf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub logger: LoggerConf,
    pub storage: StorageConf,
    pub broker: BrokerConf,
    pub scheduler: SchedulerConf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub logger: LoggerConf,
    pub storage: StorageConf,
    pub broker: BrokerConf,
}

/// Reads and parses a TOML file into any of the config types above.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse<T: DeserializeOwned>(content: &str) -> Result<T, toml::de::Error> {
    toml::from_str(content)
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let duration = humantime::parse_duration(&raw).map_err(serde::de::Error::custom)?;
    if duration.is_zero() {
        return Err(serde::de::Error::custom("duration must be greater than zero"));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: SchedulerConfig = parse("").unwrap();
        assert_eq!(cfg, SchedulerConfig::default());
        assert_eq!(cfg.scheduler.period, Duration::from_secs(60));
        assert_eq!(cfg.storage.db, StorageKind::InMemory);
    }

    #[test]
    fn parses_all_sections() {
        let cfg: SchedulerConfig = parse(
            r#"
            [logger]
            level = "debug"

            [storage]
            db = "sqlite"
            dsn = "/tmp/cal.db"

            [broker]
            url = "/tmp/queue.db"
            poll_interval = "250ms"

            [scheduler]
            period = "1m 30s"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.logger.level, "debug");
        assert_eq!(cfg.storage.db, StorageKind::Sqlite);
        assert_eq!(cfg.storage.dsn, "/tmp/cal.db");
        assert_eq!(cfg.broker.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.scheduler.period, Duration::from_secs(90));
    }

    #[test]
    fn rejects_zero_period_and_unknown_backend() {
        assert!(parse::<SchedulerConfig>("[scheduler]\nperiod = \"0s\"").is_err());
        assert!(parse::<CalendarConfig>("[storage]\ndb = \"postgres\"").is_err());
    }

    #[test]
    fn http_addr_joins_host_and_port() {
        let cfg: CalendarConfig = parse("[http]\nport = 9000").unwrap();
        assert_eq!(cfg.http.addr(), "127.0.0.1:9000");
    }
}
