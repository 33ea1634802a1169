//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracer_core::{PlaybackDriver, PlaybackEngine, PlaybackSpeed};
use tracer_graph::{standard_facility, FacilityGraph, GraphDocument};
use tracing::info;

use crate::error::{Error, Result};

/// Configuration for the visualization server.
#[derive(Debug, Clone, PartialEq)]
pub struct VisConfig {
    /// HTTP listen address
    pub addr: SocketAddr,

    /// AGV log dataset to load at startup
    pub logs: Option<PathBuf>,

    /// Payload table to load at startup
    pub payloads: Option<PathBuf>,

    /// Facility graph file; the standard 3x3 floor when unset
    pub graph: Option<PathBuf>,

    /// Renderer static files served on non-API paths
    pub assets: Option<PathBuf>,

    /// Initial playback speed
    pub speed: PlaybackSpeed,

    /// Start playing as soon as the logs are loaded
    pub autoplay: bool,
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            logs: None,
            payloads: None,
            graph: None,
            assets: None,
            speed: PlaybackSpeed::Normal,
            autoplay: false,
        }
    }
}

impl VisConfig {
    /// Create config from environment variables with defaults.
    ///
    /// Reads `TRACER_ADDR`, `TRACER_LOGS`, `TRACER_PAYLOADS`, `TRACER_GRAPH`,
    /// `TRACER_ASSETS`, `TRACER_SPEED` (one of 0.5, 1, 2, 5) and
    /// `TRACER_AUTOPLAY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("TRACER_ADDR") {
            config.addr = addr.parse().map_err(|e: std::net::AddrParseError| Error::Config {
                key: "TRACER_ADDR",
                value: addr.clone(),
                reason: e.to_string(),
            })?;
        }
        config.logs = lookup("TRACER_LOGS").map(PathBuf::from);
        config.payloads = lookup("TRACER_PAYLOADS").map(PathBuf::from);
        config.graph = lookup("TRACER_GRAPH").map(PathBuf::from);
        config.assets = lookup("TRACER_ASSETS").map(PathBuf::from);
        if let Some(speed) = lookup("TRACER_SPEED") {
            config.speed = parse_speed(&speed)?;
        }
        if let Some(autoplay) = lookup("TRACER_AUTOPLAY") {
            config.autoplay = matches!(autoplay.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Apply positional command line arguments:
    /// `[logs.json] [payloads.json] [port]`.
    pub fn with_args(mut self, args: &[String]) -> Result<Self> {
        if let Some(logs) = args.first() {
            self.logs = Some(PathBuf::from(logs));
        }
        if let Some(payloads) = args.get(1) {
            self.payloads = Some(PathBuf::from(payloads));
        }
        if let Some(port) = args.get(2) {
            let port: u16 = port.parse().map_err(|e: std::num::ParseIntError| Error::Config {
                key: "port",
                value: port.clone(),
                reason: e.to_string(),
            })?;
            self.addr.set_port(port);
        }
        Ok(self)
    }

    /// Load the facility graph and any configured datasets into a driver.
    pub async fn build_driver(&self) -> Result<PlaybackDriver> {
        let graph = match &self.graph {
            Some(path) => {
                let doc: GraphDocument = serde_json::from_str(&std::fs::read_to_string(path)?)?;
                info!(path = %path.display(), "loaded facility graph");
                FacilityGraph::try_from(doc)?
            }
            None => standard_facility(),
        };

        let driver = PlaybackDriver::new(PlaybackEngine::new(Arc::new(graph)));
        driver.set_speed(self.speed).await;

        if let Some(path) = &self.payloads {
            driver
                .load_payloads_json(&std::fs::read_to_string(path)?)
                .await?;
        }
        if let Some(path) = &self.logs {
            driver.load_logs_json(&std::fs::read_to_string(path)?).await?;
            if self.autoplay {
                driver.start().await;
            }
        }

        Ok(driver)
    }
}

fn parse_speed(text: &str) -> Result<PlaybackSpeed> {
    let invalid = |reason: &str| Error::Config {
        key: "TRACER_SPEED",
        value: text.to_string(),
        reason: reason.to_string(),
    };
    let multiplier: f64 = text.trim().parse().map_err(|_| invalid("not a number"))?;
    PlaybackSpeed::from_multiplier(multiplier).ok_or_else(|| invalid("expected 0.5, 1, 2 or 5"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = VisConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, VisConfig::default());
        assert_eq!(config.addr.port(), 3000);
    }

    #[test]
    fn reads_env_values() {
        let config = VisConfig::from_lookup(lookup(&[
            ("TRACER_ADDR", "127.0.0.1:8088"),
            ("TRACER_LOGS", "agv_logs.json"),
            ("TRACER_SPEED", "5"),
            ("TRACER_AUTOPLAY", "true"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8088".parse().unwrap());
        assert_eq!(config.logs, Some(PathBuf::from("agv_logs.json")));
        assert_eq!(config.speed, PlaybackSpeed::Quintuple);
        assert!(config.autoplay);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(VisConfig::from_lookup(lookup(&[("TRACER_ADDR", "nowhere")])).is_err());
        assert!(VisConfig::from_lookup(lookup(&[("TRACER_SPEED", "3")])).is_err());
        assert!(VisConfig::from_lookup(lookup(&[("TRACER_SPEED", "fast")])).is_err());
    }

    #[test]
    fn args_override_env() {
        let args: Vec<String> = ["logs.json", "payloads.json", "4000"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let config = VisConfig::default().with_args(&args).unwrap();
        assert_eq!(config.logs, Some(PathBuf::from("logs.json")));
        assert_eq!(config.payloads, Some(PathBuf::from("payloads.json")));
        assert_eq!(config.addr.port(), 4000);

        let bad = vec!["a".to_string(), "b".to_string(), "port".to_string()];
        assert!(VisConfig::default().with_args(&bad).is_err());
    }

    #[test]
    fn builds_driver_on_standard_floor() {
        let driver = tokio_test::block_on(VisConfig::default().build_driver()).unwrap();
        let status = tokio_test::block_on(driver.status());
        assert_eq!(status.max_time, 0);
        assert_eq!(status.speed, PlaybackSpeed::Normal);
    }
}
