use crate::error::CollectorError;
use crate::models::RouteDistinguisher;
use log::debug;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

struct Defaults {}

impl Defaults {
    fn listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 10179))
    }

    fn collect() -> bool {
        true
    }

    fn keep() -> u64 {
        300
    }

    fn keepalive() -> u64 {
        60
    }
}

/// Collector configuration, usually read from a TOML file.
///
/// ```toml
/// listen = "0.0.0.0:10179"
/// rds = ["65017:104", 0]
/// collect_as_paths = false
/// keep = 300
/// receive_buffer = 4194304
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    #[serde(default = "Defaults::listen")]
    pub listen: SocketAddr,

    /// Route distinguishers to keep. All of them when empty. `0` stands for the global space.
    #[serde(default)]
    pub rds: Vec<RouteDistinguisher>,

    #[serde(default = "Defaults::collect")]
    pub collect_asns: bool,
    #[serde(default = "Defaults::collect")]
    pub collect_as_paths: bool,
    #[serde(default = "Defaults::collect")]
    pub collect_communities: bool,

    /// Seconds to keep the routes of an exporter after its connection went down.
    #[serde(default = "Defaults::keep")]
    pub keep: u64,

    /// Requested `SO_RCVBUF` for exporter connections, 0 to leave the system default.
    #[serde(default)]
    pub receive_buffer: usize,

    /// TCP keepalive period in seconds.
    #[serde(default = "Defaults::keepalive")]
    pub keepalive: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            listen: Defaults::listen(),
            rds: vec![],
            collect_asns: Defaults::collect(),
            collect_as_paths: Defaults::collect(),
            collect_communities: Defaults::collect(),
            keep: Defaults::keep(),
            receive_buffer: 0,
            keepalive: Defaults::keepalive(),
        }
    }
}

impl CollectorConfig {
    pub fn from_toml_str(contents: &str) -> Result<CollectorConfig, CollectorError> {
        let config: CollectorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CollectorConfig, CollectorError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!("using config: {:?}", config);
        Ok(config)
    }

    fn validate(&self) -> Result<(), CollectorError> {
        if self.keep == 0 {
            return Err(CollectorError::Config(
                "keep should be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn keep_duration(&self) -> Duration {
        Duration::from_secs(self.keep)
    }

    pub fn keepalive_duration(&self) -> Duration {
        Duration::from_secs(self.keepalive)
    }

    /// Whether lookups have anything to return.
    pub fn collects_anything(&self) -> bool {
        self.collect_asns || self.collect_as_paths || self.collect_communities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::from_toml_str("").unwrap();
        assert_eq!(config, CollectorConfig::default());
        assert_eq!(config.listen.port(), 10179);
        assert!(config.rds.is_empty());
        assert!(config.collects_anything());
        assert_eq!(config.keep_duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_config() {
        let config = CollectorConfig::from_toml_str(
            r#"
            listen = "127.0.0.1:1790"
            rds = ["65017:104", 0, "2:65000:10", "192.0.2.1:10"]
            collect_as_paths = false
            keep = 10
            receive_buffer = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:1790".parse().unwrap());
        assert_eq!(
            config.rds,
            vec![
                RouteDistinguisher(0x0000_fdf9_0000_0068),
                RouteDistinguisher(0),
                RouteDistinguisher(0x0002_0000_fde8_000a),
                RouteDistinguisher(0x0001_c000_0201_000a),
            ]
        );
        assert!(config.collect_asns);
        assert!(!config.collect_as_paths);
        assert_eq!(config.keep, 10);
        assert_eq!(config.receive_buffer, 1 << 20);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            CollectorConfig::from_toml_str("keep = 0"),
            Err(CollectorError::Config(_))
        ));
        assert!(matches!(
            CollectorConfig::from_toml_str("rds = [\"65017:bogus\"]"),
            Err(CollectorError::Config(_))
        ));
        assert!(matches!(
            CollectorConfig::from_toml_str("listen = 1"),
            Err(CollectorError::Config(_))
        ));
        assert!(matches!(
            CollectorConfig::from_toml_str("unknown = true"),
            Err(CollectorError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bmp.toml");
        std::fs::write(&path, "collect_communities = false\n").unwrap();
        let config = CollectorConfig::from_file(&path).unwrap();
        assert!(!config.collect_communities);

        assert!(matches!(
            CollectorConfig::from_file(dir.path().join("missing.toml")),
            Err(CollectorError::Io(_))
        ));
    }
}
