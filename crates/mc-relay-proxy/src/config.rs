use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub proxy: ProxySection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub accounts: AccountsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ProxySection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_motd")]
    pub motd: String,
    /// Packets at or above this size are compressed for viewers. Negative disables.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: i32,
}

fn default_bind() -> String {
    "0.0.0.0:25567".into()
}

fn default_motd() -> String {
    "mc-relay".into()
}

fn default_compression_threshold() -> i32 {
    256
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            motd: default_motd(),
            compression_threshold: default_compression_threshold(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TimingSection {
    /// How long a detached viewer keeps priority on its last backend.
    #[serde(default = "default_reconnect_grace")]
    pub reconnect_grace_secs: u64,
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_secs: u64,
    /// A backend silent for longer than this is dropped.
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_reconnect_grace() -> u64 {
    60
}

fn default_keep_alive_interval() -> u64 {
    10
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    15
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: default_reconnect_grace(),
            keep_alive_interval_secs: default_keep_alive_interval(),
            backend_timeout_secs: default_backend_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl TimingSection {
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs.max(1))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountsSection {
    #[serde(default = "default_accounts_file")]
    pub file: String,
    /// `host:port` of a SOCKS5 proxy used for backend connections.
    #[serde(default)]
    pub socks_proxy: Option<String>,
}

fn default_accounts_file() -> String {
    "accounts.txt".into()
}

impl Default for AccountsSection {
    fn default() -> Self {
        Self {
            file: default_accounts_file(),
            socks_proxy: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ProxyConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Like [`ProxyConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [proxy]
            bind = "127.0.0.1:25570"
            motd = "Test Relay"
            compression_threshold = 512

            [timing]
            reconnect_grace_secs = 90

            [accounts]
            file = "alts.txt"
            socks_proxy = "127.0.0.1:1080"

            [logging]
            level = "debug"
        "#;
        let config: ProxyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.proxy.bind, "127.0.0.1:25570");
        assert_eq!(config.proxy.motd, "Test Relay");
        assert_eq!(config.proxy.compression_threshold, 512);
        assert_eq!(config.timing.reconnect_grace(), Duration::from_secs(90));
        // untouched keys keep their defaults
        assert_eq!(config.timing.keep_alive_interval_secs, 10);
        assert_eq!(config.timing.backend_timeout_secs, 30);
        assert_eq!(config.accounts.file, "alts.txt");
        assert_eq!(config.accounts.socks_proxy.as_deref(), Some("127.0.0.1:1080"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.proxy.bind, "0.0.0.0:25567");
        assert_eq!(config.proxy.motd, "mc-relay");
        assert_eq!(config.proxy.compression_threshold, 256);
        assert_eq!(config.timing.reconnect_grace_secs, 60);
        assert_eq!(config.timing.connect_timeout_secs, 15);
        assert_eq!(config.accounts.file, "accounts.txt");
        assert!(config.accounts.socks_proxy.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ProxyConfig::load_or_default("/nonexistent/mc-relay/proxy.toml").unwrap();
        assert_eq!(config.proxy.compression_threshold, 256);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let config: ProxyConfig = toml::from_str("[proxy]\nmotd = \"hi\"\n").unwrap();
        assert_eq!(config.proxy.motd, "hi");
        assert_eq!(config.proxy.bind, "0.0.0.0:25567");
    }
}
