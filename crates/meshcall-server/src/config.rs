//! Configuration loading and validation (C12, §4.13, §6).
//!
//! TOML file merged with `MESHCALL_<SECTION>__<KEY>` environment overrides
//! (teacher's `config` crate). Validation happens once, at startup, and
//! rejects the whole config on the first offending field (§7.1) — no
//! partial configs are ever accepted.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("rtc.udp_sockets_count must be >= 1")]
    BadSocketCount,

    #[error("rtc.nack_buffer_size must be a power of two in [32, 8192], got {0}")]
    BadNackBufferSize(u32),

    #[error("rtc.turn.static_auth_secret requires credentials_expiration_minutes in (0, 10080]")]
    TurnSecretMissingExpiry,

    #[error("rtc.turn.credentials_expiration_minutes must be in (0, 10080], got {0}")]
    BadTurnExpiry(u32),

    #[error("rtc.ice_host_port_override: {0}")]
    BadHostPortOverride(String),

    #[error("api.security.enable_admin requires admin_secret_key")]
    MissingAdminSecret,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enable: bool,
    pub cert_file: String,
    pub cert_key: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            cert_file: String::new(),
            cert_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_address: String,
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8045".to_string(),
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enable_admin: bool,
    pub admin_secret_key: String,
    pub allow_self_registration: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_admin: false,
            admin_secret_key: String::new(),
            allow_self_registration: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub http: HttpConfig,
    pub security: SecurityConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    pub static_auth_secret: String,
    pub credentials_expiration_minutes: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            static_auth_secret: String::new(),
            credentials_expiration_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IceServerEntry {
    Url(String),
    Full {
        urls: Vec<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        credential: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RtcConfig {
    pub ice_address_udp: String,
    pub ice_port_udp: u16,
    pub ice_address_tcp: String,
    pub ice_port_tcp: u16,
    pub ice_host_override: String,
    pub ice_host_port_override: String,
    pub enable_ipv6: bool,
    pub udp_sockets_count: u32,
    pub nack_buffer_size: u32,
    pub ice_servers: Vec<IceServerEntry>,
    pub turn: TurnConfig,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_address_udp: String::new(),
            ice_port_udp: 8443,
            ice_address_tcp: String::new(),
            ice_port_tcp: 8443,
            ice_host_override: String::new(),
            ice_host_port_override: String::new(),
            enable_ipv6: false,
            udp_sockets_count: 1,
            nack_buffer_size: 256,
            ice_servers: Vec::new(),
            turn: TurnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_source: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_source: "meshcall.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub enable_console: bool,
    pub enable_file: bool,
    pub console_json: bool,
    pub file_json: bool,
    pub console_level: LogLevel,
    pub file_level: LogLevel,
    pub file_location: String,
    pub enable_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enable_console: true,
            enable_file: false,
            console_json: false,
            file_json: true,
            console_level: LogLevel::Info,
            file_level: LogLevel::Info,
            file_location: "meshcalld.log".to_string(),
            enable_color: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub rtc: RtcConfig,
    pub store: StoreConfig,
    pub logger: LoggerConfig,
    pub jwt_secret: String,
    pub bind_addresses: Vec<IpAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            rtc: RtcConfig::default(),
            store: StoreConfig::default(),
            logger: LoggerConfig::default(),
            jwt_secret: "dev-secret-change-in-production".to_string(),
            bind_addresses: Vec::new(),
        }
    }
}

impl Config {
    /// Loads `config.toml` (if present) in the current directory, then
    /// applies `MESHCALL_<SECTION>__<KEY>` environment overrides, then
    /// validates. Returns the first offending field on failure (§7.1).
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        } else {
            builder = builder.add_source(config::File::with_name("config").required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("MESHCALL")
                .separator("__")
                .try_parsing(true),
        );

        let raw: Config = builder.build()?.try_deserialize()?;
        raw.validate()?;
        Ok(raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rtc.udp_sockets_count < 1 {
            return Err(ConfigError::BadSocketCount);
        }
        let n = self.rtc.nack_buffer_size;
        if !(32..=8192).contains(&n) || !n.is_power_of_two() {
            return Err(ConfigError::BadNackBufferSize(n));
        }
        if !self.rtc.turn.static_auth_secret.is_empty() {
            let exp = self.rtc.turn.credentials_expiration_minutes;
            if exp == 0 {
                return Err(ConfigError::TurnSecretMissingExpiry);
            }
            if exp > 10080 {
                return Err(ConfigError::BadTurnExpiry(exp));
            }
        }
        if self.api.security.enable_admin && self.api.security.admin_secret_key.is_empty() {
            return Err(ConfigError::MissingAdminSecret);
        }
        crate::ice::host_port_override::HostPortOverride::parse(&self.rtc.ice_host_port_override)
            .map_err(ConfigError::BadHostPortOverride)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_power_of_two_nack_buffer() {
        let mut cfg = Config::default();
        cfg.rtc.nack_buffer_size = 100;
        assert!(matches!(cfg.validate(), Err(ConfigError::BadNackBufferSize(100))));
    }

    #[test]
    fn rejects_turn_secret_without_expiry() {
        let mut cfg = Config::default();
        cfg.rtc.turn.static_auth_secret = "secret".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::TurnSecretMissingExpiry)));
    }

    #[test]
    fn rejects_admin_without_secret() {
        let mut cfg = Config::default();
        cfg.api.security.enable_admin = true;
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingAdminSecret)));
    }
}
