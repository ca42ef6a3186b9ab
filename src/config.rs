//! Runtime configuration, read once at start-up from the environment (and a
//! `.env` file when present) and passed by reference to every component.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::mac::MacFormat;

pub const DEFAULT_ISE_BASE_URL: &str = "https://localhost:9060/ers/config/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// A credential that never shows up in `Debug` output or logs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "Secret(<empty>)")
        } else {
            write!(f, "Secret(<redacted>)")
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchConfig {
    pub username: String,
    pub password: Secret,
    /// Enable secret
    pub secret: Secret,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a prompt after each command
    pub read_timeout: Duration,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: Secret::default(),
            secret: Secret::default(),
            port: 22,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IseConfig {
    pub username: String,
    pub password: Secret,
    /// ERS root, such as `https://ise:9060/ers/config/`
    pub base_url: String,
    pub timeout: Duration,
    /// Notation ISE expects in `endpoint/name/{mac}`
    pub mac_format: MacFormat,
}

impl Default for IseConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: Secret::default(),
            base_url: DEFAULT_ISE_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            mac_format: MacFormat::Colon,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VendorConfig {
    /// IEEE `oui.csv` merged over the built-in table
    pub oui_csv: Option<PathBuf>,
    pub online_lookup: bool,
    /// Minimum gap between two online lookups
    pub online_interval: Duration,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            oui_csv: None,
            online_lookup: true,
            online_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub switch: SwitchConfig,
    pub ise: IseConfig,
    pub vendor: VendorConfig,
    pub web: WebConfig,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Unset and blank keys take
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = AppConfig::default();

        if let Some(username) = get("SWITCH_USERNAME") {
            config.switch.username = username;
        }
        if let Some(password) = get("SWITCH_PASSWORD") {
            config.switch.password = Secret::new(password);
        }
        if let Some(secret) = get("SWITCH_SECRET") {
            config.switch.secret = Secret::new(secret);
        }
        if let Some(port) = parsed(&get, "SWITCH_SSH_PORT")? {
            config.switch.port = port;
        }
        if let Some(secs) = parsed::<u64, _>(&get, "SWITCH_CONNECT_TIMEOUT_SECS")? {
            config.switch.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64, _>(&get, "SWITCH_READ_TIMEOUT_SECS")? {
            config.switch.read_timeout = Duration::from_secs(secs);
        }

        if let Some(username) = get("ISE_USERNAME") {
            config.ise.username = username;
        }
        if let Some(password) = get("ISE_PASSWORD") {
            config.ise.password = Secret::new(password);
        }
        if let Some(base) = get("ISE_BASE_URL") {
            Url::parse(base.trim()).map_err(|e| ConfigError::Invalid {
                key: "ISE_BASE_URL",
                reason: e.to_string(),
            })?;
            config.ise.base_url = base.trim().to_string();
        }
        if let Some(secs) = parsed::<u64, _>(&get, "ISE_TIMEOUT_SECS")? {
            config.ise.timeout = Duration::from_secs(secs);
        }
        if let Some(format) = parsed(&get, "ISE_MAC_FORMAT")? {
            config.ise.mac_format = format;
        }

        config.vendor.oui_csv = get("OUI_CSV_PATH").map(PathBuf::from);
        if let Some(online) = get("VENDOR_LOOKUP_ONLINE") {
            config.vendor.online_lookup = parse_flag("VENDOR_LOOKUP_ONLINE", &online)?;
        }
        if let Some(millis) = parsed::<u64, _>(&get, "VENDOR_LOOKUP_INTERVAL_MS")? {
            config.vendor.online_interval = Duration::from_millis(millis);
        }

        if let Some(bind) = get("WEB_BIND") {
            config.web.bind = bind;
        }
        if let Some(port) = parsed(&get, "WEB_PORT")? {
            config.web.port = port;
        }

        Ok(config)
    }

    /// Credentials needed to log in to a switch
    pub fn validate_switch(&self) -> Result<(), ConfigError> {
        if self.switch.password.is_empty() {
            return Err(ConfigError::Missing("SWITCH_PASSWORD"));
        }
        if self.switch.secret.is_empty() {
            return Err(ConfigError::Missing("SWITCH_SECRET"));
        }
        Ok(())
    }

    /// Credentials needed to call the ERS API
    pub fn validate_ise(&self) -> Result<(), ConfigError> {
        if self.ise.password.is_empty() {
            return Err(ConfigError::Missing("ISE_PASSWORD"));
        }
        Ok(())
    }

    /// Everything the web interface needs: it talks to switches and to ISE
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_switch()?;
        self.validate_ise()
    }
}

fn parsed<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}
