//! Service Configuration
//!
//! Read once at start-up from the process environment (plus an optional
//! `.env` file loaded by the binary). Empty variables count as unset.

use alerting::{PlayerAlarm, ALERT_SOUND, DEFAULT_PLAYER};
use analytics_sync::{AnalyticsConfig, AnalyticsForwarder};
use config::{Config, Environment};
use glucose_source::NightscoutClient;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Default acknowledgment listener address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:4444";

/// Fatal start-up errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings as read from the environment, before validation
#[derive(Debug, Deserialize)]
struct RawSettings {
    nightscout_url: Option<String>,
    nightscout_token: Option<String>,
    tinybird_token: Option<String>,
    listen_addr: String,
    alert_sound: Option<PathBuf>,
    alert_player: String,
    log_format: LogFormat,
}

/// Validated service settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Nightscout base URL
    pub nightscout_url: String,
    /// Nightscout API token
    pub nightscout_token: Option<String>,
    /// Analytics token; forwarding is off without it
    pub tinybird_token: Option<String>,
    /// Acknowledgment listener address
    pub listen_addr: SocketAddr,
    /// Alert sound file replacing the embedded one
    pub alert_sound: Option<PathBuf>,
    /// Player command line
    pub alert_player: String,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_source(None)
    }

    /// Load from an explicit variable map, or the process environment if `None`
    pub fn from_source(vars: Option<config::Map<String, String>>) -> Result<Self, ConfigurationError> {
        let raw: RawSettings = Config::builder()
            .set_default("listen_addr", DEFAULT_LISTEN_ADDR)?
            .set_default("alert_player", DEFAULT_PLAYER)?
            .set_default("log_format", "text")?
            .add_source(Environment::default().ignore_empty(true).source(vars))
            .build()?
            .try_deserialize()?;

        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> Result<Self, ConfigurationError> {
        let nightscout_url = raw
            .nightscout_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigurationError::Missing("NIGHTSCOUT_URL"))?;

        let listen_addr = raw
            .listen_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigurationError::Invalid {
                name: "LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            nightscout_url,
            nightscout_token: raw.nightscout_token,
            tinybird_token: raw.tinybird_token,
            listen_addr,
            alert_sound: raw.alert_sound,
            alert_player: raw.alert_player,
            log_format: raw.log_format,
        })
    }

    /// Nightscout client for the configured instance
    pub fn source(&self) -> Result<NightscoutClient, ConfigurationError> {
        NightscoutClient::new(&self.nightscout_url, self.nightscout_token.as_deref()).map_err(|e| {
            ConfigurationError::Invalid {
                name: "NIGHTSCOUT_URL",
                reason: e.to_string(),
            }
        })
    }

    /// Alarm using the configured player and sound
    pub fn alarm(&self) -> Result<PlayerAlarm, ConfigurationError> {
        let alarm = match &self.alert_sound {
            Some(path) => {
                let sound = std::fs::read(path).map_err(|e| ConfigurationError::Invalid {
                    name: "ALERT_SOUND",
                    reason: format!("{}: {}", path.display(), e),
                })?;
                info!("Using alert sound from {}", path.display());
                PlayerAlarm::new(&self.alert_player, sound)
            }
            None => PlayerAlarm::new(&self.alert_player, ALERT_SOUND),
        };

        alarm.map_err(|e| ConfigurationError::Invalid {
            name: "ALERT_PLAYER",
            reason: e.to_string(),
        })
    }

    /// Analytics forwarder, if a token is configured
    pub fn forwarder(&self) -> Result<Option<AnalyticsForwarder>, ConfigurationError> {
        let Some(token) = &self.tinybird_token else {
            info!("TINYBIRD_TOKEN not set, analytics forwarding disabled");
            return Ok(None);
        };

        AnalyticsForwarder::new(AnalyticsConfig::with_token(token.clone()))
            .map(Some)
            .map_err(|e| ConfigurationError::Invalid {
                name: "TINYBIRD_TOKEN",
                reason: e.to_string(),
            })
    }
}
