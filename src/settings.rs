use std::time::Duration;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use crate::{dns::godaddy, ip::http};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_TTL: u32 = 600;

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Comma separated list of managed domains.
    #[serde(default)]
    pub domains: String,
    #[serde(default, alias = "interval")]
    pub update_interval: Option<String>,
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ip_url")]
    pub ip_url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
}

fn environment() -> Environment {
    Environment::with_prefix("GD")
}

fn default_ttl() -> u32 { DEFAULT_TTL }
fn default_api_url() -> String { godaddy::DEFAULT_API_URL.to_owned() }
fn default_ip_url() -> String { http::DEFAULT_IP_URL.to_owned() }
fn default_rate_limit() -> u64 { godaddy::DEFAULT_REQUESTS_PER_MINUTE }

impl Settings {
    pub fn new() -> Result<Self, SettingsError> {
        let user_config = shellexpand::tilde("~/.config/godaddy-ddns/config");

        let cfg = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name(&user_config).required(false))
            .add_source(File::with_name("/etc/godaddy-ddns/config").required(false))
            .add_source(environment())
            .build()?;

        Self::from_config(cfg)
    }

    pub fn from_config(cfg: Config) -> Result<Self, SettingsError> {
        let settings: Self = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.api_key.trim().is_empty() {
            return Err(SettingsError::Missing("api_key (GD_API_KEY)"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(SettingsError::Missing("api_secret (GD_API_SECRET)"));
        }
        if self.domain_list().is_empty() {
            return Err(SettingsError::Missing("domains (GD_DOMAINS)"));
        }
        if self.rate_limit == 0 {
            return Err(SettingsError::Invalid("rate_limit must be at least 1"));
        }
        Ok(())
    }

    pub fn domain_list(&self) -> Vec<String> {
        self.domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Parsed update interval. Falls back to ten minutes when absent or unparsable.
    pub fn update_interval(&self) -> Duration {
        let Some(raw) = self.update_interval.as_deref().map(str::trim) else {
            warn!("no update interval given, defaulting to {}", humantime::format_duration(DEFAULT_UPDATE_INTERVAL));
            return DEFAULT_UPDATE_INTERVAL;
        };

        let parsed = match raw.parse::<u64>() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => humantime::parse_duration(raw),
        };

        match parsed {
            Ok(interval) if !interval.is_zero() => interval,
            Ok(_) => {
                warn!("update interval must be positive, defaulting to {}", humantime::format_duration(DEFAULT_UPDATE_INTERVAL));
                DEFAULT_UPDATE_INTERVAL
            }
            Err(e) => {
                warn!(interval = raw, "invalid update interval ({e}), defaulting to {}", humantime::format_duration(DEFAULT_UPDATE_INTERVAL));
                DEFAULT_UPDATE_INTERVAL
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid setting: {0}")]
    Invalid(&'static str),
}
