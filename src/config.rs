use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "riseclock";
const DEFAULT_TICK_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub tick_interval: Duration,
    pub speech_enabled: bool,
    /// Voice or language hint handed to the synthesiser, e.g. `en-IN`.
    pub voice: Option<String>,
    pub seed_defaults: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            speech_enabled: true,
            voice: None,
            seed_defaults: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();

        let tick_interval = match get("RISECLOCK_TICK_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs >= 1 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidValue("RISECLOCK_TICK_SECS".into(), raw)),
            },
            None => defaults.tick_interval,
        };

        Ok(Self {
            data_dir: get("RISECLOCK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tick_interval,
            speech_enabled: parse_flag("RISECLOCK_SPEECH", get("RISECLOCK_SPEECH"))?
                .unwrap_or(defaults.speech_enabled),
            voice: get("RISECLOCK_VOICE"),
            seed_defaults: parse_flag("RISECLOCK_SEED_DEFAULTS", get("RISECLOCK_SEED_DEFAULTS"))?
                .unwrap_or(defaults.seed_defaults),
        })
    }
}

fn parse_flag(key: &str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(Some(true)),
        "0" | "false" | "off" | "no" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue(key.to_string(), raw)),
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}
