//! Configuration file for klv-ingest.
//!
//! ```toml
//! [logging]
//! log_dir = "logs"
//! retention_days = 7
//! level = "info"
//!
//! [ingest]
//! metacard_id = "mission-42"
//! subsample_count = 50
//! interval_packets = 100
//! universal_key = "060E2B34020B01010E01030101000000"
//!
//! [[fields]]
//! tag = 2
//! name = "PRECISION_TIME_STAMP"
//! encoding = { type = "timestamp" }
//!
//! [[handlers]]
//! kind = "text"
//! attribute = "country_codes"
//! field = "OBJECT_COUNTRY_CODES"
//!
//! [[updaters]]
//! kind = "temporal_end"
//! ```

use std::fs;
use std::path::Path;

use klv_handlers::{
    AttributeMergeUpdater, HandlerConfig, HandlerError, HandlerSession, MetacardUpdater,
    TemporalEndUpdater, TemporalStartUpdater,
};
use klv_protocol::{FieldDictionary, UAS_LOCAL_SET_KEY, UNIVERSAL_KEY_SIZE};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid universal key '{0}': expected 32 hex digits")]
    InvalidKey(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub ingest: IngestSection,
    /// Tag dictionary.
    #[serde(default)]
    pub fields: FieldDictionary,
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
    /// Update strategies; defaults apply when empty.
    #[serde(default)]
    pub updaters: Vec<UpdaterConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct IngestSection {
    pub metacard_id: Option<String>,
    pub subsample_count: Option<usize>,
    pub interval_packets: Option<usize>,
    pub universal_key: Option<String>,
}

/// Updater definition as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdaterConfig {
    TemporalStart,
    TemporalEnd,
    AttributeMerge { attribute: String },
}

impl From<&UpdaterConfig> for MetacardUpdater {
    fn from(config: &UpdaterConfig) -> Self {
        match config {
            UpdaterConfig::TemporalStart => MetacardUpdater::TemporalStart(TemporalStartUpdater),
            UpdaterConfig::TemporalEnd => MetacardUpdater::TemporalEnd(TemporalEndUpdater),
            UpdaterConfig::AttributeMerge { attribute } => {
                AttributeMergeUpdater::new(attribute).into()
            }
        }
    }
}

impl ConfigFile {
    /// Load and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Build the handler session described by `[[handlers]]`.
    pub fn session(&self) -> Result<HandlerSession, ConfigError> {
        Ok(HandlerSession::from_configs(&self.handlers)?)
    }

    /// Universal key packets must carry.
    pub fn universal_key(&self) -> Result<[u8; UNIVERSAL_KEY_SIZE], ConfigError> {
        match &self.ingest.universal_key {
            Some(hex) => parse_key(hex),
            None => Ok(UAS_LOCAL_SET_KEY),
        }
    }

    /// Configured updaters, or start/end plus a merge of every handler's
    /// attribute when none are configured.
    pub fn updaters(&self) -> Vec<MetacardUpdater> {
        if !self.updaters.is_empty() {
            return self.updaters.iter().map(MetacardUpdater::from).collect();
        }

        let mut updaters = vec![
            MetacardUpdater::TemporalStart(TemporalStartUpdater),
            MetacardUpdater::TemporalEnd(TemporalEndUpdater),
        ];
        for handler in &self.handlers {
            let attribute = match handler {
                HandlerConfig::FloatingPoint { attribute, .. }
                | HandlerConfig::Text { attribute, .. }
                | HandlerConfig::GeoBox { attribute, .. } => attribute,
            };
            updaters.push(AttributeMergeUpdater::new(attribute).into());
        }
        updaters
    }
}

fn parse_key(hex: &str) -> Result<[u8; UNIVERSAL_KEY_SIZE], ConfigError> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace() && *c != '.').collect();
    if digits.len() != UNIVERSAL_KEY_SIZE * 2 || !digits.is_ascii() {
        return Err(ConfigError::InvalidKey(hex.to_string()));
    }

    let mut key = [0u8; UNIVERSAL_KEY_SIZE];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
            .map_err(|_| ConfigError::InvalidKey(hex.to_string()))?;
    }
    Ok(key)
}
