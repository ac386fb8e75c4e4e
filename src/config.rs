// Store configuration - timing and capacity defaults
// Loaded from RON or JSON, falls back to defaults for missing fields

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sequencer::note::{DEFAULT_TPQN, MAX_CHANNELS};
use crate::sequencer::timeline::{SongTiming, Tempo, TimeSignature};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown configuration format: {0}")]
    UnknownFormat(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Defaults for new songs and the editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Ticks per quarter note
    pub ticks_per_quarter: u32,
    pub numerator: u8,
    pub denominator: u8,
    pub bpm: f64,
    /// Note channels of a newly created part
    pub part_channels: usize,
    /// Undo steps kept by the command manager
    pub max_undo_history: usize,
    /// Capacity of the notification ring buffer
    pub notification_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ticks_per_quarter: DEFAULT_TPQN,
            numerator: 4,
            denominator: 4,
            bpm: 120.0,
            part_channels: 1,
            max_undo_history: 100,
            notification_capacity: 256,
        }
    }
}

impl StoreConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.ron` or `.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ron") => Self::from_ron_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnknownFormat(path.to_path_buf())),
        }
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_quarter == 0 {
            return Err(ConfigError::Invalid(
                "ticks_per_quarter must be > 0".to_string(),
            ));
        }
        if TimeSignature::try_new(self.numerator, self.denominator).is_none() {
            return Err(ConfigError::Invalid(format!(
                "invalid time signature {}/{}",
                self.numerator, self.denominator
            )));
        }
        if Tempo::try_new(self.bpm).is_none() {
            return Err(ConfigError::Invalid(format!(
                "BPM {} must be between {} and {}",
                self.bpm,
                Tempo::MIN_BPM,
                Tempo::MAX_BPM
            )));
        }
        if self.part_channels == 0 || self.part_channels > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "part_channels {} out of range",
                self.part_channels
            )));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notification_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Song timing described by this configuration
    ///
    /// Invalid values fall back to the defaults.
    pub fn timing(&self) -> SongTiming {
        let time_signature =
            TimeSignature::try_new(self.numerator, self.denominator).unwrap_or_default();
        let tempo = Tempo::try_new(self.bpm).unwrap_or_default();
        let tpqn = if self.ticks_per_quarter > 0 {
            self.ticks_per_quarter
        } else {
            DEFAULT_TPQN
        };
        SongTiming::new(tpqn, time_signature, tempo)
    }
}
