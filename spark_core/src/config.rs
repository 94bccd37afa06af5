//! Configuration file support for Ignition.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/ignition/config.toml`.

use crate::cards::DuplicateBonus;
use crate::ledger::OVERLOAD_THRESHOLD;
use crate::streak::DEFAULT_LOOKBACK_DAYS;
use crate::{Calendar, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub rewards: RewardsConfig,

    #[serde(default)]
    pub streak: StreakConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Points and overload configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_overload_threshold")]
    pub overload_threshold: u32,

    #[serde(default)]
    pub duplicate_bonus: DuplicateBonus,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            overload_threshold: default_overload_threshold(),
            duplicate_bonus: DuplicateBonus::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreakConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
        }
    }
}

/// Local day boundaries; the system offset is used when unset
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CalendarConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("ignition")
}

fn default_overload_threshold() -> u32 {
    OVERLOAD_THRESHOLD
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("ignition").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.rewards.overload_threshold == 0 {
            return Err(Error::Config("overload_threshold must be at least 1".into()));
        }
        if self.streak.lookback_days == 0 {
            return Err(Error::Config("lookback_days must be at least 1".into()));
        }
        if !self.rewards.duplicate_bonus.is_monotonic() {
            tracing::warn!(
                "Duplicate bonus is not increasing with rarity: {:?}",
                self.rewards.duplicate_bonus
            );
        }
        if let Some(minutes) = self.calendar.utc_offset_minutes {
            if Calendar::from_offset_minutes(minutes).is_none() {
                return Err(Error::Config(format!(
                    "utc_offset_minutes {} is out of range",
                    minutes
                )));
            }
        }
        Ok(())
    }

    /// Calendar for the configured offset, or the system's local offset
    pub fn calendar(&self) -> Calendar {
        self.calendar
            .utc_offset_minutes
            .and_then(Calendar::from_offset_minutes)
            .unwrap_or_else(Calendar::system_local)
    }
}
