//! AOE loot configuration
//!
//! Settings live in a TOML file under an `[AOELoot]` table, using the same
//! key names the module has always used:
//!
//! ```toml
//! [AOELoot]
//! Enable = true
//! Range = 55.0
//! CorpseThreshold = 2
//! Group = true
//! MoneyShareDistanceMultiplier = 2.0
//! Debug = false
//! Message = true
//! MailFallback = false
//! ```
//!
//! Dotted keys (`AOELoot.Range = 30.0`) at the top level parse to the same
//! table. Missing keys keep their defaults, so an empty file is valid.
//! The server re-reads the file when its modification time changes.

use crate::error::ConfigError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

pub const DEFAULT_RANGE: f32 = 55.0;
pub const DEFAULT_CORPSE_THRESHOLD: u32 = 2;
pub const DEFAULT_MONEY_SHARE_MULTIPLIER: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AoeLootConfig {
    /// Server-wide switch for the whole module
    pub enable: bool,
    /// Corpse discovery radius
    pub range: f32,
    /// Minimum number of eligible corpses before an AOE pass runs
    pub corpse_threshold: u32,
    /// Split gold with nearby group members
    pub group: bool,
    /// Gold sharing uses `range * money_share_distance_multiplier`
    pub money_share_distance_multiplier: f32,
    /// Send diagnostics to every player, regardless of their own debug flag
    pub debug: bool,
    /// Show the hint message at login
    pub message: bool,
    /// Mail items that do not fit in the inventory instead of leaving them on the corpse
    pub mail_fallback: bool,
}

impl Default for AoeLootConfig {
    fn default() -> Self {
        Self {
            enable: true,
            range: DEFAULT_RANGE,
            corpse_threshold: DEFAULT_CORPSE_THRESHOLD,
            group: true,
            money_share_distance_multiplier: DEFAULT_MONEY_SHARE_MULTIPLIER,
            debug: false,
            message: true,
            mail_fallback: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "AOELoot", default)]
    aoe_loot: AoeLootConfig,
}

impl AoeLootConfig {
    /// Loads and validates the configuration file at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parses configuration text; `origin` only labels errors.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Ok(file.aoe_loot.validated())
    }

    /// Replaces unusable numeric values with their defaults.
    pub fn validated(mut self) -> Self {
        if !self.range.is_finite() || self.range <= 0.0 {
            warn!(
                "AOELoot.Range {} is invalid, using {}",
                self.range, DEFAULT_RANGE
            );
            self.range = DEFAULT_RANGE;
        }
        if !self.money_share_distance_multiplier.is_finite()
            || self.money_share_distance_multiplier < 1.0
        {
            warn!(
                "AOELoot.MoneyShareDistanceMultiplier {} is invalid, using {}",
                self.money_share_distance_multiplier, DEFAULT_MONEY_SHARE_MULTIPLIER
            );
            self.money_share_distance_multiplier = DEFAULT_MONEY_SHARE_MULTIPLIER;
        }
        self
    }

    /// Radius within which group members share gold.
    pub fn money_share_range(&self) -> f32 {
        self.range * self.money_share_distance_multiplier
    }
}

/// Modification time used to detect config edits for hot reload.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
