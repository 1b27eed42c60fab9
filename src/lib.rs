//! soloquest - solo tabletop adventure player
//!
//! A single hero against a group of monsters: dice, combat rules, and the
//! turn engine that coordinates with an asynchronous roll actor.

pub mod combat;
pub mod content;
pub mod narrative;
pub mod player;
pub mod rolls;
pub mod timers;

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub use combat::{CombatEngine, CombatError};

/// Prefix for environment overrides, e.g. `SOLOQUEST_COMBAT__AUTO_STEP_DELAY_MS`
pub const ENV_PREFIX: &str = "SOLOQUEST_";

/// Pacing of automatic combat steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Pause before a monster acts
    pub monster_turn_delay_ms: u64,
    /// Pause after a hit or miss is revealed, before the turn moves on
    pub auto_step_delay_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            monster_turn_delay_ms: 1000,
            auto_step_delay_ms: 600,
        }
    }
}

impl CombatConfig {
    /// No pauses at all
    pub fn instant() -> Self {
        Self {
            monster_turn_delay_ms: 0,
            auto_step_delay_ms: 0,
        }
    }

    pub fn monster_turn_delay(&self) -> Duration {
        Duration::from_millis(self.monster_turn_delay_ms)
    }

    pub fn auto_step_delay(&self) -> Duration {
        Duration::from_millis(self.auto_step_delay_ms)
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub combat: CombatConfig,
    /// Seed for every random source; thread entropy when unset
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Defaults, then the TOML file at `path` if given, then the environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }
}
