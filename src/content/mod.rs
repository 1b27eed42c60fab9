//! Adventure content at the ingestion edge
//!
//! Monster and node documents are authored by hand and imported from JSON,
//! so their shapes drift: a monster's attack bonus may sit under `attack`,
//! under `stats`, or at the top level. This module accepts all of those and
//! normalizes once into the strict combat types; the engine never sees a
//! raw record.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::combat::{AbilityScores, AttackProfile, Combatant, Side};

/// Hit points of a monster whose record names none
pub const DEFAULT_MONSTER_HP: i32 = 5;

/// Armor class of a monster whose record names none
pub const DEFAULT_MONSTER_AC: i32 = 10;

/// Errors loading or fetching content
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read content: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed content: {0}")]
    Json(#[from] serde_json::Error),
}

/// A narrative node, as far as combat cares about it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatNode {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "monsterIds", default)]
    pub monster_ids: Vec<String>,
    #[serde(rename = "victoryNode", alias = "victoryNodeId", default)]
    pub victory_node_id: Option<String>,
    #[serde(rename = "defeatNode", alias = "defeatNodeId", default)]
    pub defeat_node_id: Option<String>,
}

impl CombatNode {
    /// Whether entering this node starts a fight
    pub fn is_combat(&self) -> bool {
        self.kind == "combat" || !self.monster_ids.is_empty()
    }
}

/// A monster document as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stats: Map<String, Value>,
    #[serde(default)]
    pub attack: Option<Value>,
    /// Everything else, kept for the legacy top-level attack keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MonsterRecord {
    fn stat(&self, key: &str) -> Option<i32> {
        get_number(&self.stats, key)
    }

    /// The monster's attack, looked up under `attack`, then `stats`, then
    /// the top level, with defaults for anything still missing
    pub fn attack_profile(&self) -> AttackProfile {
        let attack = self.attack.as_ref().and_then(Value::as_object);
        let from_attack_number = |key: &str| attack.and_then(|a| get_number(a, key));
        let from_attack_string = |key: &str| attack.and_then(|a| get_string(a, key));

        let bonus = from_attack_number("bonus")
            .or_else(|| self.stat("attackBonus"))
            .or_else(|| get_number(&self.extra, "attackBonus"))
            .unwrap_or(AttackProfile::DEFAULT_BONUS);
        let damage_dice = from_attack_string("damageDice")
            .or_else(|| get_string(&self.stats, "damageDice"))
            .or_else(|| get_string(&self.extra, "damageDice"))
            .unwrap_or_else(|| AttackProfile::DEFAULT_DAMAGE_DICE.to_string());
        let damage_bonus = from_attack_number("damageBonus")
            .or_else(|| self.stat("damageBonus"))
            .or_else(|| get_number(&self.extra, "damageBonus"))
            .unwrap_or(AttackProfile::DEFAULT_DAMAGE_BONUS);
        let label = from_attack_string("label")
            .unwrap_or_else(|| AttackProfile::DEFAULT_LABEL.to_string());

        AttackProfile {
            bonus,
            damage_dice,
            damage_bonus,
            label,
        }
    }

    /// Normalize into a combatant. `index` disambiguates repeated monsters.
    pub fn to_combatant(&self, index: usize) -> Combatant {
        let hp = self.stat("hp").unwrap_or(DEFAULT_MONSTER_HP);
        let ability = |key: &str| self.stat(key).unwrap_or(10);

        Combatant {
            id: format!("{}__{}", self.id, index),
            name: self.name.clone(),
            side: Side::Monster,
            ac: self.stat("ac").unwrap_or(DEFAULT_MONSTER_AC),
            max_hp: hp,
            hp,
            abilities: AbilityScores {
                str: ability("str"),
                dex: ability("dex"),
                con: ability("con"),
                int: ability("int"),
                wis: ability("wis"),
                cha: ability("cha"),
            },
            initiative: 0,
            alive: hp > 0,
            unconscious: false,
            death_saves: None,
            attack: Some(self.attack_profile()),
        }
    }
}

fn get_number(record: &Map<String, Value>, key: &str) -> Option<i32> {
    let value = record.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .map(|n| n as i32)
}

fn get_string(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key)?.as_str().map(str::to_string)
}

/// Where monster definitions come from
#[async_trait]
pub trait MonsterSource: Send + Sync {
    /// Fetch the records for `ids`, in the order given. Unknown ids are
    /// skipped; repeated ids yield repeated records.
    async fn get_monsters(&self, ids: &[String]) -> Result<Vec<MonsterRecord>, ContentError>;
}

/// In-memory monster library
#[derive(Debug, Default)]
pub struct MonsterLibrary {
    monsters: RwLock<HashMap<String, MonsterRecord>>,
}

/// Accepted file shapes: a bare array or `{ "monsters": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum MonsterFile {
    List(Vec<MonsterRecord>),
    Wrapped { monsters: Vec<MonsterRecord> },
}

impl MonsterLibrary {
    /// Build a library from records
    pub fn from_records(records: impl IntoIterator<Item = MonsterRecord>) -> Self {
        let monsters = records.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            monsters: RwLock::new(monsters),
        }
    }

    /// Parse a JSON monster document
    pub fn from_json_str(json: &str) -> Result<Self, ContentError> {
        let records = match serde_json::from_str::<MonsterFile>(json)? {
            MonsterFile::List(records) => records,
            MonsterFile::Wrapped { monsters } => monsters,
        };
        debug!("Parsed {} monster records", records.len());
        Ok(Self::from_records(records))
    }

    /// Load a JSON monster document from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&json)
    }

    /// Get count of known monsters
    pub async fn len(&self) -> usize {
        self.monsters.read().await.len()
    }

    /// Check if the library is empty
    pub async fn is_empty(&self) -> bool {
        self.monsters.read().await.is_empty()
    }
}

#[async_trait]
impl MonsterSource for MonsterLibrary {
    async fn get_monsters(&self, ids: &[String]) -> Result<Vec<MonsterRecord>, ContentError> {
        let monsters = self.monsters.read().await;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match monsters.get(id) {
                Some(record) => found.push(record.clone()),
                None => warn!("Unknown monster id: {}", id),
            }
        }
        Ok(found)
    }
}
