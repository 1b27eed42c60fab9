//! Standard content for scenarios

use serde_json::{json, Value};
use soloquest::combat::AbilityScores;
use soloquest::content::{CombatNode, MonsterRecord};
use soloquest::player::HeroSnapshot;

pub const VICTORY_NODE: &str = "cave-won";
pub const DEFEAT_NODE: &str = "cave-lost";

/// Level 1, hp 10, ac 14, str 16, dex 10
pub fn hero() -> HeroSnapshot {
    HeroSnapshot {
        name: "Aria".to_string(),
        level: 1,
        hp: 10,
        max_hp: 10,
        ac: 14,
        abilities: AbilityScores {
            str: 16,
            ..AbilityScores::default()
        },
    }
}

/// A combat node routing to the standard victory and defeat nodes
pub fn node(monster_ids: &[&str]) -> CombatNode {
    CombatNode {
        node_id: "cave".to_string(),
        kind: "combat".to_string(),
        monster_ids: monster_ids.iter().map(|s| s.to_string()).collect(),
        victory_node_id: Some(VICTORY_NODE.to_string()),
        defeat_node_id: Some(DEFEAT_NODE.to_string()),
    }
}

pub fn record(value: Value) -> MonsterRecord {
    serde_json::from_value(value).expect("valid monster record")
}

/// hp 5, ac 10, dex 10, default attack
pub fn goblin() -> MonsterRecord {
    record(json!({
        "id": "goblin",
        "name": "Goblin",
        "stats": { "hp": 5, "ac": 10, "dex": 10 }
    }))
}

/// Hits hard enough to drop the standard hero in one blow
pub fn ogre() -> MonsterRecord {
    record(json!({
        "id": "ogre",
        "name": "Ogre",
        "stats": { "hp": 30, "ac": 11, "dex": 10 },
        "attack": { "bonus": 5, "damageDice": "2d6+5", "label": "Club" }
    }))
}

/// A monster with the given dex and otherwise default stats
pub fn with_dex(id: &str, dex: i32) -> MonsterRecord {
    record(json!({
        "id": id,
        "name": id,
        "stats": { "dex": dex }
    }))
}
