//! The player character sheet
//!
//! Holds the hero between encounters:
//! - Snapshot the hero when a fight starts
//! - Apply hp changes the combat engine reports
//! - Build the hero's combatant and weapon

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::combat::{
    ability_mod, proficiency_bonus, AbilityScores, AttackProfile, Combatant, Side, HERO_ID,
};

/// The hero as the character sheet currently records them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroSnapshot {
    pub name: String,
    pub level: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub abilities: AbilityScores,
}

impl HeroSnapshot {
    /// The hero's longsword: str-mod + proficiency to hit, 1d8 + str-mod damage
    pub fn weapon(&self) -> AttackProfile {
        let str_mod = ability_mod(self.abilities.str);
        AttackProfile {
            bonus: str_mod + proficiency_bonus(self.level),
            damage_dice: "1d8".to_string(),
            damage_bonus: str_mod,
            label: "Longsword".to_string(),
        }
    }

    /// Build the hero's combatant. A hero who starts at 0 hp is unconscious
    /// and making death saves, not dead.
    pub fn to_combatant(&self) -> Combatant {
        let hp = self.hp.clamp(0, self.max_hp.max(0));
        let mut hero = Combatant {
            id: HERO_ID.to_string(),
            name: if self.name.is_empty() {
                "Hero".to_string()
            } else {
                self.name.clone()
            },
            side: Side::Hero,
            ac: self.ac,
            max_hp: self.max_hp,
            hp,
            abilities: self.abilities,
            initiative: 0,
            alive: true,
            unconscious: false,
            death_saves: None,
            attack: Some(self.weapon()),
        };
        if hp == 0 {
            hero.knock_out();
        }
        hero
    }
}

/// Character sheet collaborator
pub trait CharacterSheet: Send + Sync {
    /// Current state of the hero
    fn snapshot(&self) -> HeroSnapshot;

    /// Adjust hp by `delta` (negative for damage)
    fn update_hp(&self, delta: i32);
}

/// In-memory character sheet
#[derive(Debug)]
pub struct HeroSheet {
    hero: RwLock<HeroSnapshot>,
}

impl HeroSheet {
    /// Create a sheet for `hero`
    pub fn new(hero: HeroSnapshot) -> Self {
        Self {
            hero: RwLock::new(hero),
        }
    }

    /// Create a shared instance
    pub fn shared(hero: HeroSnapshot) -> Arc<Self> {
        Arc::new(Self::new(hero))
    }

    /// Current hp
    pub fn hp(&self) -> i32 {
        self.hero.read().hp
    }
}

impl CharacterSheet for HeroSheet {
    fn snapshot(&self) -> HeroSnapshot {
        self.hero.read().clone()
    }

    /// Clamps to 0..=max_hp
    fn update_hp(&self, delta: i32) {
        let mut hero = self.hero.write();
        let hp = (hero.hp + delta).clamp(0, hero.max_hp);
        if delta > 0 {
            info!("{} healed for {} HP ({} -> {})", hero.name, delta, hero.hp, hp);
        } else if delta < 0 {
            info!("{} took {} damage ({} -> {})", hero.name, -delta, hero.hp, hp);
        }
        hero.hp = hp;
    }
}
