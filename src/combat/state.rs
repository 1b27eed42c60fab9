//! Encounter state
//!
//! The data an encounter is made of:
//! - Combatants and their attack profiles
//! - The initiative order and turn cursor
//! - The pending roll, if the engine is waiting on one
//! - The player-facing combat log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dice::ability_mod;
use super::rules::{AttackParams, DeathSaves};

/// Id of the single player character in every encounter
pub const HERO_ID: &str = "hero";

/// Which side a combatant fights on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Hero,
    Monster,
}

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub str: i32,
    pub dex: i32,
    pub con: i32,
    pub int: i32,
    pub wis: i32,
    pub cha: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            str: 10,
            dex: 10,
            con: 10,
            int: 10,
            wis: 10,
            cha: 10,
        }
    }
}

/// A weapon or natural attack, resolved once when the combatant is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    /// To-hit bonus
    pub bonus: i32,
    /// Damage dice notation, e.g. "1d8"
    pub damage_dice: String,
    /// Flat damage bonus
    pub damage_bonus: i32,
    /// Display name
    pub label: String,
}

impl AttackProfile {
    pub const DEFAULT_BONUS: i32 = 2;
    pub const DEFAULT_DAMAGE_DICE: &'static str = "1d6";
    pub const DEFAULT_DAMAGE_BONUS: i32 = 0;
    pub const DEFAULT_LABEL: &'static str = "Strike";

    /// The attack a monster gets when its record names none
    pub fn monster_default() -> Self {
        Self {
            bonus: Self::DEFAULT_BONUS,
            damage_dice: Self::DEFAULT_DAMAGE_DICE.to_string(),
            damage_bonus: Self::DEFAULT_DAMAGE_BONUS,
            label: Self::DEFAULT_LABEL.to_string(),
        }
    }

    /// Resolver inputs for swinging at `target_ac`
    pub fn params(&self, target_ac: i32) -> AttackParams<'_> {
        AttackParams {
            attack_bonus: self.bonus,
            target_ac,
            damage_dice: &self.damage_dice,
            damage_bonus: self.damage_bonus,
        }
    }
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self::monster_default()
    }
}

/// One participant in an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub side: Side,
    /// Armor class
    pub ac: i32,
    pub max_hp: i32,
    /// Current hit points, 0..=max_hp
    pub hp: i32,
    pub abilities: AbilityScores,
    /// Rolled once per encounter
    pub initiative: i32,
    /// False once dead; dead combatants never take another turn
    pub alive: bool,
    /// Hero only: down at 0 hp and making death saves
    pub unconscious: bool,
    /// Hero only: present while unconscious
    pub death_saves: Option<DeathSaves>,
    pub attack: Option<AttackProfile>,
}

impl Combatant {
    /// Check if this is the player character
    pub fn is_hero(&self) -> bool {
        self.side == Side::Hero
    }

    /// Dexterity modifier, used for initiative and its tie-break
    pub fn dex_mod(&self) -> i32 {
        ability_mod(self.abilities.dex)
    }

    /// Alive and conscious
    pub fn can_act(&self) -> bool {
        self.alive && !self.unconscious
    }

    /// Take damage, flooring hp at 0. Returns the hp actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let actual = amount.clamp(0, self.hp);
        self.hp -= actual;
        actual
    }

    /// Heal (cannot exceed max_hp). Returns the hp actually gained.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let actual = amount.clamp(0, (self.max_hp - self.hp).max(0));
        self.hp += actual;
        actual
    }

    /// Drop to 0 hp and start death saves from a clean tally
    pub fn knock_out(&mut self) {
        self.unconscious = true;
        self.death_saves = Some(DeathSaves::default());
    }
}

/// A timestamped line in the combat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub text: String,
}

/// What the engine is waiting on the roll actor for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingRollKind {
    HeroInitiative,
    HeroAttack,
    HeroDamage,
    DeathSave,
}

impl PendingRollKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingRollKind::HeroInitiative => "hero_initiative",
            PendingRollKind::HeroAttack => "hero_attack",
            PendingRollKind::HeroDamage => "hero_damage",
            PendingRollKind::DeathSave => "death_save",
        }
    }
}

/// The single outstanding roll request of an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRoll {
    /// Correlation id; only a result carrying this id is accepted
    pub id: String,
    pub kind: PendingRollKind,
    pub actor_id: String,
    pub target_id: Option<String>,
    pub label: String,
    /// Dice notation to roll
    pub expression: String,
    pub modifier: i32,
    /// Damage roll for a critical hit
    pub critical: bool,
    pub created_at: DateTime<Utc>,
}

/// How an encounter ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory,
    Defeat,
}

/// Where the turn engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    /// No encounter
    Idle,
    /// Waiting on the hero's initiative roll
    Initiative,
    /// The current combatant is acting
    TurnActive,
    /// Waiting on an attack, damage, or death-save roll
    AwaitingRoll,
    /// Finished, not yet cleared
    Resolved(Outcome),
}

/// The aggregate root of one fight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEncounter {
    pub active: bool,
    pub adventure_id: String,
    /// Narrative node that started the fight
    pub node_id: String,
    /// Starts at 1, increments each full pass of the order
    pub round: u32,
    /// Index into `order` of the combatant whose turn it is
    pub turn_index: usize,
    /// Initiative order; membership is fixed for the encounter's lifetime
    pub order: Vec<Combatant>,
    /// Append-only
    pub log: Vec<LogEntry>,
    pub pending_roll: Option<PendingRoll>,
    pub victory_node_id: Option<String>,
    pub defeat_node_id: Option<String>,
    pub outcome: Option<Outcome>,
}

impl CombatEncounter {
    /// Create an active encounter at round 1 with no rolls pending
    pub fn new(
        adventure_id: impl Into<String>,
        node_id: impl Into<String>,
        order: Vec<Combatant>,
    ) -> Self {
        Self {
            active: true,
            adventure_id: adventure_id.into(),
            node_id: node_id.into(),
            round: 1,
            turn_index: 0,
            order,
            log: Vec::new(),
            pending_roll: None,
            victory_node_id: None,
            defeat_node_id: None,
            outcome: None,
        }
    }

    /// True exactly while a roll request is outstanding
    pub fn awaiting_player(&self) -> bool {
        self.pending_roll.is_some()
    }

    /// The combatant whose turn it is
    pub fn current(&self) -> Option<&Combatant> {
        self.order.get(self.turn_index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|c| c.id == id)
    }

    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.order.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.order.iter_mut().find(|c| c.id == id)
    }

    pub fn hero(&self) -> Option<&Combatant> {
        self.order.iter().find(|c| c.is_hero())
    }

    pub fn hero_mut(&mut self) -> Option<&mut Combatant> {
        self.order.iter_mut().find(|c| c.is_hero())
    }

    /// Living monsters, in initiative order
    pub fn living_monsters(&self) -> impl Iterator<Item = &Combatant> {
        self.order
            .iter()
            .filter(|c| c.side == Side::Monster && c.alive)
    }

    /// Every monster is dead (vacuously true with none)
    pub fn all_monsters_defeated(&self) -> bool {
        self.living_monsters().next().is_none()
    }

    /// Append a line to the combat log
    pub fn push_log(&mut self, text: impl Into<String>) {
        self.log.push(LogEntry {
            ts: Utc::now(),
            text: text.into(),
        });
    }

    /// Derive the lifecycle phase
    pub fn phase(&self) -> EnginePhase {
        if !self.active {
            return self.outcome.map_or(EnginePhase::Idle, EnginePhase::Resolved);
        }
        match self.pending_roll.as_ref().map(|p| p.kind) {
            Some(PendingRollKind::HeroInitiative) => EnginePhase::Initiative,
            Some(_) => EnginePhase::AwaitingRoll,
            None => EnginePhase::TurnActive,
        }
    }
}
