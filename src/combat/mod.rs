//! Combat system module
//!
//! Implements D&D-style single-hero combat with:
//! - Dice rolling (e.g., "2d6+3") from an injectable random source
//! - Attack resolution with to-hit, crits, and damage
//! - Death saving throws for a downed hero
//! - Encounter state and the turn engine that drives it

mod dice;
mod engine;
mod error;
mod rng;
mod rules;
mod state;

pub use dice::{
    ability_mod, format_modifier, is_critical, is_fumble, parse_dice, proficiency_bonus,
    roll_dice, roll_die, DiceError, DiceRoll, RolledDice, MAX_DICE, MAX_MODIFIER, MAX_SIDES,
};
pub use engine::CombatEngine;
pub use error::CombatError;
pub use rng::{face_value, RandomSource, ScriptedRandom, SeededRandom, ThreadRandom};
pub use rules::{
    evaluate_attack, evaluate_death_save, resolve_attack, resolve_death_save, AttackCheck,
    AttackParams, AttackResolution, DeathSaveResolution, DeathSaves, DEATH_SAVE_DC,
    FATAL_FAILURES, STABLE_SUCCESSES,
};
pub use state::{
    AbilityScores, AttackProfile, CombatEncounter, Combatant, EnginePhase, LogEntry, Outcome,
    PendingRoll, PendingRollKind, Side, HERO_ID,
};
