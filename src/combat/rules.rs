//! Attack and death-save resolution
//!
//! Each rule comes in two halves. `evaluate_*` applies the rule to dice that
//! were already rolled (by the player's dice tray, say), and `resolve_*`
//! rolls the dice itself from a `RandomSource` and then evaluates. Both
//! halves are pure apart from consuming the rng.

use serde::{Deserialize, Serialize};

use super::dice::{
    format_modifier, is_critical, is_fumble, parse_dice, roll_die, DiceError, RolledDice,
};
use super::rng::RandomSource;

/// Successes needed to stabilize
pub const STABLE_SUCCESSES: u32 = 3;

/// Failures that kill
pub const FATAL_FAILURES: u32 = 3;

/// Minimum unmodified total for a successful death save
pub const DEATH_SAVE_DC: i32 = 10;

/// Result of checking a d20 attack roll against armor class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackCheck {
    /// The unmodified d20 face
    pub natural: u32,
    /// Total attack value (roll + bonus)
    pub attack_total: i32,
    /// Target's AC
    pub target_ac: i32,
    /// Whether the attack hit
    pub hit: bool,
    /// Whether it was a critical hit
    pub critical: bool,
    /// Whether it was a fumble
    pub fumble: bool,
}

/// Check an already rolled attack.
///
/// A natural 20 always hits and crits, a natural 1 always misses, anything
/// else hits when the total meets the target's AC.
pub fn evaluate_attack(natural: u32, attack_total: i32, target_ac: i32) -> AttackCheck {
    let critical = is_critical(natural);
    let fumble = is_fumble(natural);
    let hit = critical || (!fumble && attack_total >= target_ac);

    AttackCheck {
        natural,
        attack_total,
        target_ac,
        hit,
        critical,
        fumble,
    }
}

/// Inputs for a fully automatic attack
#[derive(Debug, Clone, Copy)]
pub struct AttackParams<'a> {
    pub attack_bonus: i32,
    pub target_ac: i32,
    pub damage_dice: &'a str,
    pub damage_bonus: i32,
}

/// Outcome of [`resolve_attack`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResolution {
    pub attack_roll: RolledDice,
    pub hit: bool,
    pub critical: bool,
    pub damage_roll: Option<RolledDice>,
    pub target_ac: i32,
}

impl AttackResolution {
    /// Damage dealt, never negative
    pub fn damage(&self) -> i32 {
        self.damage_roll.as_ref().map_or(0, |d| d.total.max(0))
    }
}

/// Roll a d20 attack and, on a hit, its damage.
///
/// The damage expression is validated before anything is rolled so a
/// malformed weapon fails the same way whether or not the swing lands.
/// Critical hits double the dice count but not the modifiers.
pub fn resolve_attack(
    params: AttackParams<'_>,
    rng: &mut dyn RandomSource,
) -> Result<AttackResolution, DiceError> {
    let damage_dice = parse_dice(params.damage_dice)?;

    let d20 = roll_die(20, rng)?;
    let attack_roll = RolledDice {
        total: d20 as i32 + params.attack_bonus,
        rolls: vec![d20],
        modifier: params.attack_bonus,
        detail: format!("d20 ({}){}", d20, format_modifier(params.attack_bonus)),
    };

    let check = evaluate_attack(d20, attack_roll.total, params.target_ac);
    let damage_roll = if check.hit {
        let dice = if check.critical {
            damage_dice.doubled()
        } else {
            damage_dice
        };
        Some(dice.roll(params.damage_bonus, rng)?)
    } else {
        None
    };

    Ok(AttackResolution {
        attack_roll,
        hit: check.hit,
        critical: check.critical,
        damage_roll,
        target_ac: params.target_ac,
    })
}

/// Death saving throw tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u32,
    pub failures: u32,
}

impl DeathSaves {
    pub fn is_stable(&self) -> bool {
        self.successes >= STABLE_SUCCESSES
    }

    pub fn is_dead(&self) -> bool {
        self.failures >= FATAL_FAILURES
    }
}

/// Outcome of one death saving throw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaveResolution {
    /// The unmodified d20 face
    pub natural: u32,
    /// The roll total
    pub total: i32,
    /// Tally after this save
    pub saves: DeathSaves,
    /// Natural 20: back on their feet with 1 hp
    pub revived: bool,
    pub stabilized: bool,
    pub dead: bool,
}

/// Apply one already rolled death save to the running tally.
///
/// The caller owns the side effects: restoring 1 hp on a revive, removing
/// the combatant on death.
pub fn evaluate_death_save(current: DeathSaves, natural: u32, total: i32) -> DeathSaveResolution {
    let mut saves = current;
    let mut revived = false;

    if is_fumble(natural) {
        saves.failures += 2;
    } else if is_critical(natural) {
        revived = true;
        saves = DeathSaves::default();
    } else if total >= DEATH_SAVE_DC {
        saves.successes += 1;
    } else {
        saves.failures += 1;
    }

    DeathSaveResolution {
        natural,
        total,
        saves,
        revived,
        stabilized: saves.is_stable(),
        dead: saves.is_dead(),
    }
}

/// Roll an unmodified d20 death save
pub fn resolve_death_save(
    current: DeathSaves,
    rng: &mut dyn RandomSource,
) -> Result<DeathSaveResolution, DiceError> {
    let natural = roll_die(20, rng)?;
    Ok(evaluate_death_save(current, natural, natural as i32))
}
