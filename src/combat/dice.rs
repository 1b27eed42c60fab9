//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "4d6-2", and
//! provides the ability-score helpers the combat rules build on.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::rng::RandomSource;

/// Errors raised by malformed dice content
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    /// A die must have at least one side
    #[error("invalid die: needs at least one side, got {0}")]
    InvalidInput(u32),
    /// The notation does not match `NdS[+-M]`
    #[error("invalid dice expression: {0:?}")]
    InvalidExpression(String),
}

/// Most dice one expression may name
pub const MAX_DICE: u32 = 100;
/// Most sides one die may have
pub const MAX_SIDES: u32 = 1000;
/// Largest inline modifier, either sign
pub const MAX_MODIFIER: i32 = 1000;

/// `NdS` with an optional signed inline modifier, whitespace already stripped
static DICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[dD](\d+)([+-]\d+)?$").unwrap());

/// A parsed dice expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Inline modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Same dice with the count doubled (critical hits); the modifier is kept
    pub fn doubled(&self) -> Self {
        Self {
            count: self.count.saturating_mul(2),
            ..*self
        }
    }

    /// Roll the dice, adding `extra` on top of the inline modifier
    ///
    /// Doubled dice may hold up to twice [`MAX_DICE`]; anything larger is
    /// rejected before a single die is rolled.
    pub fn roll(&self, extra: i32, rng: &mut dyn RandomSource) -> Result<RolledDice, DiceError> {
        if self.count > MAX_DICE * 2 || self.sides > MAX_SIDES {
            return Err(DiceError::InvalidExpression(self.to_string()));
        }
        let mut rolls = Vec::with_capacity(self.count as usize);
        for _ in 0..self.count {
            rolls.push(roll_die(self.sides, rng)?);
        }

        let modifier = self.modifier.saturating_add(extra);
        let sum: i32 = rolls.iter().map(|&r| r as i32).sum();
        let mod_text = format_modifier(modifier);
        let faces: Vec<String> = rolls.iter().map(|r| r.to_string()).collect();
        let detail = format!(
            "{}d{}{} ({}){}",
            self.count,
            self.sides,
            mod_text,
            faces.join(", "),
            mod_text
        );

        Ok(RolledDice {
            total: sum.saturating_add(modifier),
            rolls,
            modifier,
            detail,
        })
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        let min = self.count as i64 + self.modifier as i64;
        min.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        let max = self.count as i64 * self.sides as i64 + self.modifier as i64;
        max.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d{}{}",
            self.count,
            self.sides,
            format_modifier(self.modifier)
        )
    }
}

/// Outcome of rolling an expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolledDice {
    /// Sum of the faces plus every modifier
    pub total: i32,
    /// Individual die faces, in roll order
    pub rolls: Vec<u32>,
    /// Combined inline and caller modifier
    pub modifier: i32,
    /// Human readable breakdown, e.g. "2d6+3 (4, 2)+3"
    pub detail: String,
}

/// Parse a dice notation string like "2d6+3".
///
/// Whitespace anywhere in the notation is ignored and the "d" may be either
/// case. Anything else is rejected; there is no implicit count. Counts,
/// sides, and modifiers beyond [`MAX_DICE`], [`MAX_SIDES`], and
/// [`MAX_MODIFIER`] are rejected too.
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let compact: String = notation.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid = || DiceError::InvalidExpression(notation.to_string());

    let caps = DICE_REGEX.captures(&compact).ok_or_else(invalid)?;
    let count: u32 = caps[1].parse().map_err(|_| invalid())?;
    let sides: u32 = caps[2].parse().map_err(|_| invalid())?;
    let modifier: i32 = match caps.get(3) {
        Some(m) => m.as_str().parse().map_err(|_| invalid())?,
        None => 0,
    };
    if count > MAX_DICE || sides > MAX_SIDES || modifier.unsigned_abs() > MAX_MODIFIER as u32 {
        return Err(invalid());
    }

    Ok(DiceRoll::new(count, sides, modifier))
}

/// Roll one die: `floor(rng() * sides) + 1`
pub fn roll_die(sides: u32, rng: &mut dyn RandomSource) -> Result<u32, DiceError> {
    if sides < 1 {
        return Err(DiceError::InvalidInput(sides));
    }
    let face = (rng.next_unit() * sides as f64).floor() as u32 + 1;
    Ok(face.min(sides))
}

/// Roll an expression with an extra caller modifier.
///
/// `total = sum(rolls) + modifier + inline modifier`
pub fn roll_dice(
    expression: &str,
    modifier: i32,
    rng: &mut dyn RandomSource,
) -> Result<RolledDice, DiceError> {
    parse_dice(expression)?.roll(modifier, rng)
}

/// Ability modifier: `floor((score - 10) / 2)`
pub fn ability_mod(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Proficiency bonus by character level
pub fn proficiency_bonus(level: u32) -> i32 {
    match level {
        0..=4 => 2,
        5..=8 => 3,
        9..=12 => 4,
        13..=16 => 5,
        _ => 6,
    }
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}

/// "+3", "-1", or "" for zero
pub fn format_modifier(modifier: i32) -> String {
    match modifier {
        0 => String::new(),
        m if m > 0 => format!("+{}", m),
        m => m.to_string(),
    }
}
