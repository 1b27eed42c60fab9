//! Combat turn engine
//!
//! Drives one encounter at a time through its lifecycle:
//!
//! ```text
//! Idle -> Initiative -> TurnActive <-> AwaitingRoll -> Resolved -> Idle
//! ```
//!
//! The hero's rolls go out through the [`RollCoordinator`] and come back as
//! [`RollResult`]s matched by id. Monster rolls happen here, from the
//! engine's own random source. All state changes happen under one lock and
//! are published as a snapshot afterwards, so a reader never sees an hp
//! change without its log line. The character sheet is told about hp
//! changes only after that snapshot is out.
//!
//! The engine never blocks on a roll. Each operation mutates the encounter,
//! then runs the follow-up steps (monster turns, turn advances) until the
//! encounter needs the player again.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dice::{parse_dice, roll_die};
use super::error::CombatError;
use super::rng::{RandomSource, ThreadRandom};
use super::rules::{evaluate_attack, evaluate_death_save, resolve_attack, DEATH_SAVE_DC};
use super::state::{
    AttackProfile, CombatEncounter, Combatant, EnginePhase, Outcome, PendingRoll, PendingRollKind,
    Side,
};
use crate::content::{CombatNode, MonsterSource};
use crate::narrative::Narrative;
use crate::player::{CharacterSheet, HeroSnapshot};
use crate::rolls::{RollContext, RollCoordinator, RollRequest, RollResult};
use crate::timers::Pacer;
use crate::CombatConfig;

/// What has to happen once the lock is released
#[derive(Debug, Clone, PartialEq, Eq)]
enum Next {
    /// Nothing until the player acts or a roll comes back
    Wait,
    /// Let the player read the result, then move to the next combatant
    Advance { epoch: u64 },
    /// The current combatant is a monster; pause, then let it act
    MonsterTurn { epoch: u64 },
    /// The encounter is over; send the story to `target`
    Ended { target: Option<String> },
}

struct Inner {
    encounter: Option<CombatEncounter>,
    rng: Box<dyn RandomSource>,
    /// Bumped whenever the encounter is replaced or cleared
    epoch: u64,
    /// A paced step (monster turn or turn advance) is pausing or running
    processing: bool,
    /// Hp changes for the character sheet, sent once their log line is out
    sheet_updates: Vec<i32>,
}

/// Runs combat encounters for a single hero
pub struct CombatEngine {
    monsters: Arc<dyn MonsterSource>,
    rolls: Arc<RollCoordinator>,
    sheet: Arc<dyn CharacterSheet>,
    narrative: Arc<dyn Narrative>,
    config: CombatConfig,
    pacer: Pacer,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<Option<CombatEncounter>>,
}

impl std::fmt::Debug for CombatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatEngine")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .finish()
    }
}

impl CombatEngine {
    /// Create an engine wired to its collaborators. Uses thread entropy
    /// until [`CombatEngine::with_rng`] says otherwise.
    pub fn new(
        monsters: Arc<dyn MonsterSource>,
        rolls: Arc<RollCoordinator>,
        sheet: Arc<dyn CharacterSheet>,
        narrative: Arc<dyn Narrative>,
        config: CombatConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            monsters,
            rolls,
            sheet,
            narrative,
            config,
            pacer: Pacer::new(),
            inner: Mutex::new(Inner {
                encounter: None,
                rng: Box::new(ThreadRandom),
                epoch: 0,
                processing: false,
                sheet_updates: Vec::new(),
            }),
            snapshots,
        }
    }

    /// Replace the random source used for monster rolls and tie-breaks
    pub fn with_rng(self, rng: Box<dyn RandomSource>) -> Self {
        self.inner.lock().rng = rng;
        self
    }

    /// Current encounter, if any
    pub fn state(&self) -> Option<CombatEncounter> {
        self.inner.lock().encounter.clone()
    }

    /// Where the engine is in its lifecycle
    pub fn phase(&self) -> EnginePhase {
        self.inner
            .lock()
            .encounter
            .as_ref()
            .map_or(EnginePhase::Idle, CombatEncounter::phase)
    }

    /// Receive a snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<Option<CombatEncounter>> {
        self.snapshots.subscribe()
    }

    /// Start the fight a combat node describes.
    ///
    /// Entering a node whose encounter is already running does nothing.
    /// Monster initiatives are rolled at once; the hero's initiative is
    /// requested from the roll actor.
    pub async fn start_combat(
        &self,
        adventure_id: &str,
        node: &CombatNode,
        hero: &HeroSnapshot,
    ) -> Result<(), CombatError> {
        if !node.is_combat() {
            debug!("Node {} has no combat", node.node_id);
            return Ok(());
        }
        if self.is_running(&node.node_id) {
            debug!("Combat for node {} already running", node.node_id);
            return Ok(());
        }

        let records = self.monsters.get_monsters(&node.monster_ids).await?;
        let mut order = Vec::with_capacity(records.len() + 1);
        order.push(hero.to_combatant());
        order.extend(records.iter().enumerate().map(|(i, m)| m.to_combatant(i)));

        // Bad weapon dice must fail here, not halfway through a turn
        for combatant in &order {
            if let Some(attack) = &combatant.attack {
                parse_dice(&attack.damage_dice)?;
            }
        }

        let next = {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner.encounter.as_ref().filter(|e| e.active) {
                if existing.node_id == node.node_id {
                    debug!("Combat for node {} started concurrently", node.node_id);
                    return Ok(());
                }
                warn!(
                    "Replacing active combat at node {} with node {}",
                    existing.node_id, node.node_id
                );
                if existing.pending_roll.is_some() {
                    self.rolls.clear_pending();
                }
            }
            self.pacer.cancel_all();
            inner.epoch += 1;
            inner.processing = false;

            for combatant in order.iter_mut().filter(|c| c.side == Side::Monster) {
                let roll = roll_die(20, inner.rng.as_mut())?;
                combatant.initiative = roll as i32 + combatant.dex_mod();
            }

            let mut encounter = CombatEncounter::new(adventure_id, &node.node_id, order);
            encounter.victory_node_id = node.victory_node_id.clone();
            encounter.defeat_node_id = node.defeat_node_id.clone();
            encounter.push_log("Combat begins.");
            info!(
                "Combat started at node {} against {} monsters",
                node.node_id,
                records.len()
            );
            inner.encounter = Some(encounter);

            let next = self
                .turn(&mut inner, |turn| {
                    if turn.enc.all_monsters_defeated() {
                        warn!("No monsters found for node {}", turn.enc.node_id);
                        turn.enc.push_log("No foes stand in the way.");
                        return turn.end(Outcome::Victory);
                    }
                    turn.request_initiative();
                    Next::Wait
                })
                .unwrap_or(Next::Wait);
            self.publish(&mut inner);
            next
        };

        self.drive(next).await
    }

    /// Attack `target_id` on the hero's turn.
    ///
    /// Returns false, changing nothing, unless it is the conscious hero's
    /// turn, no roll is pending, no paced step is running, and the target is
    /// a living monster.
    pub fn hero_attack(&self, target_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let accepted = !inner.processing
            && self
                .turn(&mut inner, |turn| turn.request_attack(target_id))
                .unwrap_or(false);
        if accepted {
            self.publish(&mut inner);
        } else {
            debug!("Ignoring hero attack on {}", target_id);
        }
        accepted
    }

    /// Pass the hero's turn without attacking
    pub async fn end_turn(&self) -> Result<bool, CombatError> {
        let next = {
            let mut inner = self.inner.lock();
            let busy = inner.processing;
            let next = self.turn(&mut inner, |turn| {
                if busy || !turn.is_hero_turn() {
                    return None;
                }
                let name = turn.current_name();
                turn.enc.push_log(format!("{} holds back.", name));
                Some(turn.advance_turn())
            });
            match next.flatten() {
                Some(next) => {
                    self.publish(&mut inner);
                    next
                }
                None => {
                    debug!("Ignoring end turn outside the hero's turn");
                    return Ok(false);
                }
            }
        };

        self.drive(next).await?;
        Ok(true)
    }

    /// Run the current monster's turn, if it is a monster's turn.
    ///
    /// Monster turns normally run on their own after the step that reached
    /// them. This picks one up when that driver went away, e.g. a listener
    /// task aborted mid-pause. Returns false when a paced step is already in
    /// progress or the current combatant is not a monster.
    pub async fn monster_auto_turn(&self) -> Result<bool, CombatError> {
        let epoch = {
            let inner = self.inner.lock();
            let Some(encounter) = inner.encounter.as_ref().filter(|e| e.active) else {
                return Ok(false);
            };
            match encounter.current() {
                Some(c) if c.side == Side::Monster && c.alive && !inner.processing => inner.epoch,
                _ => return Ok(false),
            }
        };
        self.drive(Next::MonsterTurn { epoch }).await?;
        Ok(true)
    }

    /// Apply a roll result from the roll actor.
    ///
    /// Returns `Ok(false)` without touching anything when `result.id` does
    /// not match the pending roll: late, duplicate, and foreign results are
    /// all dropped here.
    pub async fn apply_roll_result(&self, result: RollResult) -> Result<bool, CombatError> {
        let next = {
            let mut inner = self.inner.lock();
            let outcome = self.turn(&mut inner, |turn| {
                let matches = turn
                    .enc
                    .pending_roll
                    .as_ref()
                    .is_some_and(|p| p.id == result.id);
                if !matches {
                    return None;
                }
                Some(turn.apply_result(&result))
            });

            match outcome.flatten() {
                None => {
                    debug!("Discarding stale roll result {}", result.id);
                    return Ok(false);
                }
                Some(next) => {
                    self.publish(&mut inner);
                    next?
                }
            }
        };

        self.drive(next).await?;
        Ok(true)
    }

    /// Discard the encounter, any pending roll, and any paced step in flight
    pub fn clear_combat(&self) {
        let mut inner = self.inner.lock();
        if let Some(encounter) = inner.encounter.take() {
            if encounter.pending_roll.is_some() {
                self.rolls.clear_pending();
            }
            info!("Combat at node {} cleared", encounter.node_id);
        }
        inner.epoch += 1;
        inner.processing = false;
        self.pacer.cancel_all();
        self.publish(&mut inner);
    }

    /// Feed every result published on the coordinator into the engine, in
    /// delivery order. The subscription is taken before this returns.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let mut results = self.rolls.subscribe_results();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match results.recv().await {
                    Ok(result) => {
                        if let Err(e) = engine.apply_roll_result(result).await {
                            warn!("Failed to apply roll result: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Combat engine missed {} roll results", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn is_running(&self, node_id: &str) -> bool {
        self.inner
            .lock()
            .encounter
            .as_ref()
            .is_some_and(|e| e.active && e.node_id == node_id)
    }

    fn publish(&self, inner: &mut Inner) {
        self.snapshots.send_replace(inner.encounter.clone());
        for delta in inner.sheet_updates.drain(..) {
            self.sheet.update_hp(delta);
        }
    }

    /// Run `f` against the active encounter, or return None without one
    fn turn<T>(&self, inner: &mut Inner, f: impl FnOnce(&mut Turn<'_>) -> T) -> Option<T> {
        let epoch = inner.epoch;
        let enc = inner.encounter.as_mut().filter(|e| e.active)?;
        let mut turn = Turn {
            enc,
            rng: inner.rng.as_mut(),
            rolls: &self.rolls,
            sheet_updates: &mut inner.sheet_updates,
            epoch,
        };
        Some(f(&mut turn))
    }

    /// Run a paced step, provided the encounter it was scheduled for is
    /// still the current one
    fn paced_step(
        &self,
        epoch: u64,
        f: impl FnOnce(&mut Turn<'_>) -> Result<Next, CombatError>,
    ) -> Result<Next, CombatError> {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return Ok(Next::Wait);
        }
        let next = self.turn(&mut inner, f).unwrap_or(Ok(Next::Wait))?;
        self.publish(&mut inner);
        Ok(next)
    }

    async fn drive(&self, mut next: Next) -> Result<(), CombatError> {
        loop {
            let monster = matches!(next, Next::MonsterTurn { .. });
            let (epoch, delay) = match next {
                Next::Wait => return Ok(()),
                Next::Ended { target } => {
                    if let Some(node_id) = target {
                        self.narrative.go_to_node(&node_id);
                    }
                    return Ok(());
                }
                Next::Advance { epoch } => (epoch, self.config.auto_step_delay()),
                Next::MonsterTurn { epoch } => (epoch, self.config.monster_turn_delay()),
            };

            let Some(guard) = Processing::claim(self, epoch) else {
                debug!("Paced step already in progress");
                return Ok(());
            };
            // Unpaced steps can chain without end; let a clear get in between
            if delay.is_zero() {
                tokio::task::yield_now().await;
            }
            let result = if self.pacer.pause(delay).await {
                self.paced_step(epoch, |turn| {
                    if monster {
                        turn.monster_turn()
                    } else {
                        Ok(turn.advance_turn())
                    }
                })
            } else {
                Ok(Next::Wait)
            };
            drop(guard);
            next = result?;
        }
    }
}

/// Holds the processing flag; releases it on drop, so an aborted driver
/// can't leave the engine stuck
struct Processing<'a> {
    engine: &'a CombatEngine,
    epoch: u64,
}

impl<'a> Processing<'a> {
    fn claim(engine: &'a CombatEngine, epoch: u64) -> Option<Self> {
        let mut inner = engine.inner.lock();
        if inner.epoch != epoch || inner.processing {
            return None;
        }
        inner.processing = true;
        Some(Self { engine, epoch })
    }
}

impl Drop for Processing<'_> {
    fn drop(&mut self) {
        let mut inner = self.engine.inner.lock();
        if inner.epoch == self.epoch {
            inner.processing = false;
        }
    }
}

/// Mutable access to one encounter for the length of a step
struct Turn<'a> {
    enc: &'a mut CombatEncounter,
    rng: &'a mut dyn RandomSource,
    rolls: &'a RollCoordinator,
    sheet_updates: &'a mut Vec<i32>,
    epoch: u64,
}

impl Turn<'_> {
    fn current_name(&self) -> String {
        self.enc
            .current()
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    fn is_hero_turn(&self) -> bool {
        !self.enc.awaiting_player()
            && self
                .enc
                .current()
                .is_some_and(|c| c.is_hero() && c.can_act())
    }

    fn hero_index(&self) -> Option<usize> {
        self.enc.order.iter().position(Combatant::is_hero)
    }

    #[allow(clippy::too_many_arguments)]
    fn request_roll(
        &mut self,
        kind: PendingRollKind,
        actor_id: String,
        target_id: Option<String>,
        label: String,
        expression: String,
        modifier: i32,
        critical: bool,
    ) {
        let pending = PendingRoll {
            id: Uuid::new_v4().to_string(),
            kind,
            actor_id,
            target_id,
            label,
            expression,
            modifier,
            critical,
            created_at: Utc::now(),
        };
        debug!(
            "Requesting {} roll {}: {}{:+}",
            kind.as_str(),
            pending.id,
            pending.expression,
            pending.modifier
        );
        self.rolls.request_roll(RollRequest {
            id: pending.id.clone(),
            label: pending.label.clone(),
            expression: pending.expression.clone(),
            modifier: pending.modifier,
            context: RollContext {
                kind: Some(kind),
                actor_id: Some(pending.actor_id.clone()),
                target_id: pending.target_id.clone(),
            },
        });
        self.enc.pending_roll = Some(pending);
    }

    fn request_initiative(&mut self) {
        let Some(hero) = self.enc.hero() else {
            return;
        };
        let (id, dex_mod) = (hero.id.clone(), hero.dex_mod());
        self.request_roll(
            PendingRollKind::HeroInitiative,
            id,
            None,
            "Initiative".to_string(),
            "1d20".to_string(),
            dex_mod,
            false,
        );
    }

    fn request_attack(&mut self, target_id: &str) -> bool {
        if !self.is_hero_turn() {
            return false;
        }
        let Some(target) = self.enc.combatant(target_id) else {
            return false;
        };
        if target.side != Side::Monster || !target.alive {
            return false;
        }
        let target_name = target.name.clone();

        let Some(hero) = self.enc.current() else {
            return false;
        };
        let hero_id = hero.id.clone();
        let hero_name = hero.name.clone();
        let weapon = hero.attack.clone().unwrap_or_default();

        self.enc
            .push_log(format!("{} attacks {}.", hero_name, target_name));
        self.request_roll(
            PendingRollKind::HeroAttack,
            hero_id,
            Some(target_id.to_string()),
            format!("{} vs {}", weapon.label, target_name),
            "1d20".to_string(),
            weapon.bonus,
            false,
        );
        true
    }

    /// Hand a matching result to its handler. The pending roll is put back
    /// if the handler fails, so a retry with the same id is still accepted.
    fn apply_result(&mut self, result: &RollResult) -> Result<Next, CombatError> {
        let Some(pending) = self.enc.pending_roll.take() else {
            return Ok(Next::Wait);
        };
        debug!(
            "Applying {} roll {} with total {}",
            pending.kind.as_str(),
            result.id,
            result.total
        );

        let next = match pending.kind {
            PendingRollKind::HeroInitiative => Ok(self.on_initiative(result)),
            PendingRollKind::HeroAttack => self.on_attack(&pending, result),
            PendingRollKind::HeroDamage => Ok(self.on_damage(&pending, result)),
            PendingRollKind::DeathSave => Ok(self.on_death_save(result)),
        };
        if next.is_err() {
            self.enc.pending_roll = Some(pending);
        }
        next
    }

    fn on_initiative(&mut self, result: &RollResult) -> Next {
        if let Some(hero) = self.enc.hero_mut() {
            hero.initiative = result.total;
        }
        self.sort_initiative();
        self.enc.turn_index = 0;

        let order: Vec<String> = self
            .enc
            .order
            .iter()
            .map(|c| format!("{} {}", c.name, c.initiative))
            .collect();
        self.enc
            .push_log(format!("Initiative: {}.", order.join(", ")));
        self.begin_turn()
    }

    /// Descending initiative, then descending dex modifier, then a coin
    /// flip. Only combatants tied on both keys draw from the rng, in their
    /// current order, so untied fights consume nothing.
    fn sort_initiative(&mut self) {
        let keys: Vec<(i32, i32)> = self
            .enc
            .order
            .iter()
            .map(|c| (c.initiative, c.dex_mod()))
            .collect();
        let mut flips = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let tied = keys.iter().enumerate().any(|(j, k)| j != i && k == key);
            flips.push(if tied { self.rng.next_unit() } else { 0.0 });
        }

        let mut keyed: Vec<(f64, Combatant)> =
            flips.into_iter().zip(self.enc.order.drain(..)).collect();
        keyed.sort_by(|(fa, a), (fb, b)| {
            b.initiative
                .cmp(&a.initiative)
                .then(b.dex_mod().cmp(&a.dex_mod()))
                .then(fa.total_cmp(fb))
        });
        self.enc.order = keyed.into_iter().map(|(_, c)| c).collect();
    }

    fn on_attack(
        &mut self,
        pending: &PendingRoll,
        result: &RollResult,
    ) -> Result<Next, CombatError> {
        let target = pending
            .target_id
            .as_deref()
            .and_then(|id| self.enc.combatant(id))
            .filter(|t| t.alive)
            .map(|t| (t.id.clone(), t.name.clone(), t.ac));
        let Some((target_id, target_name, target_ac)) = target else {
            self.enc.push_log("The target is gone.");
            return Ok(Next::Advance { epoch: self.epoch });
        };
        let Some(hero) = self.enc.combatant(&pending.actor_id) else {
            return Ok(Next::Advance { epoch: self.epoch });
        };
        let hero_id = hero.id.clone();
        let weapon = hero.attack.clone().unwrap_or_default();

        let natural = result
            .natural_face()
            .unwrap_or_else(|| (result.total - pending.modifier).clamp(1, 20) as u32);
        let check = evaluate_attack(natural, result.total, target_ac);
        let mut text = format!("Roll {} vs AC {}.", result.total, target_ac);

        if !check.hit {
            text.push_str(if check.fumble {
                " Natural 1. Miss."
            } else {
                " Miss."
            });
            self.enc.push_log(text);
            return Ok(Next::Advance { epoch: self.epoch });
        }

        let dice = parse_dice(&weapon.damage_dice)?;
        let dice = if check.critical { dice.doubled() } else { dice };
        text.push_str(if check.critical {
            " Critical hit!"
        } else {
            " Hit!"
        });
        self.enc.push_log(text);
        self.request_roll(
            PendingRollKind::HeroDamage,
            hero_id,
            Some(target_id),
            format!("{} damage to {}", weapon.label, target_name),
            dice.to_string(),
            weapon.damage_bonus,
            check.critical,
        );
        Ok(Next::Wait)
    }

    fn on_damage(&mut self, pending: &PendingRoll, result: &RollResult) -> Next {
        let damage = result.total.max(0);
        let Some(target) = pending
            .target_id
            .as_deref()
            .and_then(|id| self.enc.combatant_mut(id))
        else {
            return Next::Advance { epoch: self.epoch };
        };

        target.take_damage(damage);
        let mut text = format!("{} takes {} damage.", target.name, damage);
        if target.hp == 0 {
            target.alive = false;
            text.push_str(&format!(" {} falls.", target.name));
        }
        self.enc.push_log(text);

        if self.enc.all_monsters_defeated() {
            return self.end(Outcome::Victory);
        }
        Next::Advance { epoch: self.epoch }
    }

    fn on_death_save(&mut self, result: &RollResult) -> Next {
        let Some(index) = self.hero_index() else {
            return Next::Wait;
        };
        let natural = result
            .natural_face()
            .unwrap_or_else(|| result.total.clamp(1, 20) as u32);
        let hero = &mut self.enc.order[index];
        let tally = hero.death_saves.unwrap_or_default();
        let save = evaluate_death_save(tally, natural, result.total);
        let mut text = format!("Death save roll {}.", result.total);

        if save.revived {
            hero.hp = 0;
            hero.heal(1);
            hero.unconscious = false;
            hero.death_saves = None;
            text.push_str(&format!(" Natural 20. {} returns with 1 HP.", hero.name));
            self.sheet_updates.push(1);
            self.enc.push_log(text);
            // Back on their feet, and it is still their turn
            return Next::Wait;
        }

        hero.death_saves = Some(save.saves);
        if save.dead {
            hero.alive = false;
            text.push_str(&format!(" {} dies.", hero.name));
            self.enc.push_log(text);
            return self.end(Outcome::Defeat);
        }

        text.push_str(if save.stabilized {
            " Stable."
        } else if save.natural == 1 {
            " Critical failure."
        } else if save.total >= DEATH_SAVE_DC {
            " Success."
        } else {
            " Failure."
        });
        self.enc.push_log(text);
        Next::Advance { epoch: self.epoch }
    }

    fn monster_turn(&mut self) -> Result<Next, CombatError> {
        let Some(monster) = self
            .enc
            .current()
            .filter(|c| c.side == Side::Monster && c.alive)
        else {
            return Ok(Next::Wait);
        };
        let monster_name = monster.name.clone();
        let attack = monster
            .attack
            .clone()
            .unwrap_or_else(AttackProfile::monster_default);

        let Some(hero_index) = self.hero_index() else {
            return Ok(Next::Wait);
        };
        if !self.enc.order[hero_index].alive {
            return Ok(self.end(Outcome::Defeat));
        }

        let hero_ac = self.enc.order[hero_index].ac;
        let resolution = resolve_attack(attack.params(hero_ac), &mut *self.rng)?;

        let hero = &mut self.enc.order[hero_index];
        let mut text = format!(
            "{} attacks {} with {}. Roll {} vs AC {}.",
            monster_name, hero.name, attack.label, resolution.attack_roll.total, hero_ac
        );

        if !resolution.hit {
            text.push_str(" Miss.");
            self.enc.push_log(text);
            return Ok(self.advance_turn());
        }

        let damage = resolution.damage();
        let lost = hero.take_damage(damage);
        if resolution.critical {
            text.push_str(" Critical hit!");
        }
        text.push_str(&format!(" Hit for {} damage.", damage));
        if hero.hp == 0 && !hero.unconscious {
            hero.knock_out();
            text.push_str(&format!(" {} is unconscious.", hero.name));
        }
        if lost > 0 {
            self.sheet_updates.push(-lost);
        }
        self.enc.push_log(text);
        Ok(self.advance_turn())
    }

    fn step_cursor(&mut self) {
        self.enc.turn_index += 1;
        if self.enc.turn_index >= self.enc.order.len() {
            self.enc.turn_index = 0;
            self.enc.round += 1;
        }
    }

    /// Move to the next living combatant and begin their turn. Gives up
    /// after `order.len() + 1` hops.
    fn advance_turn(&mut self) -> Next {
        let len = self.enc.order.len();
        if len == 0 {
            return Next::Wait;
        }
        let mut attempts = 0;
        loop {
            self.step_cursor();
            attempts += 1;
            if attempts > len || self.enc.current().is_some_and(|c| c.alive) {
                break;
            }
        }
        self.begin_turn()
    }

    fn begin_turn(&mut self) -> Next {
        for _ in 0..=self.enc.order.len() {
            let Some(current) = self.enc.current() else {
                return Next::Wait;
            };
            if !current.alive {
                self.step_cursor();
                continue;
            }

            match current.side {
                Side::Monster => return Next::MonsterTurn { epoch: self.epoch },
                Side::Hero if current.unconscious => {
                    let saves = current.death_saves.unwrap_or_default();
                    if saves.is_stable() {
                        let text = format!("{} is stable but unconscious.", current.name);
                        self.enc.push_log(text);
                        self.step_cursor();
                        continue;
                    }
                    let (id, name) = (current.id.clone(), current.name.clone());
                    self.request_roll(
                        PendingRollKind::DeathSave,
                        id,
                        None,
                        format!("{} death save", name),
                        "1d20".to_string(),
                        0,
                        false,
                    );
                    return Next::Wait;
                }
                Side::Hero => return Next::Wait,
            }
        }

        warn!("No combatant left able to act");
        Next::Wait
    }

    fn end(&mut self, outcome: Outcome) -> Next {
        self.enc.active = false;
        self.enc.outcome = Some(outcome);
        if self.enc.pending_roll.take().is_some() {
            self.rolls.clear_pending();
        }
        let (text, target) = match outcome {
            Outcome::Victory => ("Victory!", self.enc.victory_node_id.clone()),
            Outcome::Defeat => ("Defeat...", self.enc.defeat_node_id.clone()),
        };
        self.enc.push_log(text);
        info!(
            "Combat at node {} ended in {:?} after {} rounds",
            self.enc.node_id, outcome, self.enc.round
        );
        Next::Ended { target }
    }
}
