//! Victory scenarios

use soloquest::combat::{EnginePhase, Outcome, PendingRollKind, ScriptedRandom};

use crate::harness::{fixtures, member_ids, CombatTable};

/// Test: hero wins initiative, hits on a 15, and kills the goblin in one blow
#[tokio::test]
async fn test_one_turn_victory() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
    table.start(&fixtures::node(&["goblin"])).await.unwrap();
    let members = member_ids(&table.state());

    assert!(table.answer(18, Some(18)).await);
    let state = table.state();
    assert_eq!(state.current().unwrap().id, "hero");
    assert_eq!(table.engine.phase(), EnginePhase::TurnActive);

    assert!(table.engine.hero_attack("goblin__0"));
    assert!(table.answer(20, Some(15)).await);
    let damage = table.pending();
    assert_eq!(damage.kind, PendingRollKind::HeroDamage);
    assert_eq!(damage.expression, "1d8");
    assert_eq!(damage.modifier, 3);
    assert!(!damage.critical);

    assert!(table.answer(8, None).await);

    let state = table.state();
    let goblin = state.combatant("goblin__0").unwrap();
    assert_eq!(goblin.hp, 0);
    assert!(!goblin.alive);
    assert!(!state.active);
    assert_eq!(state.outcome, Some(Outcome::Victory));
    assert_eq!(table.engine.phase(), EnginePhase::Resolved(Outcome::Victory));
    assert!(state.pending_roll.is_none());
    assert!(!state.awaiting_player());
    assert!(table.rolls.pending().is_none());
    assert_eq!(member_ids(&state), members);
    assert_eq!(
        table.tracker.current_node().as_deref(),
        Some(fixtures::VICTORY_NODE)
    );
    assert_eq!(table.sheet.hp(), 10);
    assert_eq!(state.log.last().unwrap().text, "Victory!");
}

/// Test: a kill that leaves another monster standing keeps the fight going
#[tokio::test]
async fn test_second_monster_keeps_fight_going() {
    let table = CombatTable::new(
        vec![fixtures::goblin()],
        ScriptedRandom::faces(&[(2, 20), (3, 20)]),
    );
    table
        .start(&fixtures::node(&["goblin", "goblin"]))
        .await
        .unwrap();
    assert_eq!(table.state().order.len(), 3);

    table.answer(18, Some(18)).await;
    assert!(table.engine.hero_attack("goblin__1"));
    table.answer(19, Some(14)).await;
    table.answer(6, None).await;

    let state = table.state();
    assert!(state.active);
    assert!(!state.combatant("goblin__1").unwrap().alive);
    assert!(state.combatant("goblin__0").unwrap().alive);
    // Both goblins' turns ran; the dead one was skipped
    assert_eq!(state.round, 2);
    assert_eq!(state.current().unwrap().id, "hero");
    assert_eq!(table.log_count("Goblin attacks"), 1);

    // Dead monsters can't be targeted again
    assert!(!table.engine.hero_attack("goblin__1"));
    assert!(table.engine.hero_attack("goblin__0"));
}

/// Test: a natural 20 doubles the damage dice, not the bonus
#[tokio::test]
async fn test_critical_hit_doubles_damage_dice() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
    table.start(&fixtures::node(&["goblin"])).await.unwrap();
    table.answer(18, Some(18)).await;

    table.engine.hero_attack("goblin__0");
    table.answer(25, Some(20)).await;

    let damage = table.pending();
    assert_eq!(damage.expression, "2d8");
    assert_eq!(damage.modifier, 3);
    assert!(damage.critical);
    assert_eq!(table.log_count("Critical hit!"), 1);
}

/// Test: a natural 1 misses even when the total beats the AC
#[tokio::test]
async fn test_natural_one_misses() {
    let table = CombatTable::new(
        vec![fixtures::goblin()],
        ScriptedRandom::faces(&[(2, 20), (1, 20)]),
    );
    table.start(&fixtures::node(&["goblin"])).await.unwrap();
    table.answer(18, Some(18)).await;

    table.engine.hero_attack("goblin__0");
    table.answer(30, Some(1)).await;

    let state = table.state();
    assert_eq!(state.combatant("goblin__0").unwrap().hp, 5);
    assert_eq!(table.log_count("Natural 1. Miss."), 1);
    // Goblin swung back (and fumbled), hero is up again
    assert_eq!(state.round, 2);
    assert_eq!(state.current().unwrap().id, "hero");
}

/// Test: a node whose monsters can't be found is won outright
#[tokio::test]
async fn test_no_monsters_routes_to_victory() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::new([0.5]));
    table.start(&fixtures::node(&["dragon"])).await.unwrap();

    assert_eq!(table.engine.phase(), EnginePhase::Resolved(Outcome::Victory));
    assert!(table.rolls.pending().is_none());
    assert_eq!(
        table.tracker.current_node().as_deref(),
        Some(fixtures::VICTORY_NODE)
    );
}

/// Test: a resolved fight can be cleared, and the node fought again
#[tokio::test]
async fn test_restart_after_clear() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
    let node = fixtures::node(&["goblin"]);
    table.start(&node).await.unwrap();
    table.answer(18, Some(18)).await;
    table.engine.hero_attack("goblin__0");
    table.answer(20, Some(15)).await;
    table.answer(8, None).await;
    assert_eq!(table.engine.phase(), EnginePhase::Resolved(Outcome::Victory));

    table.engine.clear_combat();
    assert_eq!(table.engine.phase(), EnginePhase::Idle);

    table.start(&node).await.unwrap();
    let state = table.state();
    assert!(state.active);
    assert_eq!(state.round, 1);
    assert!(state.combatant("goblin__0").unwrap().alive);
    assert_eq!(table.engine.phase(), EnginePhase::Initiative);
}
