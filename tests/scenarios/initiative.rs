//! Initiative ordering and turn progression

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use soloquest::combat::{face_value, ScriptedRandom};

use crate::harness::{fixtures, member_ids, CombatTable};

fn order_ids(table: &CombatTable) -> Vec<String> {
    table.state().order.iter().map(|c| c.id.clone()).collect()
}

/// quick rolls 8 (+2 dex), slow rolls 10 (+0): both land on 10, as does a
/// hero initiative total of 10. `flips` are the coin flips for the hero and
/// slow, who also tie on dex.
async fn three_way_tie(flips: [f64; 2]) -> CombatTable {
    let rng = ScriptedRandom::new([face_value(8, 20), face_value(10, 20), flips[0], flips[1]]);
    let table = CombatTable::new(
        vec![fixtures::with_dex("quick", 14), fixtures::with_dex("slow", 10)],
        rng,
    );
    table
        .start(&fixtures::node(&["quick", "slow"]))
        .await
        .unwrap();
    assert!(table.answer(10, Some(10)).await);
    table
}

/// Test: ties go to the higher dex, then to the lower coin flip
#[tokio::test]
async fn test_tie_breaks() {
    let table = three_way_tie([0.9, 0.1]).await;
    assert_eq!(order_ids(&table), vec!["quick__0", "slow__1", "hero"]);

    // Both monsters missed on an 11 and the hero is up
    let state = table.state();
    assert_eq!(state.turn_index, 2);
    assert_eq!(state.round, 1);
    assert_eq!(table.log_count("Miss."), 2);
    assert_eq!(table.log_count("Initiative: quick 10, slow 10, Aria 10."), 1);
}

/// Test: the coin flip decides between equal initiative and dex
#[tokio::test]
async fn test_coin_flip_order() {
    let table = three_way_tie([0.1, 0.9]).await;
    assert_eq!(order_ids(&table), vec!["quick__0", "hero", "slow__1"]);
    assert_eq!(table.state().turn_index, 1);
}

/// Test: without ties, sorting draws nothing from the rng
#[tokio::test]
async fn test_untied_initiative_draws_nothing() {
    let draws = Arc::new(AtomicUsize::new(0));
    let counter = draws.clone();
    let rng = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        face_value(3, 20)
    };

    let table = CombatTable::new(vec![fixtures::goblin()], rng);
    table.start(&fixtures::node(&["goblin"])).await.unwrap();
    assert_eq!(draws.load(Ordering::SeqCst), 1);
    assert_eq!(table.state().combatant("goblin__0").unwrap().initiative, 3);

    table.answer(18, Some(18)).await;
    assert_eq!(draws.load(Ordering::SeqCst), 1);
    assert_eq!(order_ids(&table), vec!["hero", "goblin__0"]);
}

/// Test: initiative includes the dex modifier and a negative total sorts last
#[tokio::test]
async fn test_monster_initiative_uses_dex() {
    let table = CombatTable::new(
        vec![fixtures::with_dex("clumsy", 3), fixtures::with_dex("nimble", 18)],
        ScriptedRandom::faces(&[(1, 20), (1, 20)]),
    );
    table
        .start(&fixtures::node(&["clumsy", "nimble"]))
        .await
        .unwrap();
    let state = table.state();
    assert_eq!(state.combatant("clumsy__0").unwrap().initiative, -3);
    assert_eq!(state.combatant("nimble__1").unwrap().initiative, 5);
    let request = table.pending();
    assert_eq!(request.modifier, 0);

    table.answer(12, Some(12)).await;
    assert_eq!(order_ids(&table), vec!["hero", "nimble__1", "clumsy__0"]);
    assert_eq!(table.state().turn_index, 0);
}

/// Test: the cursor wraps, rounds count up, and membership never changes
#[tokio::test]
async fn test_rounds_advance_with_fixed_membership() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
    table.start(&fixtures::node(&["goblin"])).await.unwrap();
    let members = member_ids(&table.state());
    table.answer(18, Some(18)).await;

    for round in 1..=3 {
        let state = table.state();
        assert_eq!(state.round, round);
        assert_eq!(state.current().unwrap().id, "hero");
        assert_eq!(state.awaiting_player(), state.pending_roll.is_some());
        assert_eq!(member_ids(&state), members);
        assert!(table.engine.end_turn().await.unwrap());
    }

    let state = table.state();
    assert_eq!(state.round, 4);
    assert_eq!(table.log_count("Aria holds back."), 3);
    assert_eq!(table.log_count("Goblin attacks Aria"), 3);
}

/// Test: fighting the same node twice is a no-op while it is running
#[tokio::test]
async fn test_reentering_running_node_is_noop() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
    let node = fixtures::node(&["goblin"]);
    table.start(&node).await.unwrap();
    table.answer(18, Some(18)).await;
    let before = table.state();

    table.start(&node).await.unwrap();
    assert_eq!(table.state(), before);
}
