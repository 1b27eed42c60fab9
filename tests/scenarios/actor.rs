//! Fights answered by the automatic roller through the coordinator

use std::sync::Arc;
use std::time::Duration;

use soloquest::combat::{EnginePhase, Outcome, RandomSource, ScriptedRandom, SeededRandom};
use soloquest::rolls::AutoRoller;
use tokio::time::timeout;

use crate::harness::{fixtures, member_ids, CombatTable};

/// Spawn the listener and the roller, then attack the first living monster
/// whenever the hero is up, until the fight resolves. Returns None once the
/// hero is down but stable, since the monsters can swing at them forever.
async fn play_out(
    table: &CombatTable,
    node: &[&str],
    dice: impl RandomSource + 'static,
) -> Option<Outcome> {
    let roller = Arc::new(AutoRoller::new(table.rolls.clone(), Box::new(dice)));
    let _roller = roller.spawn();
    let _listener = table.engine.listen();

    let mut snapshots = table.engine.subscribe();
    table.start(&fixtures::node(node)).await.unwrap();
    let members = member_ids(&table.state());

    timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if let Some(encounter) = snapshot {
                assert_eq!(encounter.awaiting_player(), encounter.pending_roll.is_some());
                assert_eq!(member_ids(&encounter), members);
                let stable = encounter
                    .hero()
                    .and_then(|h| h.death_saves)
                    .is_some_and(|s| s.is_stable());
                match encounter.phase() {
                    EnginePhase::Resolved(outcome) => return Some(outcome),
                    _ if stable => return None,
                    EnginePhase::TurnActive => {
                        let hero_up = encounter
                            .current()
                            .is_some_and(|c| c.is_hero() && c.can_act());
                        if let Some(target) = encounter.living_monsters().next() {
                            if hero_up {
                                table.engine.hero_attack(&target.id);
                            }
                        }
                    }
                    _ => {}
                }
            }
            snapshots.changed().await.expect("engine alive");
        }
    })
    .await
    .expect("fight finished in time")
}

/// Test: scripted dice through the roller reproduce the one-turn victory
#[tokio::test]
async fn test_rolled_victory() {
    let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
    let dice = ScriptedRandom::faces(&[(18, 20), (15, 20), (8, 8)]);

    let outcome = play_out(&table, &["goblin"], dice).await;
    assert_eq!(outcome, Some(Outcome::Victory));

    let state = table.state();
    assert_eq!(state.hero().unwrap().initiative, 18);
    assert_eq!(state.round, 1);
    assert_eq!(table.log_count("Roll 20 vs AC 10. Hit!"), 1);
    assert_eq!(table.log_count("Goblin takes 11 damage."), 1);
    assert!(table.rolls.pending().is_none());
    assert_eq!(
        table.tracker.current_node().as_deref(),
        Some(fixtures::VICTORY_NODE)
    );
}

/// Test: seeded fights always finish and route to a matching node, or leave
/// a stable hero that a clear can still end
#[tokio::test]
async fn test_seeded_fights_finish() {
    for seed in 0..10 {
        let table = CombatTable::new(
            vec![fixtures::goblin(), fixtures::ogre()],
            SeededRandom::new(seed),
        );
        let dice = SeededRandom::new(seed + 100);
        let Some(outcome) = play_out(&table, &["goblin", "ogre"], dice).await else {
            let hero = table.state().hero().cloned().unwrap();
            assert!(hero.alive && hero.unconscious);
            table.engine.clear_combat();
            assert!(table.engine.state().is_none());
            continue;
        };

        let expected_node = match outcome {
            Outcome::Victory => fixtures::VICTORY_NODE,
            Outcome::Defeat => fixtures::DEFEAT_NODE,
        };
        assert_eq!(table.tracker.current_node().as_deref(), Some(expected_node));
        assert_eq!(table.state().outcome, Some(outcome));
        assert!(table.rolls.pending().is_none());
    }
}
