//! CombatTable - an engine with hand-answered rolls

use std::collections::BTreeSet;
use std::sync::Arc;

use soloquest::combat::{CombatEncounter, PendingRoll, RandomSource};
use soloquest::content::{CombatNode, MonsterLibrary, MonsterRecord};
use soloquest::narrative::NodeTracker;
use soloquest::player::HeroSheet;
use soloquest::rolls::{RollCoordinator, RollResult};
use soloquest::{CombatConfig, CombatEngine, CombatError};

use super::fixtures;

/// A combat engine plus handles on every collaborator it talks to
pub struct CombatTable {
    pub engine: Arc<CombatEngine>,
    pub rolls: Arc<RollCoordinator>,
    pub sheet: Arc<HeroSheet>,
    pub tracker: Arc<NodeTracker>,
}

impl CombatTable {
    /// Engine with no pacing delays
    pub fn new(monsters: Vec<MonsterRecord>, rng: impl RandomSource + 'static) -> Self {
        Self::with_config(monsters, rng, CombatConfig::instant())
    }

    pub fn with_config(
        monsters: Vec<MonsterRecord>,
        rng: impl RandomSource + 'static,
        config: CombatConfig,
    ) -> Self {
        let rolls = RollCoordinator::shared();
        let sheet = HeroSheet::shared(fixtures::hero());
        let tracker = NodeTracker::shared();
        let engine = CombatEngine::new(
            Arc::new(MonsterLibrary::from_records(monsters)),
            rolls.clone(),
            sheet.clone(),
            tracker.clone(),
            config,
        )
        .with_rng(Box::new(rng));

        Self {
            engine: Arc::new(engine),
            rolls,
            sheet,
            tracker,
        }
    }

    /// Start `node` with the standard hero
    pub async fn start(&self, node: &CombatNode) -> Result<(), CombatError> {
        self.tracker.start("crypt", &node.node_id);
        self.engine
            .start_combat("crypt", node, &fixtures::hero())
            .await
    }

    /// Current encounter; panics without one
    pub fn state(&self) -> CombatEncounter {
        self.engine.state().expect("an encounter")
    }

    /// The roll the engine is waiting on; panics without one
    pub fn pending(&self) -> PendingRoll {
        self.state().pending_roll.expect("a pending roll")
    }

    /// A result for the pending roll
    pub fn result_for_pending(&self, total: i32, natural: Option<u32>) -> RollResult {
        RollResult {
            id: self.pending().id,
            total,
            rolls: natural.into_iter().collect(),
            natural,
        }
    }

    /// Answer the pending roll directly
    pub async fn answer(&self, total: i32, natural: Option<u32>) -> bool {
        let result = self.result_for_pending(total, natural);
        self.engine
            .apply_roll_result(result)
            .await
            .expect("roll applied")
    }

    /// Log lines containing `needle`
    pub fn log_count(&self, needle: &str) -> usize {
        self.state()
            .log
            .iter()
            .filter(|e| e.text.contains(needle))
            .count()
    }
}

/// Ids in the initiative order, for membership checks
pub fn member_ids(encounter: &CombatEncounter) -> BTreeSet<String> {
    encounter.order.iter().map(|c| c.id.clone()).collect()
}
