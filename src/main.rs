//! soloquest - play one encounter from the command line
//!
//! Every roll is answered by the automatic roller and the hero attacks the
//! first monster still standing, so a fight runs start to finish unattended.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use soloquest::combat::{
    AbilityScores, EnginePhase, Outcome, RandomSource, SeededRandom, ThreadRandom,
};
use soloquest::content::{CombatNode, MonsterLibrary};
use soloquest::narrative::NodeTracker;
use soloquest::player::{HeroSheet, HeroSnapshot};
use soloquest::rolls::{AutoRoller, RollCoordinator};
use soloquest::{CombatEngine, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Solo adventure combat runner
#[derive(Parser, Debug)]
#[command(name = "soloquest", version, about = "Run a solo combat encounter")]
struct Args {
    /// JSON file of monster definitions
    #[arg(short, long)]
    content: PathBuf,

    /// Monster id to fight (can be specified multiple times)
    #[arg(short, long = "monster", required = true)]
    monsters: Vec<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed the dice; overrides the configured seed
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "Hero")]
    hero_name: String,

    #[arg(long, default_value_t = 1)]
    level: u32,

    #[arg(long, default_value_t = 10)]
    hp: i32,

    #[arg(long, default_value_t = 14)]
    ac: i32,

    #[arg(long = "str", default_value_t = 16)]
    strength: i32,

    #[arg(long = "dex", default_value_t = 12)]
    dexterity: i32,
}

fn random_source(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soloquest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }

    let library = MonsterLibrary::load(&args.content).await?;
    if library.is_empty().await {
        bail!("No monsters in {}", args.content.display());
    }

    let hero = HeroSnapshot {
        name: args.hero_name,
        level: args.level,
        hp: args.hp,
        max_hp: args.hp,
        ac: args.ac,
        abilities: AbilityScores {
            str: args.strength,
            dex: args.dexterity,
            ..AbilityScores::default()
        },
    };

    let rolls = RollCoordinator::shared();
    let sheet = HeroSheet::shared(hero.clone());
    let tracker = NodeTracker::shared();
    let engine = Arc::new(
        CombatEngine::new(
            Arc::new(library),
            rolls.clone(),
            sheet.clone(),
            tracker.clone(),
            config.combat,
        )
        .with_rng(random_source(config.rng_seed)),
    );

    // The roller gets its own stream so its rolls don't shift the monsters'
    let roller = Arc::new(AutoRoller::new(
        rolls,
        random_source(config.rng_seed.map(|s| s.wrapping_add(1))),
    ));
    let _listener = engine.listen();
    let _roller = roller.spawn();

    let node = CombatNode {
        node_id: "cli".to_string(),
        kind: "combat".to_string(),
        monster_ids: args.monsters,
        victory_node_id: Some("victory".to_string()),
        defeat_node_id: Some("defeat".to_string()),
    };
    tracker.start("cli", &node.node_id);

    let mut snapshots = engine.subscribe();
    engine.start_combat("cli", &node, &hero).await?;

    let encounter = loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Some(encounter) = snapshot {
            let stable = encounter
                .hero()
                .and_then(|h| h.death_saves)
                .is_some_and(|s| s.is_stable());
            match encounter.phase() {
                EnginePhase::Resolved(_) => break encounter,
                // Nobody heals a stable hero, so the monsters would swing forever
                _ if stable => {
                    engine.clear_combat();
                    break encounter;
                }
                EnginePhase::TurnActive => {
                    let hero_up = encounter
                        .current()
                        .is_some_and(|c| c.is_hero() && c.can_act());
                    if hero_up {
                        if let Some(target) = encounter.living_monsters().next() {
                            engine.hero_attack(&target.id);
                        }
                    }
                }
                _ => {}
            }
        }
        if snapshots.changed().await.is_err() {
            bail!("Combat engine shut down mid-fight");
        }
    };

    for entry in &encounter.log {
        println!("[{}] {}", entry.ts.format("%H:%M:%S%.3f"), entry.text);
    }
    match encounter.outcome {
        Some(Outcome::Victory) => println!("Victory with {} HP left.", sheet.hp()),
        Some(Outcome::Defeat) => println!("Defeated."),
        None => println!("{} lies stable; the fight is called off.", hero.name),
    }
    info!(
        "Encounter finished; story moves to {}",
        tracker.current_node().unwrap_or_default()
    );

    Ok(())
}
