//! Special Stage entry point
//!
//! Native driver: loads a stage from a directory of decompressed buffers,
//! runs it headless with a scripted input pattern and prints the final
//! published state as JSON.
//!
//! Usage: `special-stage <asset-dir> [settings.json] [ticks]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::path::PathBuf;

    use special_stage::sim::{SimEvent, SpecialStage, StageOutcome, tick};
    use special_stage::{AssetBundle, Settings};

    env_logger::init();
    log::info!("Special Stage (native) starting...");

    let mut args = std::env::args().skip(1);
    let Some(asset_dir) = args.next().map(PathBuf::from) else {
        eprintln!("usage: special-stage <asset-dir> [settings.json] [ticks]");
        std::process::exit(2);
    };
    let settings_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("special_stage.json"));
    let max_ticks: u64 = args.next().and_then(|t| t.parse().ok()).unwrap_or(60 * 60 * 3);

    let settings = match Settings::load(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    let assets = match AssetBundle::load_dir(&asset_dir) {
        Ok(assets) => assets,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut sim: SpecialStage = SpecialStage::new();
    if let Err(e) = sim.initialize(settings, &assets) {
        log::error!("{}", e);
        std::process::exit(1);
    }

    let mut rings = 0;
    let mut bombs = 0;
    let mut ticks = 0;
    while ticks < max_ticks && sim.outcome() == StageOutcome::InProgress {
        tick(&mut sim, &demo_input(ticks));
        ticks += 1;
        for event in sim.drain_events() {
            match event {
                SimEvent::RingCollected { .. } => rings += 1,
                SimEvent::BombHit { .. } => bombs += 1,
                SimEvent::CheckpointResolved { act, outcome } => {
                    log::info!("Checkpoint {} -> {:?}", act, outcome);
                }
                other => log::debug!("{:?}", other),
            }
        }
    }

    log::info!(
        "Ran {} ticks: {:?}, {} rings picked up, {} bombs hit",
        ticks,
        sim.outcome(),
        rings,
        bombs
    );

    if let Some(snapshot) = sim.snapshot() {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize snapshot: {}", e),
        }
    }
}

/// Weave across the floor and hop now and then
#[cfg(not(target_arch = "wasm32"))]
fn demo_input(tick: u64) -> special_stage::sim::TickInput {
    use special_stage::sim::tick::{BUTTON_A, BUTTON_LEFT, BUTTON_RIGHT};

    let held = match (tick / 45) % 4 {
        0 => BUTTON_LEFT,
        2 => BUTTON_RIGHT,
        _ => 0,
    };
    let pressed = if tick % 240 == 200 { BUTTON_A } else { 0 };
    special_stage::sim::TickInput {
        held: held | pressed,
        pressed,
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // No browser front end; the library is driven by the host page
}
