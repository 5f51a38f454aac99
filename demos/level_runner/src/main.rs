//! Headless level runner: plays a level catalog with a scripted input
//! timeline and jittered frame deltas, logging every game event.

mod logging;
mod script;

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use phaseshift::{EventKind, FormTuning, LevelCatalog, SimConfig, Vec2, World};

use crate::script::Timeline;

/// Run phaseshift levels without a window
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulation config JSON (any subset of fields)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Form tuning JSON (any subset of fields)
    #[arg(long, value_name = "PATH")]
    tuning: Option<PathBuf>,

    /// Level catalog JSON; the built-in sample is used otherwise
    #[arg(long, value_name = "PATH")]
    levels: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(short, long, default_value_t = 3600)]
    frames: u32,

    /// Relative frame-time jitter, 0 for a steady 60 Hz
    #[arg(long, default_value_t = 0.3)]
    jitter: f32,

    /// Seed for the jitter
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = match &args.config {
        Some(path) => SimConfig::from_json(&read(path)?)?,
        None => SimConfig::default(),
    };
    let tuning = match &args.tuning {
        Some(path) => FormTuning::from_json(&read(path)?)?,
        None => FormTuning::default(),
    };
    let catalog = match &args.levels {
        Some(path) => LevelCatalog::from_json(&read(path)?)?,
        None => LevelCatalog::sample(),
    };

    let base_dt = config.fixed_dt;
    let mut world = World::new(config, tuning, catalog)?;

    let restarted = Rc::new(Cell::new(false));
    let flag = Rc::clone(&restarted);
    world
        .events_mut()
        .subscribe(EventKind::LevelStarted, move |_, _| flag.set(true));
    world.events_mut().subscribe_all(|event, _| {
        log::info!(target: "level_runner", "{event:?}");
    });

    world.start()?;

    let mut rng = fastrand::Rng::with_seed(args.seed);
    let mut timeline = Timeline::autopilot();
    let mut ticks = 0u64;
    let mut frames = 0u32;

    while frames < args.frames && !world.is_complete() {
        if restarted.replace(false) {
            timeline.restart(world.controls_mut());
        }
        timeline.apply(world.controls_mut());

        let at = world.character_position()?;
        world.controls_mut().set_pointer(Some(at + Vec2::new(4.0, 1.0)));

        let wobble = (rng.f32() * 2.0 - 1.0) * args.jitter;
        let delta = (base_dt * (1.0 + wobble)).max(0.0);
        ticks += u64::from(world.frame(delta)?);
        frames += 1;

        if frames % 60 == 0 {
            let character = world.character()?;
            log::debug!(
                "frame {frames}: {:?}/{} at {:?} (alpha {:.2})",
                character.kind(),
                character.state_name(),
                world.character_position()?,
                world.stepper().alpha()
            );
        }
    }

    let level = world.current_level().map_or(0, |l| l.index);
    log::info!(
        "{} after {frames} frames ({ticks} ticks), level {} of {}",
        if world.is_complete() { "complete" } else { "stopped" },
        level + 1,
        world.catalog().len()
    );
    Ok(())
}
