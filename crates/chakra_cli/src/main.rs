//! ChakraBeats command-line player
//!
//! Plays a binaural pair for a fixed duration and prints the engine state
//! and a live spectrum per channel.

mod cli;
mod display;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chakra_core::{
    BinauralEngine, BinauralParameters, EngineConfig, Event, OfflineBackend, OfflineHandle,
    OutputDevice, PresetCatalog, CUSTOM_OFFSET_ID,
};

use cli::Args;

/// Display refresh rate
const REFRESH: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chakra=info")),
        )
        .init();

    let args = Args::parse();
    args.check()?;
    let config = args.engine_config()?;

    if args.list_presets {
        display::print_presets(&PresetCatalog::for_convention(
            config.convention,
            config.limits,
        ));
        return Ok(());
    }
    if args.list_devices {
        let devices = OutputDevice::enumerate().context("listing output devices")?;
        display::print_devices(&devices);
        return Ok(());
    }

    info!("Starting ChakraBeats");
    let (engine, offline) = build_engine(&args, config)?;
    configure(&engine, &args)?;

    engine.start().context("could not start audio output")?;
    println!("{}", display::state_line(&engine.get_state()));

    play(&engine, offline.as_ref(), &args);

    engine.stop();
    println!("{}", display::state_line(&engine.get_state()));
    Ok(())
}

fn build_engine(
    args: &Args,
    config: EngineConfig,
) -> anyhow::Result<(BinauralEngine, Option<OfflineHandle>)> {
    if args.offline {
        let (backend, handle) = OfflineBackend::new();
        let engine = BinauralEngine::with_backend(config, backend)?;
        Ok((engine, Some(handle)))
    } else {
        Ok((BinauralEngine::with_config(config)?, None))
    }
}

/// Apply presets first, then explicit base/beat on top
fn configure(engine: &BinauralEngine, args: &Args) -> anyhow::Result<()> {
    if args.wants_preset() {
        let offset = match (&args.offset, args.custom_offset) {
            (Some(id), _) => Some(id.as_str()),
            (None, Some(_)) => Some(CUSTOM_OFFSET_ID),
            (None, None) => None,
        };
        engine.apply_preset(args.chakra.as_deref(), offset, args.custom_offset)?;
    }

    if args.base.is_some() || args.beat.is_some() {
        let current = engine.get_state().parameters;
        engine.retune(BinauralParameters::new(
            args.base.unwrap_or(current.base),
            args.beat.unwrap_or(current.offset),
        ));
    }
    Ok(())
}

fn play(engine: &BinauralEngine, offline: Option<&OfflineHandle>, args: &Args) {
    let tap = engine.spectrum_tap();
    let frames_per_tick =
        (engine.config().stream.sample_rate as f32 * REFRESH.as_secs_f32()) as usize;
    let deadline = Instant::now() + Duration::from_secs_f32(args.seconds);

    while Instant::now() < deadline {
        // Offline output only advances when pulled
        if let Some(handle) = offline {
            let _ = handle.render(frames_per_tick);
        }

        if tap.poll() {
            let (left, right) = tap.snapshot().bars(args.bars);
            println!(
                "L {}  R {}",
                display::bar_line(&left),
                display::bar_line(&right)
            );
        }

        while let Some(event) = engine.poll_event() {
            if let Event::Error { message } = event {
                warn!("Engine error: {}", message);
            }
        }

        thread::sleep(REFRESH);
    }
}
