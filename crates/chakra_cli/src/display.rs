//! Terminal rendering of engine state and spectrum bars.

use chakra_core::{BrainwaveBand, EngineState, OutputDevice, PresetCatalog};

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One character per bar, heights 0.0 - 1.0
pub fn bar_line(bars: &[f32]) -> String {
    bars.iter()
        .map(|&v| {
            let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
            let index = (v * (LEVELS.len() - 1) as f32).round() as usize;
            LEVELS[index.min(LEVELS.len() - 1)]
        })
        .collect()
}

pub fn state_line(state: &EngineState) -> String {
    let band = BrainwaveBand::for_beat(state.beat_hz);
    let mut line = format!(
        "{:?}  L {:.2} Hz  R {:.2} Hz  beat {:.2} Hz ({})  gain {:.2}",
        state.lifecycle,
        state.left_hz,
        state.right_hz,
        state.beat_hz,
        band.label(),
        state.gain
    );
    if let Some(chakra) = &state.selection.chakra {
        line.push_str(&format!("  chakra {}", chakra));
    }
    if let Some(offset) = &state.selection.offset {
        line.push_str(&format!("  offset {}", offset));
    }
    line
}

pub fn print_presets(catalog: &PresetCatalog) {
    println!("Chakras:");
    for chakra in catalog.chakras() {
        let beat = chakra
            .beat
            .map(|b| format!("  beat {:.2} Hz", b))
            .unwrap_or_default();
        println!(
            "  {:<13} {:>4} Hz  {:<12} {:<13} {}{}",
            chakra.id, chakra.frequency, chakra.name, chakra.sanskrit, chakra.color, beat
        );
    }
    println!("Offsets:");
    for offset in catalog.offsets() {
        println!(
            "  {:<13} {:>5.2} Hz  {:<10} {}",
            offset.id,
            offset.value,
            offset.name,
            offset.band.label()
        );
    }
}

pub fn print_devices(devices: &[OutputDevice]) {
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!(
            "{} {}  ({} ch, rates {:?}{})",
            marker,
            device.name,
            device.max_channels,
            device.sample_rates,
            if device.supports_stereo() { "" } else { ", mono only" }
        );
    }
}
