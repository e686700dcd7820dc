//! tactus CLI: headless demo render of the voice engine.
//!
//! Usage:
//!   cargo run --bin tc-cli
//!   cargo run --bin tc-cli -- --voices 4 --protocol expressive --csv out.csv
//!   cargo run --bin tc-cli -- --unison --verbose

use std::{env, fs};

use log::{LevelFilter, Metadata, Record};
use tc_ir::semitones_to_bend;
use tc_master::{
    recording_to_csv, render_offline, Controller, EngineConfig, Event, Protocol, Recording, Stream,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK: usize = 64;
const CAPACITY: usize = 8;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        eprintln!("[{:5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let args: Vec<String> = env::args().collect();
    let flag = |name: &str| args.iter().any(|a| a == name);
    let value = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let level = if flag("--verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    let voices = match value("--voices").map(|v| v.parse::<usize>()) {
        None => 4,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("Bad --voices: {}", e);
            std::process::exit(1);
        }
    };
    let protocol = match value("--protocol").as_deref() {
        None | Some("conventional") => Protocol::Conventional,
        Some("expressive") => Protocol::Expressive,
        Some("touch") => Protocol::ContinuousTouch,
        Some(other) => {
            eprintln!("Unknown protocol {}, expected conventional|expressive|touch", other);
            std::process::exit(1);
        }
    };
    let seconds = value("--seconds")
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(1.0);

    let config = EngineConfig {
        voices,
        protocol,
        unison: flag("--unison"),
        glide: 0.005,
        ..EngineConfig::default()
    };

    let (mut ctrl, mut engine) = Controller::new(CAPACITY, SAMPLE_RATE).unwrap_or_else(|e| {
        eprintln!("Failed to create engine: {}", e);
        std::process::exit(1);
    });
    ctrl.configure(config).unwrap_or_else(|e| {
        eprintln!("Rejected config: {}", e);
        std::process::exit(1);
    });

    let total_frames = (seconds * SAMPLE_RATE) as usize;
    let script = demo_script(&config, total_frames as u64);
    let rec = render_offline(&mut ctrl, &mut engine, &script, total_frames, BLOCK)
        .unwrap_or_else(|e| {
            eprintln!("Render failed: {}", e);
            std::process::exit(1);
        });
    engine.dump_voices();

    println!("Voices:   {} of {}", engine.voice_count(), engine.capacity());
    println!("Protocol: {:?}", protocol);
    println!("Frames:   {} at {} Hz", rec.frames(), rec.sample_rate());
    println!();
    print_summary(&rec, engine.voice_count());

    if let Some(path) = value("--csv") {
        let active: Vec<usize> = (0..engine.voice_count()).collect();
        let csv = recording_to_csv(&rec, &active);
        fs::write(&path, &csv).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {}", path, e);
            std::process::exit(1);
        });
        println!("Wrote {} bytes to {}", csv.len(), path);
    }
}

/// A C major chord, a whole-tone bend up and back, then a staggered release.
fn demo_script(config: &EngineConfig, total: u64) -> Vec<Event> {
    let protocol = config.protocol;
    let q = total / 8;
    let notes = [60.0, 64.0, 67.0];
    let mut script = Vec::new();

    for (i, &note) in notes.iter().enumerate() {
        let source = i as u32 + 1;
        let channel = match protocol {
            Protocol::Expressive => i as u8 + 2,
            _ => 1,
        };
        let t = i as u64 * 10;
        script.push(match protocol {
            Protocol::ContinuousTouch => Event::touch_on(source, note, 0.8, 0.5, 0.5, t),
            _ => Event::note_on(source, channel, note, 0.8, t),
        });
    }
    let up = semitones_to_bend(2.0, config.bend_range);
    let center = semitones_to_bend(0.0, config.bend_range);
    script.push(Event::pitch_bend(0, 1, up, q * 2));
    script.push(Event::channel_pressure(0, 1, 0.6, q * 3));
    script.push(Event::pitch_bend(0, 1, center, q * 4));
    for (i, _) in notes.iter().enumerate() {
        let channel = match protocol {
            Protocol::Expressive => i as u8 + 2,
            _ => 1,
        };
        script.push(Event::note_off(i as u32 + 1, channel, q * (5 + i as u64)));
    }
    script
}

fn print_summary(rec: &Recording, voices: usize) {
    println!("voice   pitch(min..max)     gate(on frames)  after(max)");
    for voice in 0..voices {
        let pitch = rec.stream(voice, Stream::Pitch);
        let gate = rec.stream(voice, Stream::Gate);
        let after = rec.stream(voice, Stream::Aftertouch);
        let lo = pitch.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = pitch.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let on = gate.iter().filter(|&&g| g > 0.5).count();
        let peak = after.iter().copied().fold(0.0, f32::max);
        println!(
            "{:5}   {:+.3}..{:+.3}      {:8}         {:.3}",
            voice, lo, hi, on, peak
        );
    }
}
