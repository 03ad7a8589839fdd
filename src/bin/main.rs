//! Headless driver: runs a ROM for a number of 60 Hz frames and prints the final screen.
//!
//! usage: chipotle8 <rom> [frames] [log level]
use chipotle8::{Config, Emulator, HEIGHT, PIXEL_ON, WIDTH};
use slog::{info, o};
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;
use std::error::Error;
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let rom_path = args.next().ok_or("usage: chipotle8 <rom> [frames] [log level]")?;
    let frames: u64 = match args.next() {
        Some(frames) => frames.parse()?,
        None => 600,
    };
    let level: Severity = match args.next() {
        Some(level) => level.parse()?,
        None => Severity::Info,
    };

    let mut builder = TerminalLoggerBuilder::new();
    builder.level(level);
    builder.destination(Destination::Stderr);
    let logger = builder.build()?;

    let rom = std::fs::read(&rom_path)?;
    let mut emulator = Emulator::with_config(Config::default(), Some(logger.clone()));
    emulator.load_rom(&rom)?;
    info!(logger, "running"; "rom" => &rom_path, "frames" => frames);

    for _ in 0..frames {
        let started = Instant::now();
        emulator.run_frame()?;
        if let Some(rest) = FRAME_INTERVAL.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let snapshot = emulator.snapshot();
    info!(logger.new(o!("pc" => snapshot.pc)), "stopped"; "opcode" => snapshot.opcode);

    for row in emulator.get_pixels().chunks(WIDTH).take(HEIGHT) {
        let line: String = row
            .iter()
            .map(|p| if *p == PIXEL_ON { '#' } else { ' ' })
            .collect();
        println!("{}", line);
    }

    Ok(())
}
