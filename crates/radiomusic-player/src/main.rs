//! RadioMusic Player - console host for the sample-bank radio
//!
//! Plays the configured sample root on the default output device and reads
//! line commands from stdin (type `help`). Settings are restored from the
//! config file on startup and written back on `quit`.
//!
//! Set `RADIOMUSIC_CONFIG` to use a config file other than
//! `~/.config/radiomusic/config.yaml`.

mod audio;
mod config;
mod console;

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use radiomusic_core::config::{load_config, save_config};

use audio::start_audio;
use config::PlayerConfig;
use console::ConsoleCommand;

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("radiomusic-player starting up");

    let config_path = config::config_path();
    let mut config: PlayerConfig = load_config(&config_path);

    let record = config.module.to_json();
    let patch_dir = config.patch_dir.clone();
    let mut audio = start_audio(config.buffer_size, |controller| {
        controller.set_patch_dir(Some(patch_dir.clone()));
        controller.restore_settings(&record, Some(&patch_dir));
    })
    .context("Failed to start audio output")?;

    println!("RadioMusic player at {} Hz. Type 'help' for commands.", audio.sample_rate);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let command = match console::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Module(command) => {
                if !audio.send(command) {
                    log::warn!("Command queue full, command dropped");
                }
            }
            ConsoleCommand::Station(value) => audio.controls().set_station(value),
            ConsoleCommand::Start(value) => audio.controls().set_start(value),
            ConsoleCommand::Reset => audio.controls().press_reset(),
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Quit => break,
        }
    }

    if let Some(settings) = audio.snapshot_settings(Duration::from_secs(1)) {
        config.module = settings;
    }
    drop(audio);

    save_config(&config, &config_path)?;
    Ok(())
}
