// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use midly::num::u4;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pianodeck::config::Settings;
use pianodeck::keyboard::{self, Event, NOTE_KEYS};
use pianodeck::notes::MAX_OCTAVE;
use pianodeck::synth::Synthesizer;
use pianodeck::transport::Transport;
use pianodeck::waveform::{self, Peaks, DEFAULT_PIXELS_PER_SECOND};
use pianodeck::{audio, midi, util};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A twelve-note synthesizer and multitrack player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Plays audio files together through the configured audio device.
    Play {
        /// The path to the config file.
        config_path: PathBuf,
        /// The audio files to play.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Plays the synthesizer from the keyboard.
    Piano {
        /// The path to the config file.
        config_path: PathBuf,
    },
    /// Prints the peak profile of an audio file.
    Peaks {
        /// The audio file.
        file: PathBuf,
        /// Columns per second of audio.
        #[arg(short, long, default_value_t = DEFAULT_PIXELS_PER_SECOND)]
        pixels_per_second: u32,
    },
    /// Prints the config file with defaults filled in.
    ShowConfig {
        /// The path to the config file.
        config_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play { config_path, files } => {
            play(&Settings::load(&config_path)?, &files).await?;
        }
        Commands::Piano { config_path } => {
            piano(&Settings::load(&config_path)?).await?;
        }
        Commands::Peaks {
            file,
            pixels_per_second,
        } => {
            let peaks = Peaks::from_file(&file, pixels_per_second, 1024)?;
            println!(
                "{} ({} columns at {}/s)",
                util::filename_display(&file),
                peaks.columns().len(),
                peaks.pixels_per_second()
            );
            println!("{}", peaks.render());
        }
        Commands::ShowConfig { config_path } => {
            print!("{}", serde_yml::to_string(&Settings::load(&config_path)?)?);
        }
    }

    Ok(())
}

/// Plays the files together and takes transport commands from stdin until quit.
async fn play(settings: &Settings, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let audio_config = settings
        .audio()
        .ok_or("an audio device must be configured to play files")?;
    let device = audio::get_device(audio_config)?;
    let mut transport = Transport::new(device, audio_config.buffer_size());

    for file in files {
        add_track(&mut transport, file);
    }
    if transport.is_empty() {
        return Err("none of the files could be opened".into());
    }
    print_tracks(&transport);
    report(transport.play_pause());

    let (events_tx, mut events_rx) = mpsc::channel(16);
    let driver = keyboard::Driver::new().monitor_events(
        events_tx,
        "Command (play, stop, seek <time>, scrub <column>, add <file>, remove <n>, list, quit)",
    );
    let mut ticker = tokio::time::interval(settings.transport().poll_interval()?);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if transport.is_playing() && transport.current_time() >= transport.total_time() {
                    info!("Reached the end of the master track.");
                    report(transport.stop());
                }
                eprint!("\r[{}] ", transport.time_display());
            }
            event = events_rx.recv() => match event {
                Some(Event::PlayPause) => report(transport.play_pause()),
                Some(Event::Stop) => report(transport.stop()),
                Some(Event::Seek(position)) => report(transport.seek_all(position)),
                Some(Event::Scrub(offset)) => report(transport.seek_all(
                    waveform::offset_to_position(offset, DEFAULT_PIXELS_PER_SECOND),
                )),
                Some(Event::Add(path)) => add_track(&mut transport, Path::new(&path)),
                Some(Event::Remove(position)) => {
                    let id = position
                        .checked_sub(1)
                        .and_then(|i| transport.list_tracks().get(i).map(|info| info.id));
                    match id {
                        Some(id) => {
                            transport.remove_track(id);
                        }
                        None => println!("No track at position {}.", position),
                    }
                }
                Some(Event::List) => print_tracks(&transport),
                Some(Event::Quit) | None => break,
                Some(other) => warn!(event = ?other, "Not a transport command"),
            },
        }
    }

    report(transport.stop());
    driver.await??;
    Ok(())
}

fn add_track(transport: &mut Transport, path: &Path) {
    if let Err(e) = transport.add_track(path) {
        println!("Unable to add {}: {}", path.display(), e);
    }
}

fn print_tracks(transport: &Transport) {
    println!("Tracks ({}):", transport.time_display());
    for (i, info) in transport.list_tracks().iter().enumerate() {
        println!(
            "{}. {} ({}/{}){}",
            i + 1,
            info.name,
            util::duration_minutes_seconds(info.position),
            util::duration_minutes_seconds(info.duration),
            if info.is_master { " [master]" } else { "" }
        );
    }
}

/// Plays the synthesizer from stdin until quit.
async fn piano(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let audio_device = settings.audio().map(audio::get_device).transpose()?;
    let midi_device = settings
        .midi()
        .map(|midi_config| midi::get_device(midi_config.device()))
        .transpose()?;
    let midi_channel = settings
        .midi()
        .map(|midi_config| midi_config.wire_channel())
        .unwrap_or(u4::new(0));
    let synth = Synthesizer::from_config(
        settings.synth(),
        audio_device,
        midi_device,
        midi_channel,
    );

    let (events_tx, mut events_rx) = mpsc::channel(16);
    let driver = keyboard::Driver::new().monitor_events(
        events_tx,
        "Keys (notes, +/- octave, mode <mode>, gain <0-1>, off, quit)",
    );
    println!("Note keys: {} (C to B)", NOTE_KEYS);

    while let Some(event) = events_rx.recv().await {
        let settings = synth.settings();
        let result = match event {
            Event::Toggle(note) if synth.is_active(note) => synth.stop(note),
            Event::Toggle(note) => synth.play(note),
            Event::OctaveUp => {
                synth.set_octave(settings.octave.saturating_add(1).min(MAX_OCTAVE));
                Ok(())
            }
            Event::OctaveDown => {
                synth.set_octave(settings.octave.saturating_sub(1));
                Ok(())
            }
            Event::Mode(mode) => {
                synth.set_mode(mode);
                Ok(())
            }
            Event::Gain(gain) => {
                synth.set_gain(gain);
                Ok(())
            }
            Event::AllOff => synth.stop_all(),
            Event::Quit => break,
            other => {
                warn!(event = ?other, "Not a synthesizer command");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{}", e);
        }

        let settings = synth.settings();
        println!(
            "{} octave {} gain {:.2}",
            settings.mode, settings.octave, settings.gain
        );
    }

    report(synth.stop_all());
    driver.await??;
    Ok(())
}

fn report<E: Error>(result: Result<(), E>) {
    if let Err(e) = result {
        println!("{}", e);
    }
}
