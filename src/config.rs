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
use std::path::Path;

use serde::{Deserialize, Serialize};

mod audio;
mod error;
mod midi;
mod synth;
mod transport;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::midi::Midi;
pub use self::synth::Synth;
pub use self::transport::Transport;

/// Environment variables with this prefix override the file, e.g. PIANODECK_SYNTH__GAIN.
const ENV_PREFIX: &str = "PIANODECK";

/// The full configuration file.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Settings {
    /// The audio output. Required for waveform modes and track playback.
    audio: Option<Audio>,

    /// The MIDI output. Required for MIDI mode.
    midi: Option<Midi>,

    #[serde(default)]
    synth: Synth,

    #[serde(default)]
    transport: Transport,
}

impl Settings {
    /// Loads and validates the configuration at the given path, with environment overrides.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let settings: Settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses and validates YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }
        if let Some(midi) = &self.midi {
            midi.validate()?;
        }
        self.synth.validate()?;
        self.transport.validate()
    }

    pub fn audio(&self) -> Option<&Audio> {
        self.audio.as_ref()
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    pub fn synth(&self) -> &Synth {
        &self.synth
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}
