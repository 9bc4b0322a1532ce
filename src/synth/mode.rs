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
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("unknown synthesizer mode {0}")]
    Unknown(String),

    #[error("mode index {0} is out of range, must be 0-6")]
    OutOfRange(u8),
}

/// A signal shape the waveform generators can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
    PinkNoise,
    WhiteNoise,
}

impl Waveform {
    /// Samples a periodic waveform at the given phase in [0, 1). Noise has no phase and
    /// returns silence here.
    pub fn sample(self, phase: f64) -> f32 {
        let value = match self {
            Waveform::Sine => (std::f64::consts::TAU * phase).sin(),
            Waveform::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::PinkNoise | Waveform::WhiteNoise => 0.0,
        };
        value as f32
    }

    pub fn is_noise(self) -> bool {
        matches!(self, Waveform::PinkNoise | Waveform::WhiteNoise)
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::PinkNoise => "pink noise",
            Waveform::WhiteNoise => "white noise",
        };
        write!(f, "{}", name)
    }
}

/// Selects how the synthesizer makes sound: through a MIDI device or by generating a
/// waveform directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Midi,
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    PinkNoise,
    WhiteNoise,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Midi,
        Mode::Sine,
        Mode::Triangle,
        Mode::Square,
        Mode::Sawtooth,
        Mode::PinkNoise,
        Mode::WhiteNoise,
    ];

    /// The waveform generated in this mode. None for MIDI.
    pub fn waveform(self) -> Option<Waveform> {
        match self {
            Mode::Midi => None,
            Mode::Sine => Some(Waveform::Sine),
            Mode::Triangle => Some(Waveform::Triangle),
            Mode::Square => Some(Waveform::Square),
            Mode::Sawtooth => Some(Waveform::Sawtooth),
            Mode::PinkNoise => Some(Waveform::PinkNoise),
            Mode::WhiteNoise => Some(Waveform::WhiteNoise),
        }
    }

    pub fn is_midi(self) -> bool {
        self == Mode::Midi
    }
}

impl TryFrom<u8> for Mode {
    type Error = ModeError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Mode::ALL
            .get(index as usize)
            .copied()
            .ok_or(ModeError::OutOfRange(index))
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "midi" => Ok(Mode::Midi),
            "sine" => Ok(Mode::Sine),
            "triangle" => Ok(Mode::Triangle),
            "square" => Ok(Mode::Square),
            "sawtooth" | "saw" => Ok(Mode::Sawtooth),
            "pink_noise" | "pink" => Ok(Mode::PinkNoise),
            "white_noise" | "white" => Ok(Mode::WhiteNoise),
            _ => Err(ModeError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.waveform() {
            Some(waveform) => write!(f, "{}", waveform),
            None => write!(f, "MIDI"),
        }
    }
}
