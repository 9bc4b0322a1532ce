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
use serde::{Deserialize, Serialize};

use crate::synth::Mode;

use super::error::ConfigError;

const DEFAULT_GAIN: f32 = 0.5;
const DEFAULT_OCTAVE: u8 = 4;

/// A YAML representation of the synthesizer's starting settings.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Synth {
    /// midi, sine, triangle, square, sawtooth, pink_noise or white_noise (default: sine)
    mode: Option<Mode>,

    /// Output gain and MIDI velocity scale, 0.0-1.0 (default: 0.5)
    gain: Option<f32>,

    /// Starting octave, 0-8 (default: 4)
    octave: Option<u8>,
}

impl Synth {
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    pub fn gain(&self) -> f32 {
        self.gain.unwrap_or(DEFAULT_GAIN)
    }

    pub fn octave(&self) -> u8 {
        self.octave.unwrap_or(DEFAULT_OCTAVE)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !self.gain().is_finite() {
            return Err(ConfigError::Invalid("synth gain must be a number".into()));
        }
        Ok(())
    }
}
