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
use midly::num::u4;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

const DEFAULT_CHANNEL: u8 = 1;

/// A YAML representation of the MIDI output configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Midi {
    /// The MIDI output device. Matched by substring; names starting with "mock" select a
    /// mock device.
    device: String,

    /// The channel notes are sent on, 1-16 (default: 1)
    channel: Option<u8>,
}

impl Midi {
    pub fn new(device: &str) -> Midi {
        Midi {
            device: device.to_string(),
            channel: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the channel as configured, 1-16.
    pub fn channel(&self) -> u8 {
        self.channel.unwrap_or(DEFAULT_CHANNEL)
    }

    /// Returns the zero based channel used on the wire.
    pub fn wire_channel(&self) -> u4 {
        u4::new(self.channel().clamp(1, 16) - 1)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=16).contains(&self.channel()) {
            return Err(ConfigError::Invalid(format!(
                "MIDI channel {} must be between 1 and 16",
                self.channel()
            )));
        }
        Ok(())
    }
}
