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
use std::{fmt, sync::Arc};

use midly::live::LiveEvent;

pub mod midir;
pub mod mock;

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("unable to initialize MIDI: {0}")]
    Init(String),

    #[error("no MIDI device found with name {0}")]
    NotFound(String),

    #[error("found too many MIDI devices that match ({0}), use a less ambiguous device name")]
    Ambiguous(String),

    #[error("MIDI device {0} has no output port")]
    NoOutput(String),

    #[error("unable to connect to MIDI device {device}: {message}")]
    Connect { device: String, message: String },

    #[error("unable to send MIDI event: {0}")]
    Send(String),

    #[error("unable to encode MIDI event: {0}")]
    Encode(#[from] std::io::Error),
}

/// A MIDI output device.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Emits an event.
    fn emit(&self, event: LiveEvent<'static>) -> Result<(), MidiError>;
}

/// Encodes an event into its wire bytes.
pub fn encode(event: &LiveEvent<'_>) -> Result<Vec<u8>, MidiError> {
    // Channel messages are at most 3 bytes.
    let mut buf: Vec<u8> = Vec::with_capacity(3);
    event.write_std(&mut buf)?;
    Ok(buf)
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, MidiError> {
    midir::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, MidiError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}
