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

use parking_lot::Mutex;

use crate::config;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod sample_source;
mod thread_priority;

use sample_source::SampleSource;

/// A sample source shared between its owner and the mixer that pulls from it. The owner
/// seeks and queries position through the same lock the mixer reads under.
pub type SharedSource = Arc<Mutex<Box<dyn SampleSource>>>;

/// Wraps a sample source so it can be bound to a device.
pub fn share(source: Box<dyn SampleSource>) -> SharedSource {
    Arc::new(Mutex::new(source))
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio device {0} is unavailable")]
    DeviceUnavailable(String),

    #[error("audio device {0} was not found")]
    NotFound(String),

    #[error("found {count} audio devices matching {name}, be more specific")]
    Ambiguous { name: String, count: usize },

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("sink has been closed")]
    SinkClosed,

    #[error("unsupported audio configuration: {0}")]
    Unsupported(String),
}

/// Playback state of a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    Stopped,
    Playing,
    Paused,
}

/// A playback handle for one source bound to a device.
pub trait Sink: Send {
    /// Starts or resumes pulling samples from the bound source.
    fn play(&mut self) -> Result<(), AudioError>;

    /// Holds the bound source at its current position.
    fn pause(&mut self) -> Result<(), AudioError>;

    /// Halts output. Rewinding the source is up to its owner.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Discards anything buffered ahead of the source. Called after the source is repositioned.
    fn reset(&mut self);

    /// The current playback state.
    fn state(&self) -> SinkState;
}

pub trait Device: fmt::Display + Send + Sync {
    /// The name of the device.
    fn name(&self) -> String;

    /// The output sample rate of the device.
    fn sample_rate(&self) -> u32;

    /// Binds a source to the device. The returned sink starts out stopped and detaches the
    /// source from the device when dropped.
    fn bind(&self, source: SharedSource) -> Result<Box<dyn Sink>, AudioError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets a device with the given name.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.sample_rate())));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
