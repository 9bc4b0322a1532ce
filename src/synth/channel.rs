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
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::{self, share, Sink};

use super::generator::{GeneratorSettings, SignalGenerator};
use super::SynthError;

/// One note's path to the audio device. Each start binds a fresh generator, so
/// reconfiguring never touches a sound that's already playing.
pub struct NoteChannel {
    device: Arc<dyn audio::Device>,
    settings: Option<GeneratorSettings>,
    sink: Option<Box<dyn Sink>>,
}

impl NoteChannel {
    pub fn new(device: Arc<dyn audio::Device>) -> NoteChannel {
        NoteChannel {
            device,
            settings: None,
            sink: None,
        }
    }

    /// Sets what the next start will play.
    pub fn configure(&mut self, settings: GeneratorSettings) {
        self.settings = Some(settings);
    }

    pub fn settings(&self) -> Option<GeneratorSettings> {
        self.settings
    }

    /// Starts playing the configured signal, replacing anything already sounding.
    pub fn start(&mut self) -> Result<(), SynthError> {
        let settings = self.settings.ok_or(SynthError::NotConfigured)?;
        self.stop();

        let generator = SignalGenerator::new(settings, self.device.sample_rate());
        let mut sink = self.device.bind(share(Box::new(generator)))?;
        sink.play()?;
        self.sink = Some(sink);
        Ok(())
    }

    /// Silences the channel. Safe to call when nothing is playing.
    pub fn stop(&mut self) {
        let Some(mut sink) = self.sink.take() else {
            return;
        };
        if let Err(e) = sink.stop() {
            // Dropping the sink still detaches it from the mixer.
            warn!(err = %e, "Error stopping note channel");
        }
        debug!(device = self.device.name(), "Note channel stopped");
    }

    pub fn is_sounding(&self) -> bool {
        self.sink.is_some()
    }
}
