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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::{
    mixer::{AudioMixer, MixerInput, MixerSink, SinkControl},
    AudioError, SharedSource, Sink, SinkState,
};

const MOCK_CHANNELS: u16 = 2;

/// A handle onto a sink the mock device has handed out.
#[derive(Clone)]
pub struct SinkHandle {
    control: Arc<SinkControl>,
    online: Arc<AtomicBool>,
}

impl SinkHandle {
    pub fn state(&self) -> SinkState {
        self.control.state()
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// Taking a sink offline makes its transitions fail as if its device went away.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

/// A mock device. Nothing is sent to hardware; output is only produced when rendered.
pub struct Device {
    name: String,
    sample_rate: u32,
    online: AtomicBool,
    mixer: Mutex<AudioMixer>,
    sinks: Mutex<Vec<SinkHandle>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            online: AtomicBool::new(true),
            mixer: Mutex::new(AudioMixer::new(MOCK_CHANNELS, sample_rate)),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Controls whether new sources can be bound.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Every sink this device has handed out, oldest first.
    pub fn sinks(&self) -> Vec<SinkHandle> {
        self.sinks.lock().clone()
    }

    /// Sinks that haven't been dropped.
    pub fn open_sinks(&self) -> Vec<SinkHandle> {
        self.sinks
            .lock()
            .iter()
            .filter(|sink| !sink.is_closed())
            .cloned()
            .collect()
    }

    /// Mixes the given number of frames and returns them interleaved.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * MOCK_CHANNELS as usize];
        self.mixer.lock().process_into_output(&mut output, frames);
        output
    }
}

impl crate::audio::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bind(&self, source: SharedSource) -> Result<Box<dyn Sink>, AudioError> {
        if !self.online.load(Ordering::Acquire) {
            return Err(AudioError::DeviceUnavailable(self.name.clone()));
        }

        debug!(device = self.name, "Binding source to mock device");
        let control = Arc::new(SinkControl::default());
        let online = Arc::new(AtomicBool::new(true));
        let input = MixerInput::new(source, control.clone(), self.sample_rate)?;
        self.mixer.lock().add_input(input);
        self.sinks.lock().push(SinkHandle {
            control: control.clone(),
            online: online.clone(),
        });

        Ok(Box::new(MixerSink::new(control, self.name.clone(), online)))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::audio::{sample_source::MemorySampleSource, share, Device as _, SinkState};

    use super::Device;

    #[test]
    fn bind_and_render() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device", 1000);
        let source = share(Box::new(MemorySampleSource::new(vec![0.25; 10], 1, 1000)));
        let mut sink = device.bind(source)?;
        assert_eq!(sink.state(), SinkState::Stopped);
        assert_eq!(device.render(2), vec![0.0; 4]);

        sink.play()?;
        assert_eq!(device.render(2), vec![0.25; 4]);
        assert_eq!(device.open_sinks().len(), 1);

        drop(sink);
        assert!(device.open_sinks().is_empty());
        assert_eq!(device.sinks().len(), 1);
        Ok(())
    }

    #[test]
    fn offline() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device", 1000);
        device.set_online(false);
        let source = share(Box::new(MemorySampleSource::new(vec![0.25; 10], 1, 1000)));
        assert!(device.bind(source.clone()).is_err());

        device.set_online(true);
        let mut sink = device.bind(source)?;
        device.sinks()[0].set_online(false);
        assert!(sink.play().is_err());
        Ok(())
    }
}
