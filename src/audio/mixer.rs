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
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::error;

use crate::audio::sample_source::Transcoder;
use crate::audio::{AudioError, SharedSource, Sink, SinkState};

const STOPPED: u8 = 0;
const PLAYING: u8 = 1;
const PAUSED: u8 = 2;

/// State shared between a sink handle and the mixer input it controls.
#[derive(Default)]
pub struct SinkControl {
    state: AtomicU8,
    closed: AtomicBool,
    flush: AtomicBool,
}

impl SinkControl {
    pub fn state(&self) -> SinkState {
        match self.state.load(Ordering::Acquire) {
            PLAYING => SinkState::Playing,
            PAUSED => SinkState::Paused,
            _ => SinkState::Stopped,
        }
    }

    fn set_state(&self, state: SinkState) {
        let value = match state {
            SinkState::Stopped => STOPPED,
            SinkState::Playing => PLAYING,
            SinkState::Paused => PAUSED,
        };
        self.state.store(value, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The sink handed out by both the cpal and mock devices. Dropping it detaches the source
/// from the mixer.
pub struct MixerSink {
    control: Arc<SinkControl>,
    device_name: String,
    online: Arc<AtomicBool>,
}

impl MixerSink {
    pub fn new(control: Arc<SinkControl>, device_name: String, online: Arc<AtomicBool>) -> Self {
        Self {
            control,
            device_name,
            online,
        }
    }

    fn transition(&mut self, state: SinkState) -> Result<(), AudioError> {
        if self.control.is_closed() {
            return Err(AudioError::SinkClosed);
        }
        if !self.online.load(Ordering::Acquire) {
            return Err(AudioError::DeviceUnavailable(self.device_name.clone()));
        }
        self.control.set_state(state);
        Ok(())
    }
}

impl Sink for MixerSink {
    fn play(&mut self) -> Result<(), AudioError> {
        self.transition(SinkState::Playing)
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.transition(SinkState::Paused)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.transition(SinkState::Stopped)
    }

    fn reset(&mut self) {
        self.control.flush.store(true, Ordering::Release);
    }

    fn state(&self) -> SinkState {
        self.control.state()
    }
}

impl Drop for MixerSink {
    fn drop(&mut self) {
        self.control.set_state(SinkState::Stopped);
        self.control.closed.store(true, Ordering::Release);
    }
}

/// A source attached to the mixer. Sources at a different rate from the mixer are
/// resampled by a transcoder. Mono sources feed every output channel, otherwise output
/// channel c takes source channel c.
pub struct MixerInput {
    source: SharedSource,
    control: Arc<SinkControl>,
    transcoder: Transcoder,
    scratch: Vec<Vec<f32>>,
    exhausted: bool,
    failed: bool,
}

impl MixerInput {
    pub fn new(
        source: SharedSource,
        control: Arc<SinkControl>,
        output_sample_rate: u32,
    ) -> Result<Self, AudioError> {
        let (channels, source_rate) = {
            let source = source.lock();
            (source.channel_count() as usize, source.sample_rate())
        };
        let transcoder = Transcoder::new(source_rate, output_sample_rate, channels)
            .map_err(|e| AudioError::Unsupported(e.to_string()))?;

        Ok(Self {
            source,
            control,
            transcoder,
            scratch: vec![Vec::new(); channels],
            exhausted: false,
            failed: false,
        })
    }

    fn reset(&mut self) {
        if let Err(e) = self.transcoder.reset() {
            error!(err = %e, "Error resetting transcoder");
            self.failed = true;
            self.exhausted = true;
            return;
        }
        self.exhausted = false;
        self.failed = false;
    }

    /// Adds this input's next frames onto the interleaved output. Only as many source
    /// frames as are played are read when no resampling is needed.
    fn mix_into(&mut self, output: &mut [f32], num_channels: usize, frames: usize) {
        if self.control.flush.swap(false, Ordering::AcqRel) {
            self.reset();
        }
        if self.control.state() != SinkState::Playing {
            return;
        }

        let mut source = self.source.lock();
        let mut written = 0;
        while written < frames && !self.exhausted {
            let wanted = frames - written;
            match self
                .transcoder
                .next_chunk(&mut **source, &mut self.scratch, wanted)
            {
                Ok(0) => self.exhausted = true,
                Ok(read) => {
                    add_frames(
                        &mut output[written * num_channels..],
                        num_channels,
                        &self.scratch,
                        read,
                    );
                    written += read;
                }
                Err(e) => {
                    if !self.failed {
                        error!(err = %e, "Error reading from audio source");
                    }
                    self.failed = true;
                    self.exhausted = true;
                }
            }
        }
    }
}

/// Sums planar frames onto interleaved output.
fn add_frames(output: &mut [f32], num_channels: usize, planar: &[Vec<f32>], frames: usize) {
    if num_channels == 0 {
        return;
    }
    for (frame, out) in output
        .chunks_exact_mut(num_channels)
        .take(frames)
        .enumerate()
    {
        for (out_ch, sample) in out.iter_mut().enumerate() {
            let src_ch = if planar.len() == 1 { 0 } else { out_ch };
            if let Some(value) = planar.get(src_ch).and_then(|plane| plane.get(frame)) {
                *sample += value;
            }
        }
    }
}

/// Core audio mixing logic that's independent of any audio backend
pub struct AudioMixer {
    inputs: Vec<MixerInput>,
    num_channels: u16,
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            inputs: Vec::new(),
            num_channels,
            sample_rate,
        }
    }

    pub fn add_input(&mut self, input: MixerInput) {
        self.inputs.push(input);
    }

    /// Mixes the given number of frames into the interleaved output buffer. Inputs whose
    /// sinks have been dropped are removed.
    pub fn process_into_output(&mut self, output: &mut [f32], frames: usize) {
        let num_channels = self.num_channels as usize;
        let frames = frames.min(output.len() / num_channels.max(1));
        output.fill(0.0);

        self.inputs.retain(|input| !input.control.is_closed());
        for input in self.inputs.iter_mut() {
            input.mix_into(output, num_channels, frames);
        }
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of inputs still attached.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::audio::sample_source::MemorySampleSource;
    use crate::audio::share;

    fn attach(
        mixer: &mut AudioMixer,
        samples: Vec<f32>,
        channels: u16,
        sample_rate: u32,
    ) -> (MixerSink, SharedSource) {
        let source = share(Box::new(MemorySampleSource::new(
            samples,
            channels,
            sample_rate,
        )));
        let control = Arc::new(SinkControl::default());
        let input = MixerInput::new(source.clone(), control.clone(), mixer.sample_rate())
            .expect("mixer input");
        mixer.add_input(input);
        let sink = MixerSink::new(control, "test".to_string(), Arc::new(AtomicBool::new(true)));
        (sink, source)
    }

    #[test]
    fn test_basic_mixing() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(2, 44100);
        let (mut sink, _) = attach(&mut mixer, vec![0.5, 0.8], 1, 44100);
        sink.play()?;

        let mut output = vec![1.0; 6];
        mixer.process_into_output(&mut output, 3);

        // Mono goes to both channels, then silence once the source runs out.
        assert_eq!(output, vec![0.5, 0.5, 0.8, 0.8, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_multiple_source_mixing() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(2, 44100);
        let (mut sink1, _) = attach(&mut mixer, vec![0.5, 0.25], 2, 44100);
        let (mut sink2, _) = attach(&mut mixer, vec![0.25, 0.125], 2, 44100);
        sink1.play()?;
        sink2.play()?;

        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output, 1);
        assert_eq!(output, vec![0.75, 0.375]);
        Ok(())
    }

    #[test]
    fn test_paused_and_stopped_are_silent() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(1, 1000);
        let (mut sink, source) = attach(&mut mixer, vec![0.5; 100], 1, 1000);

        let mut output = vec![0.0; 10];
        mixer.process_into_output(&mut output, 10);
        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(source.lock().position(), Duration::ZERO);

        sink.play()?;
        mixer.process_into_output(&mut output, 10);
        assert!(output.iter().all(|s| *s == 0.5));

        sink.pause()?;
        let paused_at = source.lock().position();
        mixer.process_into_output(&mut output, 10);
        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(source.lock().position(), paused_at);
        assert_eq!(sink.state(), SinkState::Paused);
        Ok(())
    }

    #[test]
    fn test_dropped_sink_is_removed() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(1, 1000);
        let (mut sink, _) = attach(&mut mixer, vec![0.5; 100], 1, 1000);
        sink.play()?;
        assert_eq!(mixer.input_count(), 1);

        drop(sink);
        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output, 4);
        assert_eq!(mixer.input_count(), 0);
        assert!(output.iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn test_offline_device_rejects_transitions() {
        let online = Arc::new(AtomicBool::new(false));
        let mut sink = MixerSink::new(
            Arc::new(SinkControl::default()),
            "gone".to_string(),
            online.clone(),
        );
        assert!(matches!(sink.play(), Err(AudioError::DeviceUnavailable(_))));
        assert_eq!(sink.state(), SinkState::Stopped);

        online.store(true, Ordering::Release);
        assert!(sink.play().is_ok());
        assert_eq!(sink.state(), SinkState::Playing);
    }

    #[test]
    fn test_resampled_input_holds_level() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(1, 2000);
        let (mut sink, _) = attach(&mut mixer, vec![0.5; 2000], 1, 1000);
        sink.play()?;

        let mut output = vec![0.0; 4000];
        mixer.process_into_output(&mut output, 4000);
        for sample in &output[1500..3500] {
            assert!((sample - 0.5).abs() < 0.01, "sample {}", sample);
        }
        Ok(())
    }

    #[test]
    fn test_position_matches_frames_played() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(2, 1000);
        let (mut sink, source) = attach(&mut mixer, vec![0.25; 2000], 1, 1000);
        sink.play()?;

        let mut output = vec![0.0; 600];
        mixer.process_into_output(&mut output, 300);
        assert_eq!(source.lock().position(), Duration::from_millis(300));
        mixer.process_into_output(&mut output, 7);
        assert_eq!(source.lock().position(), Duration::from_millis(307));
        Ok(())
    }

    #[test]
    fn test_reset_discards_buffered_frames() -> Result<(), AudioError> {
        let mut mixer = AudioMixer::new(1, 1000);
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let (mut sink, source) = attach(&mut mixer, samples, 1, 1000);
        sink.play()?;

        let mut output = vec![0.0; 10];
        mixer.process_into_output(&mut output, 10);
        assert_eq!(output[0], 0.0);

        source
            .lock()
            .seek(Duration::from_millis(50))
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        sink.reset();
        mixer.process_into_output(&mut output, 10);
        assert_eq!(output[0], 0.5);
        Ok(())
    }
}
