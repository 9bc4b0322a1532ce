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
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::audio::sample_source::{
    duration_to_frames, frames_to_duration, SampleSource, SampleSourceError,
};

use super::mode::Waveform;

/// What a note's generator plays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorSettings {
    pub frequency: f64,
    pub waveform: Waveform,
    pub gain: f32,
}

/// Paul Kellet's refined pink noise filter.
#[derive(Default)]
struct PinkFilter {
    b: [f32; 7],
}

impl PinkFilter {
    fn next(&mut self, white: f32) -> f32 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let pink = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115926;
        // Brings the sum back to roughly unit amplitude.
        pink * 0.11
    }
}

/// An endless mono signal source.
pub struct SignalGenerator {
    settings: GeneratorSettings,
    sample_rate: u32,
    frames: u64,
    rng: StdRng,
    pink: PinkFilter,
}

impl SignalGenerator {
    pub fn new(settings: GeneratorSettings, sample_rate: u32) -> Self {
        Self::with_rng(settings, sample_rate, StdRng::from_entropy())
    }

    /// Creates a generator whose noise is reproducible.
    pub fn with_seed(settings: GeneratorSettings, sample_rate: u32, seed: u64) -> Self {
        Self::with_rng(settings, sample_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: GeneratorSettings, sample_rate: u32, rng: StdRng) -> Self {
        Self {
            settings,
            sample_rate: sample_rate.max(1),
            frames: 0,
            rng,
            pink: PinkFilter::default(),
        }
    }

    pub fn settings(&self) -> GeneratorSettings {
        self.settings
    }

    fn next_value(&mut self, frame: u64) -> f32 {
        let value = match self.settings.waveform {
            Waveform::WhiteNoise => self.rng.gen_range(-1.0f32..1.0),
            Waveform::PinkNoise => {
                let white = self.rng.gen_range(-1.0f32..1.0);
                self.pink.next(white)
            }
            waveform => {
                // Derived from the frame count so the phase doesn't drift.
                let phase =
                    (frame as f64 * self.settings.frequency / self.sample_rate as f64).fract();
                waveform.sample(phase)
            }
        };
        value * self.settings.gain
    }
}

impl SampleSource for SignalGenerator {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let [channel] = output else {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "Output has {} channels, expected 1",
                output.len()
            )));
        };

        channel.clear();
        for frame in self.frames..self.frames + max_frames as u64 {
            let value = self.next_value(frame);
            channel.push(value);
        }
        self.frames += max_frames as u64;
        Ok(max_frames)
    }

    fn channel_count(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn position(&self) -> Duration {
        frames_to_duration(self.frames, self.sample_rate)
    }

    fn seek(&mut self, position: Duration) -> Result<(), SampleSourceError> {
        self.frames = duration_to_frames(position, self.sample_rate);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::time::Duration;

    use crate::audio::sample_source::SampleSource;
    use crate::synth::mode::Waveform;

    use super::{GeneratorSettings, SignalGenerator};

    fn settings(waveform: Waveform) -> GeneratorSettings {
        GeneratorSettings {
            frequency: 100.0,
            waveform,
            gain: 0.5,
        }
    }

    #[test]
    fn square_wave_period_and_gain() -> Result<(), Box<dyn Error>> {
        let mut generator = SignalGenerator::new(settings(Waveform::Square), 1000);
        let mut output = vec![Vec::new()];
        assert_eq!(generator.next_chunk(&mut output, 20)?, 20);

        // 100 Hz at 1 kHz is 10 frames per cycle, half high and half low.
        let expected: Vec<f32> = (0..20)
            .map(|i| if i % 10 < 5 { 0.5 } else { -0.5 })
            .collect();
        assert_eq!(output[0], expected);
        assert_eq!(generator.position(), Duration::from_millis(20));
        assert_eq!(generator.duration(), None);
        Ok(())
    }

    #[test]
    fn noise() -> Result<(), Box<dyn Error>> {
        let mut white = SignalGenerator::with_seed(settings(Waveform::WhiteNoise), 44100, 7);
        let mut output = vec![Vec::new()];
        white.next_chunk(&mut output, 4096)?;
        assert!(output[0].iter().all(|s| s.abs() <= 0.5));
        assert!(output[0].iter().any(|s| *s != 0.0));

        let mut pink = SignalGenerator::with_seed(settings(Waveform::PinkNoise), 44100, 7);
        pink.next_chunk(&mut output, 4096)?;
        assert!(output[0].iter().all(|s| s.is_finite()));
        assert!(output[0].iter().any(|s| *s != 0.0));

        // Same seed, same noise.
        let mut again = SignalGenerator::with_seed(settings(Waveform::PinkNoise), 44100, 7);
        let mut repeat = vec![Vec::new()];
        again.next_chunk(&mut repeat, 4096)?;
        assert_eq!(output, repeat);
        Ok(())
    }

    #[test]
    fn seek_moves_position() -> Result<(), Box<dyn Error>> {
        let mut generator = SignalGenerator::new(settings(Waveform::Sine), 1000);
        generator.seek(Duration::from_millis(250))?;
        assert_eq!(generator.position(), Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let mut generator = SignalGenerator::new(settings(Waveform::Sine), 1000);
        let mut output = vec![Vec::new(), Vec::new()];
        assert!(generator.next_chunk(&mut output, 1).is_err());
    }
}
