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

use super::error::SampleSourceError;
use super::traits::{duration_to_frames, frames_to_duration, SampleSource};

/// Interleaved samples held in memory. Used as a stand-in for decoded files.
pub struct MemorySampleSource {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    frame: usize,
}

impl MemorySampleSource {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> MemorySampleSource {
        assert!(channels > 0, "a source needs at least one channel");
        MemorySampleSource {
            samples,
            channels,
            sample_rate,
            frame: 0,
        }
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

impl SampleSource for MemorySampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let channels = self.channels as usize;
        if output.len() != channels {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "expected {} output channels, got {}",
                channels,
                output.len()
            )));
        }

        let count = self.frames().saturating_sub(self.frame).min(max_frames);
        let start = self.frame * channels;
        let frames = &self.samples[start..start + count * channels];
        for (channel, out) in output.iter_mut().enumerate() {
            out.clear();
            out.extend(frames.iter().skip(channel).step_by(channels));
        }
        self.frame += count;

        Ok(count)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(frames_to_duration(self.frames() as u64, self.sample_rate))
    }

    fn position(&self) -> Duration {
        frames_to_duration(self.frame as u64, self.sample_rate)
    }

    fn seek(&mut self, position: Duration) -> Result<(), SampleSourceError> {
        self.frame = (duration_to_frames(position, self.sample_rate) as usize).min(self.frames());
        Ok(())
    }
}
