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

/// A seekable source of audio samples that produces chunks in planar format.
/// Planar format stores all samples for channel 0, then all samples for channel 1, etc.
pub trait SampleSource: Send {
    /// Get the next chunk of samples from the source in planar format.
    /// Each inner Vec corresponds to one channel and is cleared before being filled
    /// with up to max_frames samples. Returns the number of frames written (0 = EOF).
    ///
    /// The output slice must have exactly channel_count() elements.
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError>;

    /// Get the number of channels in this source
    fn channel_count(&self) -> u16;

    /// Get the sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get the duration of this source.
    /// Returns None if the duration is unknown or infinite.
    fn duration(&self) -> Option<Duration>;

    /// The position of the next frame that next_chunk will return.
    fn position(&self) -> Duration;

    /// Moves the read position. Positions past the end hold the source at its end.
    fn seek(&mut self, position: Duration) -> Result<(), SampleSourceError>;
}

/// Blanket implementation for Box<dyn SampleSource> so boxed sources can be passed
/// to generic functions that require S: SampleSource.
impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn seek(&mut self, position: Duration) -> Result<(), SampleSourceError> {
        (**self).seek(position)
    }
}

/// Converts a frame count at the given sample rate into a duration.
pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}

/// Converts a duration into a frame count at the given sample rate, rounding down.
pub fn duration_to_frames(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).round() as u64
}
