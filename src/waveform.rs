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
use std::{path::Path, time::Duration};

use tracing::debug;

use crate::audio::sample_source::{
    create_sample_source_from_file, SampleSource, SampleSourceError,
};
use crate::track::Track;
use crate::util::filename_display;

/// Columns per second of audio when nothing else is asked for.
pub const DEFAULT_PIXELS_PER_SECOND: u32 = 10;

const RENDER_LEVELS: &[u8] = b" .:-=+*#";

#[derive(Debug, thiserror::Error)]
pub enum WaveformError {
    #[error(transparent)]
    Source(#[from] SampleSourceError),

    #[error("pixels per second must be greater than zero")]
    InvalidResolution,
}

/// The loudest positive and negative samples within one column.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Peak {
    /// Never below zero.
    pub top: f32,
    /// Never above zero.
    pub bottom: f32,
}

impl Peak {
    fn include(&mut self, sample: f32) {
        self.top = self.top.max(sample);
        self.bottom = self.bottom.min(sample);
    }

    /// The larger of the two magnitudes.
    pub fn magnitude(&self) -> f32 {
        self.top.max(-self.bottom)
    }
}

/// A peak profile of a whole file, one column per slice of time.
#[derive(Clone, Debug, PartialEq)]
pub struct Peaks {
    columns: Vec<Peak>,
    pixels_per_second: u32,
}

impl Peaks {
    /// Decodes the file with its own source. A file that is playing elsewhere is unaffected.
    pub fn from_file(
        path: &Path,
        pixels_per_second: u32,
        buffer_size: usize,
    ) -> Result<Peaks, WaveformError> {
        let mut source = create_sample_source_from_file(path, buffer_size)?;
        let peaks = Peaks::from_source(&mut source, pixels_per_second)?;
        debug!(
            file = filename_display(path),
            columns = peaks.columns.len(),
            "Computed peaks."
        );
        Ok(peaks)
    }

    /// Decodes the track's file again. The track's own source is never read, so playback
    /// is unaffected.
    pub fn from_track(
        track: &Track,
        pixels_per_second: u32,
        buffer_size: usize,
    ) -> Result<Peaks, WaveformError> {
        Peaks::from_file(track.path(), pixels_per_second, buffer_size)
    }

    /// Reads the source from its current position to the end. Every channel contributes
    /// to the same column.
    pub fn from_source<S: SampleSource + ?Sized>(
        source: &mut S,
        pixels_per_second: u32,
    ) -> Result<Peaks, WaveformError> {
        if pixels_per_second == 0 {
            return Err(WaveformError::InvalidResolution);
        }

        let frames_per_column = (source.sample_rate() / pixels_per_second).max(1) as usize;
        let mut buffers = vec![Vec::new(); source.channel_count() as usize];
        let mut columns = Vec::new();
        let mut current = Peak::default();
        let mut filled = 0;

        loop {
            let frames = source.next_chunk(&mut buffers, frames_per_column * 16)?;
            if frames == 0 {
                break;
            }

            for frame in 0..frames {
                for channel in buffers.iter() {
                    current.include(channel[frame]);
                }
                filled += 1;
                if filled == frames_per_column {
                    columns.push(current);
                    current = Peak::default();
                    filled = 0;
                }
            }
        }
        if filled > 0 {
            columns.push(current);
        }

        Ok(Peaks {
            columns,
            pixels_per_second,
        })
    }

    pub fn columns(&self) -> &[Peak] {
        &self.columns
    }

    pub fn pixels_per_second(&self) -> u32 {
        self.pixels_per_second
    }

    /// Renders one character per column, denser for louder columns.
    pub fn render(&self) -> String {
        let top = RENDER_LEVELS.len() - 1;
        self.columns
            .iter()
            .map(|peak| {
                let level = (peak.magnitude().clamp(0.0, 1.0) * top as f32).round() as usize;
                RENDER_LEVELS[level.min(top)] as char
            })
            .collect()
    }
}

/// The time at a column offset, for scrubbing.
pub fn offset_to_position(offset: u32, pixels_per_second: u32) -> Duration {
    if pixels_per_second == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(offset as f64 / pixels_per_second as f64)
}

/// The column a position falls in.
pub fn position_to_offset(position: Duration, pixels_per_second: u32) -> u32 {
    (position.as_secs_f64() * pixels_per_second as f64).floor() as u32
}
