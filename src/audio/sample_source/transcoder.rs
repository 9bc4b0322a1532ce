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
use rubato::{
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction,
};

use super::error::SampleSourceError;
use super::traits::SampleSource;

/// Input frames the sinc resampler consumes per block.
const INPUT_BLOCK_SIZE: usize = 1024;

fn build_resampler(
    source_rate: u32,
    target_rate: u32,
    channels: usize,
) -> Result<SincFixedIn<f32>, SampleSourceError> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        1.0,
        params,
        INPUT_BLOCK_SIZE,
        channels,
    )
    .map_err(|_| SampleSourceError::ResamplingFailed(source_rate, target_rate))
}

/// Converts a source's frames to the output sample rate. Sources already at the output
/// rate pass straight through without buffering.
///
/// The transcoder doesn't own its source, so the same source can be seeked and queried
/// by its owner between reads. Call `reset` after the source moves.
pub struct Transcoder {
    resampler: Option<SincFixedIn<f32>>,
    source_rate: u32,
    target_rate: u32,
    channels: usize,
    /// Source frames waiting for a full resampler block.
    input: Vec<Vec<f32>>,
    source_finished: bool,
    /// Resampled frames not yet handed out.
    output: Vec<Vec<f32>>,
    resampled: Vec<Vec<f32>>,
    read_buffer: Vec<Vec<f32>>,
}

impl Transcoder {
    pub fn new(
        source_rate: u32,
        target_rate: u32,
        channels: usize,
    ) -> Result<Transcoder, SampleSourceError> {
        let resampler = if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
            None
        } else {
            Some(build_resampler(source_rate, target_rate, channels)?)
        };
        let resampled = resampler
            .as_ref()
            .map(|r| r.output_buffer_allocate(true))
            .unwrap_or_default();

        Ok(Transcoder {
            resampler,
            source_rate,
            target_rate,
            channels,
            input: vec![Vec::new(); channels],
            source_finished: false,
            output: vec![Vec::new(); channels],
            resampled,
            read_buffer: vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels],
        })
    }

    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Source frames read but not yet handed out, in source frames. Always zero when
    /// passing through.
    pub fn buffered_source_frames(&self) -> usize {
        let input = self.input.first().map_or(0, Vec::len);
        let output = self.output.first().map_or(0, Vec::len);
        input + (output as f64 * self.source_rate as f64 / self.target_rate as f64) as usize
    }

    /// Drops everything buffered and starts the resampler over.
    pub fn reset(&mut self) -> Result<(), SampleSourceError> {
        for ch in self.input.iter_mut().chain(self.output.iter_mut()) {
            ch.clear();
        }
        self.source_finished = false;
        if self.resampler.is_some() {
            self.resampler = Some(build_resampler(
                self.source_rate,
                self.target_rate,
                self.channels,
            )?);
        }
        Ok(())
    }

    /// Fills the planar output with up to max_frames frames at the output rate. Returns 0
    /// once the source and the resampler are both drained.
    pub fn next_chunk(
        &mut self,
        source: &mut dyn SampleSource,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        if self.resampler.is_none() {
            return source.next_chunk(output, max_frames);
        }

        if output.len() != self.channels {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "expected {} output channels, got {}",
                self.channels,
                output.len()
            )));
        }
        for ch in output.iter_mut() {
            ch.clear();
        }

        while self.output.first().map_or(0, Vec::len) < max_frames {
            if !self.resample_block(source)? {
                break;
            }
        }

        let count = self.output.first().map_or(0, Vec::len).min(max_frames);
        for (out, fifo) in output.iter_mut().zip(self.output.iter_mut()) {
            out.extend(fifo.drain(..count));
        }
        Ok(count)
    }

    /// Runs one block through the resampler. Returns false when there is nothing left to
    /// resample.
    fn resample_block(&mut self, source: &mut dyn SampleSource) -> Result<bool, SampleSourceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(false);
        };

        let needed = resampler.input_frames_next();
        while !self.source_finished && self.input.first().map_or(0, Vec::len) < needed {
            let wanted = needed - self.input.first().map_or(0, Vec::len);
            let read = source.next_chunk(&mut self.read_buffer, wanted)?;
            if read == 0 {
                self.source_finished = true;
                break;
            }
            for (input, chunk) in self.input.iter_mut().zip(self.read_buffer.iter()) {
                input.extend_from_slice(&chunk[..read.min(chunk.len())]);
            }
        }

        let available = self.input.first().map_or(0, Vec::len);
        let result = if available >= needed {
            resampler.process_into_buffer(&self.input, &mut self.resampled, None)
        } else if available > 0 {
            // The source is finished. The final partial block is padded with silence.
            resampler
                .process_partial_into_buffer(
                    Some(&self.input as &[Vec<f32>]),
                    &mut self.resampled,
                    None,
                )
                .map(|(_, produced)| (available, produced))
        } else {
            return Ok(false);
        };
        let (consumed, produced) = result
            .map_err(|_| SampleSourceError::ResamplingFailed(self.source_rate, self.target_rate))?;

        for ch in self.input.iter_mut() {
            let consumed = consumed.min(ch.len());
            ch.drain(..consumed);
        }
        for (fifo, resampled) in self.output.iter_mut().zip(self.resampled.iter()) {
            fifo.extend_from_slice(&resampled[..produced.min(resampled.len())]);
        }
        Ok(consumed > 0 || produced > 0)
    }
}
