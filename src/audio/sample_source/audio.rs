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
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use symphonia::default::get_codecs;
use symphonia::default::get_probe;

use super::error::SampleSourceError;
use super::traits::{duration_to_frames, frames_to_duration, SampleSource};

/// A sample source that reads audio files (WAV, MP3, FLAC, etc.) and provides scaled samples.
/// Decoding is done by symphonia; samples are handed out in planar chunks.
pub struct AudioSampleSource {
    path: PathBuf,
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    is_finished: bool,
    // Interleaved samples from the last decoded packet that haven't been handed out yet.
    leftover_samples: Vec<f32>,
    leftover_position: usize,
    // Frames to discard after an accurate seek lands before the requested timestamp.
    pending_skip: u64,
    frames_read: u64,
    buffer_size: usize,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let channels = self.channels as usize;
        if output.len() != channels {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "Output has {} channels, expected {}",
                output.len(),
                channels
            )));
        }

        for ch in output.iter_mut() {
            ch.clear();
        }

        let mut written = 0;
        while written < max_frames && !self.is_finished {
            if self.leftover_position >= self.leftover_samples.len() {
                if !self.refill_buffer()? {
                    self.is_finished = true;
                    break;
                }
                continue;
            }

            let available = (self.leftover_samples.len() - self.leftover_position) / channels;
            if self.pending_skip > 0 {
                let skipped = (self.pending_skip as usize).min(available);
                self.leftover_position += skipped * channels;
                self.pending_skip -= skipped as u64;
                continue;
            }

            let to_take = available.min(max_frames - written);
            for frame in 0..to_take {
                let base = self.leftover_position + frame * channels;
                for (ch_idx, out_ch) in output.iter_mut().enumerate() {
                    out_ch.push(self.leftover_samples[base + ch_idx]);
                }
            }
            self.leftover_position += to_take * channels;
            written += to_take;
        }

        self.frames_read += written as u64;
        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn position(&self) -> Duration {
        frames_to_duration(self.frames_read, self.sample_rate)
    }

    fn seek(&mut self, position: Duration) -> Result<(), SampleSourceError> {
        let position = match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        };

        self.leftover_samples.clear();
        self.leftover_position = 0;
        self.pending_skip = 0;

        if self.duration.is_some_and(|duration| position >= duration) {
            // Nothing left to decode, so park the source at its end.
            self.is_finished = true;
            self.frames_read = duration_to_frames(position, self.sample_rate);
            return Ok(());
        }

        let seek_to = SeekTo::Time {
            time: Time::new(position.as_secs(), position.subsec_nanos() as f64 / 1e9),
            track_id: Some(self.track_id),
        };
        let seeked = self
            .format_reader
            .seek(SeekMode::Accurate, seek_to)
            .map_err(|e| SampleSourceError::SeekFailed(position, e.to_string()))?;
        self.decoder.reset();

        let skip_ts = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.pending_skip = match self.time_base {
            Some(time_base) => {
                let skip = time_base.calc_time(skip_ts);
                ((skip.seconds as f64 + skip.frac) * self.sample_rate as f64).round() as u64
            }
            None => skip_ts,
        };
        self.is_finished = false;
        self.frames_read = duration_to_frames(position, self.sample_rate);
        Ok(())
    }
}

impl AudioSampleSource {
    /// Creates a new audio sample source from a file path.
    /// Supports WAV, MP3, FLAC, and other formats supported by symphonia.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> Result<Self, SampleSourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| SampleSourceError::Open {
            path: path.clone(),
            source: e,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| SampleSourceError::Unsupported(path.clone(), e.to_string()))?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::Unsupported(path.clone(), "no audio track found".to_string())
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::Unsupported(path.clone(), "sample rate not specified".to_string())
        })?;

        let duration = params
            .n_frames
            .map(|n_frames| frames_to_duration(n_frames, sample_rate));

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs()
            .make(&params, &decoder_opts)
            .map_err(|e| SampleSourceError::Unsupported(path.clone(), e.to_string()))?;

        // Prefer container metadata for the channel count. If it's missing, decode the
        // first packet and keep its samples as the start of the stream.
        let (channels, leftover_samples) = match params.channels {
            Some(channels) if channels.count() > 0 => (channels.count() as u16, Vec::new()),
            _ => match Self::read_and_decode_next_packet_for_track(
                format_reader.as_mut(),
                decoder.as_mut(),
                track_id,
            )? {
                Some((samples, channels)) => (channels as u16, samples),
                None => {
                    return Err(SampleSourceError::Unsupported(
                        path,
                        "channels not specified".to_string(),
                    ))
                }
            },
        };

        Ok(Self {
            path,
            format_reader,
            decoder,
            track_id,
            time_base: params.time_base,
            is_finished: false,
            leftover_samples,
            leftover_position: 0,
            pending_skip: 0,
            frames_read: 0,
            buffer_size: buffer_size.max(1),
            channels,
            sample_rate,
            duration,
        })
    }

    /// The file this source decodes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Helper function to read the next packet with common error handling.
    /// Returns:
    /// - `Ok(Some(packet))` if a packet was successfully read
    /// - `Ok(None)` if EOF was reached (UnexpectedEof or DecodeError)
    /// - `Err(...)` if an error occurred that should be returned
    ///
    /// ResetRequired errors are propagated to callers so they can reset the decoder.
    fn read_next_packet(
        format_reader: &mut dyn FormatReader,
    ) -> Result<Option<Packet>, SampleSourceError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                Err(SampleSourceError::AudioError(SymphoniaError::ResetRequired))
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            // Some decoders return DecodeError at EOF instead of IoError
            Err(SymphoniaError::DecodeError(_)) => Ok(None),
            Err(e) => Err(SampleSourceError::AudioError(e)),
        }
    }

    /// Reads and decodes the next packet for the given track. Handles ResetRequired by
    /// resetting the decoder and retrying. Returns `Ok(Some((samples, channels)))` when
    /// a packet was decoded, `Ok(None)` on EOF, or `Err` on other errors.
    fn read_and_decode_next_packet_for_track(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn Decoder,
        track_id: u32,
    ) -> Result<Option<(Vec<f32>, usize)>, SampleSourceError> {
        loop {
            let packet = match Self::read_next_packet(format_reader) {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(None),
                Err(SampleSourceError::AudioError(SymphoniaError::ResetRequired)) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                Err(e) => return Err(SampleSourceError::AudioError(e)),
            };
            let (samples, channels) = Self::decode_buffer_to_f32(decoded);
            // Header packets (Ogg/Vorbis) can decode to zero frames.
            if channels > 0 && !samples.is_empty() {
                return Ok(Some((samples, channels)));
            }
        }
    }

    /// Decodes packets until at least buffer_size frames are waiting. Returns false at EOF
    /// when nothing could be read.
    fn refill_buffer(&mut self) -> Result<bool, SampleSourceError> {
        self.leftover_samples.clear();
        self.leftover_position = 0;

        let channels = self.channels as usize;
        let target_samples = self.buffer_size * channels;
        while self.leftover_samples.len() < target_samples {
            match Self::read_and_decode_next_packet_for_track(
                self.format_reader.as_mut(),
                self.decoder.as_mut(),
                self.track_id,
            )? {
                Some((samples, decoded_channels)) => {
                    if decoded_channels != channels {
                        return Err(SampleSourceError::SampleConversionFailed(format!(
                            "{}: packet has {} channels, expected {}",
                            self.path.display(),
                            decoded_channels,
                            channels
                        )));
                    }
                    self.leftover_samples.extend_from_slice(&samples);
                }
                None => break,
            }
        }

        Ok(!self.leftover_samples.is_empty())
    }

    /// Converts a decoded AudioBufferRef to a Vec<f32> of interleaved samples
    /// and returns the channel count as observed in the decoded buffer.
    fn decode_buffer_to_f32(decoded: AudioBufferRef) -> (Vec<f32>, usize) {
        match decoded {
            AudioBufferRef::F32(buf) => Self::interleave_planar_samples(&buf, |sample| sample),
            AudioBufferRef::F64(buf) => {
                Self::interleave_planar_samples(&buf, |sample| sample as f32)
            }
            AudioBufferRef::S8(buf) => Self::interleave_planar_samples(&buf, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::interleave_planar_samples(&buf, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::interleave_planar_samples(&buf, |sample| Self::scale_s24(sample.inner()))
            }
            AudioBufferRef::S32(buf) => Self::interleave_planar_samples(&buf, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::interleave_planar_samples(&buf, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::interleave_planar_samples(&buf, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::interleave_planar_samples(&buf, |sample| Self::scale_u24(sample.inner()))
            }
            AudioBufferRef::U32(buf) => Self::interleave_planar_samples(&buf, Self::scale_u32),
        }
    }

    /// Helper to interleave planar samples from a generic AudioBuffer.
    fn interleave_planar_samples<T, F>(buf: &AudioBuffer<T>, convert: F) -> (Vec<f32>, usize)
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        let channels = buf.spec().channels.count();
        let planes = buf.planes();
        let mut samples = Vec::with_capacity(frames * channels);
        for frame_idx in 0..frames {
            for plane in planes.planes().iter().take(channels) {
                samples.push(convert(plane[frame_idx]));
            }
        }
        (samples, channels)
    }

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}
