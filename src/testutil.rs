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
use std::{error::Error, fs::File, path::Path, time::Duration};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes interleaved 16-bit samples to a WAV file.
pub fn write_wav(
    path: &Path,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a mono WAV file of the given length. Every sample is `value`.
pub fn write_constant_wav(
    path: &Path,
    duration: Duration,
    value: i16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
    write_wav(path, &vec![value; frames], 1, sample_rate)
}
