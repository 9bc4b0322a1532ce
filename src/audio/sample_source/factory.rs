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
use std::path::Path;

use tracing::debug;

use super::audio::AudioSampleSource;
use super::error::SampleSourceError;
use super::traits::SampleSource;

/// Opens a decoded source for the file. The container format is probed from the file
/// contents, with the extension as a hint.
pub fn create_sample_source_from_file<P: AsRef<Path>>(
    path: P,
    buffer_size: usize,
) -> Result<Box<dyn SampleSource>, SampleSourceError> {
    let path = path.as_ref();
    if path.is_dir() {
        return Err(SampleSourceError::Unsupported(
            path.to_path_buf(),
            "path is a directory".to_string(),
        ));
    }

    let source = AudioSampleSource::from_file(path, buffer_size)?;
    debug!(
        path = %path.display(),
        channels = source.channel_count(),
        sample_rate = source.sample_rate(),
        "Opened sample source."
    );
    Ok(Box::new(source))
}
