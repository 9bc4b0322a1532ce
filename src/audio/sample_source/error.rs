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
use std::{path::PathBuf, time::Duration};

/// Failures while opening, decoding or seeking an audio file.
#[derive(Debug, thiserror::Error)]
pub enum SampleSourceError {
    #[error("unable to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported audio file {0}: {1}")]
    Unsupported(PathBuf, String),

    #[error("sample conversion failed: {0}")]
    SampleConversionFailed(String),

    #[error("seek to {0:?} failed: {1}")]
    SeekFailed(Duration, String),

    #[error("unable to resample from {0} Hz to {1} Hz")]
    ResamplingFailed(u32, u32),

    #[error("decode error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
