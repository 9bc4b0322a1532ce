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
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use crate::audio::{
    self,
    sample_source::{create_sample_source_from_file, SampleSource, SampleSourceError},
    share, AudioError, SharedSource, Sink, SinkState,
};
use crate::util::{duration_minutes_seconds, filename_display};

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("unable to open {path}: {source}")]
    MediaOpen {
        path: PathBuf,
        #[source]
        source: SampleSourceError,
    },

    #[error("unable to seek {path}: {source}")]
    Seek {
        path: PathBuf,
        #[source]
        source: SampleSourceError,
    },

    #[error(transparent)]
    Device(#[from] AudioError),
}

/// A decoded audio file bound to an output device.
pub struct Track {
    // Dropped before the source so the mixer lets go of it first.
    sink: Box<dyn Sink>,
    source: SharedSource,
    path: PathBuf,
    name: String,
    duration: Duration,
}

impl Track {
    /// Opens and decodes the file and binds it to the device, ready to play from the start.
    pub fn open(
        device: &dyn audio::Device,
        path: &Path,
        buffer_size: usize,
    ) -> Result<Track, TrackError> {
        let source = create_sample_source_from_file(path, buffer_size).map_err(|source| {
            TrackError::MediaOpen {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let duration = source.duration().unwrap_or_default();
        let source = share(source);
        let sink = device.bind(source.clone())?;

        let track = Track {
            sink,
            source,
            path: path.to_path_buf(),
            name: filename_display(path).to_string(),
            duration,
        };
        info!(
            track = track.name,
            device = device.name(),
            duration = duration_minutes_seconds(duration),
            "Opened track."
        );
        Ok(track)
    }

    pub fn play(&mut self) -> Result<(), TrackError> {
        Ok(self.sink.play()?)
    }

    pub fn pause(&mut self) -> Result<(), TrackError> {
        Ok(self.sink.pause()?)
    }

    /// Stops output and rewinds to the start. The rewind happens even if the device
    /// refuses to stop.
    pub fn stop(&mut self) -> Result<(), TrackError> {
        let stopped = self.sink.stop();
        self.seek_to(Duration::ZERO)?;
        Ok(stopped?)
    }

    /// Moves the playback position. Positions past the end hold at the end.
    pub fn seek_to(&mut self, position: Duration) -> Result<(), TrackError> {
        self.source
            .lock()
            .seek(position)
            .map_err(|source| TrackError::Seek {
                path: self.path.clone(),
                source,
            })?;
        self.sink.reset();
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn current_position(&self) -> Duration {
        self.source.lock().position()
    }

    pub fn state(&self) -> SinkState {
        self.sink.state()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the sink and then the source.
    pub fn close(self) {
        debug!(track = self.name, "Closing track.");
        let Track { sink, source, .. } = self;
        drop(sink);
        drop(source);
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name,
            duration_minutes_seconds(self.duration)
        )
    }
}
