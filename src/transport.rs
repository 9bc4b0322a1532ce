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
use std::{fmt, path::Path, sync::Arc, time::Duration};

use tracing::{error, info, span, Level, Span};

use crate::audio::{self, SinkState};
use crate::track::{Track, TrackError};
use crate::util::elapsed_of_total;

/// Identifies a track for the life of its transport. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("{} track(s) failed: {}", .failures.len(), describe_failures(.failures))]
    Partial { failures: Vec<(TrackId, TrackError)> },
}

fn describe_failures(failures: &[(TrackId, TrackError)]) -> String {
    failures
        .iter()
        .map(|(id, err)| format!("{}: {}", id, err))
        .collect::<Vec<String>>()
        .join("; ")
}

/// A summary of one track.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub name: String,
    pub duration: Duration,
    pub position: Duration,
    pub state: SinkState,
    pub is_master: bool,
}

/// Plays a set of tracks in lock step. The longest track is the master and provides the
/// elapsed and total time.
pub struct Transport {
    device: Arc<dyn audio::Device>,
    buffer_size: usize,
    /// In insertion order.
    tracks: Vec<(TrackId, Track)>,
    next_id: u64,
    master: Option<TrackId>,
    playing: bool,
    span: Span,
}

impl Transport {
    pub fn new(device: Arc<dyn audio::Device>, buffer_size: usize) -> Transport {
        Transport {
            device,
            buffer_size,
            tracks: Vec::new(),
            next_id: 0,
            master: None,
            playing: false,
            span: span!(Level::INFO, "transport"),
        }
    }

    /// Opens the file as a new track. If the transport is playing, the track joins in at the
    /// current time. On failure nothing changes.
    pub fn add_track(&mut self, path: &Path) -> Result<TrackId, TransportError> {
        let span = self.span.clone();
        let _enter = span.enter();

        let mut track = Track::open(self.device.as_ref(), path, self.buffer_size)?;
        if self.playing {
            let joined = track
                .seek_to(self.current_time())
                .and_then(|_| track.play());
            if let Err(e) = joined {
                track.close();
                return Err(e.into());
            }
        }

        let id = TrackId(self.next_id);
        self.next_id += 1;
        info!(id = %id, track = track.name(), "Added track.");
        self.tracks.push((id, track));
        self.recompute_master();
        Ok(id)
    }

    /// Closes and removes the track. Returns false if there's no such track.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();

        let Some(index) = self.tracks.iter().position(|(track_id, _)| *track_id == id) else {
            return false;
        };
        let (_, track) = self.tracks.remove(index);
        info!(id = %id, track = track.name(), "Removed track.");
        track.close();

        if self.tracks.is_empty() {
            self.playing = false;
        }
        self.recompute_master();
        true
    }

    /// Plays every track if stopped or paused, otherwise pauses every track. Does nothing
    /// to an empty transport.
    pub fn play_pause(&mut self) -> Result<(), TransportError> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.playing {
            self.playing = false;
            info!("Pausing.");
            self.for_each_track(|track| track.pause())
        } else if self.tracks.is_empty() {
            Ok(())
        } else {
            self.playing = true;
            info!("Playing.");
            self.for_each_track(|track| track.play())
        }
    }

    /// Stops every track and rewinds it to the start.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.playing = false;
        info!("Stopping.");
        self.for_each_track(|track| track.stop())
    }

    /// Moves every track to the given position without changing whether they're playing.
    pub fn seek_all(&mut self, position: Duration) -> Result<(), TransportError> {
        let span = self.span.clone();
        let _enter = span.enter();

        info!(position = ?position, "Seeking.");
        self.for_each_track(|track| track.seek_to(position))
    }

    /// The master track's position, or zero when there are no tracks.
    pub fn current_time(&self) -> Duration {
        self.master_track()
            .map(|track| track.current_position())
            .unwrap_or_default()
    }

    /// The master track's duration, or zero when there are no tracks.
    pub fn total_time(&self) -> Duration {
        self.master_track()
            .map(|track| track.duration())
            .unwrap_or_default()
    }

    /// Elapsed and total time as MM:SS/MM:SS.
    pub fn time_display(&self) -> String {
        elapsed_of_total(self.current_time(), self.total_time())
    }

    pub fn list_tracks(&self) -> Vec<TrackInfo> {
        self.tracks
            .iter()
            .map(|(id, track)| TrackInfo {
                id: *id,
                name: track.name().to_string(),
                duration: track.duration(),
                position: track.current_position(),
                state: track.state(),
                is_master: self.master == Some(*id),
            })
            .collect()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|(track_id, _)| *track_id == id)
            .map(|(_, track)| track)
    }

    pub fn master(&self) -> Option<TrackId> {
        self.master
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn master_track(&self) -> Option<&Track> {
        self.master.and_then(|id| self.track(id))
    }

    /// The first track with the longest duration wins.
    fn recompute_master(&mut self) {
        let mut best: Option<(TrackId, Duration)> = None;
        for (id, track) in &self.tracks {
            let longer = match best {
                Some((_, longest)) => track.duration() > longest,
                None => true,
            };
            if longer {
                best = Some((*id, track.duration()));
            }
        }
        self.master = best.map(|(id, _)| id);
    }

    /// Applies the operation to every track, even after failures, and reports the tracks
    /// that failed.
    fn for_each_track<F>(&mut self, mut op: F) -> Result<(), TransportError>
    where
        F: FnMut(&mut Track) -> Result<(), TrackError>,
    {
        let mut failures = Vec::new();
        for (id, track) in self.tracks.iter_mut() {
            if let Err(e) = op(track) {
                error!(id = %id, track = track.name(), err = %e, "Track operation failed.");
                failures.push((*id, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TransportError::Partial { failures })
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::audio::{mock, SinkState};
    use crate::testutil::write_constant_wav;
    use crate::track::TrackError;

    use super::{Transport, TransportError};

    const RATE: u32 = 1000;

    fn wav(dir: &TempDir, name: &str, seconds: u64) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.path().join(name);
        write_constant_wav(&path, Duration::from_secs(seconds), 100, RATE)?;
        Ok(path)
    }

    fn transport() -> (Transport, Arc<mock::Device>) {
        let device = Arc::new(mock::Device::get("mock-device", RATE));
        (Transport::new(device.clone(), 256), device)
    }

    #[test]
    fn master_follows_longest_track() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, _) = transport();
        assert_eq!(transport.master(), None);
        assert_eq!(transport.total_time(), Duration::ZERO);
        assert_eq!(transport.current_time(), Duration::ZERO);

        let a = transport.add_track(&wav(&dir, "a.wav", 30)?)?;
        assert_eq!(transport.master(), Some(a));

        let b = transport.add_track(&wav(&dir, "b.wav", 90)?)?;
        assert_eq!(transport.master(), Some(b));
        assert_eq!(transport.total_time(), Duration::from_secs(90));

        assert!(transport.remove_track(b));
        assert_eq!(transport.master(), Some(a));
        assert_eq!(transport.total_time(), Duration::from_secs(30));

        assert!(transport.remove_track(a));
        assert_eq!(transport.master(), None);
        assert_eq!(transport.total_time(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn ties_go_to_the_first_track() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, _) = transport();
        let first = transport.add_track(&wav(&dir, "first.wav", 5)?)?;
        let second = transport.add_track(&wav(&dir, "second.wav", 5)?)?;
        assert_eq!(transport.master(), Some(first));

        transport.remove_track(first);
        assert_eq!(transport.master(), Some(second));
        Ok(())
    }

    #[test]
    fn remove_unknown_track() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, _) = transport();
        let id = transport.add_track(&wav(&dir, "a.wav", 1)?)?;
        assert!(transport.remove_track(id));
        assert!(!transport.remove_track(id));
        assert!(transport.is_empty());
        Ok(())
    }

    #[test]
    fn removal_keeps_order() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();
        let a = transport.add_track(&wav(&dir, "a.wav", 1)?)?;
        let b = transport.add_track(&wav(&dir, "b.wav", 2)?)?;
        let c = transport.add_track(&wav(&dir, "c.wav", 3)?)?;

        transport.remove_track(b);
        let ids: Vec<_> = transport.list_tracks().iter().map(|info| info.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(device.open_sinks().len(), 2);

        // Ids aren't reused.
        let d = transport.add_track(&wav(&dir, "d.wav", 1)?)?;
        assert!(d > c);
        Ok(())
    }

    #[test]
    fn failed_add_changes_nothing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();
        let a = transport.add_track(&wav(&dir, "a.wav", 2)?)?;

        let result = transport.add_track(&dir.path().join("missing.wav"));
        assert!(matches!(
            result,
            Err(TransportError::Track(TrackError::MediaOpen { .. }))
        ));
        assert_eq!(transport.len(), 1);
        assert_eq!(transport.master(), Some(a));
        assert_eq!(device.open_sinks().len(), 1);
        Ok(())
    }

    #[test]
    fn play_pause_toggles_every_track() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();

        // Nothing to play.
        transport.play_pause()?;
        assert!(!transport.is_playing());

        transport.add_track(&wav(&dir, "a.wav", 2)?)?;
        transport.add_track(&wav(&dir, "b.wav", 3)?)?;

        transport.play_pause()?;
        assert!(transport.is_playing());
        assert!(device
            .open_sinks()
            .iter()
            .all(|sink| sink.state() == SinkState::Playing));

        device.render(500);
        transport.play_pause()?;
        assert!(!transport.is_playing());
        assert!(device
            .open_sinks()
            .iter()
            .all(|sink| sink.state() == SinkState::Paused));
        assert!(transport.current_time() >= Duration::from_millis(500));
        Ok(())
    }

    #[test]
    fn stop_rewinds_every_track() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();

        // Safe on an empty transport.
        transport.stop()?;

        transport.add_track(&wav(&dir, "a.wav", 2)?)?;
        transport.add_track(&wav(&dir, "b.wav", 3)?)?;
        transport.play_pause()?;
        device.render(700);

        transport.stop()?;
        assert!(!transport.is_playing());
        for info in transport.list_tracks() {
            assert_eq!(info.position, Duration::ZERO);
            assert_eq!(info.state, SinkState::Stopped);
        }

        // Stopping again is fine.
        transport.stop()?;
        assert_eq!(transport.current_time(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn seek_all_moves_the_clock() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, _) = transport();
        transport.add_track(&wav(&dir, "a.wav", 30)?)?;
        transport.add_track(&wav(&dir, "b.wav", 90)?)?;

        transport.seek_all(Duration::from_secs(12))?;
        assert_eq!(transport.current_time(), Duration::from_secs(12));
        assert!(!transport.is_playing());
        assert_eq!(transport.time_display(), "00:12/01:30");
        for info in transport.list_tracks() {
            assert_eq!(info.position, Duration::from_secs(12));
        }

        // Past the shorter track's end, it holds at its end.
        transport.seek_all(Duration::from_secs(45))?;
        let tracks = transport.list_tracks();
        assert_eq!(tracks[0].position, Duration::from_secs(30));
        assert_eq!(tracks[1].position, Duration::from_secs(45));
        assert!(tracks[1].is_master);
        Ok(())
    }

    #[test]
    fn clock_follows_frames_played() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();
        transport.add_track(&wav(&dir, "a.wav", 3)?)?;
        transport.add_track(&wav(&dir, "b.wav", 5)?)?;

        transport.seek_all(Duration::from_secs(2))?;
        transport.play_pause()?;
        device.render(300);
        assert_eq!(transport.current_time(), Duration::from_millis(2300));
        for info in transport.list_tracks() {
            assert_eq!(info.position, Duration::from_millis(2300));
        }
        Ok(())
    }

    #[test]
    fn failures_do_not_stop_the_batch() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();
        let a = transport.add_track(&wav(&dir, "a.wav", 2)?)?;
        transport.add_track(&wav(&dir, "b.wav", 3)?)?;
        device.sinks()[0].set_online(false);

        match transport.play_pause() {
            Err(TransportError::Partial { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, a);
            }
            other => panic!("expected a partial failure, got {:?}", other),
        }
        assert!(transport.is_playing());
        assert_eq!(device.sinks()[1].state(), SinkState::Playing);

        device.render(300);
        assert!(transport.stop().is_err());
        assert!(transport
            .list_tracks()
            .iter()
            .all(|info| info.position == Duration::ZERO));
        Ok(())
    }

    #[test]
    fn tracks_added_while_playing_join_in() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (mut transport, device) = transport();
        transport.add_track(&wav(&dir, "a.wav", 10)?)?;
        transport.seek_all(Duration::from_secs(4))?;
        transport.play_pause()?;

        let b = transport.add_track(&wav(&dir, "b.wav", 5)?)?;
        let track = transport.track(b).ok_or("missing track")?;
        assert_eq!(track.state(), SinkState::Playing);
        assert_eq!(track.current_position(), Duration::from_secs(4));
        assert_eq!(device.open_sinks().len(), 2);

        // Removing the last track stops the transport.
        let ids: Vec<_> = transport.list_tracks().iter().map(|info| info.id).collect();
        for id in ids {
            transport.remove_track(id);
        }
        assert!(!transport.is_playing());
        Ok(())
    }
}
