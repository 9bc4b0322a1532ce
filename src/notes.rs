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
use std::{fmt, str::FromStr};

use midly::num::u7;

/// Number of chromatic notes the synthesizer plays.
pub const NOTE_COUNT: usize = 12;

/// Highest selectable octave.
pub const MAX_OCTAVE: u8 = 8;

/// Frequencies in Hz of C0 through B0.
pub const BASE_FREQUENCIES: [f64; NOTE_COUNT] = [
    16.35, 17.32, 18.35, 19.45, 20.60, 21.83, 23.12, 24.50, 25.96, 27.50, 29.14, 30.87,
];

const NOTE_NAMES: [&str; NOTE_COUNT] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NoteError {
    #[error("note index {0} is out of range, must be 0-11")]
    OutOfRange(u8),

    #[error("unknown note name {0}")]
    UnknownName(String),
}

/// One of the twelve chromatic pitch classes, C through B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note(u8);

impl Note {
    /// Creates a note from its index.
    ///
    /// # Panics
    ///
    /// Panics if the index is 12 or greater. Use `Note::try_from` for untrusted input.
    pub fn from_index(index: usize) -> Note {
        assert!(index < NOTE_COUNT, "note index {} is out of range", index);
        Note(index as u8)
    }

    /// All notes in ascending order.
    pub fn all() -> impl Iterator<Item = Note> {
        (0..NOTE_COUNT as u8).map(Note)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }

    /// The frequency of this note in octave 0.
    pub fn base_frequency(self) -> f64 {
        BASE_FREQUENCIES[self.index()]
    }

    /// The frequency of this note in the given octave.
    pub fn frequency(self, octave: u8) -> f64 {
        self.base_frequency() * 2f64.powi(octave as i32)
    }

    /// The MIDI key number of this note in the given octave, where C4 is 60. None if the
    /// key falls outside the MIDI range.
    pub fn midi_key(self, octave: u8) -> Option<u7> {
        let key = self.0 as u32 + 12 * (octave as u32 + 1);
        (key <= 127).then(|| u7::new(key as u8))
    }
}

impl TryFrom<u8> for Note {
    type Error = NoteError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        if (index as usize) < NOTE_COUNT {
            Ok(Note(index))
        } else {
            Err(NoteError::OutOfRange(index))
        }
    }
}

impl FromStr for Note {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        NOTE_NAMES
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(|index| Note(index as u8))
            .ok_or_else(|| NoteError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
