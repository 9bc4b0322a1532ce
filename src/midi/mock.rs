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
    sync::atomic::{AtomicBool, Ordering},
};

use midly::live::LiveEvent;
use parking_lot::Mutex;
use tracing::debug;

use super::MidiError;

/// A mock device. Records what it's asked to emit.
pub struct Device {
    name: String,
    failing: AtomicBool,
    emitted: Mutex<Vec<Vec<u8>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            failing: AtomicBool::new(false),
            emitted: Mutex::new(Vec::new()),
        }
    }

    /// Makes subsequent emits fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Every event emitted so far, as wire bytes.
    pub fn emitted(&self) -> Vec<Vec<u8>> {
        self.emitted.lock().clone()
    }

    /// Gets the last event emitted.
    pub fn last_emitted(&self) -> Option<Vec<u8>> {
        self.emitted.lock().last().cloned()
    }

    pub fn reset_emitted(&self) {
        self.emitted.lock().clear();
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn emit(&self, event: LiveEvent<'static>) -> Result<(), MidiError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(MidiError::Send(format!("{} is failing", self.name)));
        }

        let buf = super::encode(&event)?;
        debug!(device = self.name, event = ?buf, "Mock emit.");
        self.emitted.lock().push(buf);
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
