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
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority for the mixing thread when PIANODECK_THREAD_PRIORITY is unset.
const DEFAULT_MIXER_THREAD_PRIORITY: u8 = 70;

/// Reads PIANODECK_THREAD_PRIORITY (0-99). Out of range or unparsable values fall back
/// to the default.
pub fn mixer_thread_priority() -> u8 {
    parse_priority(std::env::var("PIANODECK_THREAD_PRIORITY").ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_MIXER_THREAD_PRIORITY)
}

/// Raises the priority of the calling thread. Failure only costs latency, so it's logged.
pub fn raise_current_thread_priority(priority: u8) {
    let value = match ThreadPriorityValue::try_from(priority) {
        Ok(value) => value,
        Err(e) => {
            warn!(priority, err = ?e, "Invalid thread priority");
            return;
        }
    };

    match set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
        Ok(()) => info!(priority, "Raised mixer thread priority"),
        Err(e) => warn!(priority, err = ?e, "Unable to raise mixer thread priority"),
    }
}
