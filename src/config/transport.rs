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
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A YAML representation of the transport configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Transport {
    /// How often elapsed time is reported while playing, e.g. "100ms" (default: 100ms)
    poll_interval: Option<String>,
}

impl Transport {
    /// Returns the poll interval from the configuration.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(poll_interval) => {
                let duration: Duration = DurationString::from_string(poll_interval.clone())
                    .map_err(|e| {
                        ConfigError::Invalid(format!(
                            "transport poll_interval {}: {}",
                            poll_interval, e
                        ))
                    })?
                    .into();
                if duration.is_zero() {
                    return Err(ConfigError::Invalid(
                        "transport poll_interval must be greater than zero".into(),
                    ));
                }
                Ok(duration)
            }
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.poll_interval().map(|_| ())
    }
}
