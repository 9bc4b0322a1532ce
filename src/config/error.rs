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
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file couldn't be read or didn't match the expected shape.
    #[error("unable to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// The file parsed but holds a value out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
