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
use std::{collections::HashMap, fmt};

use midir::{MidiInput, MidiOutput, MidiOutputConnection, MidiOutputPort};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::MidiError;

pub struct Device {
    name: String,
    has_input: bool,
    output_port: Option<MidiOutputPort>,
    /// Opened on the first emit and kept for the life of the device.
    connection: Mutex<Option<MidiOutputConnection>>,
}

impl Device {
    fn connect(&self, output_port: &MidiOutputPort) -> Result<MidiOutputConnection, MidiError> {
        let output =
            MidiOutput::new("pianodeck output").map_err(|e| MidiError::Init(e.to_string()))?;
        let connection = output
            .connect(output_port, "pianodeck")
            .map_err(|e| MidiError::Connect {
                device: self.name.clone(),
                message: e.to_string(),
            })?;
        info!(device = self.name, "Connected to MIDI output.");
        Ok(connection)
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn emit(&self, event: LiveEvent<'static>) -> Result<(), MidiError> {
        let span = span!(Level::DEBUG, "emit (midir)");
        let _enter = span.enter();

        let output_port = self
            .output_port
            .as_ref()
            .ok_or_else(|| MidiError::NoOutput(self.name.clone()))?;

        debug!(device = self.name, event = ?event, "Emitting event.");
        let buf = super::encode(&event)?;

        let mut connection = self.connection.lock();
        if connection.is_none() {
            *connection = Some(self.connect(output_port)?);
        }
        if let Some(connection) = connection.as_mut() {
            connection
                .send(&buf)
                .map_err(|e| MidiError::Send(e.to_string()))?;
        }

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut capabilities: Vec<String> = Vec::new();
        if self.has_input {
            capabilities.push(String::from("Input"));
        }
        if self.output_port.is_some() {
            capabilities.push(String::from("Output"));
        }

        write!(f, "{} ({})", self.name, capabilities.join("/"))
    }
}

/// Lists midir devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, MidiError> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir devices.
fn list_midir_devices() -> Result<Vec<Device>, MidiError> {
    let input =
        MidiInput::new("pianodeck input listing").map_err(|e| MidiError::Init(e.to_string()))?;
    let output =
        MidiOutput::new("pianodeck output listing").map_err(|e| MidiError::Init(e.to_string()))?;

    let mut devices: HashMap<String, Device> = HashMap::new();
    for port in input.ports() {
        let Ok(name) = input.port_name(&port) else {
            continue;
        };
        devices.entry(name.clone()).or_insert(Device {
            name,
            has_input: true,
            output_port: None,
            connection: Mutex::new(None),
        });
    }

    for port in output.ports() {
        let Ok(name) = output.port_name(&port) else {
            continue;
        };
        devices
            .entry(name.clone())
            .or_insert(Device {
                name,
                has_input: false,
                output_port: None,
                connection: Mutex::new(None),
            })
            .output_port = Some(port);
    }

    let mut sorted_devices = devices.into_values().collect::<Vec<Device>>();
    sorted_devices.sort_by_key(|device| device.name.clone());
    Ok(sorted_devices)
}

/// Gets the given midir device.
pub fn get(name: &str) -> Result<Device, MidiError> {
    let mut matches = list_midir_devices()?
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    match matches.len() {
        0 => Err(MidiError::NotFound(name.to_string())),
        1 => Ok(matches.swap_remove(0)),
        _ => Err(MidiError::Ambiguous(
            matches
                .iter()
                .map(|device| device.name.clone())
                .collect::<Vec<String>>()
                .join(", "),
        )),
    }
}
