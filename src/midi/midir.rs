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
use std::{fmt, mem};

use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, span, warn, Level};

use super::{MidiError, PermissionState};

/// An input that listens to every midir input port whose name contains a filter.
pub struct Device {
    /// The port name filter. None matches every port.
    name: Option<String>,
    permission_state: PermissionState,
    connections: Mutex<Vec<MidiInputConnection<()>>>,
}

impl Device {
    /// Creates the device. If the MIDI backend can't be opened the device is created
    /// anyway with a denied permission state.
    pub fn new(name: Option<&str>) -> Device {
        let permission_state = match MidiInput::new("keysynth access check") {
            Ok(_) => {
                info!("MIDI access granted.");
                PermissionState::Granted
            }
            Err(e) => {
                warn!(err = e.to_string(), "Failed to get MIDI access.");
                PermissionState::Denied
            }
        };

        Device {
            name: name.map(str::to_string),
            permission_state,
            connections: Mutex::new(Vec::new()),
        }
    }

    fn matches(&self, port_name: &str) -> bool {
        match &self.name {
            Some(name) => port_name.contains(name.as_str()),
            None => true,
        }
    }

    /// Returns the matching ports with their names.
    fn matching_ports(&self) -> Result<Vec<(MidiInputPort, String)>, MidiError> {
        let input = MidiInput::new("keysynth input listing")?;
        let mut ports = Vec::new();
        for port in input.ports() {
            let name = input.port_name(&port)?;
            if self.matches(&name) {
                ports.push((port, name));
            }
        }
        Ok(ports)
    }
}

impl super::Input for Device {
    fn permission_state(&self) -> PermissionState {
        self.permission_state
    }

    fn port_names(&self) -> Result<Vec<String>, MidiError> {
        if self.permission_state == PermissionState::Denied {
            return Ok(Vec::new());
        }

        Ok(self
            .matching_ports()?
            .into_iter()
            .map(|(_, name)| name)
            .collect())
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), MidiError> {
        let span = span!(Level::INFO, "watch events (midir)");
        let _enter = span.enter();

        let mut connections = self.connections.lock();
        if !connections.is_empty() {
            return Err(MidiError::AlreadyWatching);
        }

        let ports = self.matching_ports()?;
        if ports.is_empty() {
            warn!(filter = ?self.name, "No MIDI input ports found.");
            return Ok(());
        }

        // Connections opened before a failure are closed when this is dropped.
        let mut opened = Vec::with_capacity(ports.len());
        for (port, port_name) in ports {
            // Each connection consumes its MidiInput.
            let input = MidiInput::new("keysynth input")?;
            let sender = sender.clone();
            let connection = input
                .connect(
                    &port,
                    "keysynth input watcher",
                    move |_, raw_event, _| {
                        debug!(event = ?raw_event, "Received MIDI event.");
                        if let Err(e) = sender.blocking_send(Vec::from(raw_event)) {
                            error!(err = e.to_string(), "Error sending MIDI event to receiver.");
                        }
                    },
                    (),
                )
                .map_err(|e| MidiError::Connect {
                    port: port_name.clone(),
                    reason: e.to_string(),
                })?;

            info!(port = port_name, "Watching MIDI events.");
            opened.push(connection);
        }

        *connections = opened;
        Ok(())
    }

    fn stop_watch_events(&self) {
        let connections = mem::take(&mut *self.connections.lock());
        for connection in connections {
            // Closing hands back the MidiInput, which is dropped here.
            connection.close();
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (MIDI {})", name, self.permission_state),
            None => write!(f, "all ports (MIDI {})", self.permission_state),
        }
    }
}

/// Lists the names of all midir input ports, sorted.
pub fn list() -> Result<Vec<String>, MidiError> {
    let input = MidiInput::new("keysynth input listing")?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}
