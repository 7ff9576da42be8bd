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
use std::{fmt, sync::Arc, time::Duration};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

mod message;
mod midir;
pub mod mock;

pub use message::{parse, ParsedMidiMessage, NOTE_OFF, NOTE_ON};

/// Errors raised by the MIDI hardware layer.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("unable to initialize MIDI: {0}")]
    Init(#[from] ::midir::InitError),

    #[error("unable to read MIDI port info: {0}")]
    PortInfo(#[from] ::midir::PortInfoError),

    #[error("unable to connect to MIDI port {port}: {reason}")]
    Connect { port: String, reason: String },

    #[error("unable to send MIDI data: {0}")]
    Send(#[from] ::midir::SendError),

    #[error("unable to encode MIDI event: {0}")]
    Encode(#[from] std::io::Error),

    #[error("already watching MIDI events")]
    AlreadyWatching,

    #[error("no MIDI device found with name {0}")]
    NotFound(String),

    #[error("found too many MIDI devices that match ({0}), use a less ambiguous device name")]
    Ambiguous(String),
}

/// Whether the MIDI subsystem can be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// The MIDI backend is available.
    Granted,
    /// The MIDI backend could not be opened. Pointer input keeps working.
    Denied,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
        }
    }
}

/// A MIDI input source that delivers raw MIDI buffers from one or more ports.
pub trait Input: fmt::Display + Send + Sync {
    /// Returns whether access to MIDI was granted.
    fn permission_state(&self) -> PermissionState;

    /// Returns the names of the ports this input currently listens to.
    fn port_names(&self) -> Result<Vec<String>, MidiError>;

    /// Attaches to every current port and sends each raw buffer to the sender.
    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), MidiError>;

    /// Detaches from all ports.
    fn stop_watch_events(&self);
}

/// Lists the names of all MIDI input ports known to midir.
pub fn list_ports() -> Result<Vec<String>, MidiError> {
    midir::list()
}

/// Gets an input for ports matching the given name, or all ports if no name is given.
/// Names starting with "mock" produce a mock input.
pub fn get_input(name: Option<&str>) -> Arc<dyn Input> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Arc::new(mock::Device::get(name));
        }
    }

    Arc::new(midir::Device::new(name))
}

/// Attaches the input to all of its ports and keeps it attached as ports come and go.
/// The port list is polled every interval and a change re-attaches the input. The
/// watcher stops once the receiving side of the sender is closed.
pub fn watch_ports(
    input: Arc<dyn Input>,
    sender: Sender<Vec<u8>>,
    interval: Duration,
) -> JoinHandle<()> {
    let span = span!(Level::INFO, "MIDI port watcher");
    tokio::spawn(
        async move {
            if input.permission_state() == PermissionState::Denied {
                warn!(input = input.to_string(), "MIDI access denied, not watching ports.");
                return;
            }

            let mut known_ports = input.port_names().unwrap_or_else(|e| {
                warn!(err = e.to_string(), "Unable to list MIDI ports.");
                Vec::new()
            });
            info!(ports = ?known_ports, "Attaching to MIDI ports.");
            let mut attached = attach(input.as_ref(), &sender);

            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if sender.is_closed() {
                    info!("MIDI receiver closed.");
                    input.stop_watch_events();
                    return;
                }

                let ports = match input.port_names() {
                    Ok(ports) => ports,
                    Err(e) => {
                        warn!(err = e.to_string(), "Unable to list MIDI ports.");
                        continue;
                    }
                };
                if attached && ports == known_ports {
                    continue;
                }

                if ports != known_ports {
                    info!(ports = ?ports, "MIDI device state changed.");
                }
                input.stop_watch_events();
                attached = attach(input.as_ref(), &sender);
                known_ports = ports;
            }
        }
        .instrument(span),
    )
}

/// Attaches the input, returning false if it has to be retried.
fn attach(input: &dyn Input, sender: &Sender<Vec<u8>>) -> bool {
    match input.watch_events(sender.clone()) {
        Ok(()) => true,
        Err(e) => {
            error!(err = e.to_string(), "Error watching MIDI events, will retry.");
            false
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, time::Duration};

    use tokio::sync::mpsc;

    use crate::testutil::eventually_async;

    use super::{mock, watch_ports, PermissionState};

    #[tokio::test]
    async fn test_watch_ports_reattaches_on_change() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-keys");
        let input: std::sync::Arc<dyn super::Input> = std::sync::Arc::new(device.clone());
        let (sender, mut receiver) = mpsc::channel::<Vec<u8>>(10);

        let handle = watch_ports(input, sender, Duration::from_millis(5));
        eventually_async(|| device.attach_count() == 1, "input never attached").await;

        device.mock_event(&[0x90, 60, 100]);
        assert_eq!(Some(vec![0x90, 60, 100]), receiver.recv().await);

        device.set_ports(vec!["mock-keys".to_string(), "mock-pads".to_string()]);
        eventually_async(|| device.attach_count() == 2, "input never re-attached").await;

        // Events keep flowing after re-attaching.
        device.mock_event(&[0x80, 60]);
        assert_eq!(Some(vec![0x80, 60]), receiver.recv().await);

        drop(receiver);
        handle.await?;
        assert!(!device.is_watching());
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_ports_retries_failed_attach() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-flaky");
        device.fail_watches(2);
        let input: std::sync::Arc<dyn super::Input> = std::sync::Arc::new(device.clone());
        let (sender, mut receiver) = mpsc::channel::<Vec<u8>>(10);

        // The port list never changes, the watcher retries on its own.
        let handle = watch_ports(input, sender, Duration::from_millis(5));
        eventually_async(|| device.attach_count() == 1, "input never attached").await;

        device.mock_event(&[0x90, 64, 90]);
        assert_eq!(Some(vec![0x90, 64, 90]), receiver.recv().await);

        drop(receiver);
        handle.await?;
        assert_eq!(1, device.attach_count());
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_ports_denied() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-denied");
        device.set_permission_state(PermissionState::Denied);
        let input: std::sync::Arc<dyn super::Input> = std::sync::Arc::new(device.clone());
        let (sender, _receiver) = mpsc::channel::<Vec<u8>>(10);

        watch_ports(input, sender, Duration::from_millis(5)).await?;
        assert_eq!(0, device.attach_count());
        Ok(())
    }
}
