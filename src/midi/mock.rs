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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

use super::{MidiError, PermissionState};

/// A mock input. Events are only ever produced by the test harness.
#[derive(Clone)]
pub struct Device {
    name: String,
    permission_state: Arc<Mutex<PermissionState>>,
    ports: Arc<Mutex<Vec<String>>>,
    sender: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    attach_count: Arc<AtomicUsize>,
    failing_watches: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device. It starts out with a single port named after itself.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            permission_state: Arc::new(Mutex::new(PermissionState::Granted)),
            ports: Arc::new(Mutex::new(vec![name.to_string()])),
            sender: Arc::new(Mutex::new(None)),
            attach_count: Arc::new(AtomicUsize::new(0)),
            failing_watches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sends the mock event through to the sender, if attached.
    pub fn mock_event(&self, event: &[u8]) {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if let Err(e) = sender.try_send(event.to_vec()) {
                    debug!(err = e.to_string(), "Mock event dropped.");
                }
            }
            None => debug!("Mock device is not attached, dropping event."),
        }
    }

    /// Replaces the set of ports, simulating devices connecting or disconnecting.
    pub fn set_ports(&self, ports: Vec<String>) {
        *self.ports.lock() = ports;
    }

    /// Overrides the permission state.
    pub fn set_permission_state(&self, permission_state: PermissionState) {
        *self.permission_state.lock() = permission_state;
    }

    /// Makes the next `count` attempts to watch events fail.
    pub fn fail_watches(&self, count: usize) {
        self.failing_watches.store(count, Ordering::Relaxed);
    }

    /// Returns how many times the device has been attached.
    pub fn attach_count(&self) -> usize {
        self.attach_count.load(Ordering::Relaxed)
    }

    /// Returns true if the device is currently attached.
    pub fn is_watching(&self) -> bool {
        self.sender.lock().is_some()
    }
}

impl super::Input for Device {
    fn permission_state(&self) -> PermissionState {
        *self.permission_state.lock()
    }

    fn port_names(&self) -> Result<Vec<String>, MidiError> {
        Ok(self.ports.lock().clone())
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), MidiError> {
        let mut current = self.sender.lock();
        if current.is_some() {
            return Err(MidiError::AlreadyWatching);
        }
        if self
            .failing_watches
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            })
            .is_ok()
        {
            return Err(MidiError::Connect {
                port: self.name.clone(),
                reason: "mock connection failure".to_string(),
            });
        }

        info!(device = self.name, "Watching mock MIDI events.");
        *current = Some(sender);
        self.attach_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop_watch_events(&self) {
        self.sender.lock().take();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
