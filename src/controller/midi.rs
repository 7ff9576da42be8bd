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
use std::{io, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{info, span, Instrument, Level};

use super::Event;
use crate::midi::{self, Input};

/// How many raw MIDI buffers may queue up between the input callback and the
/// controller.
const RAW_EVENT_BUFFER: usize = 64;

/// A driver that feeds raw buffers from MIDI input ports to the controller.
pub struct Driver {
    /// The MIDI input.
    input: Arc<dyn Input>,
    /// How often to check for ports coming and going.
    poll_interval: Duration,
}

impl Driver {
    pub fn new(input: Arc<dyn Input>, poll_interval: Duration) -> Driver {
        Driver {
            input,
            poll_interval,
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(RAW_EVENT_BUFFER);
        midi::watch_ports(self.input.clone(), midi_events_tx, self.poll_interval);

        let span = span!(Level::INFO, "MIDI driver");
        let input = self.input.to_string();
        tokio::spawn(
            async move {
                info!(input = %input, "MIDI driver started.");

                while let Some(raw_event) = midi_events_rx.recv().await {
                    if events_tx.send(Event::Midi(raw_event)).await.is_err() {
                        info!("Controller closed.");
                        return Ok(());
                    }
                }

                info!("MIDI watcher closed.");
                Ok(())
            }
            .instrument(span),
        )
    }
}
