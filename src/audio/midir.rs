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

//! An engine that plays voices on an external synthesizer over MIDI.
//!
//! Frequencies are mapped back to the nearest note, parameters become control changes
//! and the oscillator shape selects a program.

use std::fmt;

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::{EngineError, EngineState, VoiceRequest};
use crate::midi::MidiError;
use crate::synth::{params::VOLUME_DB_RANGE, Envelope, OscillatorShape};

const CC_VOLUME: u8 = 7;
const CC_SUSTAIN_LEVEL: u8 = 70;
const CC_RELEASE_TIME: u8 = 72;
const CC_ATTACK_TIME: u8 = 73;
const CC_DECAY_TIME: u8 = 75;

/// Longest envelope time, mapped onto the top of the controller range.
const MAX_ENVELOPE_SECONDS: f32 = 2.0;

pub struct Engine {
    name: String,
    channel: u4,
    connection: Mutex<Option<MidiOutputConnection>>,
}

impl Engine {
    /// Gets the engine for the single output port matching the name.
    pub fn get(name: &str) -> Result<Engine, MidiError> {
        find_port(name)?;
        Ok(Engine {
            name: name.to_string(),
            channel: u4::from(0),
            connection: Mutex::new(None),
        })
    }

    fn send(&self, message: MidiMessage) -> Result<(), EngineError> {
        let mut connection = self.connection.lock();
        let connection = match connection.as_mut() {
            Some(connection) => connection,
            None => {
                warn!(device = self.name, "MIDI output not connected, dropping message.");
                return Ok(());
            }
        };

        let event = LiveEvent::Midi {
            channel: self.channel,
            message,
        };
        debug!(device = self.name, event = ?event, "Sending MIDI event.");

        // Choosing 8 here because that's what nodi does.
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write_std(&mut buf).map_err(MidiError::from)?;
        connection.send(&buf).map_err(MidiError::from)?;
        Ok(())
    }

    fn control_change(&self, controller: u8, value: u8) -> Result<(), EngineError> {
        self.send(MidiMessage::Controller {
            controller: u7::from(controller),
            value: u7::from(value),
        })
    }
}

impl super::Engine for Engine {
    fn state(&self) -> EngineState {
        if self.connection.lock().is_some() {
            EngineState::Running
        } else {
            EngineState::Suspended
        }
    }

    fn resume(&self) -> Result<(), EngineError> {
        let span = span!(Level::INFO, "resume (midir)");
        let _enter = span.enter();

        let mut connection = self.connection.lock();
        if connection.is_some() {
            return Ok(());
        }

        let (port, port_name) = find_port(&self.name)?;
        let output = MidiOutput::new("keysynth engine output").map_err(MidiError::from)?;
        *connection = Some(output.connect(&port, "keysynth engine").map_err(|e| {
            MidiError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            }
        })?);

        info!(port = port_name, "MIDI output engine running.");
        Ok(())
    }

    fn set_volume_db(&self, volume_db: f32) -> Result<(), EngineError> {
        let (min, max) = VOLUME_DB_RANGE;
        self.control_change(CC_VOLUME, scale((volume_db - min) / (max - min)))
    }

    fn set_envelope(&self, envelope: Envelope) -> Result<(), EngineError> {
        self.control_change(CC_ATTACK_TIME, scale(envelope.attack / MAX_ENVELOPE_SECONDS))?;
        self.control_change(CC_DECAY_TIME, scale(envelope.decay / MAX_ENVELOPE_SECONDS))?;
        self.control_change(CC_SUSTAIN_LEVEL, scale(envelope.sustain))?;
        self.control_change(CC_RELEASE_TIME, scale(envelope.release / MAX_ENVELOPE_SECONDS))
    }

    fn set_oscillator(&self, oscillator: OscillatorShape) -> Result<(), EngineError> {
        self.send(MidiMessage::ProgramChange {
            program: u7::from(program(oscillator)),
        })
    }

    fn trigger_attack(&self, voice: VoiceRequest) -> Result<(), EngineError> {
        self.send(MidiMessage::NoteOn {
            key: u7::from(frequency_to_note(voice.frequency)),
            vel: u7::from(scale(voice.velocity).max(1)),
        })
    }

    fn trigger_release(&self, frequency: f32) -> Result<(), EngineError> {
        self.send(MidiMessage::NoteOff {
            key: u7::from(frequency_to_note(frequency)),
            vel: u7::from(0),
        })
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (MIDI output)", self.name)
    }
}

/// Scales a [0, 1] value onto the 7 bit controller range.
fn scale(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 127.0).round() as u8
}

/// Maps a frequency to the nearest MIDI note.
fn frequency_to_note(frequency: f32) -> u8 {
    (69.0 + 12.0 * (frequency / 440.0).log2())
        .round()
        .clamp(0.0, 127.0) as u8
}

fn program(oscillator: OscillatorShape) -> u8 {
    match oscillator {
        OscillatorShape::Sine => 0,
        OscillatorShape::Square => 1,
        OscillatorShape::Sawtooth => 2,
        OscillatorShape::Triangle => 3,
    }
}

/// Finds exactly one output port whose name contains the given name.
fn find_port(name: &str) -> Result<(MidiOutputPort, String), MidiError> {
    let output = MidiOutput::new("keysynth output listing")?;
    let mut matches = Vec::new();
    for port in output.ports() {
        let port_name = output.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port, port_name));
        }
    }

    if matches.is_empty() {
        return Err(MidiError::NotFound(name.to_string()));
    }
    if matches.len() > 1 {
        return Err(MidiError::Ambiguous(
            matches
                .iter()
                .map(|(_, port_name)| port_name.clone())
                .collect::<Vec<String>>()
                .join(", "),
        ));
    }

    Ok(matches.swap_remove(0))
}
