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

//! Voice management for the polyphonic synthesizer.
//!
//! Turns note lifecycle events into engine commands, tracks which notes are sounding
//! and keeps the engine in step with the user's parameter edits.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::audio::{Engine, EngineError, VoiceRequest};
use crate::registry::RetriggerBehavior;

pub mod params;

pub use params::{Envelope, OscillatorShape, ParamsError, ParamsUpdate, SynthesizerParams};

/// Velocity used when a caller has none to give.
pub const DEFAULT_VELOCITY: f32 = 0.8;

/// Converts a MIDI note to its equal tempered frequency, with A4 (69) at 440Hz.
pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((f32::from(note) - 69.0) / 12.0)
}

/// Whether the engine has been allowed to make sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Suspended,
    Running,
}

/// Drives the audio engine from note lifecycle events.
pub struct VoiceManager {
    engine: Arc<dyn Engine>,
    params: SynthesizerParams,
    /// Sounding notes and the velocity they were triggered with.
    active_notes: HashMap<u8, f32>,
    activation: Activation,
    retrigger: RetriggerBehavior,
}

impl VoiceManager {
    /// Creates a voice manager. Nothing reaches the engine until it is activated.
    pub fn new(
        engine: Arc<dyn Engine>,
        params: SynthesizerParams,
        retrigger: RetriggerBehavior,
    ) -> VoiceManager {
        VoiceManager {
            engine,
            params: params.clamped(),
            active_notes: HashMap::new(),
            activation: Activation::Suspended,
            retrigger,
        }
    }

    /// Returns the current parameters.
    pub fn params(&self) -> &SynthesizerParams {
        &self.params
    }

    /// Merges the update into the current parameters and pushes every changed value to
    /// the engine.
    pub fn set_params(&mut self, update: &ParamsUpdate) {
        let previous = self.params;
        let params = previous.merge(update);
        if params == previous {
            debug!("Parameter update changed nothing.");
            return;
        }
        self.params = params;

        if params.volume_db != previous.volume_db {
            self.report("volume", self.engine.set_volume_db(params.volume_db));
        }
        if params.envelope() != previous.envelope() {
            self.report("envelope", self.engine.set_envelope(params.envelope()));
        }
        if params.oscillator != previous.oscillator {
            self.report("oscillator", self.engine.set_oscillator(params.oscillator));
        }

        info!(params = ?self.params, "Synthesizer parameters updated.");
    }

    /// Resumes the engine in response to user interaction and pushes the current
    /// parameters to it. Only the first successful call reaches the engine; a failed
    /// resume is retried on the next call.
    pub fn activate(&mut self) -> Activation {
        if self.activation == Activation::Running {
            return self.activation;
        }

        match self.engine.resume() {
            Ok(()) => {
                info!(engine = self.engine.to_string(), "Audio engine running.");
                self.activation = Activation::Running;
                self.push_params();
            }
            Err(e) => warn!(err = e.to_string(), "Unable to start audio engine."),
        }
        self.activation
    }

    /// Returns the activation state.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Starts a voice for the note. Velocity is clamped to [0, 1].
    pub fn trigger_note(&mut self, note: u8, velocity: f32) {
        let velocity = velocity.clamp(0.0, 1.0);
        let frequency = note_to_frequency(note);

        if self.active_notes.contains_key(&note) {
            match self.retrigger {
                RetriggerBehavior::Ignore => {
                    debug!(note, "Note already sounding.");
                    return;
                }
                RetriggerBehavior::Retrigger => {
                    debug!(note, "Retriggering note.");
                    self.report("release", self.engine.trigger_release(frequency));
                }
            }
        }

        self.active_notes.insert(note, velocity);
        debug!(note, frequency, velocity, "Note on.");
        let params = self.params;
        self.report(
            "attack",
            self.engine.trigger_attack(VoiceRequest {
                frequency,
                velocity,
                envelope: params.envelope(),
                oscillator: params.oscillator,
                volume_db: params.volume_db,
            }),
        );
    }

    /// Starts the release of the note's voice. Releasing a note that isn't sounding
    /// does nothing.
    pub fn release_note(&mut self, note: u8) {
        if self.active_notes.remove(&note).is_none() {
            debug!(note, "Note is not sounding.");
            return;
        }

        let frequency = note_to_frequency(note);
        debug!(note, frequency, "Note off.");
        self.report("release", self.engine.trigger_release(frequency));
    }

    /// Releases every sounding note.
    pub fn release_all(&mut self) {
        for note in self.active_notes() {
            self.release_note(note);
        }
    }

    /// Returns the sounding notes in ascending order.
    pub fn active_notes(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self.active_notes.keys().copied().collect();
        notes.sort_unstable();
        notes
    }

    /// Returns the velocity a sounding note was triggered with.
    pub fn velocity(&self, note: u8) -> Option<f32> {
        self.active_notes.get(&note).copied()
    }

    /// Sends every parameter to the engine. Engines may drop commands while suspended,
    /// so this runs once the engine is running.
    fn push_params(&self) {
        let params = self.params;
        self.report("volume", self.engine.set_volume_db(params.volume_db));
        self.report("envelope", self.engine.set_envelope(params.envelope()));
        self.report("oscillator", self.engine.set_oscillator(params.oscillator));
    }

    fn report(&self, command: &str, result: Result<(), EngineError>) {
        if let Err(e) = result {
            error!(command, err = e.to_string(), "Audio engine command failed.");
        }
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("engine", &self.engine.to_string())
            .field("active_notes", &self.active_notes.len())
            .field("activation", &self.activation)
            .finish()
    }
}
