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
use std::{fmt, sync::Arc};

use crate::midi::MidiError;
use crate::synth::{Envelope, OscillatorShape};

mod midir;
pub mod mock;

/// Errors raised by an audio engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("audio engine could not be activated: {0}")]
    Activation(String),

    #[error(transparent)]
    Midi(#[from] MidiError),
}

/// Whether the engine is allowed to produce sound yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Suspended,
    Running,
}

/// Everything the engine needs to start a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceRequest {
    pub frequency: f32,
    pub velocity: f32,
    pub envelope: Envelope,
    pub oscillator: OscillatorShape,
    pub volume_db: f32,
}

/// The synthesizer that actually produces sound.
pub trait Engine: fmt::Display + Send + Sync {
    /// Returns the engine state.
    fn state(&self) -> EngineState;

    /// Resumes a suspended engine. Only called in response to user interaction.
    fn resume(&self) -> Result<(), EngineError>;

    /// Sets the output volume.
    fn set_volume_db(&self, volume_db: f32) -> Result<(), EngineError>;

    /// Sets the envelope for new voices and, where supported, sounding ones.
    fn set_envelope(&self, envelope: Envelope) -> Result<(), EngineError>;

    /// Sets the oscillator shape.
    fn set_oscillator(&self, oscillator: OscillatorShape) -> Result<(), EngineError>;

    /// Starts a voice. May be dropped by an engine that isn't running.
    fn trigger_attack(&self, voice: VoiceRequest) -> Result<(), EngineError>;

    /// Starts the release phase of the voice playing the frequency.
    fn trigger_release(&self, frequency: f32) -> Result<(), EngineError>;
}

/// Gets an engine by name. Names starting with "mock" produce a mock engine, anything
/// else is looked up as a MIDI output port driving an external synthesizer.
pub fn get_engine(name: &str) -> Result<Arc<dyn Engine>, EngineError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Engine::get(name)));
    }

    Ok(Arc::new(midir::Engine::get(name)?))
}
