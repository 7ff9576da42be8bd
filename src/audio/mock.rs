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

use parking_lot::Mutex;
use tracing::debug;

use super::{EngineError, EngineState, VoiceRequest};
use crate::synth::{Envelope, OscillatorShape};

/// A command received by the mock engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Resume,
    Volume(f32),
    Envelope(Envelope),
    Oscillator(OscillatorShape),
    Attack(VoiceRequest),
    Release(f32),
}

struct State {
    engine_state: EngineState,
    failing_resumes: usize,
    drop_while_suspended: bool,
    commands: Vec<Command>,
}

/// A mock engine. Makes no sound and records every command it accepts.
#[derive(Clone)]
pub struct Engine {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Engine {
    /// Gets the given mock engine. It starts out suspended.
    pub fn get(name: &str) -> Engine {
        Engine {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State {
                engine_state: EngineState::Suspended,
                failing_resumes: 0,
                drop_while_suspended: false,
                commands: Vec::new(),
            })),
        }
    }

    /// Makes the next `count` resumes fail.
    pub fn fail_resumes(&self, count: usize) {
        self.state.lock().failing_resumes = count;
    }

    /// Makes the engine drop every command but resume while it is suspended, the way an
    /// engine without an open output does.
    pub fn drop_while_suspended(&self) {
        self.state.lock().drop_while_suspended = true;
    }

    /// Returns the recorded commands.
    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().commands.clone()
    }

    /// Returns the frequencies of the recorded attacks.
    pub fn attacks(&self) -> Vec<f32> {
        self.commands()
            .iter()
            .filter_map(|command| match command {
                Command::Attack(voice) => Some(voice.frequency),
                _ => None,
            })
            .collect()
    }

    /// Returns the frequencies of the recorded releases.
    pub fn releases(&self) -> Vec<f32> {
        self.commands()
            .iter()
            .filter_map(|command| match command {
                Command::Release(frequency) => Some(*frequency),
                _ => None,
            })
            .collect()
    }

    /// Forgets the recorded commands.
    pub fn clear(&self) {
        self.state.lock().commands.clear();
    }

    fn record(&self, command: Command) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.drop_while_suspended && state.engine_state == EngineState::Suspended {
            debug!(engine = self.name, command = ?command, "Mock engine suspended, dropping.");
            return Ok(());
        }

        debug!(engine = self.name, command = ?command, "Mock engine command.");
        state.commands.push(command);
        Ok(())
    }
}

impl super::Engine for Engine {
    fn state(&self) -> EngineState {
        self.state.lock().engine_state
    }

    fn resume(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.failing_resumes > 0 {
            state.failing_resumes -= 1;
            return Err(EngineError::Activation("mock resume failure".to_string()));
        }

        state.engine_state = EngineState::Running;
        state.commands.push(Command::Resume);
        Ok(())
    }

    fn set_volume_db(&self, volume_db: f32) -> Result<(), EngineError> {
        self.record(Command::Volume(volume_db))
    }

    fn set_envelope(&self, envelope: Envelope) -> Result<(), EngineError> {
        self.record(Command::Envelope(envelope))
    }

    fn set_oscillator(&self, oscillator: OscillatorShape) -> Result<(), EngineError> {
        self.record(Command::Oscillator(oscillator))
    }

    fn trigger_attack(&self, voice: VoiceRequest) -> Result<(), EngineError> {
        if self.state() == EngineState::Suspended {
            debug!(engine = self.name, "Mock engine suspended, dropping attack.");
            return Ok(());
        }
        self.record(Command::Attack(voice))
    }

    fn trigger_release(&self, frequency: f32) -> Result<(), EngineError> {
        self.record(Command::Release(frequency))
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
