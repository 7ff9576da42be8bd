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
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::controller::{self, Controller, Driver};
use crate::synth::VoiceManager;
use crate::{audio, keybed, layout, registry::PressRegistry};

pub mod error;
mod keyboard;
mod midi;

pub use self::error::ConfigError;
pub use self::keyboard::Keyboard;
pub use self::midi::Midi;

/// Loads the keyboard configuration and starts a controller fed by MIDI input and the
/// terminal.
pub fn init_keyboard_and_controller(path: &Path) -> Result<Controller, Box<dyn Error>> {
    let keyboard = Keyboard::deserialize(path)?;
    let midi_config = keyboard.midi();

    let layout = layout::generate(keyboard.layout())?;
    let engine = audio::get_engine(keyboard.engine())?;
    let voices = Arc::new(Mutex::new(VoiceManager::new(
        engine,
        keyboard.synth(),
        midi_config.retrigger(),
    )));
    let registry = PressRegistry::new(midi_config.retrigger());
    keybed::bind(&layout, &registry, voices.clone());

    let input = crate::midi::get_input(midi_config.device());
    info!(
        input = input.to_string(),
        permission = input.permission_state().to_string(),
        keys = layout.note_ids().len(),
        "Keyboard ready."
    );

    let drivers: Vec<Arc<dyn Driver>> = vec![
        Arc::new(controller::midi::Driver::new(
            input,
            midi_config.poll_interval()?,
        )),
        Arc::new(controller::keyboard::Driver::new()),
    ];
    Ok(Controller::new(
        registry,
        voices,
        midi_config.channel()?,
        drivers,
    ))
}
