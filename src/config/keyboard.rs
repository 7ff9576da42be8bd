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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use super::{error::ConfigError, midi::Midi};
use crate::{
    layout::{self, LayoutConfig},
    synth::SynthesizerParams,
};

const DEFAULT_ENGINE: &str = "mock";

/// The YAML representation of a keyboard: its MIDI input, its keys and the synthesizer
/// they play.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Keyboard {
    /// The MIDI input configuration.
    midi: Midi,

    /// The on screen key layout.
    layout: LayoutConfig,

    /// The initial synthesizer parameters.
    synth: SynthesizerParams,

    /// The audio engine. Names starting with "mock" are silent, anything else names a
    /// MIDI output port.
    engine: String,
}

impl Default for Keyboard {
    fn default() -> Self {
        Keyboard {
            midi: Midi::default(),
            layout: LayoutConfig::default(),
            synth: SynthesizerParams::default(),
            engine: DEFAULT_ENGINE.to_string(),
        }
    }
}

impl Keyboard {
    /// Deserializes and validates a keyboard configuration file.
    pub fn deserialize(path: &Path) -> Result<Keyboard, ConfigError> {
        let keyboard = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Keyboard>()?;

        layout::generate(&keyboard.layout)?;
        keyboard.midi.channel()?;
        keyboard.midi.poll_interval()?;
        Ok(keyboard)
    }

    /// Returns the MIDI configuration.
    pub fn midi(&self) -> &Midi {
        &self.midi
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the initial synthesizer parameters, clamped into range.
    pub fn synth(&self) -> SynthesizerParams {
        self.synth.clamped()
    }

    /// Returns the engine name.
    pub fn engine(&self) -> &str {
        &self.engine
    }
}
