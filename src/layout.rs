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

//! Procedural keyboard layout.
//!
//! Turns a white key count and a starting note into the ordered white keys (each with
//! the geometry class the renderer should use) and the black keys sitting between them.
//! The whole run is centered around the origin.

use serde::{Deserialize, Serialize};

/// Semitone offsets of the white keys within an octave: C, D, E, F, G, A, B.
const WHITE_KEY_SEMITONES: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Note names by semitone.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The highest MIDI note number.
const MAX_NOTE: usize = 127;

/// Default number of white keys.
pub const DEFAULT_WHITE_KEY_COUNT: usize = 19;

/// Default starting note (an F).
pub const DEFAULT_STARTING_NOTE: u8 = 53;

/// Default width of a single white key in scene units.
pub const DEFAULT_WHITE_KEY_WIDTH: f32 = 0.0225;

/// Errors for layout configurations that cannot be realized.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("starting note {starting_note} is not a white key")]
    InvalidStartingNote { starting_note: u8 },

    #[error("a layout needs at least one white key")]
    NoKeys,

    #[error("layout reaches note {note}, which is outside of the MIDI note range")]
    NoteOutOfRange { note: usize },
}

/// The shape variant a rendered white key uses, determined by its black key neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryClass {
    /// No black key on either side.
    Full,
    /// Black keys on both sides.
    Middle,
    /// A black key on the right only.
    LeftAdjacentBlack,
    /// A black key on the left only.
    RightAdjacentBlack,
}

/// The layout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// The number of white keys to lay out.
    #[serde(default = "default_white_key_count")]
    white_key_count: usize,

    /// The MIDI note of the leftmost key. Must be a white key.
    #[serde(default = "default_starting_note")]
    starting_note: u8,

    /// The width of a single white key.
    #[serde(default = "default_white_key_width")]
    white_key_width: f32,
}

fn default_white_key_count() -> usize {
    DEFAULT_WHITE_KEY_COUNT
}

fn default_starting_note() -> u8 {
    DEFAULT_STARTING_NOTE
}

fn default_white_key_width() -> f32 {
    DEFAULT_WHITE_KEY_WIDTH
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            white_key_count: DEFAULT_WHITE_KEY_COUNT,
            starting_note: DEFAULT_STARTING_NOTE,
            white_key_width: DEFAULT_WHITE_KEY_WIDTH,
        }
    }
}

impl LayoutConfig {
    /// Creates a new layout configuration.
    pub fn new(white_key_count: usize, starting_note: u8, white_key_width: f32) -> LayoutConfig {
        LayoutConfig {
            white_key_count,
            starting_note,
            white_key_width,
        }
    }

    /// Returns the number of white keys.
    pub fn white_key_count(&self) -> usize {
        self.white_key_count
    }

    /// Returns the starting note.
    pub fn starting_note(&self) -> u8 {
        self.starting_note
    }

    /// Returns the white key width.
    pub fn white_key_width(&self) -> f32 {
        self.white_key_width
    }
}

/// A white key in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WhiteKey {
    note: u8,
    x_position: f32,
    geometry: GeometryClass,
}

impl WhiteKey {
    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn x_position(&self) -> f32 {
        self.x_position
    }

    pub fn geometry(&self) -> GeometryClass {
        self.geometry
    }
}

/// A black key in the layout. All black keys share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlackKey {
    note: u8,
    x_position: f32,
}

impl BlackKey {
    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn x_position(&self) -> f32 {
        self.x_position
    }
}

/// The generated key layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    white_keys: Vec<WhiteKey>,
    black_keys: Vec<BlackKey>,
}

impl Layout {
    /// The white keys, left to right.
    pub fn white_keys(&self) -> &[WhiteKey] {
        &self.white_keys
    }

    /// The black keys, left to right.
    pub fn black_keys(&self) -> &[BlackKey] {
        &self.black_keys
    }

    /// Every note in the layout in ascending order.
    pub fn note_ids(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self
            .white_keys
            .iter()
            .map(|key| key.note)
            .chain(self.black_keys.iter().map(|key| key.note))
            .collect();
        notes.sort_unstable();
        notes
    }
}

/// Returns true if a black key follows the white key at this position in the octave.
/// Only E (2) and B (6) have no black key to their right.
fn has_black_after(position_in_octave: usize) -> bool {
    matches!(position_in_octave, 0 | 1 | 3 | 4 | 5)
}

/// Generates the layout for the given configuration.
pub fn generate(config: &LayoutConfig) -> Result<Layout, LayoutError> {
    let count = config.white_key_count;
    if count == 0 {
        return Err(LayoutError::NoKeys);
    }

    let starting_note = config.starting_note;
    let starting_key_index = WHITE_KEY_SEMITONES
        .iter()
        .position(|semitone| *semitone == usize::from(starting_note % 12))
        .ok_or(LayoutError::InvalidStartingNote { starting_note })?;
    let base_octave = usize::from(starting_note / 12);

    let position = |i: usize| (starting_key_index + i) % 7;

    let notes = (0..count)
        .map(|i| {
            let octave = base_octave + (starting_key_index + i) / 7;
            let note = octave * 12 + WHITE_KEY_SEMITONES[position(i)];
            if note > MAX_NOTE {
                return Err(LayoutError::NoteOutOfRange { note });
            }
            Ok(note as u8)
        })
        .collect::<Result<Vec<u8>, LayoutError>>()?;

    let width = config.white_key_width;
    let total_width = count as f32 * width;

    let white_keys = notes
        .iter()
        .enumerate()
        .map(|(i, note)| {
            let black_on_left = i > 0 && has_black_after(position(i - 1));
            let black_on_right = i + 1 < count && has_black_after(position(i));
            let geometry = match (black_on_left, black_on_right) {
                (true, true) => GeometryClass::Middle,
                (false, true) => GeometryClass::LeftAdjacentBlack,
                (true, false) => GeometryClass::RightAdjacentBlack,
                (false, false) => GeometryClass::Full,
            };

            WhiteKey {
                note: *note,
                x_position: i as f32 * width - total_width / 2.0 + width / 2.0,
                geometry,
            }
        })
        .collect();

    let black_keys = (0..count - 1)
        .filter(|i| has_black_after(position(*i)))
        .map(|i| BlackKey {
            // C, D, F, G and A are each a semitone below their sharp.
            note: notes[i] + 1,
            x_position: (i + 1) as f32 * width - total_width / 2.0,
        })
        .collect();

    Ok(Layout {
        white_keys,
        black_keys,
    })
}

/// Returns a human readable name for the note, e.g. 60 is "C4".
pub fn note_name(note: u8) -> String {
    let octave = i16::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}
