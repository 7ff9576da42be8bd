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
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::{
    layout::Layout,
    registry::{Handler, KeyEvent, PressRegistry, Unregister},
    synth::VoiceManager,
};

/// Binds every key of the layout to the voice manager. Pressing a key triggers its
/// note and releasing it releases the note. Returns one handle per bound key.
pub fn bind(
    layout: &Layout,
    registry: &PressRegistry,
    voices: Arc<Mutex<VoiceManager>>,
) -> Vec<Unregister> {
    let note_ids = layout.note_ids();
    info!(keys = note_ids.len(), "Binding keys.");

    note_ids
        .into_iter()
        .map(|note| {
            let on_press: Handler = {
                let voices = voices.clone();
                Arc::new(move |event: &KeyEvent| {
                    voices.lock().trigger_note(event.note, event.velocity)
                })
            };
            let on_release: Handler = {
                let voices = voices.clone();
                Arc::new(move |event: &KeyEvent| voices.lock().release_note(event.note))
            };
            registry.register(note, on_press, Some(on_release))
        })
        .collect()
}
