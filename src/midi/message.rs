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
use serde::Serialize;

/// The command nibble for Note Off.
pub const NOTE_OFF: u8 = 0x8;

/// The command nibble for Note On.
pub const NOTE_ON: u8 = 0x9;

/// A raw MIDI buffer split into its fields. Values are passed through as received,
/// nothing is range checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParsedMidiMessage {
    /// The high nibble of the status byte.
    pub command: u8,
    /// The low nibble of the status byte.
    pub channel: u8,
    /// The second byte.
    pub note: u8,
    /// The third byte normalized to [0, 1], or 0 if the buffer has no third byte.
    pub velocity: f32,
}

/// Parses a raw MIDI buffer. Buffers shorter than two bytes yield None and anything
/// past the third byte is ignored.
pub fn parse(raw: &[u8]) -> Option<ParsedMidiMessage> {
    let (status, note) = match raw {
        [status, note, ..] => (*status, *note),
        _ => return None,
    };

    Some(ParsedMidiMessage {
        command: status >> 4,
        channel: status & 0xF,
        note,
        velocity: raw.get(2).map_or(0.0, |velocity| f32::from(*velocity) / 127.0),
    })
}

#[cfg(test)]
mod test {
    use midly::{live::LiveEvent, MidiMessage};

    use super::*;

    #[test]
    fn test_parse_note_on() {
        assert_eq!(
            Some(ParsedMidiMessage {
                command: 9,
                channel: 0,
                note: 60,
                velocity: 64.0 / 127.0,
            }),
            parse(&[0x90, 0x3C, 0x40])
        );
    }

    #[test]
    fn test_parse_without_velocity() {
        assert_eq!(
            Some(ParsedMidiMessage {
                command: 8,
                channel: 0,
                note: 60,
                velocity: 0.0,
            }),
            parse(&[0x80, 0x3C])
        );
    }

    #[test]
    fn test_parse_short_buffers() {
        assert_eq!(None, parse(&[0x3C]));
        assert_eq!(None, parse(&[]));
    }

    #[test]
    fn test_parse_passes_values_through() {
        let parsed = parse(&[0xBF, 0xFF, 0x7F, 0x01, 0x02]).expect("expected message");
        assert_eq!(0xB, parsed.command);
        assert_eq!(0xF, parsed.channel);
        assert_eq!(0xFF, parsed.note);
        assert_eq!(1.0, parsed.velocity);
    }

    #[test]
    fn test_parse_matches_midly_encoding() -> Result<(), std::io::Error> {
        let event = LiveEvent::Midi {
            channel: 5.into(),
            message: MidiMessage::NoteOn {
                key: 72.into(),
                vel: 127.into(),
            },
        };
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write_std(&mut buf)?;

        let parsed = parse(&buf).expect("expected message");
        assert_eq!(NOTE_ON, parsed.command);
        assert_eq!(5, parsed.channel);
        assert_eq!(72, parsed.note);
        assert_eq!(1.0, parsed.velocity);
        Ok(())
    }
}
