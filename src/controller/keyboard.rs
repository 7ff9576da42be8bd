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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::{
    registry::KeyEvent,
    synth::{ParamsUpdate, DEFAULT_VELOCITY},
};

const DOWN: &str = "down";
const UP: &str = "up";
const SET: &str = "set";
const QUIT: &str = "quit";

/// A driver that plays keys and edits parameters from lines typed on stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and sends one command. Returns false once input is exhausted or the user
    /// quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <note> [velocity], {} <note>, {} <field>=<value>, {}): ",
            DOWN, UP, SET, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = match parse_command(&input) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(true),
            Err(reason) => {
                warn!(input = input.trim(), reason = %reason, "Unrecognized input");
                return Ok(true);
            }
        };

        let keep_going = event != Event::Shutdown;
        events_tx.blocking_send(event).map_err(io::Error::other)?;
        Ok(keep_going)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses one line of input. Blank lines produce no event.
fn parse_command(input: &str) -> Result<Option<Event>, String> {
    let mut parts = input.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let note = |arg: Option<&&str>| -> Result<u8, String> {
        let arg = arg.ok_or("missing note")?;
        arg.parse::<u8>()
            .ok()
            .filter(|note| *note <= 127)
            .ok_or_else(|| format!("invalid note '{}'", arg))
    };

    let event = match command.to_lowercase().as_str() {
        DOWN => {
            let velocity = match args.get(1) {
                Some(arg) => arg
                    .parse::<f32>()
                    .map_err(|_| format!("invalid velocity '{}'", arg))?,
                None => DEFAULT_VELOCITY,
            };
            Event::Key(KeyEvent::down(note(args.first())?, velocity))
        }
        UP => Event::Key(KeyEvent::up(note(args.first())?)),
        SET => {
            let assignment = args.concat();
            Event::Params(
                assignment
                    .parse::<ParamsUpdate>()
                    .map_err(|e| e.to_string())?,
            )
        }
        QUIT => Event::Shutdown,
        _ => return Err(format!("unknown command '{}'", command)),
    };
    Ok(Some(event))
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
