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
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use keysynth::layout::{self, LayoutConfig};
use keysynth::{config, midi};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A playable polyphonic keyboard synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Prints the key layout for the given keyboard shape.
    Layout {
        /// The number of white keys.
        #[arg(short = 'k', long, default_value_t = layout::DEFAULT_WHITE_KEY_COUNT)]
        white_keys: usize,
        /// The MIDI note of the leftmost key.
        #[arg(short, long, default_value_t = layout::DEFAULT_STARTING_NOTE)]
        starting_note: u8,
        /// The width of a white key.
        #[arg(short = 'w', long, default_value_t = layout::DEFAULT_WHITE_KEY_WIDTH)]
        width: f32,
    },
    /// Starts the keyboard with the given configuration.
    Start {
        /// The path to the keyboard configuration.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MidiDevices {} => {
            let input = midi::get_input(None);
            println!("MIDI access: {}", input.permission_state());

            let devices = midi::list_ports()?;
            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Layout {
            white_keys,
            starting_note,
            width,
        } => {
            let keys = layout::generate(&LayoutConfig::new(white_keys, starting_note, width))?;
            println!("# {} keys", keys.note_ids().len());
            for key in keys.white_keys() {
                println!("# {} {:?}", layout::note_name(key.note()), key.geometry());
            }
            print!("{}", serde_yml::to_string(&keys)?);
        }
        Commands::Start { config_path } => {
            config::init_keyboard_and_controller(&PathBuf::from(config_path))?
                .join()
                .await?;
        }
    }

    Ok(())
}
