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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::registry::RetriggerBehavior;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The highest MIDI channel number, counting from zero.
const MAX_CHANNEL: u8 = 15;

/// A YAML representation of the MIDI input configuration.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Midi {
    /// Only ports whose names contain this are used. All ports are used if unset.
    device: Option<String>,

    /// Only messages on this channel are played.
    channel: Option<u8>,

    /// How often to check for MIDI devices being connected or disconnected.
    poll_interval: Option<String>,

    /// What a press on a key that is already down does.
    retrigger: RetriggerBehavior,
}

impl Midi {
    /// New will create a new MIDI configuration.
    #[cfg(test)]
    pub fn new(device: Option<&str>, channel: Option<u8>) -> Midi {
        Midi {
            device: device.map(str::to_string),
            channel,
            poll_interval: None,
            retrigger: RetriggerBehavior::default(),
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the channel filter.
    pub fn channel(&self) -> Result<Option<u8>, ConfigError> {
        match self.channel {
            Some(channel) if channel > MAX_CHANNEL => Err(ConfigError::Channel(channel)),
            channel => Ok(channel),
        }
    }

    /// Returns the port polling interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(poll_interval) => Ok(DurationString::from_string(poll_interval.clone())
                .map_err(|e| ConfigError::Duration(e.to_string()))?
                .into()),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    /// Returns the retrigger behavior.
    pub fn retrigger(&self) -> RetriggerBehavior {
        self.retrigger
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let midi = Midi::default();
        assert_eq!(None, midi.device());
        assert_eq!(None, midi.channel()?);
        assert_eq!(DEFAULT_POLL_INTERVAL, midi.poll_interval()?);
        assert_eq!(RetriggerBehavior::Ignore, midi.retrigger());
        Ok(())
    }

    #[test]
    fn test_channel() {
        assert!(matches!(Midi::new(None, Some(15)).channel(), Ok(Some(15))));
        assert!(matches!(
            Midi::new(None, Some(16)).channel(),
            Err(ConfigError::Channel(16))
        ));
    }

    #[test]
    fn test_poll_interval() -> Result<(), ConfigError> {
        let mut midi = Midi::new(Some("Keystation"), None);
        midi.poll_interval = Some("2s".to_string());
        assert_eq!(Duration::from_secs(2), midi.poll_interval()?);

        midi.poll_interval = Some("often".to_string());
        assert!(matches!(midi.poll_interval(), Err(ConfigError::Duration(_))));
        Ok(())
    }
}
