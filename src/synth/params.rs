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
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Volume range in dB.
pub const VOLUME_DB_RANGE: (f32, f32) = (-60.0, 0.0);

/// Attack, decay and release range in seconds.
pub const ENVELOPE_TIME_RANGE: (f32, f32) = (0.0, 2.0);

/// Sustain level range.
pub const SUSTAIN_RANGE: (f32, f32) = (0.0, 1.0);

/// Errors from parsing a parameter assignment such as `attack=0.2`.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("expected <field>=<value>, got '{0}'")]
    Malformed(String),

    #[error("unknown synthesizer parameter '{0}'")]
    UnknownField(String),

    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },
}

/// The oscillator waveform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OscillatorShape {
    Sine,
    Square,
    #[default]
    Sawtooth,
    Triangle,
}

impl FromStr for OscillatorShape {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sine" => Ok(OscillatorShape::Sine),
            "square" => Ok(OscillatorShape::Square),
            "sawtooth" => Ok(OscillatorShape::Sawtooth),
            "triangle" => Ok(OscillatorShape::Triangle),
            _ => Err(ParamsError::InvalidValue {
                field: "oscillator".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OscillatorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OscillatorShape::Sine => "sine",
            OscillatorShape::Square => "square",
            OscillatorShape::Sawtooth => "sawtooth",
            OscillatorShape::Triangle => "triangle",
        };
        write!(f, "{}", name)
    }
}

/// An ADSR envelope. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// The user editable synthesizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesizerParams {
    pub volume_db: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub oscillator: OscillatorShape,
}

impl Default for SynthesizerParams {
    fn default() -> Self {
        SynthesizerParams {
            volume_db: -24.0,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
            oscillator: OscillatorShape::Sawtooth,
        }
    }
}

impl SynthesizerParams {
    /// Returns the envelope portion of the parameters.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
        }
    }

    /// Returns the parameters with every value clamped into its range. NaN values are
    /// replaced with their defaults.
    pub fn clamped(self) -> SynthesizerParams {
        let defaults = SynthesizerParams::default();
        SynthesizerParams {
            volume_db: clamp(self.volume_db, VOLUME_DB_RANGE, defaults.volume_db),
            attack: clamp(self.attack, ENVELOPE_TIME_RANGE, defaults.attack),
            decay: clamp(self.decay, ENVELOPE_TIME_RANGE, defaults.decay),
            sustain: clamp(self.sustain, SUSTAIN_RANGE, defaults.sustain),
            release: clamp(self.release, ENVELOPE_TIME_RANGE, defaults.release),
            oscillator: self.oscillator,
        }
    }

    /// Returns these parameters with the update applied on top. Values that aren't
    /// finite are ignored.
    pub fn merge(&self, update: &ParamsUpdate) -> SynthesizerParams {
        let pick = |value: Option<f32>, current: f32| {
            value.filter(|value| value.is_finite()).unwrap_or(current)
        };
        SynthesizerParams {
            volume_db: pick(update.volume_db, self.volume_db),
            attack: pick(update.attack, self.attack),
            decay: pick(update.decay, self.decay),
            sustain: pick(update.sustain, self.sustain),
            release: pick(update.release, self.release),
            oscillator: update.oscillator.unwrap_or(self.oscillator),
        }
        .clamped()
    }
}

fn clamp(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// A partial parameter edit. Unset fields are left alone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
pub struct ParamsUpdate {
    pub volume_db: Option<f32>,
    pub attack: Option<f32>,
    pub decay: Option<f32>,
    pub sustain: Option<f32>,
    pub release: Option<f32>,
    pub oscillator: Option<OscillatorShape>,
}

impl FromStr for ParamsUpdate {
    type Err = ParamsError;

    /// Parses a single `<field>=<value>` assignment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| ParamsError::Malformed(s.to_string()))?;
        let (field, value) = (field.trim(), value.trim());

        let number = || {
            value
                .parse::<f32>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or_else(|| ParamsError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                })
        };

        let mut update = ParamsUpdate::default();
        match field {
            "volume" | "volume_db" => update.volume_db = Some(number()?),
            "attack" => update.attack = Some(number()?),
            "decay" => update.decay = Some(number()?),
            "sustain" => update.sustain = Some(number()?),
            "release" => update.release = Some(number()?),
            "oscillator" => update.oscillator = Some(value.parse()?),
            _ => return Err(ParamsError::UnknownField(field.to_string())),
        }
        Ok(update)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge_keeps_unset_fields() {
        let params = SynthesizerParams::default();
        let merged = params.merge(&ParamsUpdate {
            attack: Some(0.5),
            oscillator: Some(OscillatorShape::Sine),
            ..Default::default()
        });

        assert_eq!(0.5, merged.attack);
        assert_eq!(OscillatorShape::Sine, merged.oscillator);
        assert_eq!(params.volume_db, merged.volume_db);
        assert_eq!(params.decay, merged.decay);
        assert_eq!(params.sustain, merged.sustain);
        assert_eq!(params.release, merged.release);
    }

    #[test]
    fn test_merge_clamps() {
        let merged = SynthesizerParams::default().merge(&ParamsUpdate {
            volume_db: Some(6.0),
            attack: Some(-1.0),
            release: Some(10.0),
            sustain: Some(1.5),
            ..Default::default()
        });

        assert_eq!(0.0, merged.volume_db);
        assert_eq!(0.0, merged.attack);
        assert_eq!(2.0, merged.release);
        assert_eq!(1.0, merged.sustain);
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            Ok(ParamsUpdate {
                attack: Some(0.2),
                ..Default::default()
            }),
            "attack=0.2".parse()
        );
        assert_eq!(
            Ok(ParamsUpdate {
                volume_db: Some(-12.0),
                ..Default::default()
            }),
            "volume = -12".parse()
        );
        assert_eq!(
            Ok(ParamsUpdate {
                oscillator: Some(OscillatorShape::Triangle),
                ..Default::default()
            }),
            "oscillator=Triangle".parse()
        );
        assert_eq!(
            Err(ParamsError::Malformed("attack".to_string())),
            "attack".parse::<ParamsUpdate>()
        );
        assert_eq!(
            Err(ParamsError::UnknownField("cutoff".to_string())),
            "cutoff=100".parse::<ParamsUpdate>()
        );
        assert!(matches!(
            "decay=slow".parse::<ParamsUpdate>(),
            Err(ParamsError::InvalidValue { .. })
        ));
        assert!(matches!(
            "oscillator=noise".parse::<ParamsUpdate>(),
            Err(ParamsError::InvalidValue { .. })
        ));
        for value in ["NaN", "inf", "-inf"] {
            assert_eq!(
                Err(ParamsError::InvalidValue {
                    field: "attack".to_string(),
                    value: value.to_string(),
                }),
                format!("attack={}", value).parse::<ParamsUpdate>()
            );
        }
    }

    #[test]
    fn test_non_finite_values() {
        let params = SynthesizerParams {
            attack: f32::NAN,
            volume_db: f32::NEG_INFINITY,
            ..Default::default()
        }
        .clamped();
        assert_eq!(SynthesizerParams::default().attack, params.attack);
        assert_eq!(VOLUME_DB_RANGE.0, params.volume_db);

        let merged = params.merge(&ParamsUpdate {
            decay: Some(f32::NAN),
            release: Some(f32::INFINITY),
            ..Default::default()
        });
        assert_eq!(params, merged);
    }

    #[test]
    fn test_oscillator_round_trip_names() {
        for shape in [
            OscillatorShape::Sine,
            OscillatorShape::Square,
            OscillatorShape::Sawtooth,
            OscillatorShape::Triangle,
        ] {
            assert_eq!(Ok(shape), shape.to_string().parse());
        }
    }
}
