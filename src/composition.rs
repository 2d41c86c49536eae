//! Composition description: the data a graph is composed from
//!
//! A composition is plain data loaded from TOML. Reloading the file and
//! composing again is the whole hot-reload story; no code is reloaded.
//!
//! ```toml
//! tempo_bpm = 138.0
//! key = "Eb"
//! scale_mode = "major"
//! buses = ["drums", "loops"]
//!
//! [sample_assets]
//! chords = "./samples/idioteque.wav"
//!
//! [mix_levels]
//! drums = 0.5
//! ```

use crate::error::{Error, Result};
use crate::node::SampleMode;
use crate::tonal::{Key, ScaleMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The bundled "Idioteque" arrangement.
pub const IDIOTEQUE_TOML: &str = include_str!("../presets/idioteque.toml");

/// A mix bus that can be summed into the channel outputs.
///
/// Declaration order is the summation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bus {
    Drums,
    Pad,
    Arpeggio,
    Loops,
}

impl Bus {
    pub const MIX_ORDER: [Bus; 4] = [Bus::Drums, Bus::Pad, Bus::Arpeggio, Bus::Loops];

    /// Name of this bus's entry in `mix_levels`.
    pub fn level_key(self) -> &'static str {
        match self {
            Bus::Drums => "drums",
            Bus::Pad => "pad",
            Bus::Arpeggio => "arpeggio",
            Bus::Loops => "loops",
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.level_key())
    }
}

/// Step patterns. Drum patterns are trigger levels; `chords` and
/// `arpeggio` are 1-based scale degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patterns {
    pub kick: Vec<f64>,
    pub shaker: Vec<f64>,
    pub hat: Vec<f64>,
    pub snare: Vec<f64>,
    pub chords: Vec<i32>,
    pub arpeggio: Vec<i32>,
}

/// Which tempo gate triggers a sample player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopGate {
    /// Zero-rate train: the player starts once and is never retriggered
    #[default]
    Never,
    Bar,
    Eighth,
    Sixteenth,
}

/// How the sample-loop bus reaches the two outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelMode {
    /// Left plays sample channel 0, right plays channel 1
    #[default]
    Stereo,
    /// Both sample channels are summed and sent to both outputs
    MonoSum,
}

fn default_loop_mode() -> SampleMode {
    SampleMode::Loop
}

/// One member of the sample-loop bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSpec {
    /// Key into `sample_assets`
    pub asset: String,
    /// Key into `mix_levels`
    pub level: String,
    #[serde(default = "default_loop_mode")]
    pub mode: SampleMode,
    #[serde(default)]
    pub gate: LoopGate,
}

/// Delay plus convolution chain applied to the snare voices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub delay_ms: f64,
    pub feedback: f64,
    /// Keys into `sample_assets`, in chain order
    pub impulses: Vec<String>,
}

/// A constant that may wobble: `center + amount * sin(rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wobble {
    pub center: f64,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub amount: f64,
}

impl Wobble {
    pub const fn fixed(center: f64) -> Self {
        Self {
            center,
            rate: 0.0,
            amount: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HatVoice {
    pub pitch: f64,
    pub tone: f64,
    pub attack: f64,
    pub decay: Wobble,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClapVoice {
    pub tone: f64,
    pub attack: f64,
    pub decay: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KickVoice {
    pub pitch: f64,
    pub click: f64,
    pub decay: f64,
    pub drive: f64,
    pub attack: Wobble,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PadVoice {
    pub octave: i32,
    pub cutoff: f64,
    pub resonance: f64,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArpVoice {
    pub octave: i32,
    pub cutoff: f64,
    pub resonance: f64,
    pub decay: f64,
}

/// Voice tunings; defaults reproduce the Idioteque kit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Voices {
    pub shaker: HatVoice,
    pub hat: HatVoice,
    pub snare: ClapVoice,
    pub snare_high: ClapVoice,
    pub kick: KickVoice,
    pub pad: PadVoice,
    pub arpeggio: ArpVoice,
}

impl Default for Voices {
    fn default() -> Self {
        let hat_decay = Wobble {
            center: 0.5,
            rate: 4.0,
            amount: 0.47,
        };
        Self {
            shaker: HatVoice {
                pitch: 195.9977,
                tone: 6271.927,
                attack: 0.005,
                decay: hat_decay,
            },
            hat: HatVoice {
                pitch: 391.9954,
                tone: 6271.927,
                attack: 0.005,
                decay: hat_decay,
            },
            snare: ClapVoice {
                tone: 783.9909,
                attack: 0.005,
                decay: 0.40,
            },
            snare_high: ClapVoice {
                tone: 3520.0,
                attack: 0.005,
                decay: 0.40,
            },
            kick: KickVoice {
                pitch: 48.99943,
                click: 0.15,
                decay: 0.25,
                drive: 5.0,
                attack: Wobble {
                    center: 0.255,
                    rate: 1.0,
                    amount: 0.2,
                },
            },
            pad: PadVoice {
                octave: 3,
                cutoff: 1800.0,
                resonance: 0.7,
                attack: 0.4,
                decay: 0.8,
                sustain: 0.6,
                release: 1.2,
            },
            arpeggio: ArpVoice {
                octave: 5,
                cutoff: 2400.0,
                resonance: 1.2,
                decay: 0.12,
            },
        }
    }
}

fn default_sample_rate() -> f64 {
    44_100.0
}

/// Everything `compose` needs to build one arrangement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Composition {
    pub tempo_bpm: f64,
    pub key: String,
    pub scale_mode: ScaleMode,
    /// Buses summed into the outputs; order here is irrelevant
    pub buses: Vec<Bus>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub channel_mode: ChannelMode,
    #[serde(default)]
    pub sample_assets: BTreeMap<String, String>,
    #[serde(default)]
    pub mix_levels: BTreeMap<String, f64>,
    #[serde(default)]
    pub patterns: Patterns,
    #[serde(default)]
    pub loops: Vec<LoopSpec>,
    pub room: RoomSpec,
    #[serde(default)]
    pub voices: Voices,
}

impl Composition {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn idioteque() -> Result<Self> {
        Self::from_toml_str(IDIOTEQUE_TOML)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn musical_key(&self) -> Result<Key> {
        Ok(Key::new(self.key.parse()?, self.scale_mode))
    }

    pub fn includes(&self, bus: Bus) -> bool {
        self.buses.contains(&bus)
    }

    /// Gain for a mix stage. Missing stages are an error, never a default.
    pub fn level(&self, stage: &str) -> Result<f64> {
        self.mix_levels
            .get(stage)
            .copied()
            .ok_or_else(|| Error::invalid(format!("mix_levels.{}", stage), "no such mix level"))
    }

    /// Path of a named asset, passed through unchecked.
    pub fn asset(&self, name: &str) -> Result<&str> {
        self.sample_assets
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::invalid(format!("sample_assets.{}", name), "no such asset"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_preset_parses() {
        let c = Composition::idioteque().unwrap();
        assert_eq!(c.tempo_bpm, 138.0);
        assert_eq!(c.key, "Eb");
        assert_eq!(c.patterns.kick.len(), 80);
        assert_eq!(c.room.impulses.len(), 3);
        assert!(c.includes(Bus::Drums));
    }

    #[test]
    fn missing_level_is_an_error() {
        let c = Composition::idioteque().unwrap();
        assert!(c.level("no_such_stage").unwrap_err().is_invalid_parameter());
        assert!(c.asset("no_such_asset").unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml = format!("tempo = 120.0\n{}", IDIOTEQUE_TOML);
        assert!(matches!(
            Composition::from_toml_str(&toml),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn loop_entries_default_to_free_running_loops() {
        let c = Composition::idioteque().unwrap();
        assert_eq!(c.channel_mode, ChannelMode::Stereo);
        assert_eq!(c.loops[0].mode, SampleMode::Loop);
        assert_eq!(c.loops[0].gate, LoopGate::Never);

        let toml = IDIOTEQUE_TOML
            .replace("buses = [", "channel_mode = \"mono-sum\"\nbuses = [")
            .replace(
                "level = \"chords_loop\"",
                "level = \"chords_loop\"\nmode = \"one_shot\"\ngate = \"bar\"",
            );
        let c = Composition::from_toml_str(&toml).unwrap();
        assert_eq!(c.channel_mode, ChannelMode::MonoSum);
        assert_eq!(c.loops[0].mode, SampleMode::OneShot);
        assert_eq!(c.loops[0].gate, LoopGate::Bar);
    }

    #[test]
    fn round_trips_through_toml() {
        let c = Composition::idioteque().unwrap();
        let again = Composition::from_toml_str(&c.to_toml().unwrap()).unwrap();
        assert_eq!(c, again);
    }
}
