//! Keys, scale modes and scale-degree frequencies
//!
//! Frequencies use twelve-tone equal temperament with A4 = 440 Hz, octave
//! numbering as in scientific pitch notation (C4 = MIDI 60).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

lazy_static::lazy_static! {
    /// Natural note letters to pitch class
    static ref NATURALS: HashMap<char, i32> = {
        let mut m = HashMap::new();
        m.insert('c', 0);
        m.insert('d', 2);
        m.insert('e', 4);
        m.insert('f', 5);
        m.insert('g', 7);
        m.insert('a', 9);
        m.insert('b', 11);
        m
    };
}

/// Pitch class 0..12, C = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn semitone(self) -> i32 {
        self.0 as i32
    }
}

impl FromStr for PitchClass {
    type Err = Error;

    /// Accepts a letter followed by any number of `#`/`s`/`♯` or `b`/`f`/`♭`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::invalid("key", format!("cannot parse musical key `{}`", s));
        let mut chars = s.trim().chars();
        let letter = chars.next().ok_or_else(bad)?.to_ascii_lowercase();
        let mut semitone = *NATURALS.get(&letter).ok_or_else(bad)?;
        for c in chars {
            match c {
                '#' | 's' | '♯' => semitone += 1,
                'b' | 'f' | '♭' => semitone -= 1,
                _ => return Err(bad()),
            }
        }
        Ok(PitchClass(semitone.rem_euclid(12) as u8))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
        ];
        write!(f, "{}", NAMES[self.0 as usize])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
}

impl ScaleMode {
    pub fn intervals(self) -> [i32; 7] {
        match self {
            ScaleMode::Major => [0, 2, 4, 5, 7, 9, 11],
            ScaleMode::Minor => [0, 2, 3, 5, 7, 8, 10],
            ScaleMode::Dorian => [0, 2, 3, 5, 7, 9, 10],
            ScaleMode::Phrygian => [0, 1, 3, 5, 7, 8, 10],
            ScaleMode::Lydian => [0, 2, 4, 6, 7, 9, 11],
            ScaleMode::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            ScaleMode::Locrian => [0, 1, 3, 5, 6, 8, 10],
            ScaleMode::HarmonicMinor => [0, 2, 3, 5, 7, 8, 11],
        }
    }
}

/// Frequency of a MIDI note number.
pub fn midi_to_hz(note: i32) -> f64 {
    440.0 * 2f64.powf((note - 69) as f64 / 12.0)
}

/// A tonic plus a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: ScaleMode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: ScaleMode) -> Self {
        Self { tonic, mode }
    }

    /// Semitones above the tonic for a 1-based scale degree.
    ///
    /// Degrees above 7 continue into the next octave (9 is the second an
    /// octave up); degrees below 1 continue downwards.
    pub fn degree_offset(&self, degree: i32) -> i32 {
        let zero_based = degree - 1;
        let octave = zero_based.div_euclid(7);
        let step = zero_based.rem_euclid(7) as usize;
        octave * 12 + self.mode.intervals()[step]
    }

    /// MIDI note of `degree`, counted from the tonic in `octave`.
    pub fn degree_midi(&self, degree: i32, octave: i32) -> i32 {
        (octave + 1) * 12 + self.tonic.semitone() + self.degree_offset(degree)
    }

    pub fn degree_hz(&self, degree: i32, octave: i32) -> f64 {
        midi_to_hz(self.degree_midi(degree, octave))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.tonic, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn parses_spellings() {
        assert_eq!("Eb".parse::<PitchClass>().unwrap().semitone(), 3);
        assert_eq!("d#".parse::<PitchClass>().unwrap().semitone(), 3);
        assert_eq!("ef".parse::<PitchClass>().unwrap().semitone(), 3);
        assert_eq!("Cb".parse::<PitchClass>().unwrap().semitone(), 11);
        assert_eq!("B#".parse::<PitchClass>().unwrap().semitone(), 0);
        assert!("H".parse::<PitchClass>().is_err());
        assert!("".parse::<PitchClass>().is_err());
        assert!("E7".parse::<PitchClass>().is_err());
    }

    #[test]
    fn reference_pitches() {
        assert!(close(midi_to_hz(69), 440.0));
        // G3, G1 and A7 as tuned in the drum kit
        assert!(close(midi_to_hz(55), 195.9977));
        assert!(close(midi_to_hz(31), 48.99943));
        assert!(close(midi_to_hz(105), 3520.0));
    }

    #[test]
    fn degrees_walk_the_mode() {
        let key = Key::new("Eb".parse().unwrap(), ScaleMode::Major);
        assert_eq!(key.degree_midi(1, 4), 63);
        assert_eq!(key.degree_midi(3, 4), 67);
        assert_eq!(key.degree_midi(8, 4), 75);
        assert_eq!(key.degree_midi(0, 4), 62);

        let minor = Key::new("Eb".parse().unwrap(), ScaleMode::Minor);
        assert_eq!(minor.degree_midi(3, 4), 66);
        assert!(close(minor.degree_hz(1, 4), 311.127));
    }
}
