//! Tempo and gate-rate derivation
//!
//! Every trigger rate in an arrangement is a rational multiple of one master
//! tempo. A [`GateRatio`] says how many pulses fire per how many beats, so
//! changing the tempo rescales every voice together and voices that share a
//! bar stay phase-aligned.

use crate::error::{Error, Result};
use std::fmt;

/// Pulses per beats, kept as exact integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateRatio {
    pub pulses: u32,
    pub beats: u32,
}

impl GateRatio {
    /// Four pulses per beat.
    pub const SIXTEENTH: GateRatio = GateRatio::new(4, 1);
    /// Two pulses per beat.
    pub const EIGHTH: GateRatio = GateRatio::new(2, 1);
    pub const QUARTER: GateRatio = GateRatio::new(1, 1);
    /// One pulse per 4/4 bar.
    pub const BAR: GateRatio = GateRatio::new(1, 4);

    pub const fn new(pulses: u32, beats: u32) -> Self {
        Self { pulses, beats }
    }
}

impl fmt::Display for GateRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pulses, self.beats)
    }
}

/// A validated tempo in beats per minute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::invalid(
                "tempo_bpm",
                format!("tempo must be a finite value > 0, got {}", bpm),
            ));
        }
        Ok(Self { bpm })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Gate frequency in Hz: `bpm * pulses / (60 * beats)`.
    pub fn gate_hz(&self, ratio: GateRatio) -> f64 {
        self.bpm * ratio.pulses as f64 / (60.0 * ratio.beats as f64)
    }

    /// Gate period in milliseconds: `60000 * beats / (bpm * pulses)`.
    ///
    /// Infinite for a zero-pulse ratio.
    pub fn period_ms(&self, ratio: GateRatio) -> f64 {
        60_000.0 * ratio.beats as f64 / (self.bpm * ratio.pulses as f64)
    }
}
