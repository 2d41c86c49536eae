//! Voice recipes
//!
//! Each percussive voice is a fixed pipeline:
//! source -> shaping filter -> gated envelope -> optional drive,
//! optionally followed by a [`room`]. Melodic voices read their pitch from a
//! held frequency sequencer so the engine keeps their phase across reloads.

use crate::composition::{ArpVoice, ClapVoice, HatVoice, KickVoice, PadVoice, Wobble};
use crate::error::Result;
use crate::graph::GraphBuilder;
use crate::node::{NodeId, Param, Waveform};
use crate::tonal::Key;

/// Partial ratios of the metallic hat cluster.
const HAT_RATIOS: [f64; 6] = [2.0, 3.0, 4.16, 5.43, 6.79, 8.21];

/// Pitch sweep depth of the kick, as a multiple of its base pitch.
const KICK_SWEEP: f64 = 4.0;

const BUTTERWORTH_Q: f64 = 0.707;

/// A wobble with no depth is just its centre value.
pub fn wobble(b: &mut GraphBuilder, w: Wobble) -> Param {
    if w.amount == 0.0 {
        w.center.into()
    } else {
        b.modulate(w.center, w.rate, w.amount).into()
    }
}

/// Six detuned squares, band- then high-passed at `tone`.
pub fn hat(b: &mut GraphBuilder, voice: &HatVoice, gate: NodeId) -> NodeId {
    let partials: Vec<(f64, NodeId)> = HAT_RATIOS
        .iter()
        .map(|ratio| {
            let osc = b.osc(Waveform::Square, voice.pitch * ratio);
            (1.0 / HAT_RATIOS.len() as f64, osc)
        })
        .collect();
    let metal = b.mix(&partials);
    let band = b.bandpass(voice.tone, BUTTERWORTH_Q, metal);
    let bright = b.highpass(voice.tone, BUTTERWORTH_Q, band);
    let decay = wobble(b, voice.decay);
    let env = b.adsr(voice.attack, decay, 0.0, decay, gate);
    b.mul(bright, env)
}

/// Band-passed noise burst.
pub fn clap(b: &mut GraphBuilder, voice: &ClapVoice, gate: NodeId) -> NodeId {
    let noise = b.noise();
    let band = b.bandpass(voice.tone, 1.214, noise);
    let env = b.adsr(voice.attack, voice.decay, 0.0, voice.decay, gate);
    b.mul(band, env)
}

/// Sine with a fast downward pitch sweep, driven into saturation.
pub fn kick(b: &mut GraphBuilder, voice: &KickVoice, gate: NodeId) -> NodeId {
    let sweep = b.adsr(0.005, voice.click, 0.0, voice.click, gate);
    let freq = b.weighted(&[
        (1.0, Param::from(voice.pitch)),
        (voice.pitch * KICK_SWEEP, Param::Node(sweep)),
    ]);
    let body = b.cycle(freq);
    let attack = wobble(b, voice.attack);
    let amp = b.adsr(attack, voice.decay, 0.0, voice.decay, gate);
    let shaped = b.mul(body, amp);
    b.drive(voice.drive, shaped)
}

/// Dry signal plus a delayed, serially convolved copy.
///
/// The wet path is `input -> delay -> impulses[0] -> impulses[1] -> ...`;
/// the order of `impulses` is kept exactly.
pub fn room<S: AsRef<str>>(
    b: &mut GraphBuilder,
    input: NodeId,
    buffer_size: u32,
    delay_samples: f64,
    feedback: f64,
    impulses: &[S],
) -> NodeId {
    let delayed = b.delay(buffer_size, delay_samples, feedback, input);
    let wet = b.convolve_chain(delayed, impulses);
    b.add_all(&[Param::Node(input), Param::Node(wet)])
}

/// Scale degrees to step frequencies in `octave`.
fn degree_steps(key: &Key, degrees: &[i32], offset: i32, octave: i32) -> Vec<f64> {
    degrees
        .iter()
        .map(|d| key.degree_hz(d + offset, octave))
        .collect()
}

/// Triads on each chord degree, held for the length of the chord gate.
pub fn pad(
    b: &mut GraphBuilder,
    key: &Key,
    voice: &PadVoice,
    degrees: &[i32],
    gate: NodeId,
) -> Result<NodeId> {
    let mut tones = Vec::with_capacity(3);
    for (name, offset) in [("root", 0), ("third", 2), ("fifth", 4)] {
        let steps = degree_steps(key, degrees, offset, voice.octave);
        let seq = b.seq(&format!("pad.{}", name), &steps, true, gate)?;
        let osc = b.osc(Waveform::Saw, seq);
        tones.push((1.0 / 3.0, osc));
    }
    let chord = b.mix(&tones);
    let warm = b.lowpass(voice.cutoff, voice.resonance, chord);
    let env = b.adsr(voice.attack, voice.decay, voice.sustain, voice.release, gate);
    Ok(b.mul(warm, env))
}

/// Plucked square wave stepping through `degrees` once per gate.
pub fn arpeggio(
    b: &mut GraphBuilder,
    key: &Key,
    voice: &ArpVoice,
    degrees: &[i32],
    gate: NodeId,
) -> Result<NodeId> {
    let steps = degree_steps(key, degrees, 0, voice.octave);
    let seq = b.seq("arpeggio.pitch", &steps, true, gate)?;
    let osc = b.osc(Waveform::Square, seq);
    let filtered = b.lowpass(voice.cutoff, voice.resonance, osc);
    let env = b.adsr(0.002, voice.decay, 0.0, voice.decay, gate);
    Ok(b.mul(filtered, env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn fixed_wobble_is_a_constant() {
        let mut b = GraphBuilder::new();
        assert_eq!(wobble(&mut b, Wobble::fixed(0.3)), Param::from(0.3));
        assert!(b.is_empty());
    }

    #[test]
    fn room_keeps_impulse_order_with_repeats() {
        let mut b = GraphBuilder::new();
        let src = b.noise();
        let out = room(&mut b, src, 44_100, 2205.0, 0.5, &["a.wav", "b.wav", "a.wav"]);
        let g = b.finish(out, out).unwrap();
        let Some(Node::Mixer { inputs }) = g.node(out) else {
            panic!("room output should be a mixer");
        };
        let wet = inputs[1].input.as_node().unwrap();
        assert_eq!(g.convolution_chain(wet), vec!["a.wav", "b.wav", "a.wav"]);
        // three distinct convolution stages survive interning
        let convolutions = g
            .nodes()
            .iter()
            .filter(|n| matches!(n, Node::Convolution { .. }))
            .count();
        assert_eq!(convolutions, 3);
    }

    #[test]
    fn hat_has_six_partials() {
        let mut b = GraphBuilder::new();
        let gate = b.train(4.6).unwrap();
        let voice = HatVoice {
            pitch: 100.0,
            tone: 5000.0,
            attack: 0.005,
            decay: Wobble::fixed(0.2),
        };
        let out = hat(&mut b, &voice, gate);
        let g = b.finish(out, out).unwrap();
        let squares = g
            .nodes()
            .iter()
            .filter(|n| matches!(n, Node::Oscillator { waveform: Waveform::Square, .. }))
            .count();
        assert_eq!(squares, 6);
    }
}
