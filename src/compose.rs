//! The graph composer
//!
//! [`compose`] turns a [`Composition`] into a [`StereoGraph`]. It is a pure
//! function: no I/O, no shared state, and the same composition always yields
//! a structurally identical graph. Asset paths are copied into the graph as
//! given; whether they exist is for the render engine to find out.
//!
//! ## Timing
//!
//! All gates derive from the composition tempo:
//!
//! | gate      | ratio | drives                         |
//! |-----------|-------|--------------------------------|
//! | sixteenth | 4/1   | kick sequencer, arpeggio       |
//! | eighth    | 2/1   | shaker, hat and snare          |
//! | bar       | 1/4   | chord (pad) sequencers         |
//! | never     | 0 Hz  | free-running sample loops      |
//!
//! A loop entry may pick any of these for its sample player instead, e.g. a
//! one-shot chord sample retriggered on the bar gate.
//!
//! ## Mix-down
//!
//! Each channel is a single mixer summing, in this order: drums, pad,
//! arpeggio, sample loops. Only buses named in `buses` take part. The drum
//! bus sums shaker, hat, snare, high snare, kick. In `stereo` channel mode the
//! left output reads sample channel 0 and the right reads channel 1; in
//! `mono-sum` both sample channels are summed into one loop bus feeding both
//! outputs. The order is fixed so the graph, and the float summation the
//! engine performs over it, is reproducible.

use crate::composition::{Bus, ChannelMode, Composition, LoopGate};
use crate::error::{Error, Result};
use crate::graph::{ms_to_samples, Channel, GraphBuilder, StereoGraph};
use crate::node::NodeId;
use crate::tempo::{GateRatio, Tempo};
use crate::voices;
use tracing::{debug, warn};

/// The arrangement's gate trains.
#[derive(Debug, Clone, Copy)]
pub struct Gates {
    pub sixteenth: NodeId,
    pub eighth: NodeId,
    pub bar: NodeId,
    pub never: NodeId,
}

impl Gates {
    pub fn derive(b: &mut GraphBuilder, tempo: &Tempo) -> Result<Self> {
        Ok(Self {
            sixteenth: b.train(tempo.gate_hz(GateRatio::SIXTEENTH))?,
            eighth: b.train(tempo.gate_hz(GateRatio::EIGHTH))?,
            bar: b.train(tempo.gate_hz(GateRatio::BAR))?,
            never: b.train(0.0)?,
        })
    }

    pub fn select(&self, gate: LoopGate) -> NodeId {
        match gate {
            LoopGate::Never => self.never,
            LoopGate::Bar => self.bar,
            LoopGate::Eighth => self.eighth,
            LoopGate::Sixteenth => self.sixteenth,
        }
    }
}

/// Reject values that would produce nonsense sample counts or an unstable
/// feedback loop.
fn validate_rates(c: &Composition) -> Result<()> {
    if !c.sample_rate.is_finite() || c.sample_rate <= 0.0 || c.sample_rate > u32::MAX as f64 {
        return Err(Error::invalid(
            "sample_rate",
            format!("must be a finite value in (0, {}], got {}", u32::MAX, c.sample_rate),
        ));
    }
    if !c.room.delay_ms.is_finite() || c.room.delay_ms < 0.0 {
        return Err(Error::invalid(
            "room.delay_ms",
            format!("must be a finite value >= 0, got {}", c.room.delay_ms),
        ));
    }
    if !c.room.feedback.is_finite() || c.room.feedback.abs() >= 1.0 {
        return Err(Error::invalid(
            "room.feedback",
            format!("must lie strictly between -1 and 1, got {}", c.room.feedback),
        ));
    }
    Ok(())
}

/// Build both channel graphs for `composition`.
pub fn compose(composition: &Composition) -> Result<StereoGraph> {
    let tempo = Tempo::new(composition.tempo_bpm)?;
    let key = composition.musical_key()?;
    validate_rates(composition)?;
    debug!(bpm = tempo.bpm(), key = %key, buses = ?composition.buses, "composing");

    let mut b = GraphBuilder::new();
    let gates = Gates::derive(&mut b, &tempo)?;

    let mut left = Vec::new();
    let mut right = Vec::new();
    for bus in Bus::MIX_ORDER {
        if !composition.includes(bus) {
            continue;
        }
        let level = composition.level(bus.level_key())?;
        match bus {
            Bus::Drums => {
                let drums = drum_bus(&mut b, composition, &gates)?;
                left.push((level, drums));
                right.push((level, drums));
            }
            Bus::Pad => {
                let pad = voices::pad(
                    &mut b,
                    &key,
                    &composition.voices.pad,
                    &composition.patterns.chords,
                    gates.bar,
                )?;
                left.push((level, pad));
                right.push((level, pad));
            }
            Bus::Arpeggio => {
                let arp = voices::arpeggio(
                    &mut b,
                    &key,
                    &composition.voices.arpeggio,
                    &composition.patterns.arpeggio,
                    gates.sixteenth,
                )?;
                left.push((level, arp));
                right.push((level, arp));
            }
            Bus::Loops => match composition.channel_mode {
                ChannelMode::Stereo => {
                    left.push((level, loop_bus(&mut b, composition, &gates, &[Channel::Left])?));
                    right.push((level, loop_bus(&mut b, composition, &gates, &[Channel::Right])?));
                }
                ChannelMode::MonoSum => {
                    let both = [Channel::Left, Channel::Right];
                    let loops = loop_bus(&mut b, composition, &gates, &both)?;
                    left.push((level, loops));
                    right.push((level, loops));
                }
            },
        }
    }
    if left.is_empty() {
        warn!("no buses selected, composing silence");
    }

    let left = b.mix(&left);
    let right = b.mix(&right);
    let graph = b.finish(left, right)?;
    debug!(nodes = graph.len(), "composed");
    Ok(graph)
}

fn drum_bus(b: &mut GraphBuilder, c: &Composition, gates: &Gates) -> Result<NodeId> {
    let patterns = &c.patterns;
    let kit = &c.voices;

    let shaker_seq = b.seq("drums.shaker", &patterns.shaker, false, gates.eighth)?;
    let hat_seq = b.seq("drums.hat", &patterns.hat, false, gates.eighth)?;
    let snare_seq = b.seq("drums.snare", &patterns.snare, false, gates.eighth)?;
    let kick_seq = b.seq("drums.kick", &patterns.kick, true, gates.sixteenth)?;

    let impulses = c
        .room
        .impulses
        .iter()
        .map(|name| c.asset(name))
        .collect::<Result<Vec<_>>>()?;
    let buffer_size = c.sample_rate.round() as u32;
    let delay_samples = ms_to_samples(c.room.delay_ms, c.sample_rate);

    let shaker = voices::hat(b, &kit.shaker, shaker_seq);
    let hat = voices::hat(b, &kit.hat, hat_seq);
    let snare = voices::clap(b, &kit.snare, snare_seq);
    let snare = voices::room(b, snare, buffer_size, delay_samples, c.room.feedback, &impulses);
    let snare_high = voices::clap(b, &kit.snare_high, snare_seq);
    let snare_high = voices::room(b, snare_high, buffer_size, delay_samples, c.room.feedback, &impulses);
    let kick = voices::kick(b, &kit.kick, kick_seq);
    let kick = b.highpass(kit.kick.pitch, 0.5, kick);

    Ok(b.mix(&[
        (c.level("shaker")?, shaker),
        (c.level("hat")?, hat),
        (c.level("snare")?, snare),
        (c.level("snare_high")?, snare_high),
        (c.level("kick")?, kick),
    ]))
}

/// Sample players reading `channels` of every loop entry, summed.
fn loop_bus(
    b: &mut GraphBuilder,
    c: &Composition,
    gates: &Gates,
    channels: &[Channel],
) -> Result<NodeId> {
    let mut terms = Vec::with_capacity(c.loops.len() * channels.len());
    for entry in &c.loops {
        let path = c.asset(&entry.asset)?;
        let level = c.level(&entry.level)?;
        let gate = gates.select(entry.gate);
        for channel in channels {
            let player = b.sample(path, entry.mode, channel.index(), gate);
            terms.push((level, player));
        }
    }
    Ok(b.mix(&terms))
}
