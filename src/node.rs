//! Node types for the declarative signal graph
//!
//! A [`Node`] describes one primitive of the external render engine together
//! with its parameters. Nodes never own audio; they reference their inputs by
//! [`NodeId`] inside a [`crate::graph::StereoGraph`] arena. Every type here is
//! `Eq + Hash` so the builder can intern structurally identical nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a node inside a graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A constant parameter value with structural (bitwise) equality.
///
/// `-0.0` is folded into `0.0` so the two spellings intern to the same node.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(transparent)]
pub struct Scalar(f64);

impl Scalar {
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Scalar(0.0)
        } else {
            Scalar(value)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::new(value)
    }
}

/// A node parameter: either a constant or a modulating signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    Const(Scalar),
    Node(NodeId),
}

impl Param {
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Param::Const(s) => Some(s.get()),
            Param::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Param::Node(id) => Some(*id),
            Param::Const(_) => None,
        }
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Const(Scalar::new(value))
    }
}

impl From<NodeId> for Param {
    fn from(id: NodeId) -> Self {
        Param::Node(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Sample playback trigger behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// Play once per rising gate edge
    OneShot,
    /// Loop continuously, restart on rising gate edge
    Loop,
    /// Play while the gate is high
    Gate,
}

/// One term of a [`Node::Mixer`] sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Weighted {
    pub gain: Scalar,
    pub input: Param,
}

/// A primitive of the external render engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Periodic pulse train, 50% duty. A rate of zero never fires.
    Train { rate: Scalar },
    Oscillator { waveform: Waveform, frequency: Param },
    Noise,
    Filter {
        kind: FilterKind,
        cutoff: Param,
        resonance: Param,
        input: NodeId,
    },
    /// ADSR envelope triggered by `gate`
    Envelope {
        attack: Param,
        decay: Param,
        sustain: Param,
        release: Param,
        gate: NodeId,
    },
    Delay {
        buffer_size: u32,
        delay_samples: Param,
        feedback: Param,
        input: NodeId,
    },
    /// Convolution against an impulse response the engine resolves by path.
    Convolution { impulse: String, input: NodeId },
    SamplePlayer {
        path: String,
        mode: SampleMode,
        channel: u8,
        gate: NodeId,
    },
    /// Step sequencer advancing one step per rising edge of `gate`.
    ///
    /// `key` addresses the engine-side phase so it survives graph rebuilds.
    Sequencer {
        key: String,
        steps: Vec<Scalar>,
        hold: bool,
        gate: NodeId,
    },
    /// Weighted sum, evaluated in the order of `inputs`.
    Mixer { inputs: Vec<Weighted> },
    Multiply { a: Param, b: Param },
    /// Soft saturation: `tanh(gain * input)`
    Drive { gain: Param, input: NodeId },
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Train { .. } => "train",
            Node::Oscillator { .. } => "oscillator",
            Node::Noise => "noise",
            Node::Filter { .. } => "filter",
            Node::Envelope { .. } => "envelope",
            Node::Delay { .. } => "delay",
            Node::Convolution { .. } => "convolution",
            Node::SamplePlayer { .. } => "sample_player",
            Node::Sequencer { .. } => "sequencer",
            Node::Mixer { .. } => "mixer",
            Node::Multiply { .. } => "multiply",
            Node::Drive { .. } => "drive",
        }
    }

    /// Parameters of this node, in declaration order.
    fn params(&self) -> Vec<Param> {
        match self {
            Node::Train { rate } => vec![Param::Const(*rate)],
            Node::Oscillator { frequency, .. } => vec![*frequency],
            Node::Noise => vec![],
            Node::Filter {
                cutoff,
                resonance,
                input,
                ..
            } => vec![*cutoff, *resonance, Param::Node(*input)],
            Node::Envelope {
                attack,
                decay,
                sustain,
                release,
                gate,
            } => vec![*attack, *decay, *sustain, *release, Param::Node(*gate)],
            Node::Delay {
                delay_samples,
                feedback,
                input,
                ..
            } => vec![*delay_samples, *feedback, Param::Node(*input)],
            Node::Convolution { input, .. } => vec![Param::Node(*input)],
            Node::SamplePlayer { gate, .. } => vec![Param::Node(*gate)],
            Node::Sequencer { steps, gate, .. } => steps
                .iter()
                .map(|s| Param::Const(*s))
                .chain(std::iter::once(Param::Node(*gate)))
                .collect(),
            Node::Mixer { inputs } => inputs
                .iter()
                .flat_map(|w| [Param::Const(w.gain), w.input])
                .collect(),
            Node::Multiply { a, b } => vec![*a, *b],
            Node::Drive { gain, input } => vec![*gain, Param::Node(*input)],
        }
    }

    /// Ids of every node this node reads from.
    pub fn children(&self) -> Vec<NodeId> {
        self.params().iter().filter_map(Param::as_node).collect()
    }

    /// First non-finite constant in this node, if any.
    pub fn non_finite_constant(&self) -> Option<f64> {
        self.params()
            .iter()
            .filter_map(Param::as_const)
            .find(|v| !v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_interns_as_zero() {
        assert_eq!(Scalar::new(-0.0), Scalar::new(0.0));
        assert_ne!(Scalar::new(0.1), Scalar::new(0.1000001));
    }

    #[test]
    fn children_include_modulating_params() {
        let node = Node::Filter {
            kind: FilterKind::Lowpass,
            cutoff: Param::Node(NodeId(2)),
            resonance: 0.7.into(),
            input: NodeId(5),
        };
        assert_eq!(node.children(), vec![NodeId(2), NodeId(5)]);
    }

    #[test]
    fn detects_non_finite_constants() {
        let node = Node::Drive {
            gain: f64::NAN.into(),
            input: NodeId(0),
        };
        assert!(node.non_finite_constant().is_some());
        let node = Node::Train {
            rate: Scalar::new(2.3),
        };
        assert!(node.non_finite_constant().is_none());
    }

    #[test]
    fn serializes_with_type_tag() {
        let node = Node::Oscillator {
            waveform: Waveform::Sine,
            frequency: 440.0.into(),
        };
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(
            json,
            r#"{"type":"oscillator","waveform":"sine","frequency":{"const":440.0}}"#
        );
    }
}
