//! Graph arena, structural interning and the node builder API
//!
//! [`GraphBuilder`] appends nodes to an arena and returns their [`NodeId`].
//! A node that is structurally identical to one already in the arena (same
//! variant, same parameters, same children) is not added again; the existing
//! id is returned instead. Because a node can only reference ids that already
//! exist, the arena is always in topological order and can never hold a cycle.
//!
//! ```
//! use sonograph::graph::GraphBuilder;
//!
//! let mut b = GraphBuilder::new();
//! let gate = b.train(2.0).unwrap();
//! let a = b.cycle(4.0);
//! let again = b.cycle(4.0);
//! assert_eq!(a, again);
//!
//! let env = b.adsr(0.005, 0.2, 0.0, 0.2, gate);
//! let out = b.mul(a, env);
//! let graph = b.finish(out, out).unwrap();
//! assert_eq!(graph.len(), 4);
//! ```

use crate::error::{Error, Result};
use crate::node::{FilterKind, Node, NodeId, Param, SampleMode, Scalar, Waveform, Weighted};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Output channel of a [`StereoGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Sample-file channel index read by this output.
    pub fn index(self) -> u8 {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// An immutable, deduplicated node arena with one root per output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StereoGraph {
    nodes: Vec<Node>,
    pub left: NodeId,
    pub right: NodeId,
}

impl StereoGraph {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> NodeId {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }

    /// Find a sequencer by its stable key. Keys are unique within a graph.
    pub fn sequencer(&self, key: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| matches!(n, Node::Sequencer { key: k, .. } if k == key))
            .map(NodeId)
    }

    /// Impulse paths of the convolution chain ending at `tail`, in signal order.
    ///
    /// Walks `input` links backwards while they point at convolutions, so the
    /// first element is the stage closest to the dry source.
    pub fn convolution_chain(&self, tail: NodeId) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut cursor = tail;
        while let Some(Node::Convolution { impulse, input }) = self.node(cursor) {
            chain.push(impulse.as_str());
            cursor = *input;
        }
        chain.reverse();
        chain
    }

    /// Every node reachable from `root`, including `root`.
    pub fn reachable(&self, root: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.children());
            }
        }
        seen
    }

    /// Count of nodes per variant name, for diagnostics.
    pub fn census(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for node in &self.nodes {
            let name = node.kind_name();
            match counts.iter_mut().find(|(k, _)| *k == name) {
                Some((_, n)) => *n += 1,
                None => counts.push((name, 1)),
            }
        }
        counts
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// SHA-256 of the canonical JSON encoding, as lowercase hex.
    ///
    /// Structurally identical graphs always share a fingerprint.
    pub fn fingerprint(&self) -> Result<String> {
        let json = self.to_json()?;
        let digest = Sha256::digest(json.as_bytes());
        Ok(format!("{:x}", digest))
    }
}

/// Builds a [`StereoGraph`] one node at a time.
///
/// Constructors taking only constants and inputs return the [`NodeId`]
/// directly. A non-finite constant is recorded and reported by
/// [`GraphBuilder::finish`], so a malformed graph can never be returned.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    index: HashMap<Node, NodeId>,
    keys: HashMap<String, NodeId>,
    error: Option<Error>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unique nodes emitted so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add `node`, or return the id of an identical node already present.
    ///
    /// A node that reads from an id not yet in the arena, or that reuses a
    /// sequencer key already held by a different sequencer, is recorded as
    /// an error and reported by [`GraphBuilder::finish`].
    pub fn add(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.index.get(&node) {
            return *id;
        }
        if let Err(e) = self.validate(&node) {
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
        let id = NodeId(self.nodes.len());
        if let Node::Sequencer { key, .. } = &node {
            self.keys.entry(key.clone()).or_insert(id);
        }
        self.index.insert(node.clone(), id);
        self.nodes.push(node);
        id
    }

    fn validate(&self, node: &Node) -> Result<()> {
        if let Some(bad) = node.non_finite_constant() {
            return Err(Error::invalid(
                node.kind_name(),
                format!("constant must be finite, got {}", bad),
            ));
        }
        if let Some(child) = node.children().into_iter().find(|c| c.0 >= self.nodes.len()) {
            return Err(Error::invalid(
                node.kind_name(),
                format!("input {} is not an earlier node of this graph", child),
            ));
        }
        if let Node::Sequencer { key, .. } = node {
            if let Some(existing) = self.keys.get(key) {
                return Err(Error::invalid(
                    format!("sequence `{}`", key),
                    format!("key already used by sequencer {}", existing),
                ));
            }
        }
        Ok(())
    }

    /// Pulse train at `rate` Hz. Zero is a valid train that never fires.
    pub fn train(&mut self, rate: f64) -> Result<NodeId> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::invalid(
                "train.rate",
                format!("gate rate must be a finite value >= 0, got {}", rate),
            ));
        }
        Ok(self.add(Node::Train {
            rate: Scalar::new(rate),
        }))
    }

    /// Step sequencer; fails on an empty step list or a key that already
    /// names a different sequencer.
    pub fn seq(&mut self, key: &str, steps: &[f64], hold: bool, gate: NodeId) -> Result<NodeId> {
        if steps.is_empty() {
            return Err(Error::invalid(
                format!("sequence `{}`", key),
                "sequence must contain at least one step",
            ));
        }
        let node = Node::Sequencer {
            key: key.to_string(),
            steps: steps.iter().copied().map(Scalar::new).collect(),
            hold,
            gate,
        };
        if !self.index.contains_key(&node) {
            self.validate(&node)?;
        }
        Ok(self.add(node))
    }

    pub fn osc(&mut self, waveform: Waveform, frequency: impl Into<Param>) -> NodeId {
        self.add(Node::Oscillator {
            waveform,
            frequency: frequency.into(),
        })
    }

    /// Sine oscillator.
    pub fn cycle(&mut self, frequency: impl Into<Param>) -> NodeId {
        self.osc(Waveform::Sine, frequency)
    }

    pub fn noise(&mut self) -> NodeId {
        self.add(Node::Noise)
    }

    pub fn filter(
        &mut self,
        kind: FilterKind,
        cutoff: impl Into<Param>,
        resonance: impl Into<Param>,
        input: NodeId,
    ) -> NodeId {
        self.add(Node::Filter {
            kind,
            cutoff: cutoff.into(),
            resonance: resonance.into(),
            input,
        })
    }

    pub fn lowpass(&mut self, cutoff: impl Into<Param>, q: impl Into<Param>, input: NodeId) -> NodeId {
        self.filter(FilterKind::Lowpass, cutoff, q, input)
    }

    pub fn highpass(&mut self, cutoff: impl Into<Param>, q: impl Into<Param>, input: NodeId) -> NodeId {
        self.filter(FilterKind::Highpass, cutoff, q, input)
    }

    pub fn bandpass(&mut self, cutoff: impl Into<Param>, q: impl Into<Param>, input: NodeId) -> NodeId {
        self.filter(FilterKind::Bandpass, cutoff, q, input)
    }

    pub fn adsr(
        &mut self,
        attack: impl Into<Param>,
        decay: impl Into<Param>,
        sustain: impl Into<Param>,
        release: impl Into<Param>,
        gate: NodeId,
    ) -> NodeId {
        self.add(Node::Envelope {
            attack: attack.into(),
            decay: decay.into(),
            sustain: sustain.into(),
            release: release.into(),
            gate,
        })
    }

    pub fn delay(
        &mut self,
        buffer_size: u32,
        delay_samples: impl Into<Param>,
        feedback: impl Into<Param>,
        input: NodeId,
    ) -> NodeId {
        self.add(Node::Delay {
            buffer_size,
            delay_samples: delay_samples.into(),
            feedback: feedback.into(),
            input,
        })
    }

    pub fn convolve(&mut self, impulse: &str, input: NodeId) -> NodeId {
        self.add(Node::Convolution {
            impulse: impulse.to_string(),
            input,
        })
    }

    /// Chain convolutions in the given order: input -> impulses[0] -> impulses[1] ...
    pub fn convolve_chain<S: AsRef<str>>(&mut self, input: NodeId, impulses: &[S]) -> NodeId {
        impulses
            .iter()
            .fold(input, |acc, impulse| self.convolve(impulse.as_ref(), acc))
    }

    pub fn sample(&mut self, path: &str, mode: SampleMode, channel: u8, gate: NodeId) -> NodeId {
        self.add(Node::SamplePlayer {
            path: path.to_string(),
            mode,
            channel,
            gate,
        })
    }

    /// Weighted sum of signals or constants; terms are kept in the order given.
    pub fn weighted(&mut self, terms: &[(f64, Param)]) -> NodeId {
        let inputs = terms
            .iter()
            .map(|(gain, input)| Weighted {
                gain: Scalar::new(*gain),
                input: *input,
            })
            .collect();
        self.add(Node::Mixer { inputs })
    }

    /// Weighted sum of signals.
    pub fn mix(&mut self, terms: &[(f64, NodeId)]) -> NodeId {
        let terms: Vec<(f64, Param)> = terms.iter().map(|(g, id)| (*g, Param::Node(*id))).collect();
        self.weighted(&terms)
    }

    /// Unity-gain sum.
    pub fn add_all(&mut self, terms: &[Param]) -> NodeId {
        let terms: Vec<(f64, Param)> = terms.iter().map(|p| (1.0, *p)).collect();
        self.weighted(&terms)
    }

    /// Scale a signal by a constant gain.
    pub fn gain(&mut self, gain: f64, input: NodeId) -> NodeId {
        self.mix(&[(gain, input)])
    }

    /// Product of two signals (VCA).
    pub fn mul(&mut self, a: impl Into<Param>, b: impl Into<Param>) -> NodeId {
        self.add(Node::Multiply {
            a: a.into(),
            b: b.into(),
        })
    }

    pub fn drive(&mut self, gain: impl Into<Param>, input: NodeId) -> NodeId {
        self.add(Node::Drive {
            gain: gain.into(),
            input,
        })
    }

    /// `x + amount * sin(rate)`: a slow wobble around a centre value.
    pub fn modulate(&mut self, x: f64, rate: f64, amount: f64) -> NodeId {
        let lfo = self.cycle(rate);
        self.weighted(&[(1.0, Param::from(x)), (amount, Param::Node(lfo))])
    }

    /// Freeze the arena into a graph with the given channel roots.
    pub fn finish(self, left: NodeId, right: NodeId) -> Result<StereoGraph> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for (name, root) in [("left", left), ("right", right)] {
            if root.0 >= self.nodes.len() {
                return Err(Error::invalid(
                    format!("{} output", name),
                    format!("root {} is not a node of this graph", root),
                ));
            }
        }
        debug!(nodes = self.nodes.len(), "graph finished");
        Ok(StereoGraph {
            nodes: self.nodes,
            left,
            right,
        })
    }
}

/// Convert milliseconds to a whole-sample delay at `sample_rate`.
pub fn ms_to_samples(ms: f64, sample_rate: f64) -> f64 {
    (ms * sample_rate / 1000.0).round()
}
