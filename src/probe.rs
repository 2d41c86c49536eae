//! Gate-domain probe
//!
//! A tiny sample-by-sample evaluator for the only node types whose output is
//! fully determined by the graph itself: pulse trains and the sequencers they
//! drive. It exists to observe what a sequencer emits (for tests and for the
//! `probe` subcommand), not to render audio.
//!
//! Semantics mirror the engine primitives:
//! - a train is high for the first half of each period, starting high, and a
//!   zero-rate train stays low forever;
//! - a sequencer advances one step on each rising edge of its gate;
//! - with `hold` the current step value persists between edges, otherwise
//!   it is emitted only while the gate is high and drops to zero in between.

use crate::error::{Error, Result};
use crate::graph::StereoGraph;
use crate::node::{Node, NodeId};

#[derive(Debug, Clone)]
struct TrainState {
    increment: f64,
    phase: f64,
}

impl TrainState {
    fn next(&mut self) -> f64 {
        if self.increment == 0.0 {
            return 0.0;
        }
        let out = if self.phase < 0.5 { 1.0 } else { 0.0 };
        self.phase = (self.phase + self.increment).fract();
        out
    }
}

#[derive(Debug, Clone)]
struct SequencerState {
    steps: Vec<f64>,
    hold: bool,
    gate: Source,
    position: Option<usize>,
    value: f64,
    gate_was_high: bool,
}

impl SequencerState {
    fn next(&mut self) -> f64 {
        let high = self.gate.next() > 0.5;
        if high && !self.gate_was_high {
            let next = self.position.map_or(0, |p| (p + 1) % self.steps.len());
            self.position = Some(next);
            self.value = self.steps[next];
        }
        self.gate_was_high = high;
        if self.hold || high {
            self.value
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Train(TrainState),
    Sequencer(Box<SequencerState>),
}

impl Source {
    fn build(graph: &StereoGraph, id: NodeId, sample_rate: f64) -> Result<Self> {
        match graph.node(id) {
            Some(Node::Train { rate }) => Ok(Source::Train(TrainState {
                increment: rate.get() / sample_rate,
                phase: 0.0,
            })),
            Some(Node::Sequencer {
                steps, hold, gate, ..
            }) => Ok(Source::Sequencer(Box::new(SequencerState {
                steps: steps.iter().map(|s| s.get()).collect(),
                hold: *hold,
                gate: Source::build(graph, *gate, sample_rate)?,
                position: None,
                value: 0.0,
                gate_was_high: false,
            }))),
            Some(other) => Err(Error::invalid(
                format!("probe {}", id),
                format!("cannot probe a {} node", other.kind_name()),
            )),
            None => Err(Error::invalid(
                format!("probe {}", id),
                "no such node in graph",
            )),
        }
    }

    fn next(&mut self) -> f64 {
        match self {
            Source::Train(t) => t.next(),
            Source::Sequencer(s) => s.next(),
        }
    }
}

/// Sample-by-sample observer of a train or sequencer node.
#[derive(Debug, Clone)]
pub struct GateProbe {
    source: Source,
}

impl GateProbe {
    pub fn new(graph: &StereoGraph, id: NodeId, sample_rate: f64) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::invalid(
                "sample_rate",
                format!("must be a finite value > 0, got {}", sample_rate),
            ));
        }
        Ok(Self {
            source: Source::build(graph, id, sample_rate)?,
        })
    }

    pub fn next_sample(&mut self) -> f64 {
        self.source.next()
    }

    pub fn render(&mut self, samples: usize) -> Vec<f64> {
        (0..samples).map(|_| self.next_sample()).collect()
    }

    /// Index of the current step when probing a sequencer that has fired.
    pub fn step_index(&self) -> Option<usize> {
        match &self.source {
            Source::Sequencer(s) => s.position,
            Source::Train(_) => None,
        }
    }
}

impl Iterator for GateProbe {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_sample())
    }
}
