//! # Sonograph - Declarative Audio Graph Composer
//!
//! Sonograph turns a small, declarative description of a piece of music (tempo,
//! key, step patterns, sample assets, mix levels) into a stereo signal graph for
//! an external real-time audio engine, and re-composes that graph whenever the
//! description changes on disk.
//!
//! ## Core Features
//!
//! - **Tempo-Derived Gates**: every pulse train is derived from one BPM value
//! - **Structural Interning**: identical sub-expressions become one shared node
//! - **Keyed Sequencers**: stable keys let the engine keep phase across reloads
//! - **Hot Reload**: debounced file watching, a failed reload never silences playback
//! - **Reproducible Output**: the same composition always yields the same graph
//!
//! ## Quick Start
//!
//! ### Building a graph by hand
//!
//! ```rust
//! use sonograph::graph::GraphBuilder;
//! use sonograph::tempo::{GateRatio, Tempo};
//!
//! let tempo = Tempo::new(120.0).unwrap();
//! let mut b = GraphBuilder::new();
//!
//! // Kick sequencer stepping on sixteenths
//! let gate = b.train(tempo.gate_hz(GateRatio::SIXTEENTH)).unwrap();
//! let steps = b.seq("kick", &[1.0, 0.0, 0.0, 0.0], true, gate).unwrap();
//!
//! let body = b.cycle(55.0);
//! let env = b.adsr(0.005, 0.25, 0.0, 0.25, gate);
//! let hit = b.mul(body, env);
//! let out = b.mul(hit, steps);
//!
//! let graph = b.finish(out, out).unwrap();
//! assert!(graph.sequencer("kick").is_some());
//! ```
//!
//! ### Composing the bundled arrangement
//!
//! ```rust
//! use sonograph::{compose, Composition};
//!
//! let composition = Composition::idioteque().unwrap();
//! let graph = compose(&composition).unwrap();
//! let again = compose(&composition).unwrap();
//! assert_eq!(graph.fingerprint().unwrap(), again.fingerprint().unwrap());
//! ```
//!
//! ## Architecture
//!
//! ### Main Modules
//!
//! - [`graph`] - Node arena, interning and the builder API (start here!)
//! - [`node`] - Node variants and their parameters
//! - [`compose`] - Composition to stereo graph
//! - [`composition`] - TOML composition format and the bundled preset
//! - [`voices`] - Drum and melodic voice recipes
//! - [`tempo`] - Gate rates derived from BPM
//! - [`tonal`] - Keys, scale modes and scale degrees
//! - [`probe`] - Sample-by-sample evaluation of gates and sequencers
//! - [`engine`] - Boundary to the external render engine
//! - [`live`] - File watching and hot reload
//!
//! ### Data Flow
//!
//! 1. **Composition** is loaded from TOML
//! 2. **Gates** are derived from the tempo
//! 3. **Voices** are built per bus and interned into one arena
//! 4. **Channels** are mixed in a fixed bus order
//! 5. **Engine** receives the finished graph and swaps it in

pub mod compose;
pub mod composition;
pub mod engine;
pub mod error;
pub mod graph;
pub mod live;
pub mod node;
pub mod probe;
pub mod tempo;
pub mod tonal;
pub mod voices;

pub use compose::compose;
pub use composition::{Bus, Composition};
pub use error::{Error, Result};
pub use graph::{Channel, GraphBuilder, StereoGraph};
pub use node::{Node, NodeId, Param};
