//! Render engine boundary
//!
//! The audio engine lives outside this crate. It receives complete graphs
//! and swaps them in atomically at a buffer boundary; sequencer phase is kept
//! on its side, keyed by each sequencer's stable key.
//!
//! ```text
//! composition.toml --compose--> StereoGraph --render--> RenderEngine
//!                                                       (swap + play)
//! ```

use crate::error::{Error, Result};
use crate::graph::StereoGraph;
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// What the composer needs from an engine.
pub trait RenderEngine: Send + Sync {
    /// False until the engine has finished starting up.
    fn is_ready(&self) -> bool;

    /// Replace the playing graph with `graph`.
    fn render(&self, graph: Arc<StereoGraph>) -> Result<()>;
}

/// Lock-free slot holding the graph that is currently playing.
#[derive(Debug, Default)]
pub struct ActiveGraph {
    slot: ArcSwapOption<StereoGraph>,
}

impl ActiveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<StereoGraph>> {
        self.slot.load_full()
    }

    /// Install `graph`, returning the one it replaced.
    pub fn swap(&self, graph: Arc<StereoGraph>) -> Option<Arc<StereoGraph>> {
        self.slot.swap(Some(graph))
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }
}

#[derive(Serialize)]
struct RenderMessage<'a> {
    event: &'static str,
    fingerprint: &'a str,
    graph: &'a StereoGraph,
}

/// Streams each graph as one JSON line to an external engine process.
pub struct JsonLinesEngine<W: Write + Send> {
    out: Mutex<W>,
    ready: Arc<AtomicBool>,
    active: ActiveGraph,
}

impl<W: Write + Send> JsonLinesEngine<W> {
    /// An engine that is ready immediately.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            ready: Arc::new(AtomicBool::new(true)),
            active: ActiveGraph::new(),
        }
    }

    /// An engine that stays unready until [`Self::mark_ready`] or a ready line.
    pub fn awaiting_ready(out: W) -> Self {
        let engine = Self::new(out);
        engine.ready.store(false, Ordering::Release);
        engine
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Watch `input` on a background thread and become ready on a `ready` line.
    pub fn listen_for_ready<R: BufRead + Send + 'static>(&self, input: R) -> thread::JoinHandle<()> {
        let ready = Arc::clone(&self.ready);
        thread::spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("ready") => {
                        info!("render engine reported ready");
                        ready.store(true, Ordering::Release);
                        return;
                    }
                    Ok(line) => debug!(%line, "ignoring engine message"),
                    Err(e) => {
                        warn!("engine status stream failed: {}", e);
                        return;
                    }
                }
            }
        })
    }

    /// Graph most recently handed to the engine.
    pub fn active(&self) -> Option<Arc<StereoGraph>> {
        self.active.load()
    }

    pub fn into_inner(self) -> Result<W> {
        self.out
            .into_inner()
            .map_err(|_| Error::Engine("output lock poisoned".to_string()))
    }
}

impl<W: Write + Send> RenderEngine for JsonLinesEngine<W> {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn render(&self, graph: Arc<StereoGraph>) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::Engine("engine is not ready".to_string()));
        }
        let fingerprint = graph.fingerprint()?;
        let message = RenderMessage {
            event: "render",
            fingerprint: &fingerprint,
            graph: graph.as_ref(),
        };
        let line = serde_json::to_string(&message)?;
        {
            let mut out = self
                .out
                .lock()
                .map_err(|_| Error::Engine("output lock poisoned".to_string()))?;
            writeln!(out, "{}", line)?;
            out.flush()?;
        }
        debug!(%fingerprint, nodes = graph.len(), "graph sent to engine");
        self.active.swap(graph);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use std::io::Cursor;

    fn tiny_graph(freq: f64) -> Arc<StereoGraph> {
        let mut b = GraphBuilder::new();
        let osc = b.cycle(freq);
        Arc::new(b.finish(osc, osc).unwrap())
    }

    #[test]
    fn writes_one_line_per_render() {
        let engine = JsonLinesEngine::new(Vec::new());
        engine.render(tiny_graph(220.0)).unwrap();
        engine.render(tiny_graph(330.0)).unwrap();
        assert_eq!(engine.active().unwrap().len(), 1);

        let out = String::from_utf8(engine.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let msg: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(msg["event"], "render");
        assert_eq!(msg["graph"]["nodes"][0]["frequency"]["const"], 330.0);
    }

    #[test]
    fn refuses_to_render_before_ready() {
        let engine = JsonLinesEngine::awaiting_ready(Vec::new());
        assert!(!engine.is_ready());
        assert!(matches!(engine.render(tiny_graph(1.0)), Err(Error::Engine(_))));
        engine.mark_ready();
        assert!(engine.render(tiny_graph(1.0)).is_ok());
    }

    #[test]
    fn ready_line_unblocks() {
        let engine = JsonLinesEngine::awaiting_ready(Vec::new());
        let input = Cursor::new(b"booting\nREADY\n".to_vec());
        engine.listen_for_ready(input).join().unwrap();
        assert!(engine.is_ready());
    }

    #[test]
    fn active_slot_swaps() {
        let slot = ActiveGraph::new();
        assert!(slot.is_empty());
        assert!(slot.swap(tiny_graph(1.0)).is_none());
        let old = slot.swap(tiny_graph(2.0)).unwrap();
        assert_eq!(old.node(old.left).unwrap().kind_name(), "oscillator");
        assert!(!slot.is_empty());
    }
}
