//! Live coding module for sonograph
//!
//! Provides file watching and hot-reloading of a composition while the
//! external engine keeps playing.
//!
//! - Notifications for paths outside the composition's directory tree are
//!   ignored.
//! - A burst of notifications collapses into one reload: the first relevant
//!   event opens a debounce window, every later one extends it, and the
//!   composition is composed once the tree has been quiet for the window.
//! - Nothing is rendered until the engine reports ready; the request stays
//!   pending and is realised on the first poll after that.
//! - A reload that fails to read, parse or compose is logged and the graph
//!   that is already playing stays active.

use crate::composition::Composition;
use crate::compose::compose;
use crate::engine::RenderEngine;
use crate::error::Result;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Timing knobs for the watch loop.
#[derive(Debug, Clone, Copy)]
pub struct LiveConfig {
    /// Quiet period that closes a burst of change notifications
    pub debounce: Duration,
    /// How often to re-check engine readiness while a reload is pending
    pub poll: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            poll: Duration::from_millis(100),
        }
    }
}

/// Result of one reload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new graph was handed to the engine.
    Rendered { fingerprint: String },
    /// The composition produced the graph that is already playing.
    Unchanged,
    /// The engine is not ready yet; the reload stays pending.
    Deferred,
    /// Reading, composing or rendering failed; the previous graph is kept.
    Failed,
}

/// Counters for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub attempts: usize,
    pub rendered: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub deferred: usize,
}

/// Live coding session bound to one composition file.
pub struct LiveSession {
    current_file: PathBuf,
    roots: Vec<PathBuf>,
    engine: Arc<dyn RenderEngine>,
    config: LiveConfig,
    last_fingerprint: Option<String>,
    pending: bool,
    stats: LiveStats,
}

impl LiveSession {
    /// A session whose first poll performs the initial load.
    pub fn new(file_path: &Path, engine: Arc<dyn RenderEngine>, config: LiveConfig) -> Result<Self> {
        let current_file = if file_path.is_absolute() {
            file_path.to_path_buf()
        } else {
            std::env::current_dir()?.join(file_path)
        };
        let root = current_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let mut roots = vec![root.clone()];
        if let Ok(canonical) = root.canonicalize() {
            if canonical != root {
                roots.push(canonical);
            }
        }

        Ok(Self {
            current_file,
            roots,
            engine,
            config,
            last_fingerprint: None,
            pending: true,
            stats: LiveStats::default(),
        })
    }

    pub fn file(&self) -> &Path {
        &self.current_file
    }

    /// Directory tree whose changes trigger a reload.
    pub fn watch_root(&self) -> &Path {
        &self.roots[0]
    }

    pub fn stats(&self) -> LiveStats {
        self.stats
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn request_reload(&mut self) {
        self.pending = true;
    }

    /// True for create/modify/remove notifications inside the watched tree.
    pub fn is_relevant(&self, event: &Event) -> bool {
        let kind_matches = matches!(
            event.kind,
            EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        kind_matches
            && event
                .paths
                .iter()
                .any(|p| self.roots.iter().any(|root| p.starts_with(root)))
    }

    /// Compose the file and hand the result to the engine.
    ///
    /// Any outcome other than [`ReloadOutcome::Deferred`] settles a pending
    /// reload.
    pub fn reload(&mut self) -> ReloadOutcome {
        if !self.engine.is_ready() {
            debug!("engine not ready, deferring reload");
            self.stats.deferred += 1;
            return ReloadOutcome::Deferred;
        }
        self.pending = false;
        self.stats.attempts += 1;
        info!("🔄 Loading: {}", self.current_file.display());

        match self.compose_and_render() {
            Ok(Some(fingerprint)) => {
                info!(%fingerprint, "✅ Loaded successfully");
                self.stats.rendered += 1;
                ReloadOutcome::Rendered { fingerprint }
            }
            Ok(None) => {
                debug!("composition unchanged, keeping current graph");
                self.stats.unchanged += 1;
                ReloadOutcome::Unchanged
            }
            Err(e) => {
                error!("❌ Reload failed, keeping previous graph: {}", e);
                self.stats.failed += 1;
                ReloadOutcome::Failed
            }
        }
    }

    fn compose_and_render(&mut self) -> Result<Option<String>> {
        let composition = Composition::load(&self.current_file)?;
        let graph = compose(&composition)?;
        let fingerprint = graph.fingerprint()?;
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return Ok(None);
        }
        self.engine.render(Arc::new(graph))?;
        self.last_fingerprint = Some(fingerprint.clone());
        Ok(Some(fingerprint))
    }

    /// Realise a pending reload if there is one.
    fn poll_pending(&mut self) {
        if self.pending {
            self.reload();
        }
    }

    /// Drain notifications until none has arrived for one debounce period.
    ///
    /// Each relevant notification pushes the deadline out again, so a write
    /// that keeps going is reloaded only once it has gone quiet. Returns
    /// false once the channel has disconnected.
    fn absorb_burst(&self, events: &Receiver<notify::Result<Event>>) -> bool {
        let mut deadline = Instant::now() + self.config.debounce;
        loop {
            match events.recv_deadline(deadline) {
                Ok(Ok(event)) => {
                    if self.is_relevant(&event) {
                        debug!(paths = ?event.paths, "coalescing change");
                        deadline = Instant::now() + self.config.debounce;
                    }
                }
                Ok(Err(e)) => warn!("watch error: {}", e),
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Process notifications until the channel disconnects.
    pub fn run(&mut self, events: Receiver<notify::Result<Event>>) -> Result<()> {
        loop {
            self.poll_pending();

            match events.recv_timeout(self.config.poll) {
                Ok(Ok(event)) => {
                    if !self.is_relevant(&event) {
                        debug!(paths = ?event.paths, "ignoring change outside watch root");
                        continue;
                    }
                    info!("📝 Change detected, reloading...");
                    self.pending = true;
                    if !self.absorb_burst(&events) {
                        self.poll_pending();
                        return Ok(());
                    }
                }
                Ok(Err(e)) => warn!("watch error: {}", e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    /// Watch the composition directory and reload on every change.
    pub fn watch(&mut self) -> Result<()> {
        let (tx, rx) = channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(self.watch_root(), RecursiveMode::Recursive)?;

        info!("🎵 Live session started, watching {}", self.watch_root().display());
        self.run(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JsonLinesEngine;
    use notify::event::{AccessKind, ModifyKind};

    fn session_in(dir: &Path) -> LiveSession {
        let engine: Arc<dyn RenderEngine> = Arc::new(JsonLinesEngine::new(Vec::new()));
        LiveSession::new(&dir.join("song.toml"), engine, LiveConfig::default()).unwrap()
    }

    #[test]
    fn relevance_is_limited_to_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());

        let inside = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(dir.path().join("song.toml"));
        let nested = Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(dir.path().join("parts/drums.toml"));
        let outside = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/elsewhere/song.toml"));
        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(dir.path().join("song.toml"));

        assert!(session.is_relevant(&inside));
        assert!(session.is_relevant(&nested));
        assert!(!session.is_relevant(&outside));
        assert!(!session.is_relevant(&access));
    }

    #[test]
    fn starts_with_a_pending_initial_load() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        assert!(session.is_pending());
        assert_eq!(session.stats(), LiveStats::default());
    }
}
