/// Hot-reload behaviour of LiveSession driven by synthetic watch events
use crossbeam::channel::{self, Sender};
use notify::event::{DataChange, ModifyKind};
use notify::{Event, EventKind};
use sonograph::composition::IDIOTEQUE_TOML;
use sonograph::engine::RenderEngine;
use sonograph::live::{LiveConfig, LiveSession, ReloadOutcome};
use sonograph::{Error, Result, StereoGraph};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Engine double that records every graph it is given.
#[derive(Default)]
struct RecordingEngine {
    ready: AtomicBool,
    rendered: Mutex<Vec<Arc<StereoGraph>>>,
    fail: AtomicBool,
}

impl RecordingEngine {
    fn ready() -> Arc<Self> {
        let engine = Self::default();
        engine.ready.store(true, Ordering::SeqCst);
        Arc::new(engine)
    }

    fn renders(&self) -> Vec<Arc<StereoGraph>> {
        self.rendered.lock().unwrap().clone()
    }
}

impl RenderEngine for RecordingEngine {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn render(&self, graph: Arc<StereoGraph>) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Engine("device lost".to_string()));
        }
        self.rendered.lock().unwrap().push(graph);
        Ok(())
    }
}

fn fast_config() -> LiveConfig {
    LiveConfig {
        debounce: Duration::from_millis(30),
        poll: Duration::from_millis(10),
    }
}

fn write_song(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("song.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn modified(path: &Path) -> notify::Result<Event> {
    Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path.to_path_buf()))
}

fn send_all(tx: &Sender<notify::Result<Event>>, events: Vec<notify::Result<Event>>) {
    for event in events {
        tx.send(event).unwrap();
    }
}

#[test]
fn test_initial_load_renders_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    let (tx, rx) = channel::unbounded();
    drop(tx);
    session.run(rx).unwrap();

    assert_eq!(engine.renders().len(), 1);
    assert_eq!(session.stats().attempts, 1);
    assert_eq!(session.stats().rendered, 1);
    assert!(!session.is_pending());
}

#[test]
fn test_burst_of_changes_coalesces_into_one_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    // initial load
    assert!(matches!(session.reload(), ReloadOutcome::Rendered { .. }));

    let edited = IDIOTEQUE_TOML.replace("tempo_bpm = 138.0", "tempo_bpm = 140.0");
    write_song(dir.path(), &edited);

    let (tx, rx) = channel::unbounded();
    send_all(&tx, (0..5).map(|_| modified(&path)).collect());
    drop(tx);
    session.run(rx).unwrap();

    // five notifications, one reload
    let renders = engine.renders();
    assert_eq!(renders.len(), 2);
    assert_eq!(session.stats().attempts, 2);
    assert_eq!(session.stats().unchanged, 0);
    assert_ne!(renders[0].fingerprint().unwrap(), renders[1].fingerprint().unwrap());
}

#[test]
fn test_unchanged_composition_is_not_rerendered() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    assert!(matches!(session.reload(), ReloadOutcome::Rendered { .. }));
    // a comment-only edit composes to the same graph
    write_song(dir.path(), &format!("# tweak\n{}", IDIOTEQUE_TOML));
    assert_eq!(session.reload(), ReloadOutcome::Unchanged);
    assert_eq!(engine.renders().len(), 1);
}

#[test]
fn test_changes_outside_the_tree_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    let (tx, rx) = channel::unbounded();
    send_all(&tx, vec![modified(&other.path().join("song.toml"))]);
    drop(tx);
    session.run(rx).unwrap();

    assert_eq!(session.stats().attempts, 1);
    assert_eq!(engine.renders().len(), 1);
}

#[test]
fn test_failed_reload_keeps_previous_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();
    assert!(matches!(session.reload(), ReloadOutcome::Rendered { .. }));
    let playing = engine.renders()[0].fingerprint().unwrap();

    write_song(dir.path(), "tempo_bpm = [unterminated");
    assert_eq!(session.reload(), ReloadOutcome::Failed);

    // a composition that parses but does not compose fails the same way
    write_song(dir.path(), &IDIOTEQUE_TOML.replace("tempo_bpm = 138.0", "tempo_bpm = 0.0"));
    assert_eq!(session.reload(), ReloadOutcome::Failed);

    let renders = engine.renders();
    assert_eq!(renders.len(), 1);
    assert_eq!(renders[0].fingerprint().unwrap(), playing);
    assert_eq!(session.stats().failed, 2);

    // fixing the file recovers; the old graph is still the last one rendered,
    // so the repaired composition counts as unchanged
    write_song(dir.path(), IDIOTEQUE_TOML);
    assert_eq!(session.reload(), ReloadOutcome::Unchanged);
}

#[test]
fn test_engine_failure_is_reported_and_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    engine.fail.store(true, Ordering::SeqCst);
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    assert_eq!(session.reload(), ReloadOutcome::Failed);
    engine.fail.store(false, Ordering::SeqCst);
    assert!(matches!(session.reload(), ReloadOutcome::Rendered { .. }));
    assert_eq!(engine.renders().len(), 1);
}

#[test]
fn test_reload_waits_for_engine_ready() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = Arc::new(RecordingEngine::default());
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    let (tx, rx) = channel::unbounded();
    send_all(&tx, vec![modified(&path)]);
    drop(tx);
    session.run(rx).unwrap();

    assert!(session.is_pending());
    assert!(engine.renders().is_empty());
    assert_eq!(session.stats().attempts, 0);
    assert!(session.stats().deferred >= 1);

    engine.ready.store(true, Ordering::SeqCst);
    let (tx, rx) = channel::unbounded();
    drop(tx);
    session.run(rx).unwrap();

    assert!(!session.is_pending());
    assert_eq!(engine.renders().len(), 1);
    assert_eq!(session.stats().attempts, 1);
}

#[test]
fn test_watch_errors_do_not_stop_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let mut session = LiveSession::new(&path, engine.clone(), fast_config()).unwrap();

    let (tx, rx) = channel::unbounded();
    send_all(
        &tx,
        vec![Err(notify::Error::generic("inotify overflow")), modified(&path)],
    );
    drop(tx);
    session.run(rx).unwrap();

    assert_eq!(session.stats().attempts, 2);
    assert_eq!(session.stats().unchanged, 1);
}

#[test]
fn test_slow_write_reloads_once_it_goes_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_song(dir.path(), IDIOTEQUE_TOML);
    let engine = RecordingEngine::ready();
    let config = LiveConfig {
        debounce: Duration::from_millis(150),
        poll: Duration::from_millis(10),
    };
    let mut session = LiveSession::new(&path, engine.clone(), config).unwrap();

    // ten notifications 30 ms apart: the burst outlasts the debounce period
    // but never pauses for that long
    let (tx, rx) = channel::unbounded();
    let writer_path = path.clone();
    let writer = std::thread::spawn(move || {
        for _ in 0..10 {
            tx.send(modified(&writer_path)).unwrap();
            std::thread::sleep(Duration::from_millis(30));
        }
    });
    session.run(rx).unwrap();
    writer.join().unwrap();

    // the initial load plus one reload for the whole write
    assert_eq!(session.stats().attempts, 2);
}
