//! Runs one poll cycle per source on its own thread.
//!
//! Each worker owns its [`PollCycle`]; ticks and user commands for a source
//! are processed by that worker only, so they never interleave. Results are
//! published as immutable [`ViewBundle`]s through an [`ArcSwap`], so readers
//! always see a complete bundle.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tracing::{debug, info, info_span, warn};

use super::cycle::{DisplayMode, PollCycle, RetryPolicy};
use super::source::MetricSource;
use crate::view::ViewBundle;

/// Stable source identifier (the schema id).
pub type SourceId = &'static str;

/// How long a caller waits for a worker to pick up a command. A worker in
/// the middle of a fetch answers only after it, so the wait is kept short.
const COMMAND_REPLY_WAIT: Duration = Duration::from_millis(200);

/// A command that could not be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownSource(String),
    /// The worker is busy fetching; the command stays queued and is
    /// applied right after the fetch.
    Busy,
    /// The worker has stopped.
    Stopped,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownSource(id) => write!(f, "unknown source '{}'", id),
            CommandError::Busy => write!(f, "busy fetching, command queued"),
            CommandError::Stopped => write!(f, "collector stopped"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Commands serialized against a worker's tick loop.
enum Command {
    ToggleMode(Sender<DisplayMode>),
    SetMode(DisplayMode, Sender<()>),
    Rebase(Sender<bool>),
    SetEnabled(bool, Sender<()>),
    Shutdown,
}

struct Worker {
    id: SourceId,
    commands: Sender<Command>,
    published: Arc<ArcSwap<ViewBundle>>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the worker threads of all registered sources.
pub struct CollectorRegistry {
    interval: Duration,
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl CollectorRegistry {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            workers: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts polling `source`. The first tick runs immediately.
    pub fn register(
        &mut self,
        source: Box<dyn MetricSource>,
        policy: RetryPolicy,
        mode: DisplayMode,
    ) -> io::Result<SourceId> {
        let schema = Arc::clone(source.schema());
        let id = schema.id;
        if self.workers.iter().any(|w| w.id == id) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("source '{}' already registered", id),
            ));
        }

        let cycle = PollCycle::new(source, policy, mode);
        let published = Arc::new(ArcSwap::from_pointee(ViewBundle::placeholder(
            Arc::clone(&schema),
            mode,
        )));
        let (tx, rx) = mpsc::channel();

        let handle = {
            let published = Arc::clone(&published);
            let shutdown = Arc::clone(&self.shutdown);
            let interval = self.interval;
            std::thread::Builder::new()
                .name(format!("psglot-{}", id))
                .spawn(move || run_worker(cycle, rx, published, shutdown, interval))?
        };

        debug!(source = id, "registered");
        self.workers.push(Worker {
            id,
            commands: tx,
            published,
            handle: Some(handle),
        });
        Ok(id)
    }

    /// Registered sources, in registration order.
    pub fn sources(&self) -> Vec<SourceId> {
        self.workers.iter().map(|w| w.id).collect()
    }

    /// Last published bundle of `id`.
    pub fn latest(&self, id: &str) -> Option<Arc<ViewBundle>> {
        self.worker(id).map(|w| w.published.load_full())
    }

    /// Flips absolute/relative for one source; returns the new mode.
    pub fn toggle_mode(&self, id: &str) -> Result<DisplayMode, CommandError> {
        self.request(id, Command::ToggleMode)
    }

    pub fn set_mode(&self, id: &str, mode: DisplayMode) -> Result<(), CommandError> {
        self.request(id, |tx| Command::SetMode(mode, tx))
    }

    /// Sets the same mode on every source. All sources are attempted; the
    /// first error is returned.
    pub fn set_mode_all(&self, mode: DisplayMode) -> Result<(), CommandError> {
        let mut result = Ok(());
        for id in self.sources() {
            if let Err(e) = self.set_mode(id, mode)
                && result.is_ok()
            {
                result = Err(e);
            }
        }
        result
    }

    /// Rebases `id` on its last fetched snapshot. `Ok(false)` if the source
    /// has not fetched anything yet.
    pub fn force_rebase(&self, id: &str) -> Result<bool, CommandError> {
        self.request(id, Command::Rebase)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), CommandError> {
        self.request(id, |tx| Command::SetEnabled(enabled, tx))
    }

    /// Stops all workers and waits for them. In-flight fetches finish first;
    /// their results are not published.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        for worker in &self.workers {
            let _ = worker.commands.send(Command::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take()
                && handle.join().is_err()
            {
                warn!(source = worker.id, "worker panicked");
            }
        }
        info!(sources = self.workers.len(), "collectors stopped");
        self.workers.clear();
    }

    fn worker(&self, id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    /// Sends a command and waits briefly for the worker's reply.
    fn request<T>(
        &self,
        id: &str,
        make: impl FnOnce(Sender<T>) -> Command,
    ) -> Result<T, CommandError> {
        let worker = self
            .worker(id)
            .ok_or_else(|| CommandError::UnknownSource(id.to_string()))?;
        let (tx, rx) = mpsc::channel();
        worker
            .commands
            .send(make(tx))
            .map_err(|_| CommandError::Stopped)?;
        match rx.recv_timeout(COMMAND_REPLY_WAIT) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                debug!(source = worker.id, "command queued behind a fetch");
                Err(CommandError::Busy)
            }
            Err(RecvTimeoutError::Disconnected) => Err(CommandError::Stopped),
        }
    }
}

impl Drop for CollectorRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    mut cycle: PollCycle,
    commands: Receiver<Command>,
    published: Arc<ArcSwap<ViewBundle>>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) {
    let span = info_span!("source", id = cycle.schema().id);
    let _enter = span.enter();
    debug!("worker started");

    let mut next_tick = Instant::now();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            // Errors are recorded in the cycle's health and logged there.
            let _ = cycle.tick();
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            published.store(Arc::new(cycle.build_bundle()));
            next_tick += interval;
            if next_tick < Instant::now() {
                next_tick = Instant::now() + interval;
            }
            continue;
        }

        let command = match commands.recv_timeout(next_tick - now) {
            Ok(command) => command,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match command {
            Command::ToggleMode(reply) => {
                let mode = cycle.toggle_mode();
                published.store(Arc::new(cycle.build_bundle()));
                let _ = reply.send(mode);
            }
            Command::SetMode(mode, reply) => {
                cycle.set_mode(mode);
                published.store(Arc::new(cycle.build_bundle()));
                let _ = reply.send(());
            }
            Command::Rebase(reply) => {
                let done = cycle.force_rebase();
                published.store(Arc::new(cycle.build_bundle()));
                let _ = reply.send(done);
            }
            Command::SetEnabled(enabled, reply) => {
                let was_scheduled = cycle.is_scheduled();
                cycle.set_enabled(enabled);
                if cycle.is_scheduled() && !was_scheduled {
                    next_tick = Instant::now();
                }
                published.store(Arc::new(cycle.build_bundle()));
                let _ = reply.send(());
            }
            Command::Shutdown => break,
        }
    }

    debug!("worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockExecutor;
    use crate::collector::source::TableSource;
    use crate::collector::tables;
    use crate::collector::traits::QueryExecutor;
    use crate::model::SourceSchema;

    const LONG: Duration = Duration::from_secs(3600);

    fn wait_for(
        registry: &CollectorRegistry,
        id: &str,
        pred: impl Fn(&ViewBundle) -> bool,
    ) -> Arc<ViewBundle> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(bundle) = registry.latest(id)
                && pred(&bundle)
            {
                return bundle;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {}", id);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn registry_with(
        mock: &Arc<MockExecutor>,
        interval: Duration,
        schemas: Vec<SourceSchema>,
    ) -> CollectorRegistry {
        let mut registry = CollectorRegistry::new(interval);
        for schema in schemas {
            let executor: Arc<dyn QueryExecutor> = mock.clone();
            let source = Box::new(TableSource::new(schema, executor));
            registry
                .register(source, RetryPolicy::default(), DisplayMode::Relative)
                .unwrap();
        }
        registry
    }

    #[test]
    fn publishes_first_tick() {
        let mock = Arc::new(MockExecutor::typical_server());
        let registry = registry_with(&mock, LONG, vec![tables::statements(), tables::stages()]);

        assert_eq!(registry.sources(), vec!["statements", "stages"]);
        let bundle = wait_for(&registry, "statements", |b| b.collected_at.is_some());
        assert_eq!(bundle.rows.len(), 4);
        assert!(bundle.rows.iter().all(|r| r.is_zero()));

        wait_for(&registry, "stages", |b| b.collected_at.is_some());
        assert!(registry.latest("nope").is_none());
    }

    #[test]
    fn commands_apply_without_fetching() {
        let mock = Arc::new(MockExecutor::typical_server());
        let registry = registry_with(&mock, LONG, vec![tables::stages()]);
        wait_for(&registry, "stages", |b| b.collected_at.is_some());
        let fetches = mock.query_count();

        assert_eq!(registry.toggle_mode("stages"), Ok(DisplayMode::Absolute));
        let bundle = registry.latest("stages").unwrap();
        assert_eq!(bundle.mode, DisplayMode::Absolute);
        assert_eq!(bundle.rows[0].name, "Sending data");
        assert_eq!(bundle.rows[0].value(0), 901_234_000_000);

        assert_eq!(registry.force_rebase("stages"), Ok(true));
        registry.set_mode_all(DisplayMode::Relative).unwrap();
        let bundle = registry.latest("stages").unwrap();
        assert_eq!(bundle.mode, DisplayMode::Relative);
        assert!(bundle.rows.iter().all(|r| r.is_zero()));

        assert_eq!(mock.query_count(), fetches);
        assert_eq!(
            registry.toggle_mode("nope"),
            Err(CommandError::UnknownSource("nope".into()))
        );
        assert!(registry.force_rebase("nope").is_err());
    }

    #[test]
    fn disable_is_per_source() {
        let mock = Arc::new(MockExecutor::typical_server());
        let registry = registry_with(&mock, LONG, vec![tables::stages(), tables::mutex()]);
        wait_for(&registry, "stages", |b| b.collected_at.is_some());
        wait_for(&registry, "mutex", |b| b.collected_at.is_some());

        registry.set_enabled("mutex", false).unwrap();
        assert!(!registry.latest("mutex").unwrap().enabled);
        assert!(registry.latest("stages").unwrap().enabled);
        // Disabled sources keep their last data.
        assert_eq!(registry.latest("mutex").unwrap().rows.len(), 2);

        registry.set_enabled("mutex", true).unwrap();
        assert!(registry.latest("mutex").unwrap().enabled);
    }

    #[test]
    fn command_during_slow_fetch_is_queued() {
        let mock = Arc::new(MockExecutor::typical_server());
        mock.set_delay(Some(Duration::from_millis(1000)));
        let registry = registry_with(&mock, LONG, vec![tables::stages()]);
        std::thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        assert_eq!(registry.toggle_mode("stages"), Err(CommandError::Busy));
        assert!(started.elapsed() < Duration::from_millis(800));

        let bundle = wait_for(&registry, "stages", |b| b.mode == DisplayMode::Absolute);
        assert!(bundle.collected_at.is_some());
    }

    #[test]
    fn ticks_repeat_on_interval() {
        let mock = Arc::new(MockExecutor::typical_server());
        let registry = registry_with(&mock, Duration::from_millis(10), vec![tables::statements()]);

        let bundle = wait_for(&registry, "statements", |b| {
            b.rows.first().is_some_and(|r| r.value(0) > 0)
        });
        assert_eq!(bundle.rows[0].name, "sql/select");
        assert!(mock.query_count() >= 2);
    }

    #[test]
    fn failing_source_is_isolated() {
        let mock = Arc::new(MockExecutor::typical_server());
        let mut broken = tables::stages();
        broken.id = "broken";
        broken.query = "SELECT * FROM missing_table".to_string();
        let registry = registry_with(&mock, Duration::from_millis(10), vec![broken, tables::mutex()]);

        let bundle = wait_for(&registry, "broken", |b| b.health.is_failed());
        assert!(bundle.description().contains("FAILED"));
        let ok = wait_for(&registry, "mutex", |b| b.collected_at.is_some());
        assert!(!ok.is_stale());
    }

    #[test]
    fn shutdown_is_prompt_and_idempotent() {
        let mock = Arc::new(MockExecutor::typical_server());
        let mut registry = registry_with(&mock, LONG, vec![tables::statements(), tables::memory()]);
        wait_for(&registry, "memory", |b| b.collected_at.is_some());

        let started = Instant::now();
        registry.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(registry.sources().is_empty());
        registry.shutdown();
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mock = Arc::new(MockExecutor::typical_server());
        let mut registry = registry_with(&mock, LONG, vec![tables::stages()]);
        let executor: Arc<dyn QueryExecutor> = mock.clone();
        let again = Box::new(TableSource::new(tables::stages(), executor));

        let err = registry
            .register(again, RetryPolicy::default(), DisplayMode::Relative)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }
}
