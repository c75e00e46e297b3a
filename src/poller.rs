//! Fixed-interval polling built from self-rescheduling commands.
//!
//! Nothing in here loops or recurses. [`Poller::start_polling`] yields a single
//! command that sleeps for the configured interval and resolves to
//! [`AppEvent::PollTick`]. The event loop answers each tick with
//! [`Poller::on_tick`], which hands back a fresh fetch plus the next timer as two
//! independent commands. A failed fetch has no say in this: the timer is re-armed
//! on every tick, and only [`Poller::stop`] ends the chain.
//!
//! [`PollState`] sits behind a mutex because `stop()` and the setters may be called
//! from the controller while a fetch command is running on a worker.

use crate::events::{AppEvent, Command};
use crate::traits::RunSource;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Used when the requested interval is zero or negative.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
/// Floor for positive intervals; anything shorter hammers the service.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);
/// Runs requested per fetch when no valid page size is given.
pub const DEFAULT_PAGE_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    pub interval: Duration,
    pub page_size: usize,
    pub stopped: bool,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            stopped: false,
        }
    }
}

/// Non-positive -> [`DEFAULT_INTERVAL`]; positive but short -> [`MIN_INTERVAL`].
pub fn clamp_interval(requested: chrono::Duration) -> Duration {
    if requested <= chrono::Duration::zero() {
        return DEFAULT_INTERVAL;
    }
    requested
        .to_std()
        .map_or(DEFAULT_INTERVAL, |d| d.max(MIN_INTERVAL))
}

pub fn clamp_page_size(requested: usize) -> usize {
    if requested < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        requested
    }
}

/// Cheap to clone; clones share the same state and source.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn RunSource>,
    state: Arc<Mutex<PollState>>,
}

impl Poller {
    pub fn new(source: Arc<dyn RunSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(PollState::default())),
        }
    }

    pub fn with_config(source: Arc<dyn RunSource>, interval: chrono::Duration, page_size: usize) -> Self {
        let poller = Self::new(source);
        poller.configure(interval, page_size);
        poller
    }

    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn configure(&self, interval: chrono::Duration, page_size: usize) {
        let mut state = self.lock();
        state.interval = clamp_interval(interval);
        state.page_size = clamp_page_size(page_size);
        tracing::debug!(interval = ?state.interval, page_size = state.page_size, "poller configured");
    }

    pub fn set_interval(&self, interval: chrono::Duration) {
        self.lock().interval = clamp_interval(interval);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = clamp_page_size(page_size);
    }

    pub fn interval(&self) -> Duration {
        self.lock().interval
    }

    pub fn page_size(&self) -> usize {
        self.lock().page_size
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn snapshot(&self) -> PollState {
        *self.lock()
    }

    /// Terminal and idempotent. Work already dispatched still reports back.
    pub fn stop(&self) {
        let mut state = self.lock();
        if !state.stopped {
            state.stopped = true;
            tracing::info!("poller stopped");
        }
    }

    /// One run-list fetch. The page size is read when the command runs, so a
    /// `set_page_size` racing an outstanding fetch takes effect on the next one.
    pub fn fetch_once(&self) -> Option<Command> {
        if self.is_stopped() {
            return None;
        }
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        Some(Command::new(async move {
            let page_size = state.lock().unwrap_or_else(PoisonError::into_inner).page_size;
            tracing::debug!(page_size, "fetching runs");
            let result = source
                .list_runs(page_size)
                .await
                .map_err(|e| format!("{e:#}"));
            AppEvent::RunsUpdated { result }
        }))
    }

    /// A one-shot timer that resolves to [`AppEvent::PollTick`] after the interval.
    pub fn start_polling(&self) -> Option<Command> {
        let state = self.snapshot();
        if state.stopped {
            return None;
        }
        Some(Command::new(async move {
            tokio::time::sleep(state.interval).await;
            AppEvent::PollTick
        }))
    }

    /// Re-arm: the next fetch and the next timer, as independent commands.
    pub fn on_tick(&self) -> Vec<Command> {
        if self.is_stopped() {
            tracing::debug!("tick after stop ignored");
            return Vec::new();
        }
        self.fetch_once()
            .into_iter()
            .chain(self.start_polling())
            .collect()
    }
}
