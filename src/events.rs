//! Application event channel, background commands, and the terminal input thread.
//!
//! Everything that happens off the main loop (fetches, timers, key presses) comes
//! back as an [`AppEvent`] on one unbounded channel, and the loop handles them in
//! arrival order. [`Command`] is the unit of background work: a boxed future that
//! resolves to exactly one event. [`dispatch`] runs it on the tokio runtime.
//!
//! [`EventHandler`] spawns an OS thread (not tokio task) because `crossterm::event::poll()`
//! blocks and would starve the async runtime. Drop signals shutdown without joining
//! to avoid deadlocking if `poll` blocks during panic unwinding.

use crate::app::Run;
use crate::recovery::ConnectionState;
use crate::timeline::TimelineRecord;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    /// UI frame tick from the input thread (spinner, countdown).
    Tick,
    Resize(u16, u16),
    /// The poll interval elapsed.
    PollTick,
    /// Outcome of one run-list fetch.
    RunsUpdated {
        result: Result<Vec<Run>, String>,
    },
    ConnectionStateChanged {
        state: ConnectionState,
        error: Option<String>,
    },
    TimelineLoaded {
        run_id: u64,
        result: Result<Vec<TimelineRecord>, String>,
    },
    LogLoaded {
        title: String,
        result: Result<String, String>,
    },
    /// Global toast, auto-dismisses after `ERROR_TTL_SECS`.
    Error(String),
}

/// A deferred piece of work that produces one event when awaited.
pub struct Command(Pin<Box<dyn Future<Output = AppEvent> + Send + 'static>>);

impl Command {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        Self(Box::pin(fut))
    }

    pub async fn execute(self) -> AppEvent {
        self.0.await
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Command(..)")
    }
}

/// Run `cmd` in the background and deliver its event to the loop.
pub fn dispatch(tx: &mpsc::UnboundedSender<AppEvent>, label: &'static str, cmd: Command) {
    let tx2 = tx.clone();
    spawn_monitored(tx.clone(), label, async move {
        let event = cmd.execute().await;
        if tx2.send(event).is_err() {
            tracing::debug!("{label}: event loop gone, dropping result");
        }
    });
}

/// Spawn `fut` and report a panic inside it as an [`AppEvent::Error`].
pub fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                match join_err.into_panic().downcast::<String>() {
                    Ok(s) => *s,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(s) => (*s).to_string(),
                        Err(_) => "unknown panic".to_string(),
                    },
                }
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

/// Send from the input thread. `false` once the loop has gone away.
fn forward(tx: &mpsc::UnboundedSender<AppEvent>, event: AppEvent) -> bool {
    if tx.send(event).is_err() {
        tracing::debug!("input thread: event loop gone, dropping event");
        return false;
    }
    true
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();

        let thread = std::thread::spawn(move || {
            while !shutdown_flag.load(Ordering::Relaxed) {
                match event::poll(tick_rate) {
                    Err(e) => {
                        forward(&event_tx, AppEvent::Error(format!("Terminal poll error: {e}")));
                        break;
                    }
                    Ok(false) => {
                        if event_tx.send(AppEvent::Tick).is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(true) => {}
                }
                let forwarded = match event::read() {
                    Ok(CrosstermEvent::Key(key)) => event_tx.send(AppEvent::Key(key)),
                    Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(AppEvent::Resize(w, h)),
                    // EINTR: retry silently
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(()),
                    Err(e) => {
                        forward(&event_tx, AppEvent::Error(format!("Terminal read error: {e}")));
                        break;
                    }
                    Ok(_) => Ok(()),
                };
                if forwarded.is_err() {
                    break;
                }
            }
        });

        Self {
            rx,
            tx,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("input thread panicked");
            }
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        // Signal only; joining here could hang if crossterm::event::poll is blocked.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
