//! Fetch-outcome classification and last-known-good snapshot.
//!
//! Every poll result goes through [`ErrorHandler::process_update`]. Failures never
//! reach the renderer as errors: they turn into a stale copy of the last good run
//! list plus a message. Up to [`MAX_RECOVERABLE_ERRORS`] consecutive failures the
//! message says a retry is coming; past that it asks the operator to check their
//! connection. Polling itself is not affected by any of this.

use crate::app::Run;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Consecutive failures still reported as transient.
pub const MAX_RECOVERABLE_ERRORS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Degraded,
    Failing,
}

/// Informational connection indicator derived from fetch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No fetch has completed yet.
    Connecting,
    Connected,
    /// Failing beyond the recoverable threshold.
    Disconnected,
    /// Recent fetches failed; retrying.
    Error,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "retrying",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorState {
    pub current_error: Option<String>,
    pub consecutive_errors: u32,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_known_good: Option<Vec<Run>>,
    pub outcomes_seen: u64,
}

/// What the run list should show after one fetch outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRuns {
    /// Fresh data on success; the last good snapshot (if any) on failure.
    pub runs: Option<Vec<Run>>,
    pub is_stale: bool,
}

/// Owns [`ErrorState`] behind a mutex so a controller thread and fetch workers can
/// share one handler. The snapshot is cloned on the way in and on the way out.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    state: Mutex<ErrorState>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ErrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_update(&self, outcome: Result<Vec<Run>, String>) -> DisplayRuns {
        let mut state = self.lock();
        state.outcomes_seen = state.outcomes_seen.saturating_add(1);
        match outcome {
            Ok(runs) => {
                if state.consecutive_errors > 0 {
                    tracing::info!(
                        after = state.consecutive_errors,
                        "run fetch recovered"
                    );
                }
                state.current_error = None;
                state.consecutive_errors = 0;
                state.last_known_good = Some(runs.clone());
                DisplayRuns {
                    runs: Some(runs),
                    is_stale: false,
                }
            }
            Err(error) => {
                state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                state.last_error_at = Some(Utc::now());
                tracing::warn!(
                    consecutive = state.consecutive_errors,
                    %error,
                    "run fetch failed"
                );
                state.current_error = Some(error);
                DisplayRuns {
                    runs: state.last_known_good.clone(),
                    is_stale: true,
                }
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.lock().consecutive_errors <= MAX_RECOVERABLE_ERRORS
    }

    pub fn health(&self) -> Health {
        let state = self.lock();
        match (state.current_error.is_some(), state.consecutive_errors) {
            (false, _) => Health::Healthy,
            (true, n) if n <= MAX_RECOVERABLE_ERRORS => Health::Degraded,
            (true, _) => Health::Failing,
        }
    }

    /// `None` while healthy.
    pub fn recovery_message(&self) -> Option<String> {
        let state = self.lock();
        let error = state.current_error.as_deref()?;
        let n = state.consecutive_errors;
        if n <= MAX_RECOVERABLE_ERRORS {
            Some(format!("Fetch failed ({error}), retrying on next poll [{n}/{MAX_RECOVERABLE_ERRORS}]"))
        } else {
            Some(format!(
                "Still failing after {n} attempts ({error}). Check your network connection, press r to retry."
            ))
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.lock().outcomes_seen == 0 {
            return ConnectionState::Connecting;
        }
        match self.health() {
            Health::Healthy => ConnectionState::Connected,
            Health::Degraded => ConnectionState::Error,
            Health::Failing => ConnectionState::Disconnected,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.lock().consecutive_errors
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().current_error.clone()
    }

    pub fn last_error_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_error_at
    }

    pub fn last_known_good(&self) -> Option<Vec<Run>> {
        self.lock().last_known_good.clone()
    }

    /// Forget the current error without touching the snapshot.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.current_error = None;
        state.consecutive_errors = 0;
    }
}
