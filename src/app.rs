//! Application data model, state management, and view navigation.

use crate::events::AppEvent;
use crate::input::{InputContext, Screen};
use crate::navigator::DetailNavigator;
use crate::poller::Poller;
use crate::recovery::{ConnectionState, ErrorHandler};
use crate::timeline::{self, TimelineRecord};
use chrono::{DateTime, Utc};
use std::time::Instant;

// ── Shared utility functions ──

/// Shown wherever a duration cannot be computed from the data at hand.
pub const UNKNOWN_DURATION: &str = "--";

/// Format a duration in seconds as `MmSSs` (e.g. "2m05s"), or `Ss` under a minute.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// Unicode-width-aware truncation with ellipsis.
/// Returns `""` when `max_width` is 0.
pub fn truncate(s: &str, max_width: usize) -> String {
    use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            break;
        }
        out.push(c);
        width += cw;
    }
    out.push('\u{2026}');
    out
}

/// Long enough to read; short enough to not permanently obscure the view.
pub const ERROR_TTL_SECS: u64 = 10;
/// Keeps the tail of a log, which is where failures show up.
pub const LOG_MAX_LINES: usize = 2000;
/// Must match the frame count of `tui::spinner_frame`.
pub const SPINNER_FRAME_COUNT: usize = 10;
/// Below 60 cols, branch names and key hints don't fit.
pub const NARROW_WIDTH_THRESHOLD: u16 = 60;
/// Rows taken by header and footer; the rest is the scrollable body.
pub const CHROME_HEIGHT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    NotStarted,
    InProgress,
    Cancelling,
    Postponed,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunResult {
    Succeeded,
    PartiallySucceeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// One pipeline run as listed by the service. Replaced wholesale on every
/// successful poll, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: u64,
    pub build_number: String,
    pub definition_name: String,
    pub status: RunStatus,
    /// `None` until the run completes.
    pub result: Option<RunResult>,
    pub source_branch: String,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl Run {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            RunStatus::NotStarted
                | RunStatus::InProgress
                | RunStatus::Cancelling
                | RunStatus::Postponed
        )
    }

    /// `refs/heads/main` -> `main`; other refs are shown as-is.
    pub fn branch_name(&self) -> &str {
        self.source_branch
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.source_branch)
    }

    pub fn title(&self) -> String {
        format!("{} #{}", self.definition_name, self.build_number)
    }

    /// Elapsed time for finished runs, time since start for running ones.
    pub fn duration(&self) -> String {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) if finish >= start => {
                format_duration(finish.signed_duration_since(start).num_seconds())
            }
            (Some(start), None) => {
                format_duration(Utc::now().signed_duration_since(start).num_seconds())
            }
            _ => UNKNOWN_DURATION.to_string(),
        }
    }
}

/// The timeline currently drilled into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineView {
    pub run_id: u64,
    pub title: String,
    pub loading: bool,
}

pub struct LogOverlay {
    pub title: String,
    pub lines: Vec<String>,
    pub scroll: usize,
}

/// Immutable configuration set at startup.
pub struct AppConfig {
    pub organization: String,
    pub project: String,
    pub version_string: String,
}

pub struct AppState {
    pub config: AppConfig,

    // Run list
    pub runs: Vec<Run>,
    /// `true` while `runs` is a last-known-good copy shown during fetch failures.
    pub runs_stale: bool,
    pub cursor: usize,
    /// Rows available to the body, for paging the run list.
    pub body_height: u16,
    pub errors: ErrorHandler,
    pub connection: ConnectionState,

    // Timeline drill-down
    pub timeline: Option<TimelineView>,
    pub navigator: DetailNavigator,
    pub log_overlay: Option<LogOverlay>,

    // Polling
    pub last_poll: Option<Instant>,
    pub next_poll_in: u64,
    pub poll_interval: u64,

    // Transient UI
    pub error: Option<(String, Instant)>,
    pub spinner_frame: usize,
    pub loading_count: u16,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(organization: String, project: String) -> Self {
        Self {
            config: AppConfig {
                organization,
                project,
                version_string: String::new(),
            },
            runs: Vec::new(),
            runs_stale: false,
            cursor: 0,
            body_height: 0,
            errors: ErrorHandler::new(),
            connection: ConnectionState::Connecting,
            timeline: None,
            navigator: DetailNavigator::new(),
            log_overlay: None,
            last_poll: None,
            next_poll_in: 0,
            poll_interval: 30,
            error: None,
            spinner_frame: 0,
            loading_count: 0,
            should_quit: false,
        }
    }

    pub fn input_context(&self) -> InputContext {
        let screen = if self.log_overlay.is_some() {
            Screen::Log
        } else if self.timeline.is_some() {
            Screen::Timeline
        } else {
            Screen::Runs
        };
        InputContext {
            has_error: self.error.is_some(),
            is_loading: self.is_loading(),
            screen,
        }
    }

    // --- Run list ---

    /// Feed one fetch outcome through the error handler. The run list only changes
    /// when the handler has something to show; a failure before the first success
    /// leaves it empty. Returns a `ConnectionStateChanged` event when the derived
    /// connection state moved.
    pub fn apply_runs_update(&mut self, result: Result<Vec<Run>, String>) -> Option<AppEvent> {
        let succeeded = result.is_ok();
        let display = self.errors.process_update(result);
        if let Some(runs) = display.runs {
            self.runs = runs;
        }
        self.runs_stale = display.is_stale;
        if succeeded {
            self.last_poll = Some(Instant::now());
        }
        self.clamp_cursor();

        let state = self.errors.connection_state();
        if state == self.connection {
            return None;
        }
        self.connection = state;
        Some(AppEvent::ConnectionStateChanged {
            state,
            error: self.errors.last_error(),
        })
    }

    /// [`Self::apply_runs_update`] for results delivered by `poller`. Once the
    /// poller is stopped, late results change nothing.
    pub fn apply_poll_result(
        &mut self,
        poller: &Poller,
        result: Result<Vec<Run>, String>,
    ) -> Option<AppEvent> {
        if poller.is_stopped() {
            tracing::debug!("runs update after stop ignored");
            return None;
        }
        self.apply_runs_update(result)
    }

    fn clamp_cursor(&mut self) {
        if self.runs.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.runs.len() {
            self.cursor = self.runs.len() - 1;
        }
    }

    pub fn move_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_down(&mut self) {
        if self.cursor + 1 < self.runs.len() {
            self.cursor += 1;
        }
    }

    fn page(&self) -> usize {
        usize::from(self.body_height).max(1)
    }

    pub fn page_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(self.page());
    }

    pub fn page_cursor_down(&mut self) {
        self.cursor = (self.cursor + self.page()).min(self.runs.len().saturating_sub(1));
    }

    pub fn cursor_to_top(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_to_bottom(&mut self) {
        self.cursor = self.runs.len().saturating_sub(1);
    }

    pub fn selected_run(&self) -> Option<&Run> {
        self.runs.get(self.cursor)
    }

    pub fn has_active_runs(&self) -> bool {
        self.runs.iter().any(Run::is_active)
    }

    // --- Timeline ---

    /// Switch to the timeline of the selected run. Returns its id so the caller can
    /// start the fetch.
    pub fn open_selected_timeline(&mut self) -> Option<u64> {
        let run = self.selected_run()?;
        let view = TimelineView {
            run_id: run.id,
            title: run.title(),
            loading: true,
        };
        let run_id = view.run_id;
        self.timeline = Some(view);
        self.navigator.clear();
        Some(run_id)
    }

    pub fn close_timeline(&mut self) {
        self.timeline = None;
        self.log_overlay = None;
        self.navigator.clear();
    }

    pub fn mark_timeline_loading(&mut self) -> Option<u64> {
        let view = self.timeline.as_mut()?;
        view.loading = true;
        Some(view.run_id)
    }

    /// Results for a run the operator has already left are dropped.
    pub fn apply_timeline(&mut self, run_id: u64, result: Result<Vec<TimelineRecord>, String>) {
        let Some(view) = self.timeline.as_mut().filter(|v| v.run_id == run_id) else {
            tracing::debug!(run_id, "discarding timeline for a run no longer shown");
            return;
        };
        view.loading = false;
        match result {
            Ok(records) => {
                tracing::debug!(run_id, records = records.len(), "timeline loaded");
                self.navigator.set_timeline(timeline::build_tree(records));
            }
            Err(e) => self.set_error(format!("Timeline fetch failed: {e}")),
        }
    }

    /// `(run_id, log_id, title)` for the selected record, when it has a log.
    pub fn selected_log_target(&self) -> Option<(u64, u64, String)> {
        let view = self.timeline.as_ref()?;
        let row = self.navigator.selected_item()?;
        let log_id = row.record().log_id()?;
        Some((view.run_id, log_id, format!("{} > {}", view.title, row.record().name)))
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.body_height = height.saturating_sub(CHROME_HEIGHT);
        self.navigator.set_size(width, self.body_height);
    }

    // --- Log overlay ---

    pub fn open_log_overlay(&mut self, title: String, content: &str) {
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        if lines.len() > LOG_MAX_LINES {
            lines.drain(..lines.len() - LOG_MAX_LINES);
        }
        self.log_overlay = Some(LogOverlay {
            title,
            lines,
            scroll: 0,
        });
    }

    pub fn close_log_overlay(&mut self) {
        self.log_overlay = None;
    }

    pub fn scroll_log_up(&mut self, amount: usize) {
        if let Some(overlay) = self.log_overlay.as_mut() {
            overlay.scroll = overlay.scroll.saturating_sub(amount);
        }
    }

    pub fn scroll_log_down(&mut self, amount: usize, visible_height: usize) {
        if let Some(overlay) = self.log_overlay.as_mut() {
            let max_scroll = overlay.lines.len().saturating_sub(visible_height);
            overlay.scroll = (overlay.scroll + amount).min(max_scroll);
        }
    }

    pub fn scroll_log_to_top(&mut self) {
        if let Some(overlay) = self.log_overlay.as_mut() {
            overlay.scroll = 0;
        }
    }

    pub fn scroll_log_to_bottom(&mut self, visible_height: usize) {
        if let Some(overlay) = self.log_overlay.as_mut() {
            overlay.scroll = overlay.lines.len().saturating_sub(visible_height);
        }
    }

    // --- Transient UI ---

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn is_loading(&self) -> bool {
        self.loading_count > 0
    }

    pub fn begin_loading(&mut self) {
        self.loading_count = self.loading_count.saturating_add(1);
    }

    pub fn end_loading(&mut self) {
        self.loading_count = self.loading_count.saturating_sub(1);
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    /// Footer text, most urgent first: fetch recovery, then the navigator hint.
    pub fn status_line(&self) -> Option<String> {
        self.errors.recovery_message().or_else(|| {
            self.timeline
                .as_ref()
                .and_then(|_| self.navigator.status_message())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{LogReference, RecordResult, RecordState, RecordType};
    use pretty_assertions::assert_eq;

    fn run(id: u64) -> Run {
        Run {
            id,
            build_number: format!("20240601.{id}"),
            definition_name: "ci".to_string(),
            status: RunStatus::Completed,
            result: Some(RunResult::Succeeded),
            source_branch: "refs/heads/main".to_string(),
            queue_time: None,
            start_time: None,
            finish_time: None,
        }
    }

    fn state_with_runs(n: u64) -> AppState {
        let mut state = AppState::new("org".to_string(), "proj".to_string());
        let _ = state.apply_runs_update(Ok((1..=n).map(run).collect()));
        state
    }

    fn task(id: &str, parent: &str, log: Option<u64>) -> TimelineRecord {
        TimelineRecord {
            id: id.to_string(),
            parent_id: Some(parent.to_string()),
            record_type: RecordType::Task,
            name: id.to_string(),
            state: RecordState::Completed,
            result: Some(RecordResult::Succeeded),
            order: 1,
            log: log.map(|id| LogReference { id }),
            start_time: None,
            finish_time: None,
        }
    }

    // --- format_duration ---

    #[test]
    fn duration_seconds_only() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
    }

    #[test]
    fn duration_minutes_pad_seconds() {
        assert_eq!(format_duration(60), "1m00s");
        assert_eq!(format_duration(125), "2m05s");
        assert_eq!(format_duration(3725), "62m05s");
    }

    #[test]
    fn duration_negative_clamps() {
        assert_eq!(format_duration(-10), "0s");
    }

    // --- truncate ---

    #[test]
    fn truncate_short_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_long_adds_ellipsis() {
        assert_eq!(truncate("hello world", 6), "hello\u{2026}");
    }

    #[test]
    fn truncate_zero_width_is_empty() {
        assert_eq!(truncate("hello", 0), "");
    }

    #[test]
    fn truncate_wide_chars() {
        let result = truncate("你好世界test", 6);
        assert!(result.ends_with('\u{2026}'));
        assert!(unicode_width::UnicodeWidthStr::width(result.as_str()) <= 6);
    }

    // --- Run ---

    #[test]
    fn branch_name_strips_heads_prefix() {
        let mut r = run(1);
        assert_eq!(r.branch_name(), "main");
        r.source_branch = "refs/pull/7/merge".to_string();
        assert_eq!(r.branch_name(), "refs/pull/7/merge");
    }

    #[test]
    fn run_duration_unknown_without_start() {
        assert_eq!(run(1).duration(), UNKNOWN_DURATION);
    }

    // --- runs update ---

    #[test]
    fn first_success_connects() {
        let mut state = AppState::new("org".to_string(), "proj".to_string());
        let event = state.apply_runs_update(Ok(vec![run(1)]));
        assert!(matches!(
            event,
            Some(AppEvent::ConnectionStateChanged {
                state: ConnectionState::Connected,
                error: None
            })
        ));
        assert_eq!(state.runs.len(), 1);
        assert!(!state.runs_stale);
        assert!(state.last_poll.is_some());
    }

    #[test]
    fn failure_keeps_previous_runs_and_marks_stale() {
        let mut state = state_with_runs(3);
        let event = state.apply_runs_update(Err("timeout".to_string()));
        assert_eq!(state.runs.len(), 3);
        assert!(state.runs_stale);
        assert!(matches!(
            event,
            Some(AppEvent::ConnectionStateChanged {
                state: ConnectionState::Error,
                error: Some(_)
            })
        ));
        // Same state again: no repeated event.
        assert!(state.apply_runs_update(Err("timeout".to_string())).is_none());
    }

    #[test]
    fn failure_before_any_success_shows_nothing() {
        let mut state = AppState::new("org".to_string(), "proj".to_string());
        let _ = state.apply_runs_update(Err("dns".to_string()));
        assert!(state.runs.is_empty());
        assert!(state.runs_stale);
        assert_eq!(state.connection, ConnectionState::Error);
    }

    #[test]
    fn shrinking_run_list_clamps_cursor() {
        let mut state = state_with_runs(5);
        state.cursor_to_bottom();
        assert_eq!(state.cursor, 4);
        let _ = state.apply_runs_update(Ok(vec![run(1), run(2)]));
        assert_eq!(state.cursor, 1);
    }

    #[test]
    fn run_list_pages_by_body_height() {
        let mut state = state_with_runs(25);
        state.set_viewport(80, 10 + CHROME_HEIGHT);
        state.page_cursor_down();
        assert_eq!(state.cursor, 10);
        state.page_cursor_down();
        state.page_cursor_down();
        assert_eq!(state.cursor, 24);
        state.page_cursor_up();
        assert_eq!(state.cursor, 14);
        state.page_cursor_up();
        state.page_cursor_up();
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn unsized_run_list_pages_by_one() {
        let mut state = state_with_runs(3);
        state.page_cursor_down();
        assert_eq!(state.cursor, 1);
        let mut empty = state_with_runs(0);
        empty.page_cursor_down();
        assert_eq!(empty.cursor, 0);
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut state = state_with_runs(2);
        state.move_cursor_up();
        assert_eq!(state.cursor, 0);
        state.move_cursor_down();
        state.move_cursor_down();
        assert_eq!(state.cursor, 1);
    }

    // --- timeline ---

    #[test]
    fn open_timeline_for_selected_run() {
        let mut state = state_with_runs(2);
        state.move_cursor_down();
        assert_eq!(state.open_selected_timeline(), Some(2));
        let view = state.timeline.as_ref().unwrap();
        assert!(view.loading);
        assert_eq!(view.title, "ci #20240601.2");
        assert_eq!(state.input_context().screen, Screen::Timeline);
    }

    #[test]
    fn open_timeline_without_runs_does_nothing() {
        let mut state = AppState::new("org".to_string(), "proj".to_string());
        assert_eq!(state.open_selected_timeline(), None);
        assert!(state.timeline.is_none());
    }

    #[test]
    fn timeline_for_other_run_is_discarded() {
        let mut state = state_with_runs(2);
        state.open_selected_timeline();
        state.apply_timeline(99, Ok(vec![task("t", "j", Some(1))]));
        assert!(state.navigator.is_empty());
        assert!(state.timeline.as_ref().unwrap().loading);
    }

    #[test]
    fn timeline_loaded_feeds_navigator() {
        let mut state = state_with_runs(1);
        state.open_selected_timeline();
        let mut job = task("j", "s", None);
        job.record_type = RecordType::Job;
        job.parent_id = None;
        state.apply_timeline(1, Ok(vec![job, task("t", "j", Some(42))]));
        assert_eq!(state.navigator.len(), 2);
        assert!(!state.timeline.as_ref().unwrap().loading);

        assert!(state.selected_log_target().is_none());
        assert!(state.status_line().is_some());
        state.navigator.move_down();
        let (run_id, log_id, title) = state.selected_log_target().unwrap();
        assert_eq!((run_id, log_id), (1, 42));
        assert_eq!(title, "ci #20240601.1 > t");
    }

    #[test]
    fn timeline_error_sets_toast() {
        let mut state = state_with_runs(1);
        state.open_selected_timeline();
        state.apply_timeline(1, Err("404".to_string()));
        assert!(state.error_message().unwrap().contains("404"));
        assert!(!state.timeline.as_ref().unwrap().loading);
    }

    #[test]
    fn recovery_message_wins_status_line() {
        let mut state = state_with_runs(1);
        let _ = state.apply_runs_update(Err("offline".to_string()));
        assert!(state.status_line().unwrap().contains("retrying"));
    }

    // --- log overlay ---

    #[test]
    fn log_overlay_keeps_tail() {
        let mut state = state_with_runs(1);
        let content: Vec<String> = (0..LOG_MAX_LINES + 5).map(|i| format!("line {i}")).collect();
        state.open_log_overlay("t".to_string(), &content.join("\n"));
        let overlay = state.log_overlay.as_ref().unwrap();
        assert_eq!(overlay.lines.len(), LOG_MAX_LINES);
        assert_eq!(overlay.lines[0], "line 5");
        assert_eq!(state.input_context().screen, Screen::Log);
    }

    #[test]
    fn log_scroll_clamps() {
        let mut state = state_with_runs(1);
        state.open_log_overlay("t".to_string(), "a\nb\nc\nd\ne");
        state.scroll_log_down(10, 3);
        assert_eq!(state.log_overlay.as_ref().unwrap().scroll, 2);
        state.scroll_log_up(10);
        assert_eq!(state.log_overlay.as_ref().unwrap().scroll, 0);
        state.scroll_log_to_bottom(2);
        assert_eq!(state.log_overlay.as_ref().unwrap().scroll, 3);
        state.scroll_log_to_top();
        assert_eq!(state.log_overlay.as_ref().unwrap().scroll, 0);
    }

    #[test]
    fn loading_counter_saturates() {
        let mut state = state_with_runs(0);
        state.end_loading();
        assert!(!state.is_loading());
        state.begin_loading();
        assert!(state.is_loading());
    }
}
