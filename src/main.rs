use pipewatch::app::AppState;
use pipewatch::az::AzExecutor;
use pipewatch::cli::Cli;
use pipewatch::events::{dispatch, AppEvent, Command, EventHandler};
use pipewatch::input::{self, Action};
use pipewatch::poller::Poller;
use pipewatch::traits::{RunSource, TimelineSource};
use pipewatch::tui;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

const TICK_RATE: Duration = Duration::from_millis(100);
const LOG_PAGE: usize = 20;

fn setup_verbose_logging() -> Result<()> {
    let state_dir = state_dir();
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .init();
    tracing::info!(
        "pipewatch v{} starting with verbose logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn state_dir() -> std::path::PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        std::path::PathBuf::from(state).join("pipewatch")
    } else if let Some(home) = std::env::var_os("HOME") {
        std::path::PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("pipewatch")
    } else {
        std::path::PathBuf::from("/tmp/pipewatch")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    if args.verbose {
        setup_verbose_logging()?;
    }

    let executor = Arc::new(AzExecutor::new(&args.org, args.project.clone()));
    if let Err(e) = executor.check_available().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, SetTitle("")) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        SetTitle(format!("watching {}", args.project))
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let runs: Arc<dyn RunSource> = executor.clone();
    let timelines: Arc<dyn TimelineSource> = executor;
    let poller = Poller::with_config(runs, args.poll_interval(), args.limit);
    tracing::info!(
        interval_secs = poller.interval().as_secs(),
        page_size = poller.page_size(),
        "poller configured"
    );

    let mut state = AppState::new(args.org.clone(), args.project.clone());
    state.config.version_string = format!("pipewatch v{}", env!("CARGO_PKG_VERSION"));
    state.poll_interval = poller.interval().as_secs();
    let size = terminal.size()?;
    state.set_viewport(size.width, size.height);

    let events = EventHandler::new(TICK_RATE);
    let tx = events.sender();

    let result = run_app(&mut terminal, &mut state, events, &tx, &poller, &timelines).await;

    poller.stop();
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;

    result
}

fn log_overlay_height(terminal: &Terminal<CrosstermBackend<io::Stdout>>) -> usize {
    let height = terminal.size().map(|s| s.height).unwrap_or_else(|e| {
        tracing::warn!("terminal size query failed: {e}");
        24
    });
    tui::log_overlay::visible_height(height)
}

fn fetch_timeline(
    tx: &UnboundedSender<AppEvent>,
    timelines: &Arc<dyn TimelineSource>,
    state: &mut AppState,
    run_id: u64,
) {
    let source = Arc::clone(timelines);
    state.begin_loading();
    dispatch(
        tx,
        "timeline fetch",
        Command::new(async move {
            let result = source
                .fetch_timeline(run_id)
                .await
                .map_err(|e| format!("{e:#}"));
            AppEvent::TimelineLoaded { run_id, result }
        }),
    );
}

fn fetch_runs(tx: &UnboundedSender<AppEvent>, poller: &Poller, state: &mut AppState) {
    if let Some(cmd) = poller.fetch_once() {
        state.begin_loading();
        dispatch(tx, "run fetch", cmd);
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    mut events: EventHandler,
    tx: &UnboundedSender<AppEvent>,
    poller: &Poller,
    timelines: &Arc<dyn TimelineSource>,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let mut poll_start = Instant::now();

    fetch_runs(tx, poller, state);
    if let Some(timer) = poller.start_polling() {
        dispatch(tx, "poll timer", timer);
    }

    loop {
        terminal.draw(|f| tui::render::render(f, state))?;

        let elapsed = poll_start.elapsed().as_secs();
        state.next_poll_in = state.poll_interval.saturating_sub(elapsed);
        state.prune_error();

        let Some(event) = events.next().await else {
            tracing::warn!("event channel closed");
            break;
        };

        match event {
            AppEvent::Key(key) => match input::map_key(key, &state.input_context()) {
                Action::Quit => state.should_quit = true,
                Action::DismissError => state.clear_error(),
                Action::MoveUp => {
                    if state.timeline.is_some() {
                        state.navigator.move_up();
                    } else {
                        state.move_cursor_up();
                    }
                }
                Action::MoveDown => {
                    if state.timeline.is_some() {
                        state.navigator.move_down();
                    } else {
                        state.move_cursor_down();
                    }
                }
                Action::PageUp => {
                    if state.timeline.is_some() {
                        state.navigator.page_up();
                    } else {
                        state.page_cursor_up();
                    }
                }
                Action::PageDown => {
                    if state.timeline.is_some() {
                        state.navigator.page_down();
                    } else {
                        state.page_cursor_down();
                    }
                }
                Action::Top => {
                    if state.timeline.is_some() {
                        state.navigator.select_first();
                    } else {
                        state.cursor_to_top();
                    }
                }
                Action::Bottom => {
                    if state.timeline.is_some() {
                        state.navigator.select_last();
                    } else {
                        state.cursor_to_bottom();
                    }
                }
                Action::Open => {
                    if let Some(run_id) = state.open_selected_timeline() {
                        fetch_timeline(tx, timelines, state, run_id);
                    }
                }
                Action::Back => state.close_timeline(),
                Action::ViewLogs => {
                    if let Some((run_id, log_id, title)) = state.selected_log_target() {
                        let source = Arc::clone(timelines);
                        state.begin_loading();
                        dispatch(
                            tx,
                            "log fetch",
                            Command::new(async move {
                                let result = source
                                    .fetch_log(run_id, log_id)
                                    .await
                                    .map_err(|e| format!("{e:#}"));
                                AppEvent::LogLoaded { title, result }
                            }),
                        );
                    } else if let Some(msg) = state.navigator.status_message() {
                        state.set_error(msg);
                    }
                }
                Action::Refresh => {
                    if let Some(run_id) = state.mark_timeline_loading() {
                        fetch_timeline(tx, timelines, state, run_id);
                    } else {
                        fetch_runs(tx, poller, state);
                    }
                }
                Action::CloseOverlay => state.close_log_overlay(),
                Action::ScrollUp => state.scroll_log_up(1),
                Action::ScrollDown => state.scroll_log_down(1, log_overlay_height(terminal)),
                Action::ScrollPageUp => state.scroll_log_up(LOG_PAGE),
                Action::ScrollPageDown => {
                    state.scroll_log_down(LOG_PAGE, log_overlay_height(terminal));
                }
                Action::ScrollToTop => state.scroll_log_to_top(),
                Action::ScrollToBottom => state.scroll_log_to_bottom(log_overlay_height(terminal)),
                Action::None => {}
            },
            AppEvent::Tick => {
                if last_tick.elapsed() >= TICK_RATE {
                    state.advance_spinner();
                    last_tick = Instant::now();
                }
            }
            AppEvent::Resize(width, height) => state.set_viewport(width, height),
            AppEvent::PollTick => {
                let commands = poller.on_tick();
                if !commands.is_empty() {
                    state.begin_loading();
                    poll_start = Instant::now();
                }
                for cmd in commands {
                    dispatch(tx, "poll", cmd);
                }
            }
            AppEvent::RunsUpdated { result } => {
                state.end_loading();
                if let Some(changed) = state.apply_poll_result(poller, result) {
                    if tx.send(changed).is_err() {
                        tracing::warn!("event channel closed while reporting connection state");
                    }
                }
            }
            AppEvent::ConnectionStateChanged { state: conn, error } => match error {
                Some(e) => tracing::warn!(state = conn.label(), error = %e, "connection state changed"),
                None => tracing::info!(state = conn.label(), "connection state changed"),
            },
            AppEvent::TimelineLoaded { run_id, result } => {
                state.end_loading();
                state.apply_timeline(run_id, result);
            }
            AppEvent::LogLoaded { title, result } => {
                state.end_loading();
                match result {
                    Ok(content) => state.open_log_overlay(title, &content),
                    Err(e) => state.set_error(format!("Log fetch failed: {e}")),
                }
            }
            AppEvent::Error(e) => {
                state.loading_count = 0;
                state.set_error(e);
            }
        }

        if state.should_quit {
            break;
        }
    }
    Ok(())
}
