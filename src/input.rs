use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    DismissError,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
    /// Drill into the selected run's timeline.
    Open,
    /// Leave the timeline for the run list.
    Back,
    ViewLogs,
    Refresh,
    CloseOverlay,
    ScrollUp,
    ScrollDown,
    ScrollPageUp,
    ScrollPageDown,
    ScrollToTop,
    ScrollToBottom,
    None,
}

/// Which screen has the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Runs,
    Timeline,
    Log,
}

/// Captures the UI state needed to interpret a key press.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub has_error: bool,
    pub is_loading: bool,
    pub screen: Screen,
}

pub fn map_key(key: KeyEvent, ctx: &InputContext) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }

    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    if ctx.screen == Screen::Log {
        return match key.code {
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::PageDown | KeyCode::Char(' ') => Action::ScrollPageDown,
            KeyCode::PageUp => Action::ScrollPageUp,
            KeyCode::Char('g') | KeyCode::Home => Action::ScrollToTop,
            KeyCode::Char('G') | KeyCode::End => Action::ScrollToBottom,
            KeyCode::Char('q' | 'h') | KeyCode::Esc | KeyCode::Left => Action::CloseOverlay,
            _ => Action::None,
        };
    }

    // Shared between the run list and the timeline.
    let common = match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Action::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::MoveDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Home | KeyCode::Char('g') => Some(Action::Top),
        KeyCode::End | KeyCode::Char('G') => Some(Action::Bottom),
        KeyCode::Char('r') if !ctx.is_loading => Some(Action::Refresh),
        KeyCode::Char('q') => Some(Action::Quit),
        _ => None,
    };
    if let Some(action) = common {
        return action;
    }

    match (ctx.screen, key.code) {
        (_, KeyCode::Esc) if ctx.has_error => Action::DismissError,
        (Screen::Runs, KeyCode::Esc) => Action::Quit,
        (Screen::Runs, KeyCode::Enter | KeyCode::Right | KeyCode::Char('l')) => Action::Open,
        (Screen::Timeline, KeyCode::Esc | KeyCode::Left | KeyCode::Char('h')) => Action::Back,
        (Screen::Timeline, KeyCode::Enter | KeyCode::Right | KeyCode::Char('l')) => {
            Action::ViewLogs
        }
        _ => Action::None,
    }
}
