use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{AppState, NARROW_WIDTH_THRESHOLD};
use crate::input::Screen;

fn hints(screen: Screen, narrow: bool) -> &'static [(&'static str, &'static str)] {
    match (screen, narrow) {
        (Screen::Log, _) => &[("j/k", "scroll"), ("g/G", "top/end"), ("q", "close")],
        (Screen::Timeline, true) => &[("j/k", "nav"), ("l", "log"), ("h", "back"), ("q", "quit")],
        (Screen::Timeline, false) => &[
            ("↑↓/jk", "navigate"),
            ("PgUp/PgDn", "page"),
            ("→/l/Enter", "log"),
            ("←/h/Esc", "back"),
            ("r", "refresh"),
            ("q", "quit"),
        ],
        (Screen::Runs, true) => &[("j/k", "nav"), ("l", "open"), ("r", "refresh"), ("q", "quit")],
        (Screen::Runs, false) => &[
            ("↑↓/jk", "navigate"),
            ("→/l/Enter", "timeline"),
            ("r", "refresh"),
            ("q", "quit"),
        ],
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let narrow = area.width < NARROW_WIDTH_THRESHOLD;
    let screen = state.input_context().screen;

    let line = if let (Some(status), false) = (state.status_line(), screen == Screen::Log) {
        let mut spans = vec![
            Span::styled("» ", Style::default().fg(Color::Yellow)),
            Span::styled(status, Style::default().fg(Color::Yellow)),
        ];
        if screen == Screen::Timeline && !narrow {
            spans.push(Span::styled(
                format!("  {:.0}%", state.navigator.scroll_percent()),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    } else {
        let mut spans: Vec<Span> = Vec::new();
        for (i, (key, desc)) in hints(screen, narrow).iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(
                format!(" {desc}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if screen == Screen::Timeline && !state.navigator.is_empty() && !narrow {
            spans.push(Span::styled(
                format!("  {:.0}%", state.navigator.scroll_percent()),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_hints_are_shorter() {
        for screen in [Screen::Runs, Screen::Timeline] {
            assert!(hints(screen, true).len() < hints(screen, false).len());
        }
        assert!(hints(Screen::Log, false).iter().any(|(_, d)| *d == "close"));
    }
}
