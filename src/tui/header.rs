use crate::app::AppState;
use crate::recovery::ConnectionState;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

fn connection_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Error => Color::LightRed,
        ConnectionState::Disconnected => Color::Red,
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", state.config.version_string),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ "),
        Span::styled(
            format!("{}/{}", state.config.organization, state.config.project),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ];

    if let Some(view) = &state.timeline {
        spans.push(Span::raw(" › "));
        spans.push(Span::styled(view.title.clone(), Style::default().fg(Color::Yellow)));
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        format!("● {}", state.connection.label()),
        Style::default().fg(connection_color(state.connection)),
    ));

    if state.is_loading() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            crate::tui::spinner_frame(state.spinner_frame).to_string(),
            Style::default().fg(Color::Yellow),
        ));
    } else if state.next_poll_in > 0 {
        spans.push(Span::styled(
            format!(" {}s", state.next_poll_in),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if state.runs_stale && !state.runs.is_empty() {
        spans.push(Span::styled(
            " [stale]",
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(header, area);
}
