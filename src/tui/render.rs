use crate::app::{AppState, CHROME_HEIGHT};
use crate::tui::{detail, footer, header, log_overlay, runs};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

pub fn render(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(CHROME_HEIGHT / 2), // header
            Constraint::Min(1),                    // body
            Constraint::Length(CHROME_HEIGHT / 2), // footer
        ])
        .split(f.area());

    header::render(f, chunks[0], state);
    if state.timeline.is_some() {
        detail::render(f, chunks[1], state);
    } else {
        runs::render(f, chunks[1], state);
    }
    footer::render(f, chunks[2], state);

    if let Some(err) = state.error_message() {
        render_error_toast(f, err);
    }

    // Drawn on top of everything
    if let Some(overlay) = &state.log_overlay {
        log_overlay::render(f, overlay);
    }
}

fn render_error_toast(f: &mut Frame, err: &str) {
    let area = f.area();
    if area.height <= 6 || area.width < 4 {
        return;
    }
    let err_area = Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(5),
        width: area.width.saturating_sub(2),
        height: 3,
    };
    let widget = Paragraph::new(err.to_owned())
        .style(Style::default().fg(Color::Red))
        .block(
            Block::default()
                .title(" Error ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, err_area);
    f.render_widget(widget, err_area);
}
