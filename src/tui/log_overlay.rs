use crate::app::LogOverlay;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

/// Centered box covering most of the screen; never smaller than 6 rows if it fits.
pub fn overlay_area(area: Rect) -> Rect {
    let width = (area.width * 9 / 10).max(area.width.min(20)).min(area.width);
    let height = (area.height * 8 / 10).max(6).min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

/// Log lines that fit inside the overlay for a terminal of `terminal_height` rows.
pub fn visible_height(terminal_height: u16) -> usize {
    let area = overlay_area(Rect::new(0, 0, 1, terminal_height));
    usize::from(area.height.saturating_sub(2)).max(1)
}

pub fn render(f: &mut Frame, overlay: &LogOverlay) {
    let area = overlay_area(f.area());
    f.render_widget(Clear, area);

    let inner_height = usize::from(area.height.saturating_sub(2));
    let total = overlay.lines.len();
    let position = if total > inner_height {
        format!(
            " [{}-{}/{}] ",
            overlay.scroll + 1,
            (overlay.scroll + inner_height).min(total),
            total,
        )
    } else {
        String::new()
    };

    let block = Block::default()
        .title(format!(" {} {position}", overlay.title))
        .title_bottom(Line::from(" j/k scroll | g/G top/end | q close ").centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    let lines: Vec<Line> = if total == 0 {
        vec![Line::styled("(empty log)", Style::default().fg(Color::DarkGray))]
    } else {
        overlay
            .lines
            .iter()
            .skip(overlay.scroll)
            .take(inner_height)
            .map(|l| Line::raw(l.as_str()))
            .collect()
    };

    // No wrapping: scroll offsets count source lines.
    f.render_widget(Paragraph::new(lines).block(block), area);
}
