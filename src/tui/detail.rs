use crate::app::{truncate, AppState, NARROW_WIDTH_THRESHOLD};
use crate::timeline::{FlatRow, IconKind};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

const INDENT: usize = 2;

pub(crate) fn icon(kind: IconKind) -> (&'static str, Color) {
    match kind {
        IconKind::Succeeded => ("✓", Color::Green),
        IconKind::Warning => ("!", Color::Yellow),
        IconKind::Failed => ("✗", Color::Red),
        IconKind::Canceled => ("⊘", Color::Yellow),
        IconKind::Skipped => ("-", Color::DarkGray),
        IconKind::Running => ("⟳", Color::Yellow),
        IconKind::Pending => ("·", Color::DarkGray),
        IconKind::Unknown => ("?", Color::DarkGray),
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let loading = state.timeline.as_ref().is_some_and(|v| v.loading);
    let nav = &state.navigator;

    if nav.is_empty() {
        let msg = if loading {
            format!("{} Loading timeline…", crate::tui::spinner_frame(state.spinner_frame))
        } else {
            "This run has no timeline records".to_string()
        };
        f.render_widget(
            Paragraph::new(msg).style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let width = body_width(nav.width(), area.width);
    let narrow = width < NARROW_WIDTH_THRESHOLD;
    let width = usize::from(width);
    let lines: Vec<Line> = nav
        .visible_rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let selected = nav.top() + i == nav.selected_index();
            row_line(row, selected, narrow, width)
        })
        .take(usize::from(area.height))
        .collect();

    f.render_widget(Paragraph::new(lines), area);
}

/// Row width from the navigator's viewport, bounded by the area actually drawn;
/// an unsized navigator falls back to the area.
fn body_width(viewport: u16, area: u16) -> u16 {
    if viewport == 0 {
        area
    } else {
        viewport.min(area)
    }
}

fn row_line(row: &FlatRow<'_>, selected: bool, narrow: bool, width: usize) -> Line<'static> {
    let record = row.record();
    let (glyph, color) = icon(record.icon_kind());
    let indent = " ".repeat(1 + row.depth * INDENT);
    let duration = if narrow { String::new() } else { record.duration() };
    let kind = if narrow {
        String::new()
    } else {
        format!(" {}", record.record_type.label().to_lowercase())
    };

    let fixed = indent.width() + glyph.width() + 1 + duration.width() + kind.width() + 2;
    let name = truncate(&record.name, width.saturating_sub(fixed));

    let mut name_style = Style::default();
    if !row.node.children.is_empty() {
        name_style = name_style.add_modifier(Modifier::BOLD);
    }
    if selected {
        name_style = name_style.add_modifier(Modifier::REVERSED);
    }

    let mut spans = vec![
        Span::raw(indent),
        Span::styled(glyph, Style::default().fg(color)),
        Span::raw(" "),
        Span::styled(name, name_style),
    ];
    if !kind.is_empty() {
        spans.push(Span::styled(kind, Style::default().fg(Color::DarkGray)));
    }
    if !duration.is_empty() {
        spans.push(Span::styled(
            format!("  {duration}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if record.log.is_none() && !narrow && row.node.children.is_empty() {
        spans.push(Span::styled(" (no log)", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}
