use crate::app::{truncate, AppState, Run, RunResult, RunStatus, NARROW_WIDTH_THRESHOLD};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    if state.runs.is_empty() {
        let msg = if state.runs_stale {
            "No runs yet, waiting for the service"
        } else if state.last_poll.is_none() {
            "Loading runs…"
        } else {
            "No pipeline runs found"
        };
        f.render_widget(
            Paragraph::new(msg).style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let narrow = area.width < NARROW_WIDTH_THRESHOLD;
    let height = usize::from(area.height).max(1);
    let offset = (state.cursor + 1).saturating_sub(height);

    let lines: Vec<Line> = state
        .runs
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, run)| run_line(run, i == state.cursor, narrow, usize::from(area.width)))
        .collect();

    f.render_widget(Paragraph::new(lines), area);
}

pub(crate) fn status_icon(status: RunStatus, result: Option<RunResult>) -> (&'static str, Color) {
    match (status, result) {
        (RunStatus::Completed, Some(RunResult::Succeeded)) => ("✓", Color::Green),
        (RunStatus::Completed, Some(RunResult::PartiallySucceeded)) => ("!", Color::Yellow),
        (RunStatus::Completed, Some(RunResult::Failed)) => ("✗", Color::Red),
        (RunStatus::Completed, Some(RunResult::Canceled)) => ("⊘", Color::Yellow),
        (RunStatus::InProgress | RunStatus::Cancelling, _) => ("⟳", Color::Yellow),
        _ => ("·", Color::DarkGray),
    }
}

fn run_line(run: &Run, selected: bool, narrow: bool, max_width: usize) -> Line<'static> {
    let (icon, color) = status_icon(run.status, run.result);
    let number = format!("#{}", run.build_number);
    let duration = run.duration();
    let branch = run.branch_name().to_string();

    let suffix_width = if narrow {
        0
    } else {
        duration.len() + branch.width() + 2
    };
    let prefix_width = icon.width() + number.width() + 3;
    let name = truncate(
        &run.definition_name,
        max_width.saturating_sub(prefix_width + suffix_width),
    );

    let name_style = if selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color)),
        Span::styled(format!("{number} "), Style::default().fg(Color::DarkGray)),
        Span::styled(name, name_style),
    ];
    if !narrow {
        spans.push(Span::styled(
            format!(" {duration}"),
            Style::default().fg(Color::DarkGray),
        ));
        spans.push(Span::styled(format!(" {branch}"), Style::default().fg(Color::Blue)));
    }
    Line::from(spans)
}
