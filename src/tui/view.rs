use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::app::App;
use super::bridge::CHAT_VIEW;
use crate::format::DisplayLine;

pub fn draw(f: &mut Frame<'_>, app: &mut App) {
    let area = f.size();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // transcript
            Constraint::Length(1), // prompt + entry
        ])
        .split(area);

    draw_chat(f, app, layout[0]);
    draw_prompt_row(f, app, layout[1]);
}

/// Transcript, pinned to the newest line.
fn draw_chat(f: &mut Frame<'_>, app: &App, area: Rect) {
    let Ok(view) = app.view(CHAT_VIEW) else {
        return;
    };

    let rows = visible_rows(&view.lines, area.width, area.height);
    f.render_widget(Paragraph::new(rows), area);
}

fn draw_prompt_row(f: &mut Frame<'_>, app: &mut App, area: Rect) {
    let prompt = format!("{}>", app.channel);
    let prompt_width = (UnicodeWidthStr::width(prompt.as_str()) as u16 + 1).min(area.width);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(prompt_width), Constraint::Min(1)])
        .split(area);

    let prompt_color = if app.connected {
        Color::Green
    } else {
        Color::Red
    };
    f.render_widget(
        Paragraph::new(Span::styled(prompt, Style::default().fg(prompt_color))),
        cols[0],
    );

    let cursor = if app.focus.shows_cursor() {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    app.entry.set_cursor_style(cursor);

    f.render_widget(app.entry.widget(), cols[1]);
}

/// Break a line into rows of at most `width` columns.
///
/// Rows are cut at the column limit, not at word boundaries, so the row count
/// is exact and the newest line is never pushed below the area.
fn wrap_line(line: &DisplayLine, width: u16) -> Vec<Line<'static>> {
    let width = usize::from(width.max(1));
    let pieces = [
        (line.stamp.as_str(), Style::default().add_modifier(Modifier::BOLD)),
        (" ", Style::default()),
        (line.text.as_str(), Style::default()),
    ];

    let mut rows = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut used = 0;
    for (text, style) in pieces {
        let mut chunk = String::new();
        for c in text.chars() {
            let w = UnicodeWidthChar::width(c).unwrap_or(0);
            if used > 0 && used + w > width {
                if !chunk.is_empty() {
                    row.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                rows.push(Line::from(std::mem::take(&mut row)));
                used = 0;
            }
            chunk.push(c);
            used += w;
        }
        if !chunk.is_empty() {
            row.push(Span::styled(chunk, style));
        }
    }
    rows.push(Line::from(row));
    rows
}

/// The last `height` rows of the transcript, oldest first.
fn visible_rows(lines: &[DisplayLine], width: u16, height: u16) -> Vec<Line<'static>> {
    let height = usize::from(height);
    let mut rows = Vec::with_capacity(height);
    for line in lines.iter().rev() {
        if rows.len() >= height {
            break;
        }
        rows.extend(wrap_line(line, width).into_iter().rev());
    }
    rows.truncate(height);
    rows.reverse();
    rows
}
