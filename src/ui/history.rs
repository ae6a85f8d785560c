use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::stats::SessionResult;

const HEADERS: [&str; 5] = ["When", "Game", "Score", "Level", "Trials"];

/// One history line as display strings, in [`HEADERS`] order.
pub fn history_row(result: &SessionResult, now: DateTime<Local>) -> [String; 5] {
    [
        result.age(now),
        result.game.title().to_string(),
        result.score.to_string(),
        format!("{} ({} done)", result.level_reached, result.levels_completed),
        result.trials.to_string(),
    ]
}

/// Plain-text table for the `history` command, columns padded to the widest
/// cell.
pub fn format_history(results: &[SessionResult], now: DateTime<Local>) -> Vec<String> {
    let rows: Vec<[String; 5]> = results.iter().map(|r| history_row(r, now)).collect();

    let mut widths = HEADERS.map(|h| h.width());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let line = |cells: [&str; 5]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell}{}", " ".repeat(width - cell.width())))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut lines = vec![line(HEADERS)];
    for row in &rows {
        lines.push(line(row.each_ref().map(String::as_str)));
    }
    lines
}

/// Recent results of the game just played, best score highlighted.
pub fn render_recent(
    results: &[SessionResult],
    best: Option<u32>,
    now: DateTime<Local>,
    area: Rect,
    buf: &mut Buffer,
) {
    let header = Row::new(HEADERS.map(Cell::from)).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = results
        .iter()
        .map(|result| {
            let style = if Some(result.score) == best {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Row::new(history_row(result, now).map(Cell::from)).style(style)
        })
        .collect();

    let title = match best {
        Some(best) => format!("Recent (best {best})"),
        None => "Recent".to_string(),
    };

    Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(7),
            Constraint::Length(12),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .render(area, buf);
}
