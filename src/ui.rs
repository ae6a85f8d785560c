pub mod charting;
pub mod history;

use chrono::Local;
use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};

use crate::app::{App, AppState};
use crate::games::Screen;
use crate::session::Phase;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Playing => render_play(&self.session.screen(self.now), area, buf),
            AppState::Results => render_results(self, area, buf),
        }
    }
}

fn render_play(screen: &Screen, area: Rect, buf: &mut Buffer) {
    // styles
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let stimulus_style = match screen.outcome {
        Some(true) => Style::default().patch(bold_style).fg(Color::Green),
        Some(false) => Style::default().patch(bold_style).fg(Color::Red),
        None => bold_style,
    };

    let body: Vec<Line> = if screen.state.phase == Phase::Countdown {
        vec![Line::from(Span::styled(
            screen.state.countdown.to_string(),
            Style::default().patch(bold_style).fg(Color::Yellow),
        ))]
    } else {
        screen
            .lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), stimulus_style)))
            .collect()
    };
    let body_lines = (body.len() as u16).max(1);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // hud
            Constraint::Min(0),
            Constraint::Length(1), // time left
            Constraint::Length(body_lines),
            Constraint::Length(1), // feedback
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let state = &screen.state;
    let hud = Paragraph::new(Line::from(vec![
        Span::styled(screen.kind.title(), bold_style),
        Span::raw(format!(
            "   level {}   score {}   lives {}",
            state.level,
            state.score,
            "♥".repeat(state.lives as usize)
        )),
        Span::styled(
            if state.sound_enabled { "   ♪" } else { "   muted" },
            dim_bold_style,
        ),
    ]));
    hud.render(chunks[0], buf);

    if let Some(ms) = screen.time_left_ms {
        Paragraph::new(Span::styled(
            format!("{:.1}", ms as f64 / 1000.0),
            dim_bold_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }

    Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .render(chunks[3], buf);

    if let Some(correct) = screen.outcome {
        let (text, color) = if correct {
            ("correct", Color::Green)
        } else {
            ("wrong", Color::Red)
        };
        Paragraph::new(Span::styled(
            text,
            Style::default().fg(color).add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
    }

    Paragraph::new(Span::styled(
        format!("{}   (esc) pause", screen.controls),
        italic_style,
    ))
    .render(chunks[6], buf);

    if state.paused {
        render_pause(state.sound_enabled, area, buf);
    }
}

fn render_pause(sound_enabled: bool, area: Rect, buf: &mut Buffer) {
    let height = 4.min(area.height);
    let overlay = Rect::new(
        area.x,
        area.y + area.height.saturating_sub(height) / 2,
        area.width,
        height,
    );
    for y in overlay.top()..overlay.bottom() {
        for x in overlay.left()..overlay.right() {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.reset();
            }
        }
    }

    Paragraph::new(vec![
        Line::from(Span::styled(
            "PAUSED",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "(esc) resume / (r)estart / (s)ound {} / (q)uit",
                if sound_enabled { "off" } else { "on" }
            ),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(overlay, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let magenta_style = Style::default().fg(Color::Magenta);

    let recent_height = if app.recent.is_empty() {
        0
    } else {
        app.recent.len() as u16 + 3
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // score line
            Constraint::Length(2), // metrics
            Constraint::Length(recent_height),
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let coords = app.session.reaction_times();
    let (last_trial, slowest) = charting::compute_chart_params(&coords);

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&coords)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("trial")
                .bounds([1.0, last_trial])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(charting::format_label(last_trial), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("ms")
                .bounds([0.0, slowest])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(charting::format_label(slowest), bold_style),
                ]),
        )
        .render(chunks[0], buf);

    let state = app.session.state();
    Paragraph::new(Span::styled(
        format!(
            "{}   score {}   level {}   {} levels done",
            app.kind.title(),
            state.score,
            state.max_level,
            state.levels_completed
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    if let Some(report) = app.session.report_json() {
        Paragraph::new(Span::styled(
            metrics_summary(&report["metrics"]),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);
    }

    if !app.recent.is_empty() {
        history::render_recent(&app.recent, app.best, Local::now(), chunks[3], buf);
    }

    Paragraph::new(Span::styled("(r)etry / (esc)ape", italic_style)).render(chunks[5], buf);
}

/// `key value` pairs of a metrics object, score left out.
fn metrics_summary(metrics: &serde_json::Value) -> String {
    let Some(map) = metrics.as_object() else {
        return String::new();
    };
    map.iter()
        .filter(|(key, _)| key.as_str() != "score")
        .map(|(key, value)| format!("{} {value}", key.replace('_', " ")))
        .join("   ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Autoplay;
    use crate::games::GameKind;
    use crate::session::SessionOptions;
    use serde_json::json;

    fn app(kind: GameKind) -> App {
        App::new(
            kind,
            SessionOptions {
                sound_enabled: true,
                seed: Some(9),
            },
            None,
        )
    }

    fn rendered(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn countdown_shows_hud_and_seconds() {
        let mut app = app(GameKind::ColorMatch);
        app.start(0);
        let text = rendered(&app, 80, 24);
        assert!(text.contains("Color Match"));
        assert!(text.contains("level 1"));
        assert!(text.contains("♥♥♥"));
        assert!(text.contains('3'));
    }

    #[test]
    fn playing_shows_stimulus_and_controls() {
        let mut app = app(GameKind::Flanker);
        app.start(0);
        app.on_tick(3_000);
        let screen = app.session.screen(3_000);
        assert!(!screen.lines.is_empty());

        let text = rendered(&app, 80, 24);
        assert!(text.contains(screen.lines[0].trim()));
        assert!(text.contains("(esc) pause"));
    }

    #[test]
    fn pause_overlay_lists_the_menu() {
        let mut app = app(GameKind::ColorMatch);
        app.start(0);
        app.on_tick(3_000);
        app.session.toggle_pause(3_100);
        let text = rendered(&app, 80, 24);
        assert!(text.contains("PAUSED"));
        assert!(text.contains("(s)ound off"));
    }

    #[test]
    fn results_show_score_and_metrics() {
        let mut app = app(GameKind::SpatialCue);
        app.start(0);
        let end = app.session.autoplay(&mut Autoplay::new(0.8, 400, 1), 0);
        app.on_tick(end);
        assert_eq!(app.state, AppState::Results);

        let text = rendered(&app, 120, 30);
        assert!(text.contains("Spatial Cue"));
        assert!(text.contains("score"));
        assert!(text.contains("trial"));
        assert!(text.contains("(r)etry"));
    }

    #[test]
    fn tiny_areas_do_not_panic() {
        let mut app = app(GameKind::PatternRecall);
        app.start(0);
        for (w, h) in [(1, 1), (10, 3), (20, 5), (200, 60)] {
            rendered(&app, w, h);
        }
        app.session.toggle_pause(10);
        rendered(&app, 5, 2);
    }

    #[test]
    fn summary_skips_score_and_spaces_keys() {
        let summary = metrics_summary(&json!({
            "score": 40,
            "errores_omision": 2,
            "tiempo_reaccion_ms": 512.5
        }));
        assert!(!summary.contains("score"));
        assert!(summary.contains("errores omision 2"));
        assert!(summary.contains("tiempo reaccion ms 512.5"));
    }
}
