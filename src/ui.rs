pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use keystride::{
    engine::SessionReport,
    ledger::Outcome,
    matcher::CharState,
    runtime::Clock,
    session::Session,
    time_series,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Title, subtitle and retry label for each result kind
pub fn outcome_text(outcome: Outcome) -> (&'static str, &'static str, &'static str) {
    match outcome {
        Outcome::Baseline => (
            "Baseline Established!",
            "You've set the bar. Now the real challenge begins: time to beat it.",
            "Beat This Score",
        ),
        Outcome::NewRecord => (
            "High Score Smashed!",
            "You're getting faster. That was incredible typing.",
            "Beat This Score",
        ),
        Outcome::Ordinary => (
            "Test Complete!",
            "Solid run. Keep pushing to beat your high score.",
            "Go Again",
        ),
    }
}

struct Styles {
    bold: Style,
    green_bold: Style,
    red_bold: Style,
    dim_bold: Style,
    underlined_dim_bold: Style,
    italic: Style,
    magenta: Style,
}

impl Default for Styles {
    fn default() -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim_bold = Style::default().patch(bold).add_modifier(Modifier::DIM);
        Self {
            bold,
            green_bold: Style::default().patch(bold).fg(Color::Green),
            red_bold: Style::default().patch(bold).fg(Color::Red),
            dim_bold,
            underlined_dim_bold: Style::default()
                .patch(dim_bold)
                .add_modifier(Modifier::UNDERLINED),
            italic: Style::default().add_modifier(Modifier::ITALIC),
            magenta: Style::default().fg(Color::Magenta),
        }
    }
}

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let styles = Styles::default();

        match (self.engine.session(), self.engine.report()) {
            (Some(session), Some(report)) if session.is_finished() => {
                render_results(self, report, &styles, area, buf)
            }
            (Some(session), _) => render_typing(self, session, &styles, area, buf),
            (None, _) => render_unavailable(self, &styles, area, buf),
        }
    }
}

fn header_line<C: Clock>(app: &App<C>, session: Option<&Session>) -> String {
    let engine = &app.engine;
    let metrics = session.map(Session::metrics).unwrap_or_default();
    let time = match session {
        Some(s) => match s.remaining_secs() {
            Some(remaining) => format!("{remaining}s left"),
            None => format!("{}s", s.elapsed_secs()),
        },
        None => "-".to_string(),
    };

    format!(
        "{} · {} · pb {} wpm │ {} wpm · {}% acc · {}",
        engine.difficulty(),
        engine.mode(),
        engine.personal_best(),
        metrics.wpm,
        metrics.accuracy,
        time
    )
}

fn render_typing<C: Clock>(
    app: &App<C>,
    session: &Session,
    styles: &Styles,
    area: Rect,
    buf: &mut Buffer,
) {
    let text = session.passage().as_str();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_occupied_lines = if text.width() <= max_chars_per_line as usize {
        1
    } else {
        ((text.width() as f64 / f64::from(max_chars_per_line)).ceil() + 1.0)
            .min(f64::from(u16::MAX)) as u16
    };
    let padding = area.height.saturating_sub(prompt_occupied_lines.saturating_add(6)) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(padding),
            Constraint::Length(2),
            Constraint::Length(prompt_occupied_lines),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(header_line(app, Some(session)), styles.bold))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let status = if session.is_idle() {
        Span::styled(
            "Press Enter to start",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        )
    } else if let Some(message) = &app.message {
        Span::styled(message.clone(), styles.red_bold)
    } else {
        Span::raw("")
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(Line::from(passage_spans(session, styles)))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);

    let legend = if session.is_idle() {
        "(enter) start / (1)(2)(3) or (d) difficulty / (t)imed (p)assage / (tab) new passage / (esc)ape"
    } else {
        "(tab) new passage / (←) restart / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, styles.italic)).render(chunks[5], buf);
}

fn passage_spans(session: &Session, styles: &Styles) -> Vec<Span<'static>> {
    let passage = session.passage();
    session
        .states()
        .iter()
        .enumerate()
        .map(|(idx, state)| {
            let expected = passage.char_at(idx);
            match state {
                CharState::Correct => Span::styled(expected.to_string(), styles.green_bold),
                CharState::Incorrect => Span::styled(
                    match expected {
                        ' ' => "·".to_owned(),
                        c => c.to_string(),
                    },
                    styles.red_bold,
                ),
                CharState::Current => {
                    Span::styled(expected.to_string(), styles.underlined_dim_bold)
                }
                CharState::Pending => Span::styled(expected.to_string(), styles.dim_bold),
            }
        })
        .collect()
}

fn render_results<C: Clock>(
    app: &App<C>,
    report: &SessionReport,
    styles: &Styles,
    area: Rect,
    buf: &mut Buffer,
) {
    let (title, subtitle, retry_label) = outcome_text(report.outcome);
    let title_style = match report.outcome {
        Outcome::NewRecord => Style::default().patch(styles.bold).fg(Color::Yellow),
        _ => styles.bold,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Length(1), // subtitle
            Constraint::Length(1),
            Constraint::Min(1), // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // recent scores
            Constraint::Length(1),
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(title, title_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);
    Paragraph::new(Span::styled(subtitle, styles.italic))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let (overall_duration, highest_wpm) =
        charting::chart_bounds(&report.wpm_samples, app.engine.time_limit_secs());
    let points = time_series::as_points(&report.wpm_samples);
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(styles.magenta)
        .graph_type(GraphType::Line)
        .data(&points)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, overall_duration])
                .labels(vec![
                    Span::styled("1", styles.bold),
                    Span::styled(charting::format_label(overall_duration), styles.bold),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", styles.bold),
                    Span::styled(charting::format_label(highest_wpm), styles.bold),
                ]),
        )
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} correct   {} errors   pb {}",
            report.metrics.wpm,
            report.metrics.accuracy,
            report.counters.correct_chars,
            report.counters.errors,
            report.personal_best
        ),
        styles.bold,
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    let recent = report
        .recent_scores
        .iter()
        .map(|s| format!("{} wpm ({})", s.wpm, s.date.format("%Y-%m-%d")))
        .collect::<Vec<_>>()
        .join(" · ");
    Paragraph::new(Span::styled(
        format!("{} high scores: {}", report.difficulty, recent),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[5], buf);

    Paragraph::new(Span::styled(
        format!("(tab) {retry_label} / (←) restart / (esc)ape"),
        styles.italic,
    ))
    .render(chunks[7], buf);
}

fn render_unavailable<C: Clock>(app: &App<C>, styles: &Styles, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(header_line(app, None), styles.bold))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let message = app
        .message
        .clone()
        .unwrap_or_else(|| "No passage loaded".to_string());
    Paragraph::new(Span::styled(message, styles.red_bold))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(enter) try again / (1)(2)(3) difficulty / (esc)ape",
        styles.italic,
    ))
    .render(chunks[2], buf);
}
