pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use ringside::{
    clock::Clock,
    plan::WorkoutPlan,
    session::{Phase, SessionState},
    util::format_clock,
};
use unicode_width::UnicodeWidthStr;

use crate::{App, SessionSummary};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

impl<C: Clock> Widget for &App<'_, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match &self.summary {
            Some(summary) => render_results(self, summary, area, buf),
            None => render_session(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

/// What comes after the current countdown
fn next_up(plan: &WorkoutPlan, state: &SessionState) -> String {
    match state.phase {
        Phase::Complete => String::new(),
        Phase::Resting => plan
            .exercise(0)
            .map(|ex| format!("Next: {} (round {})", ex.name, state.current_round + 1))
            .unwrap_or_default(),
        Phase::Active if state.current_exercise_index < plan.last_exercise_index() => plan
            .exercise(state.current_exercise_index + 1)
            .map(|ex| format!("Next: {}", ex.name))
            .unwrap_or_default(),
        Phase::Active if state.current_round < plan.rounds && plan.rest_secs > 0 => {
            format!("Next: rest {}", format_clock(plan.rest_secs))
        }
        Phase::Active if state.current_round < plan.rounds => "Next: next round".to_string(),
        Phase::Active => "Last one, empty the tank".to_string(),
    }
}

fn render_session<C: Clock>(app: &App<'_, C>, area: Rect, buf: &mut Buffer) {
    let plan = app.runner.plan();
    let state = app.runner.state();
    let catalog = app.catalog();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Line::from(vec![
        Span::styled(plan.name.as_str(), bold()),
        Span::raw("   "),
        Span::styled(format!("Round {}/{}", state.current_round, plan.rounds), bold()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    let (label, color) = if !state.is_running && !state.is_complete() {
        ("PAUSED".to_string(), Color::Red)
    } else {
        let color = match state.phase {
            Phase::Active => Color::Green,
            Phase::Resting => Color::Yellow,
            Phase::Complete => Color::Cyan,
        };
        (state.phase.to_string(), color)
    };
    Paragraph::new(Span::styled(label, bold().fg(color)))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format_clock(state.time_remaining_secs),
        bold().fg(color),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let doing = match state.phase {
        Phase::Active => plan
            .exercise(state.current_exercise_index)
            .map(|ex| ex.name.clone())
            .unwrap_or_default(),
        Phase::Resting => "Breathe. Hands down, shake it out.".to_string(),
        Phase::Complete => String::new(),
    };
    Paragraph::new(Span::styled(doing, Style::default().add_modifier(Modifier::ITALIC)))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    if let Some(combo) = app.caller.current().and_then(|id| catalog.combo(id)) {
        let lines = vec![
            Line::from(Span::styled(
                format!("{}  [{}]", combo.name, catalog.combo_numbers(combo)),
                bold().fg(Color::Magenta),
            )),
            Line::from(Span::styled(
                catalog.combo_callout(combo),
                Style::default().fg(Color::Magenta),
            )),
        ];
        let widest = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        let width = (widest + 4).min(chunks[4].width);
        let height = 4.min(chunks[4].height);
        let boxed = Rect {
            x: chunks[4].x + (chunks[4].width - width) / 2,
            y: chunks[4].y,
            width,
            height,
        };
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
            .render(boxed, buf);
    }

    Paragraph::new(Span::styled(next_up(plan, state), dim()))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

    let total = plan.total_secs();
    let done = total - state.remaining_total_secs(plan).min(total);
    let ratio = if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    };
    Gauge::default()
        .gauge_style(Style::default().fg(color))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("{} / {}", format_clock(done), format_clock(total)))
        .render(chunks[6], buf);

    let help = "(space) pause  (s) skip  (r) restart  (f) finish  (q) quit";
    let help = if help.width() > chunks[7].width as usize {
        "spc s r f q"
    } else {
        help
    };
    Paragraph::new(Span::styled(help, dim().add_modifier(Modifier::ITALIC)))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);
}

fn render_results<C: Clock>(app: &App<'_, C>, summary: &SessionSummary, area: Rect, buf: &mut Buffer) {
    let plan = app.runner.plan();
    let event = &summary.event;
    let outcome = &summary.outcome;

    let mut lines = vec![
        Line::from(Span::styled(
            if summary.finished_all_rounds {
                "Workout complete"
            } else {
                "Session ended early"
            },
            bold().fg(Color::Green),
        )),
        Line::from(Span::styled(plan.name.as_str(), bold())),
        Line::default(),
        Line::from(format!(
            "{}/{} rounds   {}   ~{} kcal",
            event.rounds_completed,
            plan.rounds,
            format_clock(event.elapsed_total_secs),
            event.estimated_calories
        )),
        Line::from(format!(
            "streak {} days   {} workouts total",
            outcome.aggregate.current_streak, outcome.aggregate.workouts_completed
        )),
    ];

    if !outcome.new_achievements.is_empty() {
        lines.push(Line::default());
        for a in &outcome.new_achievements {
            lines.push(Line::from(vec![
                Span::styled("Achievement unlocked: ", Style::default().fg(Color::Yellow)),
                Span::styled(a.to_string(), bold().fg(Color::Yellow)),
            ]));
            lines.push(Line::from(Span::styled(a.description(), dim())));
        }
    }

    if !outcome.persisted {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "progress could not be saved to disk",
            Style::default().fg(Color::Red),
        )));
    }

    let content_height = lines.len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(area.height.saturating_sub(content_height + 2) / 2),
            Constraint::Length(content_height),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    Paragraph::new(Span::styled("(q)uit", dim().add_modifier(Modifier::ITALIC)))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
}
