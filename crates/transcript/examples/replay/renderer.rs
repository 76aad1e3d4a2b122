use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use relay_interface::{SenderRole, TurnStatus};
use transcript::{MessageListItem, TranscriptSnapshot};

use crate::App;

const STATS_PANEL_WIDTH: u16 = 28;

pub fn render(frame: &mut Frame, app: &App) {
    let [header_area, body_area, timeline_area, hint_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let [transcript_area, stats_area] =
        Layout::horizontal([Constraint::Fill(1), Constraint::Length(STATS_PANEL_WIDTH)])
            .areas(body_area);

    render_header(frame, app, header_area);
    render_transcript(frame, app, transcript_area);
    render_stats(frame, app, stats_area);
    render_timeline(frame, app, timeline_area);
    render_hints(frame, hint_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let status = if app.paused {
        "⏸ PAUSED"
    } else {
        "▶ PLAYING"
    };
    let text = format!(
        " {} | {} | {}ms/chunk ",
        app.fixture_name, status, app.speed_ms
    );
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn render_transcript(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot: TranscriptSnapshot = app.engine.snapshot();
    let mut lines: Vec<Line> = Vec::new();

    for item in &snapshot.finalized {
        lines.push(settled_line(item));
    }

    if let Some(live) = &snapshot.current {
        lines.push(Line::from(vec![
            role_span(live.role),
            Span::styled(
                live.text.clone(),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ),
            Span::styled("▏", Style::default().fg(Color::DarkGray)),
        ]));
    }

    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default())
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn settled_line(item: &MessageListItem) -> Line<'_> {
    let mut spans = vec![role_span(item.role), Span::raw(item.text.clone())];
    if item.status == TurnStatus::Interrupted {
        spans.push(Span::styled(
            " (interrupted)",
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn role_span(role: SenderRole) -> Span<'static> {
    match role {
        SenderRole::User => Span::styled("you    ", Style::default().fg(Color::Cyan)),
        SenderRole::Agent => Span::styled("agent  ", Style::default().fg(Color::Green)),
    }
}

fn render_stats(frame: &mut Frame, app: &App, area: Rect) {
    let stats = app.engine.stats();

    let block = Block::default()
        .borders(Borders::LEFT)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " engine ",
            Style::default().fg(Color::DarkGray),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let lines = vec![
        Line::from(vec![label("chunks    "), Span::raw(stats.chunks.to_string())]),
        Line::from(vec![label("applied   "), Span::raw(stats.applied.to_string())]),
        Line::from(vec![label("noops     "), Span::raw(stats.noops.to_string())]),
        Line::from(vec![label("rejected  "), Span::raw(stats.rejected.to_string())]),
        Line::from(vec![
            label("dropped   "),
            Span::raw(stats.decode_failures.to_string()),
        ]),
        Line::from(vec![
            label("evicted   "),
            Span::raw(stats.evicted_partials.to_string()),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let total = app.total();
    let ratio = if total == 0 {
        0.0
    } else {
        app.position as f64 / total as f64
    };
    let label = format!("{}/{}", app.position, total);
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::White).bg(Color::DarkGray))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_hints(frame: &mut Frame, area: Rect) {
    frame.render_widget(
        Paragraph::new(
            " [Space] pause/resume  [←/→] seek  [↑/↓] speed  [Home/End] jump  [q] quit ",
        )
        .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
