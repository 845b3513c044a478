use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use bibleplan_core::cache::manager::age_display;
use bibleplan_core::models::{Passage, LAST_DAY};
use bibleplan_core::reader::{DayContent, DayReading, Section};

use crate::app::{App, AppState, SearchView};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Day header
            Constraint::Min(5),    // Reading pane
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);

    if let Some(ref message) = app.plan_error {
        render_plan_error(frame, message, chunks[1].union(chunks[2]));
        render_status_bar(frame, app, chunks[3]);
        return;
    }

    render_day_header(frame, app, chunks[1]);
    render_reading(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::GoingToDay => render_prompt_overlay(frame, app, " Go to day ", "Day (1-365): "),
        AppState::Searching => render_prompt_overlay(frame, app, " Search ", "Reference: "),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Bible Reading Plan";
    let right = match app.session.user_id() {
        Some(user) => format!("{}  |  Text {}  |  [?] Help", user, app.text_size.label()),
        None => format!("Text {}  |  [?] Help", app.text_size.label()),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + right.chars().count() + 2),
        )),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_day_header(frame: &mut Frame, app: &App, area: Rect) {
    let headline = app
        .reading
        .as_ref()
        .filter(|r| r.day == app.current_day)
        .map(|r| r.headline.clone())
        .or_else(|| {
            app.plan
                .as_ref()
                .and_then(|p| p.entry(app.current_day))
                .and_then(|e| e.first_reference())
        })
        .unwrap_or_default();

    let marker = if app.is_current_day_complete() {
        Span::styled("[x] Completed!", styles::success_style())
    } else {
        Span::styled("[ ] Mark as Complete", styles::muted_style())
    };

    let line = Line::from(vec![
        Span::styled(format!(" Day {}", app.current_day), styles::title_style()),
        Span::styled("  ·  ", styles::muted_style()),
        Span::styled(headline, styles::highlight_style()),
        Span::raw("    "),
        marker,
        Span::styled(
            format!("    {}/{} completed", app.progress.completed_count(), LAST_DAY),
            styles::muted_style(),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_reading(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match (&app.search, &app.reading) {
        (Some(search), _) => search_lines(search),
        _ if app.is_loading() => vec![Line::from(Span::styled(
            "Loading...",
            styles::muted_style(),
        ))],
        (None, Some(reading)) => reading_lines(reading),
        (None, None) => vec![Line::from(Span::styled(
            "Nothing loaded. Press r to retry.",
            styles::muted_style(),
        ))],
    };

    let column = reading_column(area, app.text_size.column_width(area.width));
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    frame.render_widget(paragraph, column);
}

/// Center a column of `width` cells inside `area`.
fn reading_column(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    let x = area.x + (area.width - width) / 2;
    Rect::new(x, area.y, width, area.height)
}

/// Lines for the reading pane of one day.
pub fn reading_lines(reading: &DayReading) -> Vec<Line<'static>> {
    let sections = match &reading.content {
        DayContent::NoData => return vec![muted_line("No data for this day.")],
        DayContent::NoVerses => return vec![muted_line("No verses listed for this day.")],
        DayContent::NoReferences => {
            return vec![muted_line("Could not read the references for this day.")]
        }
        DayContent::Passages { sections, .. } => sections,
    };

    let mut lines = Vec::new();
    if let DayContent::Passages { title: Some(title), .. } = &reading.content {
        lines.push(Line::from(Span::styled(title.clone(), styles::section_title_style())));
        lines.push(Line::from(""));
    }

    for section in sections {
        match section {
            Section::Passage(passage) => passage_lines(passage, &mut lines),
            Section::Failed {
                reference,
                status,
                message,
            } => {
                let heading = match status {
                    Some(code) => format!("Could not load {} (status {})", reference, code),
                    None => format!("Could not load {}", reference),
                };
                lines.push(Line::from(Span::styled(heading, styles::error_style())));
                lines.push(Line::from(Span::styled(message.clone(), styles::muted_style())));
            }
        }
        lines.push(Line::from(""));
    }
    lines
}

fn passage_lines(passage: &Passage, lines: &mut Vec<Line<'static>>) {
    let mut header = vec![Span::styled(passage.reference.clone(), styles::chapter_style())];
    if let Some(cached_at) = passage.cached_at {
        header.push(Span::styled(
            format!("  (offline copy, cached {})", age_display(cached_at)),
            styles::muted_style(),
        ));
    }
    lines.push(Line::from(header));

    let verses = passage.verse_lines();
    if verses.is_empty() {
        let text = passage
            .fallback_text()
            .unwrap_or_else(|| "No text returned.".to_string());
        lines.push(Line::from(Span::styled(text, styles::text_style())));
        return;
    }
    for (number, text) in verses {
        lines.push(Line::from(vec![
            Span::styled(format!("{:>3} ", number), styles::verse_number_style()),
            Span::styled(text, styles::text_style()),
        ]));
    }
}

fn search_lines(search: &SearchView) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("Search: ", styles::muted_style()),
        Span::styled(search.query.clone(), styles::search_style()),
        Span::styled("   [Esc] back to the day", styles::muted_style()),
    ])];

    match &search.result {
        None => lines.push(muted_line("Searching...")),
        Some(Err(message)) => {
            lines.push(Line::from(Span::styled(message.clone(), styles::error_style())));
        }
        Some(Ok(passage)) => {
            let source = match passage.translation_name {
                Some(ref name) => format!("Source: bible-api.com · {}", name),
                None => "Source: bible-api.com".to_string(),
            };
            lines.push(muted_line(&source));
            lines.push(Line::from(""));
            passage_lines(passage, &mut lines);
        }
    }
    lines
}

fn muted_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), styles::muted_style()))
}

fn render_plan_error(frame: &mut Frame, message: &str, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  The reading plan could not be loaded.",
            styles::error_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(format!("  {}", message), styles::text_style())),
        Line::from(""),
        Line::from(Span::styled(
            "  Check plan_url in the config file, then restart. Press q to quit.",
            styles::muted_style(),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::error_style())
        .title(" System Error ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[←/→] day | [space] done | [g]o to | [/] search | [q]uit";

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None if app.is_loading() => " Loading... ".to_string(),
        None => String::new(),
    };
    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, description: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", key), styles::help_key_style()),
        Span::styled(description, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 22, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Bible Reading Plan", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Reading", styles::highlight_style())),
        help_line("←/h  →/l", "Previous / next day"),
        help_line("g", "Go to day"),
        help_line("space / c", "Mark day complete / not complete"),
        help_line("r", "Reload day"),
        help_line("↑/↓ PgUp/PgDn", "Scroll"),
        help_line("+ / -", "Larger / smaller text"),
        Line::from(""),
        Line::from(Span::styled(" Other", styles::highlight_style())),
        help_line("/", "Look up a reference"),
        help_line("Esc", "Close search or dialog"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_prompt_overlay(frame: &mut Frame, app: &App, title: &str, label: &str) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("  {}", label), styles::muted_style()),
            Span::styled(app.input.clone(), styles::search_style()),
            Span::styled("_", styles::highlight_style()),
        ]),
        Line::from(""),
    ];
    match app.status_message {
        Some(ref msg) => lines.push(Line::from(Span::styled(format!("  {}", msg), styles::error_style()))),
        None => lines.push(Line::from(Span::styled(
            "  [Enter] go   [Esc] cancel",
            styles::muted_style(),
        ))),
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(title.to_string());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
