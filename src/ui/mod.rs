use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use time::Date;

use crate::app::state::{CalendarState, FormField, FormMode, OverlayState, SnippetForm};
use crate::index::calendar::{checkbox_label, DAY_NAMES};
use crate::model::{format_date, format_day_label};

pub fn draw_app(frame: &mut Frame, state: &CalendarState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(frame.size());

    draw_calendar(frame, state, vertical[0]);
    draw_detail(frame, state, vertical[1]);

    let status = build_status_line(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[2]);

    render_overlay(frame, state);
}

fn draw_calendar(frame: &mut Frame, state: &CalendarState, area: Rect) {
    let grid = state.grid();
    let block = Block::default()
        .title(format!(
            "Reviews {} to {}",
            format_date(grid.start()),
            format_date(grid.end())
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let weeks = grid.weeks();
    let mut constraints = vec![Constraint::Length(1)];
    constraints.extend(weeks.iter().map(|_| Constraint::Ratio(1, weeks.len() as u32)));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    let header = week_columns(rows[0]);
    for (name, cell) in DAY_NAMES.iter().zip(header.iter()) {
        let label = Paragraph::new(Span::styled(
            *name,
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(label, *cell);
    }

    for (week, row) in weeks.iter().zip(rows.iter().skip(1)) {
        for (day, cell) in week.iter().zip(week_columns(*row).iter()) {
            if let Some(day) = day {
                draw_day(frame, state, *day, *cell);
            }
        }
    }
}

fn week_columns(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 7); 7])
        .split(area)
}

fn draw_day(frame: &mut Frame, state: &CalendarState, day: Date, area: Rect) {
    let is_cursor = day == state.cursor;
    let title_style = if day == state.today {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let border_style = if is_cursor {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let lines: Vec<Line> = state
        .index()
        .on(day)
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            let mut style = if entry.completed {
                Style::default().fg(Color::DarkGray)
            } else if day < state.today {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            if is_cursor && position == state.entry {
                style = style.bg(Color::Blue).fg(Color::Black);
            }
            Line::from(Span::styled(checkbox_label(entry), style))
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(Span::styled(format_day_label(day), title_style))
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    frame.render_widget(paragraph, area);
}

fn draw_detail(frame: &mut Frame, state: &CalendarState, area: Rect) {
    let text = match (state.selected_entry(), state.selected_row()) {
        (Some(entry), Some(stored)) => {
            let review = &stored.review;
            let status = if entry.completed { "done" } else { "due" };
            let created = review
                .date_created
                .map(format_date)
                .unwrap_or_else(|| "?".to_string());
            Text::from(vec![
                Line::from(vec![
                    Span::styled(
                        entry.snippet_id.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(
                        "  {}  created {created}  review {} ({status})",
                        review.snippet_type,
                        format_date(entry.review_date)
                    )),
                ]),
                Line::from(review.content.clone()),
            ])
        }
        _ => Text::from(Span::styled(
            format!("No reviews on {}.", format_date(state.cursor)),
            Style::default().fg(Color::Gray),
        )),
    };
    let detail = Paragraph::new(text)
        .block(
            Block::default()
                .title(format!("Snippet ({})", format_date(state.cursor)))
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, area);
}

fn build_status_line(state: &CalendarState) -> Text<'static> {
    let index = state.index();
    let overdue = index.overdue(state.today).count();
    let grid = state.grid();
    let in_view: usize = index
        .range(grid.start()..=grid.end())
        .map(|(_, entries)| entries.len())
        .sum();
    let mut spans = vec![Span::styled(
        format!("{in_view} reviews in view"),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if overdue > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{overdue} overdue"),
            Style::default().fg(Color::Red),
        ));
    }
    if index.skipped() > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} rows skipped", index.skipped()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(message) = state.status_message() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = Line::from(vec![
        Span::styled(
            "Keys: ",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "h/l day • j/k week • Tab next review • Space toggle • a add • e edit • d delete • t today • Ctrl-r reload • q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    Text::from(vec![Line::from(spans), keys])
}

fn render_overlay(frame: &mut Frame, state: &CalendarState) {
    match state.overlay() {
        Some(OverlayState::Snippet(form)) => {
            let area = centered_rect(60, 40, frame.size());
            frame.render_widget(Clear, area);
            let title = match &form.mode {
                FormMode::New => "New Snippet".to_string(),
                FormMode::Edit { snippet_id } => format!("Edit Snippet ({snippet_id})"),
            };
            let paragraph = Paragraph::new(form_lines(form))
                .block(
                    Block::default()
                        .title(title)
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::DeleteSnippet(overlay)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Delete Snippet",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!(
                    "Remove '{}' and all {} of its reviews?",
                    overlay.label, overlay.reviews
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to confirm • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title(format!("Confirm Delete ({})", overlay.snippet_id))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn form_lines(form: &SnippetForm) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(form.fields().len() + 4);
    for field in form.fields() {
        let focused = *field == form.focus;
        let mut value = form.value(*field).to_string();
        if focused {
            value.push('▌');
        }
        let label_style = if focused {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let marker = if focused { "▸ " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(format!("{marker}{:<8}", field.label()), label_style),
            Span::raw(value),
        ]));
        if *field == FormField::Offsets {
            lines.push(Line::from(Span::styled(
                "          days after creation, comma-separated",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Tab/Shift-Tab field • ↑/↓ type • Enter save • Esc cancel",
        Style::default().fg(Color::Gray),
    )));
    lines
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::header_row;
    use crate::storage::ReviewTable;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use time::macros::date;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn render(state: &CalendarState) -> anyhow::Result<String> {
        let mut terminal = Terminal::new(TestBackend::new(110, 40))?;
        terminal.draw(|frame| draw_app(frame, state))?;
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let symbols: Vec<&str> = buffer.content().iter().map(|cell| cell.symbol()).collect();
        Ok(symbols
            .chunks(width)
            .map(|row| row.concat())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    #[test]
    fn calendar_cells_show_checkboxes_and_detail() -> anyhow::Result<()> {
        let mut state = CalendarState::new(date!(2024 - 01 - 02), 4);
        state.load(ReviewTable::from_values(vec![
            header_row(),
            cells(&["2024-01-01", "note", "20240101-01", "alpha", "2024-01-02", "FALSE"]),
            cells(&["2024-01-01", "vocab", "20240101-02", "beta", "2024-01-04", "TRUE"]),
        ])?);

        let screen = render(&state)?;
        assert!(screen.contains("Reviews 2024-01-01 to 2024-01-28"));
        assert!(screen.contains("[ ] 0101-01"));
        assert!(screen.contains("[x] 0101-02"));
        assert!(screen.contains("alpha"));
        assert!(screen.contains("2 reviews in view"));
        Ok(())
    }

    #[test]
    fn delete_overlay_names_the_snippet() -> anyhow::Result<()> {
        let mut state = CalendarState::new(date!(2024 - 01 - 02), 4);
        state.load(ReviewTable::from_values(vec![
            header_row(),
            cells(&["2024-01-01", "note", "20240101-01", "alpha", "2024-01-02", "FALSE"]),
        ])?);
        assert!(state.open_delete_selected());

        let screen = render(&state)?;
        assert!(screen.contains("Confirm Delete (20240101-01)"));
        assert!(screen.contains("all 1 of its reviews"));
        Ok(())
    }
}
