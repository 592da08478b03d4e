use std::fmt::Write as _;

use time::Date;
use unicode_width::UnicodeWidthStr;

use super::{ReviewIndex, ReviewRowRef};
use crate::model::{add_days, format_day_label};

pub const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
pub const DEFAULT_WEEKS: u8 = 4;

const CELL_WIDTH: usize = 11;

pub type Week = [Option<Date>; 7];

/// Monday-first grid of days; cells outside `start..=end` are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid {
    start: Date,
    end: Date,
    weeks: Vec<Week>,
}

impl CalendarGrid {
    pub fn new(start: Date, end: Date) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        let mut cells: Vec<Option<Date>> =
            vec![None; usize::from(start.weekday().number_days_from_monday())];
        let mut day = start;
        loop {
            cells.push(Some(day));
            if day >= end {
                break;
            }
            match day.next_day() {
                Some(next) => day = next,
                None => break,
            }
        }
        while cells.len() % 7 != 0 {
            cells.push(None);
        }
        let weeks = cells
            .chunks(7)
            .map(|chunk| {
                let mut week: Week = [None; 7];
                week.copy_from_slice(chunk);
                week
            })
            .collect();
        Self { start, end, weeks }
    }

    /// `weeks` full weeks starting on the Monday of `today`'s week.
    pub fn rolling(today: Date, weeks: u8) -> Self {
        let weeks = i64::from(weeks.max(1));
        let back = i64::from(today.weekday().number_days_from_monday());
        let start = add_days(today, -back).unwrap_or(today);
        let end = add_days(start, weeks * 7 - 1).unwrap_or(start);
        Self::new(start, end)
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date <= self.end
    }

    /// Every real (non-padding) day in order.
    pub fn days(&self) -> impl Iterator<Item = Date> + '_ {
        self.weeks.iter().flat_map(|week| week.iter().flatten().copied())
    }
}

pub fn checkbox_label(entry: &ReviewRowRef) -> String {
    let mark = if entry.completed { "[x]" } else { "[ ]" };
    format!("{mark} {}", entry.label)
}

/// Plain-text rendering of the grid; `today` gets a trailing `*`.
pub fn render_text(grid: &CalendarGrid, index: &ReviewIndex, today: Option<Date>) -> String {
    let mut out = String::new();
    let separator = vec!["-".repeat(CELL_WIDTH); 7].join("-+-");

    push_line(&mut out, DAY_NAMES.iter().map(|name| name.to_string()));
    let _ = writeln!(out, "{separator}");

    for week in grid.weeks() {
        push_line(
            &mut out,
            week.iter().map(|cell| match cell {
                Some(day) if Some(*day) == today => format!("{}*", format_day_label(*day)),
                Some(day) => format_day_label(*day),
                None => String::new(),
            }),
        );

        let entries: Vec<&[ReviewRowRef]> = week
            .iter()
            .map(|cell| cell.map(|day| index.on(day)).unwrap_or(&[]))
            .collect();
        let depth = entries.iter().map(|refs| refs.len()).max().unwrap_or(0);
        for line in 0..depth {
            push_line(
                &mut out,
                entries
                    .iter()
                    .map(|refs| refs.get(line).map(checkbox_label).unwrap_or_default()),
            );
        }
        let _ = writeln!(out, "{separator}");
    }
    out
}

fn push_line(out: &mut String, cells: impl Iterator<Item = String>) {
    let line = cells.map(|cell| pad(&cell)).collect::<Vec<_>>().join(" | ");
    let _ = writeln!(out, "{}", line.trim_end());
}

fn pad(text: &str) -> String {
    let width = UnicodeWidthStr::width(text);
    if width >= CELL_WIDTH {
        return text.to_string();
    }
    format!("{text}{}", " ".repeat(CELL_WIDTH - width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReviewRow;
    use time::macros::date;
    use time::Weekday;

    #[test]
    fn rolling_window_starts_on_monday_and_spans_four_weeks() {
        let grid = CalendarGrid::rolling(date!(2024 - 01 - 17), DEFAULT_WEEKS);
        assert_eq!(grid.start(), date!(2024 - 01 - 15));
        assert_eq!(grid.start().weekday(), Weekday::Monday);
        assert_eq!(grid.end(), date!(2024 - 02 - 11));
        assert_eq!(grid.weeks().len(), 4);
        assert_eq!(grid.days().count(), 28);
        assert!(grid.weeks().iter().all(|week| week.iter().all(Option::is_some)));
    }

    #[test]
    fn partial_weeks_are_padded() {
        // Wednesday through the following Monday.
        let grid = CalendarGrid::new(date!(2024 - 01 - 03), date!(2024 - 01 - 08));
        assert_eq!(grid.weeks().len(), 2);
        assert_eq!(grid.weeks()[0][0], None);
        assert_eq!(grid.weeks()[0][1], None);
        assert_eq!(grid.weeks()[0][2], Some(date!(2024 - 01 - 03)));
        assert_eq!(grid.weeks()[1][0], Some(date!(2024 - 01 - 08)));
        assert!(grid.weeks()[1][1..].iter().all(Option::is_none));
        assert!(grid.contains(date!(2024 - 01 - 05)));
        assert!(!grid.contains(date!(2024 - 01 - 09)));
    }

    #[test]
    fn text_grid_lists_checkboxes_under_their_day() {
        let review = |id: &str, day: Date, completed: bool| ReviewRow {
            date_created: Some(date!(2024 - 01 - 01)),
            snippet_type: "note".into(),
            snippet_id: id.into(),
            content: String::new(),
            review_date: Some(day),
            completed,
        };
        let rows = vec![
            review("20240101-01", date!(2024 - 01 - 02), false),
            review("20240101-02", date!(2024 - 01 - 02), true),
            review("20240101-01", date!(2024 - 01 - 07), false),
        ];
        let index = ReviewIndex::build(rows.iter().enumerate().map(|(i, row)| (i + 2, row)));
        let grid = CalendarGrid::new(date!(2024 - 01 - 01), date!(2024 - 01 - 07));

        let text = render_text(&grid, &index, Some(date!(2024 - 01 - 03)));
        let expected = [
            "Mon         | Tue         | Wed         | Thu         | Fri         | Sat         | Sun",
            "------------+-------------+-------------+-------------+-------------+-------------+------------",
            "1/1         | 1/2         | 1/3*        | 1/4         | 1/5         | 1/6         | 1/7",
            "            | [ ] 0101-01 |             |             |             |             | [ ] 0101-01",
            "            | [x] 0101-02 |             |             |             |             |",
            "------------+-------------+-------------+-------------+-------------+-------------+------------",
        ];
        assert_eq!(text.lines().collect::<Vec<_>>(), expected);
    }
}
