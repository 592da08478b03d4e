use std::fmt;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, Duration};

use crate::schedule::SnippetId;

pub const COMPLETED_TRUE: &str = "TRUE";
pub const COMPLETED_FALSE: &str = "FALSE";

/// Columns of the persisted review sheet, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    DateCreated,
    SnippetType,
    SnippetId,
    Content,
    ReviewDate,
    Completed,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::DateCreated,
        Column::SnippetType,
        Column::SnippetId,
        Column::Content,
        Column::ReviewDate,
        Column::Completed,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::DateCreated => "date_created",
            Column::SnippetType => "snippet_type",
            Column::SnippetId => "snippet_id",
            Column::Content => "content",
            Column::ReviewDate => "review_date",
            Column::Completed => "completed",
        }
    }

    pub fn from_header(name: &str) -> Option<Self> {
        let name = name.trim();
        Column::ALL
            .into_iter()
            .find(|column| column.header().eq_ignore_ascii_case(name))
    }

    pub fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

pub fn header_row() -> Vec<String> {
    Column::ALL
        .iter()
        .map(|column| column.header().to_string())
        .collect()
}

/// One persisted (snippet, offset) review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub date_created: Option<Date>,
    pub snippet_type: String,
    pub snippet_id: String,
    pub content: String,
    pub review_date: Option<Date>,
    pub completed: bool,
}

impl ReviewRow {
    /// Days between creation and review, when both dates are readable.
    pub fn offset_days(&self) -> Option<i64> {
        match (self.date_created, self.review_date) {
            (Some(created), Some(review)) => Some((review - created).whole_days()),
            _ => None,
        }
    }

    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::DateCreated => self.date_created.map(format_date).unwrap_or_default(),
            Column::SnippetType => self.snippet_type.clone(),
            Column::SnippetId => self.snippet_id.clone(),
            Column::Content => self.content.clone(),
            Column::ReviewDate => self.review_date.map(format_date).unwrap_or_default(),
            Column::Completed => format_completed(self.completed).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: SnippetId,
    pub snippet_type: String,
    pub content: String,
    pub date_created: Date,
}

/// Caller-owned form state for a snippet that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetDraft {
    pub snippet_type: String,
    #[serde(with = "iso_date")]
    pub date_created: Date,
    pub content: String,
    pub offsets: String,
}

impl SnippetDraft {
    pub fn new(snippet_type: impl Into<String>, date_created: Date, offsets: impl Into<String>) -> Self {
        Self {
            snippet_type: snippet_type.into(),
            date_created,
            content: String::new(),
            offsets: offsets.into(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// New metadata for an existing snippet. Offsets are not editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEdit {
    pub snippet_type: String,
    pub date_created: Date,
    pub content: String,
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn format_compact_date(date: Date) -> String {
    date.format(format_description!("[year][month][day]"))
        .unwrap_or_else(|_| format_date(date).replace('-', ""))
}

/// `M/D` label used in calendar cells.
pub fn format_day_label(date: Date) -> String {
    format!("{}/{}", u8::from(date.month()), date.day())
}

pub fn parse_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Date::parse(trimmed, format_description!("[year]-[month]-[day]")).ok()
}

pub fn parse_completed(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(COMPLETED_TRUE)
}

pub fn format_completed(completed: bool) -> &'static str {
    if completed {
        COMPLETED_TRUE
    } else {
        COMPLETED_FALSE
    }
}

pub fn add_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(Duration::days(days))
}

mod iso_date {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid date '{raw}', expected YYYY-MM-DD")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn completed_cells_default_to_false() {
        assert!(parse_completed("TRUE"));
        assert!(parse_completed(" true "));
        assert!(!parse_completed(""));
        assert!(!parse_completed("FALSE"));
        assert!(!parse_completed("yes"));
    }

    #[test]
    fn dates_use_iso_and_compact_forms() {
        let day = date!(2024 - 03 - 07);
        assert_eq!(format_date(day), "2024-03-07");
        assert_eq!(format_compact_date(day), "20240307");
        assert_eq!(format_day_label(day), "3/7");
        assert_eq!(parse_date("2024-03-07"), Some(day));
        assert_eq!(parse_date("03/07/2024"), None);
        assert_eq!(parse_date("   "), None);
    }

    #[test]
    fn headers_map_back_to_columns() {
        for column in Column::ALL {
            assert_eq!(Column::from_header(column.header()), Some(column));
        }
        assert_eq!(Column::from_header(" Snippet_ID "), Some(Column::SnippetId));
        assert_eq!(Column::from_header("notes"), None);
    }

    #[test]
    fn offset_requires_both_dates() {
        let mut row = ReviewRow {
            date_created: Some(date!(2024 - 01 - 01)),
            snippet_type: "note".into(),
            snippet_id: "20240101-01".into(),
            content: "body".into(),
            review_date: Some(date!(2024 - 01 - 08)),
            completed: false,
        };
        assert_eq!(row.offset_days(), Some(7));
        row.review_date = None;
        assert_eq!(row.offset_days(), None);
    }

    #[test]
    fn draft_round_trips_through_json() -> anyhow::Result<()> {
        let draft = SnippetDraft::new("vocab", date!(2024 - 05 - 02), "1,3").with_content("ephemeral");
        let json = serde_json::to_string(&draft)?;
        assert!(json.contains("\"2024-05-02\""));
        let back: SnippetDraft = serde_json::from_str(&json)?;
        assert_eq!(back, draft);
        Ok(())
    }
}
