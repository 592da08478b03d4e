use time::Date;
use unicode_segmentation::UnicodeSegmentation;

use crate::index::{CalendarGrid, ReviewIndex, ReviewRowRef};
use crate::model::{add_days, format_date, parse_date, SnippetDraft, SnippetEdit};
use crate::storage::{ReviewTable, SheetSchema, StoredRow};

const MAX_CONTENT_GRAPHEMES: usize = 500;
const MAX_FIELD_GRAPHEMES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    SnippetType,
    DateCreated,
    Content,
    Offsets,
}

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::SnippetType => "Type",
            FormField::DateCreated => "Created",
            FormField::Content => "Content",
            FormField::Offsets => "Offsets",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    New,
    Edit { snippet_id: String },
}

/// Text fields of the add/edit overlay; parsed only on submit.
#[derive(Debug, Clone)]
pub struct SnippetForm {
    pub mode: FormMode,
    pub snippet_type: String,
    pub date_created: String,
    pub content: String,
    pub offsets: String,
    pub focus: FormField,
    pub error: Option<String>,
    fallback_date: Date,
}

impl SnippetForm {
    pub fn from_draft(draft: &SnippetDraft) -> Self {
        Self {
            mode: FormMode::New,
            snippet_type: draft.snippet_type.clone(),
            date_created: format_date(draft.date_created),
            content: draft.content.clone(),
            offsets: draft.offsets.clone(),
            focus: FormField::Content,
            error: None,
            fallback_date: draft.date_created,
        }
    }

    pub fn for_edit(snippet_id: &str, stored: &StoredRow, fallback_date: Date) -> Self {
        let date_created = stored.review.date_created.unwrap_or(fallback_date);
        Self {
            mode: FormMode::Edit {
                snippet_id: snippet_id.to_string(),
            },
            snippet_type: stored.review.snippet_type.clone(),
            date_created: format_date(date_created),
            content: stored.review.content.clone(),
            offsets: String::new(),
            focus: FormField::Content,
            error: None,
            fallback_date: date_created,
        }
    }

    pub fn is_new(&self) -> bool {
        self.mode == FormMode::New
    }

    /// Offsets only apply when a snippet is first scheduled.
    pub fn fields(&self) -> &'static [FormField] {
        if self.is_new() {
            &[
                FormField::SnippetType,
                FormField::DateCreated,
                FormField::Content,
                FormField::Offsets,
            ]
        } else {
            &[
                FormField::SnippetType,
                FormField::DateCreated,
                FormField::Content,
            ]
        }
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::SnippetType => &self.snippet_type,
            FormField::DateCreated => &self.date_created,
            FormField::Content => &self.content,
            FormField::Offsets => &self.offsets,
        }
    }

    fn value_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::SnippetType => &mut self.snippet_type,
            FormField::DateCreated => &mut self.date_created,
            FormField::Content => &mut self.content,
            FormField::Offsets => &mut self.offsets,
        }
    }

    pub fn next_field(&mut self) {
        self.shift_focus(1);
    }

    pub fn previous_field(&mut self) {
        self.shift_focus(-1);
    }

    fn shift_focus(&mut self, delta: isize) {
        let fields = self.fields();
        let current = fields
            .iter()
            .position(|field| *field == self.focus)
            .unwrap_or(0) as isize;
        let len = fields.len() as isize;
        self.focus = fields[(current + delta).rem_euclid(len) as usize];
    }

    pub fn push_char(&mut self, ch: char) -> bool {
        let limit = if self.focus == FormField::Content {
            MAX_CONTENT_GRAPHEMES
        } else {
            MAX_FIELD_GRAPHEMES
        };
        let field = self.focus;
        let value = self.value_mut(field);
        if value.graphemes(true).count() >= limit {
            return false;
        }
        value.push(ch);
        self.error = None;
        true
    }

    pub fn pop_char(&mut self) -> bool {
        let field = self.focus;
        let value = self.value_mut(field);
        let Some((start, _)) = value.grapheme_indices(true).last() else {
            return false;
        };
        value.truncate(start);
        self.error = None;
        true
    }

    /// Best-effort draft for journaling; an unreadable date keeps the last
    /// good one.
    pub fn snapshot(&self) -> SnippetDraft {
        SnippetDraft {
            snippet_type: self.snippet_type.clone(),
            date_created: parse_date(&self.date_created).unwrap_or(self.fallback_date),
            content: self.content.clone(),
            offsets: self.offsets.clone(),
        }
    }

    pub fn to_draft(&self) -> Result<SnippetDraft, String> {
        let (snippet_type, date_created, content) = self.validated()?;
        Ok(SnippetDraft {
            snippet_type,
            date_created,
            content,
            offsets: self.offsets.trim().to_string(),
        })
    }

    pub fn to_edit(&self) -> Result<SnippetEdit, String> {
        let (snippet_type, date_created, content) = self.validated()?;
        Ok(SnippetEdit {
            snippet_type,
            date_created,
            content,
        })
    }

    fn validated(&self) -> Result<(String, Date, String), String> {
        let date_created = parse_date(&self.date_created)
            .ok_or_else(|| format!("'{}' is not a YYYY-MM-DD date", self.date_created.trim()))?;
        let content = self.content.trim();
        if content.is_empty() {
            return Err("content cannot be empty".to_string());
        }
        Ok((
            self.snippet_type.trim().to_string(),
            date_created,
            content.to_string(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteSnippetOverlay {
    pub snippet_id: String,
    pub label: String,
    pub reviews: usize,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Snippet(SnippetForm),
    DeleteSnippet(DeleteSnippetOverlay),
}

/// Everything the calendar screen shows, rebuilt from each sheet read.
pub struct CalendarState {
    pub today: Date,
    pub cursor: Date,
    pub entry: usize,
    weeks: u8,
    grid: CalendarGrid,
    table: Option<ReviewTable>,
    index: ReviewIndex,
    overlay: Option<OverlayState>,
    status_message: Option<String>,
}

impl CalendarState {
    pub fn new(today: Date, weeks: u8) -> Self {
        Self {
            today,
            cursor: today,
            entry: 0,
            weeks,
            grid: CalendarGrid::rolling(today, weeks),
            table: None,
            index: ReviewIndex::default(),
            overlay: None,
            status_message: None,
        }
    }

    pub fn load(&mut self, table: ReviewTable) {
        self.index = ReviewIndex::build(table.indexed());
        self.table = Some(table);
        self.clamp_entry();
    }

    pub fn grid(&self) -> &CalendarGrid {
        &self.grid
    }

    pub fn index(&self) -> &ReviewIndex {
        &self.index
    }

    pub fn schema(&self) -> Option<&SheetSchema> {
        self.table.as_ref().map(ReviewTable::schema)
    }

    pub fn entries(&self) -> &[ReviewRowRef] {
        self.index.on(self.cursor)
    }

    pub fn selected_entry(&self) -> Option<&ReviewRowRef> {
        self.entries().get(self.entry)
    }

    pub fn selected_row(&self) -> Option<&StoredRow> {
        let entry = self.selected_entry()?;
        self.table.as_ref()?.row(entry.row)
    }

    pub fn move_days(&mut self, delta: i64) {
        let Some(next) = add_days(self.cursor, delta) else {
            return;
        };
        self.cursor = next;
        self.entry = 0;
        if self.grid.contains(next) {
            return;
        }
        let anchor = if next < self.grid.start() {
            next
        } else {
            add_days(next, -7 * (i64::from(self.weeks) - 1)).unwrap_or(next)
        };
        self.grid = CalendarGrid::rolling(anchor, self.weeks);
    }

    pub fn go_today(&mut self) {
        self.cursor = self.today;
        self.entry = 0;
        self.grid = CalendarGrid::rolling(self.today, self.weeks);
    }

    pub fn cycle_entry(&mut self) {
        let count = self.entries().len();
        if count > 0 {
            self.entry = (self.entry + 1) % count;
        }
    }

    fn clamp_entry(&mut self) {
        let count = self.entries().len();
        if self.entry >= count {
            self.entry = count.saturating_sub(1);
        }
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn open_form(&mut self, form: SnippetForm) {
        self.overlay = Some(OverlayState::Snippet(form));
    }

    /// Prefilled edit form for the snippet behind the selected entry.
    pub fn open_edit_selected(&mut self) -> bool {
        let Some(entry) = self.selected_entry() else {
            return false;
        };
        let snippet_id = entry.snippet_id.clone();
        let Some(stored) = self.selected_row() else {
            return false;
        };
        let form = SnippetForm::for_edit(&snippet_id, stored, self.today);
        self.open_form(form);
        true
    }

    pub fn open_delete_selected(&mut self) -> bool {
        let Some(entry) = self.selected_entry() else {
            return false;
        };
        let reviews = self
            .table
            .as_ref()
            .map(|table| table.rows_for(&entry.snippet_id).count())
            .unwrap_or(0);
        let overlay = DeleteSnippetOverlay {
            snippet_id: entry.snippet_id.clone(),
            label: entry.label.clone(),
            reviews,
        };
        self.overlay = Some(OverlayState::DeleteSnippet(overlay));
        true
    }

    pub fn form(&self) -> Option<&SnippetForm> {
        match self.overlay.as_ref() {
            Some(OverlayState::Snippet(form)) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut SnippetForm> {
        match self.overlay.as_mut() {
            Some(OverlayState::Snippet(form)) => Some(form),
            _ => None,
        }
    }

    pub fn delete_overlay(&self) -> Option<&DeleteSnippetOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::DeleteSnippet(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    /// Moves the cursor onto the first review of `snippet_id` on or after
    /// `from`, if any.
    pub fn select_snippet(&mut self, snippet_id: &str, from: Date) {
        let found = self
            .index
            .dates()
            .filter(|date| *date >= from)
            .find_map(|date| {
                self.index
                    .on(date)
                    .iter()
                    .position(|entry| entry.snippet_id == snippet_id)
                    .map(|position| (date, position))
            });
        if let Some((date, position)) = found {
            let offset = (date - self.cursor).whole_days();
            self.move_days(offset);
            self.entry = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::header_row;
    use time::macros::date;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn table() -> ReviewTable {
        ReviewTable::from_values(vec![
            header_row(),
            cells(&["2024-01-01", "note", "20240101-01", "alpha", "2024-01-02", "FALSE"]),
            cells(&["2024-01-01", "vocab", "20240101-02", "beta", "2024-01-02", "TRUE"]),
            cells(&["2024-01-01", "note", "20240101-01", "alpha", "2024-01-31", "FALSE"]),
        ])
        .expect("valid table")
    }

    #[test]
    fn cursor_walks_days_and_weeks_and_regrids_at_the_edges() {
        let mut state = CalendarState::new(date!(2024 - 01 - 03), 4);
        assert_eq!(state.grid().start(), date!(2024 - 01 - 01));

        state.move_days(-3);
        assert_eq!(state.cursor, date!(2023 - 12 - 31));
        assert_eq!(state.grid().start(), date!(2023 - 12 - 25));

        state.go_today();
        state.move_days(7 * 4);
        assert_eq!(state.cursor, date!(2024 - 01 - 31));
        assert!(state.grid().contains(state.cursor));
        assert_eq!(state.grid().end(), date!(2024 - 02 - 04));
    }

    #[test]
    fn tab_cycles_entries_of_the_selected_day() {
        let mut state = CalendarState::new(date!(2024 - 01 - 02), 4);
        state.load(table());
        assert_eq!(state.entries().len(), 2);
        assert_eq!(state.selected_entry().map(|e| e.row), Some(2));
        state.cycle_entry();
        assert_eq!(state.selected_entry().map(|e| e.row), Some(3));
        state.cycle_entry();
        assert_eq!(state.entry, 0);

        state.move_days(1);
        assert!(state.selected_entry().is_none());
        state.cycle_entry();
        assert_eq!(state.entry, 0);
    }

    #[test]
    fn edit_form_is_prefilled_from_the_selected_snippet() {
        let mut state = CalendarState::new(date!(2024 - 01 - 02), 4);
        state.load(table());
        state.cycle_entry();
        assert!(state.open_edit_selected());
        let form = state.form().expect("form open");
        assert_eq!(
            form.mode,
            FormMode::Edit {
                snippet_id: "20240101-02".into()
            }
        );
        assert_eq!(form.snippet_type, "vocab");
        assert_eq!(form.content, "beta");
        assert_eq!(form.fields().len(), 3);
    }

    #[test]
    fn form_validates_on_submit_and_keeps_text() {
        let draft = SnippetDraft::new("note", date!(2024 - 01 - 05), "1,3");
        let mut form = SnippetForm::from_draft(&draft);
        assert_eq!(form.to_draft().unwrap_err(), "content cannot be empty");

        for ch in "hé".chars() {
            form.push_char(ch);
        }
        form.next_field();
        assert_eq!(form.focus, FormField::Offsets);
        form.next_field();
        assert_eq!(form.focus, FormField::SnippetType);
        form.next_field();
        for _ in 0..10 {
            form.pop_char();
        }
        assert!(form.to_draft().unwrap_err().contains("not a YYYY-MM-DD date"));
        assert_eq!(form.snapshot().date_created, date!(2024 - 01 - 05));
        assert_eq!(form.snapshot().content, "hé");

        for ch in "2024-01-06".chars() {
            form.push_char(ch);
        }
        let draft = form.to_draft().expect("valid draft");
        assert_eq!(draft.date_created, date!(2024 - 01 - 06));
        assert_eq!(draft.offsets, "1,3");
    }

    #[test]
    fn delete_overlay_counts_all_reviews_of_the_snippet() {
        let mut state = CalendarState::new(date!(2024 - 01 - 02), 4);
        state.load(table());
        assert!(state.open_delete_selected());
        let overlay = state.delete_overlay().expect("overlay open");
        assert_eq!(overlay.snippet_id, "20240101-01");
        assert_eq!(overlay.reviews, 2);
    }

    #[test]
    fn select_snippet_jumps_to_its_next_review() {
        let mut state = CalendarState::new(date!(2024 - 01 - 10), 4);
        state.load(table());
        state.select_snippet("20240101-01", state.today);
        assert_eq!(state.cursor, date!(2024 - 01 - 31));
        assert_eq!(state.selected_entry().map(|e| e.row), Some(4));
    }
}
