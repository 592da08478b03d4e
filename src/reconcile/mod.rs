//! Turns snippet edits, completion toggles and deletions into sheet writes.
//!
//! Planning is pure: every `plan_*` function looks at a [`ReviewTable`] read
//! from the sheet and returns a [`WritePlan`]. [`Reconciler`] wires a read,
//! the plan, and its sequential application against a [`SheetGateway`].

use indexmap::IndexMap;
use time::Date;

use crate::index::{ReviewIndex, ReviewRowRef};
use crate::model::{
    add_days, format_compact_date, format_date, Column, ReviewRow, Snippet, SnippetDraft,
    SnippetEdit,
};
use crate::schedule::{allocate, generate, OffsetList};
use crate::storage::{
    CellRange, GatewayError, ReviewTable, RowSpan, SchemaError, SchemaStatus, SheetGateway,
    SheetSchema,
};

mod plan;

pub use plan::{ApplyError, SheetWrite, WritePlan};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("review sheet is missing column(s): {}", describe_columns(.missing))]
    Degraded { missing: Vec<Column> },
    #[error("no reviews found for snippet {0}")]
    UnknownSnippet(String),
    #[error("snippet {snippet_id} has no review on {date}")]
    NoMatchingReview { snippet_id: String, date: String },
    #[error("no usable review offsets in '{0}', nothing would be stored")]
    EmptySchedule(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("reading the review sheet failed")]
    Gateway(#[source] GatewayError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

fn describe_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|column| column.header())
        .collect::<Vec<_>>()
        .join(", ")
}

fn require(schema: &SheetSchema, columns: &[Column]) -> Result<(), ReconcileError> {
    let missing = schema.missing_of(columns);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::Degraded { missing })
    }
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub snippet: Snippet,
    pub rows: Vec<ReviewRow>,
    pub plan: WritePlan,
}

#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub matched: usize,
    pub plan: WritePlan,
}

#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub previous_id: String,
    pub snippet_id: String,
    pub rows: usize,
    pub plan: WritePlan,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub snippet_id: String,
    pub removed: usize,
    pub plan: WritePlan,
}

/// Allocates an id for the draft and appends one row per offset.
pub fn plan_add(table: &ReviewTable, draft: &SnippetDraft) -> Result<AddOutcome, ReconcileError> {
    let schema = table.schema();
    require(schema, &Column::ALL)?;

    let offsets = OffsetList::parse(&draft.offsets);
    let snippet = Snippet {
        id: allocate(draft.date_created, table.snippet_ids()),
        snippet_type: draft.snippet_type.trim().to_string(),
        content: draft.content.clone(),
        date_created: draft.date_created,
    };
    let rows = generate(&snippet, &offsets);
    if rows.is_empty() {
        return Err(ReconcileError::EmptySchedule(draft.offsets.clone()));
    }

    let mut plan = WritePlan::new();
    plan.push(SheetWrite::Append {
        rows: rows.iter().map(|row| schema.encode(row, None)).collect(),
    });
    Ok(AddOutcome {
        snippet,
        rows,
        plan,
    })
}

/// One cell write when the flag actually changes, nothing otherwise.
pub fn plan_toggle(
    schema: &SheetSchema,
    entry: &ReviewRowRef,
    completed: bool,
) -> Result<WritePlan, ReconcileError> {
    let mut plan = WritePlan::new();
    if entry.completed == completed {
        return Ok(plan);
    }
    let column = schema
        .position(Column::Completed)
        .ok_or_else(|| ReconcileError::Degraded {
            missing: vec![Column::Completed],
        })?;
    plan.push(SheetWrite::Update {
        range: CellRange::cell(entry.row, column),
        values: vec![vec![SheetSchema::completed_cell(completed)]],
    });
    Ok(plan)
}

/// Toggles every review of `snippet_id` due on `date`.
pub fn plan_toggle_on(
    table: &ReviewTable,
    snippet_id: &str,
    date: Date,
    completed: bool,
) -> Result<ToggleOutcome, ReconcileError> {
    require(table.schema(), &[Column::SnippetId, Column::ReviewDate])?;
    let index = ReviewIndex::build(table.indexed());
    let entries: Vec<&ReviewRowRef> = index.find(snippet_id, date).collect();
    if entries.is_empty() {
        return Err(ReconcileError::NoMatchingReview {
            snippet_id: snippet_id.to_string(),
            date: format_date(date),
        });
    }
    let mut plan = WritePlan::new();
    for entry in &entries {
        for write in plan_toggle(table.schema(), entry, completed)?.writes() {
            plan.push(write.clone());
        }
    }
    Ok(ToggleOutcome {
        matched: entries.len(),
        plan,
    })
}

/// Rewrites a snippet's rows in place, keeping each review's offset from
/// the creation date and its completion flag. Moving the snippet to another
/// day reissues its id for that day.
pub fn plan_edit(
    table: &ReviewTable,
    snippet_id: &str,
    edit: &SnippetEdit,
) -> Result<EditOutcome, ReconcileError> {
    let schema = table.schema();
    require(schema, &Column::ALL)?;

    let stored: Vec<_> = table.rows_for(snippet_id).collect();
    if stored.is_empty() {
        return Err(ReconcileError::UnknownSnippet(snippet_id.to_string()));
    }

    let new_prefix = format!("{}-", format_compact_date(edit.date_created));
    let new_id = if snippet_id.starts_with(&new_prefix) {
        snippet_id.to_string()
    } else {
        allocate(
            edit.date_created,
            table.snippet_ids().filter(|id| *id != snippet_id),
        )
        .to_string()
    };

    let mut changed: Vec<(usize, Vec<String>)> = Vec::new();
    for row in &stored {
        let (review_date, keep_stored_date) = match row.review.offset_days() {
            Some(offset) => (add_days(edit.date_created, offset), false),
            None => {
                tracing::warn!(
                    snippet_id,
                    row = row.row,
                    "cannot derive review offset, keeping the stored review date"
                );
                (row.review.review_date, true)
            }
        };
        let updated = ReviewRow {
            date_created: Some(edit.date_created),
            snippet_type: edit.snippet_type.trim().to_string(),
            snippet_id: new_id.clone(),
            content: edit.content.clone(),
            review_date,
            completed: row.review.completed,
        };
        let mut cells = schema.encode(&updated, Some(&row.cells));
        if keep_stored_date {
            if let Some(index) = schema.position(Column::ReviewDate) {
                if let Some(raw) = row.cells.get(index) {
                    cells[index] = raw.clone();
                }
            }
        }
        if cells != row.cells {
            changed.push((row.row, cells));
        }
    }

    let mut plan = WritePlan::new();
    let mut run: Vec<(usize, Vec<String>)> = Vec::new();
    for (row, cells) in changed {
        if let Some((last, _)) = run.last() {
            if *last + 1 != row {
                plan.push(update_run(schema, std::mem::take(&mut run)));
            }
        }
        run.push((row, cells));
    }
    if !run.is_empty() {
        plan.push(update_run(schema, run));
    }

    Ok(EditOutcome {
        previous_id: snippet_id.to_string(),
        snippet_id: new_id,
        rows: stored.len(),
        plan,
    })
}

fn update_run(schema: &SheetSchema, run: Vec<(usize, Vec<String>)>) -> SheetWrite {
    let first = run.first().map(|(row, _)| *row).unwrap_or_default();
    let last = run.last().map(|(row, _)| *row).unwrap_or(first);
    SheetWrite::Update {
        range: CellRange::rows(RowSpan::new(first, last), schema.width()),
        values: run.into_iter().map(|(_, cells)| cells).collect(),
    }
}

/// Removes every row of `snippet_id` in one batch, highest rows first.
pub fn plan_delete(table: &ReviewTable, snippet_id: &str) -> Result<DeleteOutcome, ReconcileError> {
    require(table.schema(), &[Column::SnippetId])?;
    let rows: Vec<usize> = table.rows_for(snippet_id).map(|stored| stored.row).collect();
    if rows.is_empty() {
        return Err(ReconcileError::UnknownSnippet(snippet_id.to_string()));
    }
    let mut spans = RowSpan::coalesce(rows.iter().copied());
    spans.reverse();

    let mut plan = WritePlan::new();
    plan.push(SheetWrite::Delete { spans });
    Ok(DeleteOutcome {
        snippet_id: snippet_id.to_string(),
        removed: rows.len(),
        plan,
    })
}

/// Health of a sheet after partial failures or hand edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub status: SchemaStatus,
    pub rows: usize,
    pub snippets: usize,
    pub blank_rows: Vec<usize>,
    pub missing_id_rows: Vec<usize>,
    pub undated_rows: Vec<usize>,
    pub fragmented: Vec<String>,
}

impl TableReport {
    pub fn is_healthy(&self) -> bool {
        self.status == SchemaStatus::Complete
            && self.blank_rows.is_empty()
            && self.missing_id_rows.is_empty()
            && self.undated_rows.is_empty()
            && self.fragmented.is_empty()
    }
}

pub fn check(table: &ReviewTable) -> TableReport {
    let mut report = TableReport {
        status: table.schema().status(),
        rows: table.len(),
        snippets: 0,
        blank_rows: Vec::new(),
        missing_id_rows: Vec::new(),
        undated_rows: Vec::new(),
        fragmented: Vec::new(),
    };
    let mut by_snippet: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for stored in table.rows() {
        if stored.is_blank() {
            report.blank_rows.push(stored.row);
            continue;
        }
        if stored.review.snippet_id.is_empty() {
            report.missing_id_rows.push(stored.row);
        } else {
            by_snippet
                .entry(stored.review.snippet_id.as_str())
                .or_default()
                .push(stored.row);
        }
        if stored.review.review_date.is_none() {
            report.undated_rows.push(stored.row);
        }
    }
    report.snippets = by_snippet.len();
    report.fragmented = by_snippet
        .into_iter()
        .filter(|(_, rows)| RowSpan::coalesce(rows.iter().copied()).len() > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    report
}

/// Reads, plans and applies one operation at a time against a gateway.
pub struct Reconciler<'g, G: SheetGateway + ?Sized> {
    gateway: &'g G,
    dry_run: bool,
}

impl<'g, G: SheetGateway + ?Sized> Reconciler<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            dry_run: false,
        }
    }

    /// Plans are computed but never applied.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn load(&self) -> Result<ReviewTable, ReconcileError> {
        let values = self.gateway.bulk_read().map_err(ReconcileError::Gateway)?;
        let table = ReviewTable::from_values(values)?;
        if let SchemaStatus::Degraded { missing } = table.schema().status() {
            tracing::warn!(
                missing = %describe_columns(&missing),
                "review sheet is missing columns, running in degraded mode"
            );
        }
        Ok(table)
    }

    pub fn add(&self, draft: &SnippetDraft) -> Result<AddOutcome, ReconcileError> {
        let table = self.load()?;
        let outcome = match plan_add(&table, draft) {
            Ok(outcome) => outcome,
            Err(err @ ReconcileError::EmptySchedule(_)) => {
                tracing::warn!(offsets = %draft.offsets, "snippet has no usable review offsets");
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        self.commit(&outcome.plan)?;
        tracing::info!(
            snippet_id = %outcome.snippet.id,
            reviews = outcome.rows.len(),
            dry_run = self.dry_run,
            "added snippet"
        );
        Ok(outcome)
    }

    /// Toggles a review the caller already holds a reference to; no read.
    pub fn toggle_entry(
        &self,
        schema: &SheetSchema,
        entry: &ReviewRowRef,
        completed: bool,
    ) -> Result<WritePlan, ReconcileError> {
        let plan = plan_toggle(schema, entry, completed)?;
        self.commit(&plan)?;
        tracing::info!(
            snippet_id = %entry.snippet_id,
            row = entry.row,
            completed,
            writes = plan.len(),
            "toggled review"
        );
        Ok(plan)
    }

    pub fn toggle(
        &self,
        snippet_id: &str,
        date: Date,
        completed: bool,
    ) -> Result<ToggleOutcome, ReconcileError> {
        let table = self.load()?;
        let outcome = plan_toggle_on(&table, snippet_id, date, completed)?;
        self.commit(&outcome.plan)?;
        tracing::info!(
            snippet_id,
            date = %format_date(date),
            completed,
            writes = outcome.plan.len(),
            "toggled review"
        );
        Ok(outcome)
    }

    pub fn edit(&self, snippet_id: &str, edit: &SnippetEdit) -> Result<EditOutcome, ReconcileError> {
        let table = self.load()?;
        self.edit_in(&table, snippet_id, edit)
    }

    /// Edits against a table the caller just loaded.
    pub fn edit_in(
        &self,
        table: &ReviewTable,
        snippet_id: &str,
        edit: &SnippetEdit,
    ) -> Result<EditOutcome, ReconcileError> {
        let outcome = plan_edit(table, snippet_id, edit)?;
        self.commit(&outcome.plan)?;
        tracing::info!(
            previous_id = %outcome.previous_id,
            snippet_id = %outcome.snippet_id,
            rows = outcome.rows,
            writes = outcome.plan.len(),
            "edited snippet"
        );
        Ok(outcome)
    }

    pub fn delete(&self, snippet_id: &str) -> Result<DeleteOutcome, ReconcileError> {
        let table = self.load()?;
        let outcome = plan_delete(&table, snippet_id)?;
        self.commit(&outcome.plan)?;
        tracing::info!(snippet_id, removed = outcome.removed, "deleted snippet");
        Ok(outcome)
    }

    fn commit(&self, plan: &WritePlan) -> Result<(), ReconcileError> {
        if self.dry_run {
            tracing::debug!(writes = plan.len(), "dry run, skipping sheet writes");
            return Ok(());
        }
        plan.apply(self.gateway)?;
        Ok(())
    }
}
