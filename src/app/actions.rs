use anyhow::{Context, Result};

use crate::index::ReviewRowRef;
use crate::model::{SnippetDraft, SnippetEdit};
use crate::reconcile::{AddOutcome, DeleteOutcome, EditOutcome, Reconciler, WritePlan};
use crate::storage::{ReviewTable, SheetGateway, SheetSchema};

/// Runs calendar actions against the sheet, one read or plan at a time.
pub struct ActionDispatcher<'a, G: SheetGateway + ?Sized> {
    engine: Reconciler<'a, G>,
}

impl<'a, G: SheetGateway + ?Sized> ActionDispatcher<'a, G> {
    pub fn new(sheet: &'a G) -> Self {
        Self {
            engine: Reconciler::new(sheet),
        }
    }

    pub fn reload(&self) -> Result<ReviewTable> {
        self.engine.load().context("reading the review sheet")
    }

    pub fn toggle(
        &self,
        schema: &SheetSchema,
        entry: &ReviewRowRef,
        completed: bool,
    ) -> Result<WritePlan> {
        self.engine
            .toggle_entry(schema, entry, completed)
            .with_context(|| format!("toggling review of {}", entry.snippet_id))
    }

    pub fn add(&self, draft: &SnippetDraft) -> Result<AddOutcome> {
        self.engine.add(draft).context("adding snippet")
    }

    pub fn edit(&self, snippet_id: &str, edit: &SnippetEdit) -> Result<EditOutcome> {
        self.engine
            .edit(snippet_id, edit)
            .with_context(|| format!("editing snippet {snippet_id}"))
    }

    pub fn delete(&self, snippet_id: &str) -> Result<DeleteOutcome> {
        self.engine
            .delete(snippet_id)
            .with_context(|| format!("deleting snippet {snippet_id}"))
    }
}
