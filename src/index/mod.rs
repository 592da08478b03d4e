use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use time::Date;

use crate::model::ReviewRow;
use crate::schedule::short_label;

pub mod calendar;

pub use calendar::{render_text, CalendarGrid};

/// What the calendar needs to show and toggle one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRowRef {
    pub snippet_id: String,
    pub label: String,
    pub row: usize,
    pub review_date: Date,
    pub completed: bool,
}

/// Reviews grouped by due date, rebuilt from every fresh read.
#[derive(Debug, Clone, Default)]
pub struct ReviewIndex {
    buckets: BTreeMap<Date, Vec<ReviewRowRef>>,
    skipped: usize,
}

impl ReviewIndex {
    /// Single pass over `(row index, review)` pairs; rows without a
    /// readable review date are skipped.
    pub fn build<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a ReviewRow)>,
    {
        let mut index = Self::default();
        for (row, review) in rows {
            let Some(review_date) = review.review_date else {
                index.skipped += 1;
                continue;
            };
            index
                .buckets
                .entry(review_date)
                .or_default()
                .push(ReviewRowRef {
                    snippet_id: review.snippet_id.clone(),
                    label: short_label(&review.snippet_id),
                    row,
                    review_date,
                    completed: review.completed,
                });
        }
        if index.skipped > 0 {
            tracing::debug!(skipped = index.skipped, "rows without a review date left out of the index");
        }
        index
    }

    pub fn on(&self, date: Date) -> &[ReviewRowRef] {
        self.buckets.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.buckets.keys().copied()
    }

    pub fn range(&self, dates: RangeInclusive<Date>) -> impl Iterator<Item = (Date, &[ReviewRowRef])> {
        self.buckets
            .range(dates)
            .map(|(date, refs)| (*date, refs.as_slice()))
    }

    /// Incomplete reviews due strictly before `today`, oldest first.
    pub fn overdue(&self, today: Date) -> impl Iterator<Item = &ReviewRowRef> {
        self.buckets
            .range(..today)
            .flat_map(|(_, refs)| refs.iter())
            .filter(|entry| !entry.completed)
    }

    pub fn find(&self, snippet_id: &str, date: Date) -> impl Iterator<Item = &ReviewRowRef> {
        let snippet_id = snippet_id.to_string();
        self.on(date)
            .iter()
            .filter(move |entry| entry.snippet_id == snippet_id)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
