use crate::model::{add_days, ReviewRow, Snippet};

mod ids;
mod offsets;

pub use ids::{allocate, short_label, InvalidSnippetId, SnippetId};
pub use offsets::{OffsetList, DEFAULT_OFFSETS};

/// Expands a snippet into one incomplete review row per offset, in offset order.
pub fn generate(snippet: &Snippet, offsets: &OffsetList) -> Vec<ReviewRow> {
    let mut rows = Vec::with_capacity(offsets.len());
    for &days in offsets.days() {
        let Some(review_date) = add_days(snippet.date_created, i64::from(days)) else {
            tracing::warn!(
                snippet_id = %snippet.id,
                days,
                "review offset overflows the calendar, skipping"
            );
            continue;
        };
        rows.push(ReviewRow {
            date_created: Some(snippet.date_created),
            snippet_type: snippet.snippet_type.clone(),
            snippet_id: snippet.id.to_string(),
            content: snippet.content.clone(),
            review_date: Some(review_date),
            completed: false,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn snippet() -> Snippet {
        Snippet {
            id: allocate(date!(2024 - 01 - 01), std::iter::empty()),
            snippet_type: "vocab".into(),
            content: "serendipity".into(),
            date_created: date!(2024 - 01 - 01),
        }
    }

    #[test]
    fn default_offsets_schedule_five_reviews() {
        let rows = generate(&snippet(), &OffsetList::parse(DEFAULT_OFFSETS));
        let dates: Vec<_> = rows.iter().filter_map(|row| row.review_date).collect();
        assert_eq!(
            dates,
            vec![
                date!(2024 - 01 - 02),
                date!(2024 - 01 - 04),
                date!(2024 - 01 - 08),
                date!(2024 - 01 - 15),
                date!(2024 - 01 - 31),
            ]
        );
        assert!(rows.iter().all(|row| !row.completed));
        assert!(rows.iter().all(|row| row.snippet_id == "20240101-01"));
        assert!(rows
            .iter()
            .all(|row| row.date_created == Some(date!(2024 - 01 - 01))));
    }

    #[test]
    fn malformed_tokens_produce_fewer_rows() {
        let rows = generate(&snippet(), &OffsetList::parse("1,,abc,7"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].review_date, Some(date!(2024 - 01 - 02)));
        assert_eq!(rows[1].review_date, Some(date!(2024 - 01 - 08)));
    }

    #[test]
    fn duplicate_offsets_duplicate_rows() {
        let rows = generate(&snippet(), &OffsetList::parse("0,0"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[0].review_date, Some(date!(2024 - 01 - 01)));
    }

    #[test]
    fn empty_offsets_yield_no_rows() {
        assert!(generate(&snippet(), &OffsetList::default()).is_empty());
    }
}
