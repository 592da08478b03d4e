use std::fmt;

use crate::storage::{CellRange, GatewayError, RowSpan, SheetGateway};

/// One gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetWrite {
    Update {
        range: CellRange,
        values: Vec<Vec<String>>,
    },
    Append {
        rows: Vec<Vec<String>>,
    },
    /// Spans are kept highest-first.
    Delete {
        spans: Vec<RowSpan>,
    },
}

impl SheetWrite {
    fn apply<G: SheetGateway + ?Sized>(&self, gateway: &G) -> Result<(), GatewayError> {
        match self {
            SheetWrite::Update { range, values } => gateway.update_range(range, values),
            SheetWrite::Append { rows } => gateway.append_rows(rows),
            SheetWrite::Delete { spans } => gateway.batch_delete_rows(spans),
        }
    }
}

impl fmt::Display for SheetWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetWrite::Update { range, values } => {
                write!(f, "update {range} ({} row", values.len())?;
                if values.len() != 1 {
                    f.write_str("s")?;
                }
                f.write_str(")")
            }
            SheetWrite::Append { rows } => write!(f, "append {} row(s)", rows.len()),
            SheetWrite::Delete { spans } => {
                let spans = spans
                    .iter()
                    .map(|span| span.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "delete rows {spans}")
            }
        }
    }
}

/// Ordered writes; later writes may rely on row numbers valid only before
/// earlier ones, so they are applied strictly in sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    writes: Vec<SheetWrite>,
}

#[derive(Debug, thiserror::Error)]
#[error("write {} of {total} failed ({applied} applied before it)", .applied + 1)]
pub struct ApplyError {
    pub applied: usize,
    pub total: usize,
    #[source]
    pub source: GatewayError,
}

impl WritePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: SheetWrite) {
        self.writes.push(write);
    }

    pub fn writes(&self) -> &[SheetWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies writes one at a time and stops at the first failure.
    pub fn apply<G: SheetGateway + ?Sized>(&self, gateway: &G) -> Result<(), ApplyError> {
        let total = self.writes.len();
        for (applied, write) in self.writes.iter().enumerate() {
            tracing::debug!(%write, "applying sheet write");
            write.apply(gateway).map_err(|source| ApplyError {
                applied,
                total,
                source,
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for WritePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.writes.is_empty() {
            return f.write_str("no changes");
        }
        for (i, write) in self.writes.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}. {write}", i + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemorySheet;
    use assert_matches::assert_matches;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn failure_reports_how_far_the_plan_got() {
        let sheet = MemorySheet::from_rows(vec![cells(&["h"]), cells(&["a"])]);
        let mut plan = WritePlan::new();
        plan.push(SheetWrite::Append {
            rows: vec![cells(&["b"])],
        });
        plan.push(SheetWrite::Update {
            range: CellRange::cell(2, 0),
            values: vec![cells(&["A"])],
        });
        plan.push(SheetWrite::Delete {
            spans: vec![RowSpan::single(3)],
        });
        sheet.fail_writes_after(1);

        let err = plan.apply(&sheet).unwrap_err();
        assert_eq!(err.applied, 1);
        assert_eq!(err.total, 3);
        assert_matches!(err.source, GatewayError::Transport(_));
        assert_eq!(err.to_string(), "write 2 of 3 failed (1 applied before it)");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(sheet.rows(), vec![cells(&["h"]), cells(&["a"]), cells(&["b"])]);
    }

    #[test]
    fn plans_describe_their_writes() {
        let mut plan = WritePlan::new();
        assert_eq!(plan.to_string(), "no changes");
        plan.push(SheetWrite::Update {
            range: CellRange::cell(4, 5),
            values: vec![cells(&["TRUE"])],
        });
        plan.push(SheetWrite::Delete {
            spans: vec![RowSpan::new(7, 9), RowSpan::single(2)],
        });
        assert_eq!(
            plan.to_string(),
            "1. update F4:F4 (1 row)\n2. delete rows 7:9, 2"
        );
    }
}
