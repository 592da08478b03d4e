use std::cell::{Cell, RefCell};

use super::{validate_delete_spans, CellRange, GatewayError, RowSpan, SheetGateway};
use crate::model::header_row;

/// In-process sheet for exercising the engine without SQLite.
#[derive(Debug, Default)]
pub struct MemorySheet {
    rows: RefCell<Vec<Vec<String>>>,
    writes: Cell<usize>,
    fail_after: Cell<Option<usize>>,
}

impl MemorySheet {
    pub fn with_header() -> Self {
        Self::from_rows(vec![header_row()])
    }

    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: RefCell::new(rows),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.borrow().clone()
    }

    /// Number of write calls that reached the sheet.
    pub fn write_calls(&self) -> usize {
        self.writes.get()
    }

    /// Lets `count` more writes through, then fails every write.
    pub fn fail_writes_after(&self, count: usize) {
        self.fail_after.set(Some(self.writes.get() + count));
    }

    fn begin_write(&self) -> Result<(), GatewayError> {
        if let Some(limit) = self.fail_after.get() {
            if self.writes.get() >= limit {
                return Err(GatewayError::Transport("injected failure".into()));
            }
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<(), GatewayError> {
        let rows = self.rows.borrow().len();
        if row == 0 || row > rows {
            return Err(GatewayError::RowOutOfRange { row, rows });
        }
        Ok(())
    }
}

impl SheetGateway for MemorySheet {
    fn bulk_read(&self) -> Result<Vec<Vec<String>>, GatewayError> {
        Ok(self.rows())
    }

    fn update_range(&self, range: &CellRange, values: &[Vec<String>]) -> Result<(), GatewayError> {
        if values.len() != range.rows.len() {
            return Err(GatewayError::ShapeMismatch {
                range: range.to_string(),
                expected: range.rows.len(),
                actual: values.len(),
            });
        }
        self.check_row(range.rows.last)?;
        self.begin_write()?;
        let mut rows = self.rows.borrow_mut();
        for (offset, row_values) in values.iter().enumerate() {
            let cells = &mut rows[range.rows.first + offset - 1];
            if cells.len() <= range.last_column {
                cells.resize(range.last_column + 1, String::new());
            }
            for column in 0..range.width() {
                cells[range.first_column + column] =
                    row_values.get(column).cloned().unwrap_or_default();
            }
        }
        Ok(())
    }

    fn append_rows(&self, values: &[Vec<String>]) -> Result<(), GatewayError> {
        self.begin_write()?;
        self.rows.borrow_mut().extend(values.iter().cloned());
        Ok(())
    }

    fn clear_range(&self, rows: RowSpan) -> Result<(), GatewayError> {
        self.check_row(rows.last)?;
        self.begin_write()?;
        let mut sheet = self.rows.borrow_mut();
        for row in rows.first..=rows.last {
            for cell in sheet[row - 1].iter_mut() {
                cell.clear();
            }
        }
        Ok(())
    }

    fn batch_delete_rows(&self, spans: &[RowSpan]) -> Result<(), GatewayError> {
        let ordered = validate_delete_spans(spans)?;
        if let Some(highest) = ordered.first() {
            self.check_row(highest.last)?;
        }
        self.begin_write()?;
        let mut sheet = self.rows.borrow_mut();
        for span in ordered {
            sheet.drain(span.first - 1..span.last);
        }
        Ok(())
    }
}
