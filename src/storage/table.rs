use crate::model::{format_completed, parse_completed, parse_date, Column, ReviewRow};

/// Header row index; data starts on the row after it.
pub const HEADER_ROW: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("the review sheet has no header row")]
    MissingHeader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    Complete,
    Degraded { missing: Vec<Column> },
}

/// Where each known column lives in the sheet, resolved from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSchema {
    positions: [Option<usize>; 6],
    width: usize,
}

impl SheetSchema {
    /// First matching header cell wins for each column.
    pub fn from_header(header: &[String]) -> Self {
        let mut positions = [None; 6];
        for (index, name) in header.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                let slot = &mut positions[column.position()];
                if slot.is_none() {
                    *slot = Some(index);
                }
            }
        }
        Self {
            positions,
            width: header.len(),
        }
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions[column.position()]
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn missing(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|column| self.position(*column).is_none())
            .collect()
    }

    pub fn status(&self) -> SchemaStatus {
        let missing = self.missing();
        if missing.is_empty() {
            SchemaStatus::Complete
        } else {
            SchemaStatus::Degraded { missing }
        }
    }

    /// Columns from `required` that the sheet lacks.
    pub fn missing_of(&self, required: &[Column]) -> Vec<Column> {
        required
            .iter()
            .copied()
            .filter(|column| self.position(*column).is_none())
            .collect()
    }

    pub fn decode(&self, cells: &[String]) -> ReviewRow {
        let text = |column: Column| {
            self.position(column)
                .and_then(|index| cells.get(index))
                .map(String::as_str)
                .unwrap_or("")
        };
        ReviewRow {
            date_created: parse_date(text(Column::DateCreated)),
            snippet_type: text(Column::SnippetType).trim().to_string(),
            snippet_id: text(Column::SnippetId).trim().to_string(),
            content: text(Column::Content).to_string(),
            review_date: parse_date(text(Column::ReviewDate)),
            completed: parse_completed(text(Column::Completed)),
        }
    }

    /// Lays a review row out at the sheet's column positions. Cells outside
    /// the known columns are copied from `base` when given.
    pub fn encode(&self, row: &ReviewRow, base: Option<&[String]>) -> Vec<String> {
        let mut cells = match base {
            Some(base) => self.normalize(base.to_vec()),
            None => vec![String::new(); self.width],
        };
        for column in Column::ALL {
            if let Some(index) = self.position(column) {
                cells[index] = row.cell(column);
            }
        }
        cells
    }

    pub fn completed_cell(completed: bool) -> String {
        format_completed(completed).to_string()
    }

    fn normalize(&self, mut cells: Vec<String>) -> Vec<String> {
        cells.resize(self.width, String::new());
        cells
    }
}

/// A decoded data row and the sheet row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub row: usize,
    pub review: ReviewRow,
    pub cells: Vec<String>,
}

impl StoredRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| cell.trim().is_empty())
    }
}

/// Typed snapshot of the whole review sheet from one bulk read.
#[derive(Debug, Clone)]
pub struct ReviewTable {
    schema: SheetSchema,
    rows: Vec<StoredRow>,
}

impl ReviewTable {
    pub fn from_values(values: Vec<Vec<String>>) -> Result<Self, SchemaError> {
        let mut values = values.into_iter();
        let header = values.next().ok_or(SchemaError::MissingHeader)?;
        if header.iter().all(|cell| cell.trim().is_empty()) {
            return Err(SchemaError::MissingHeader);
        }
        let schema = SheetSchema::from_header(&header);
        let rows = values
            .enumerate()
            .map(|(offset, cells)| {
                let cells = schema.normalize(cells);
                StoredRow {
                    row: HEADER_ROW + 1 + offset,
                    review: schema.decode(&cells),
                    cells,
                }
            })
            .collect();
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &SheetSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, row: usize) -> Option<&StoredRow> {
        row.checked_sub(HEADER_ROW + 1)
            .and_then(|offset| self.rows.get(offset))
    }

    pub fn rows_for<'a>(&'a self, snippet_id: &'a str) -> impl Iterator<Item = &'a StoredRow> + 'a {
        self.rows
            .iter()
            .filter(move |stored| stored.review.snippet_id == snippet_id)
    }

    pub fn snippet_ids(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(|stored| stored.review.snippet_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// `(row index, review)` pairs in storage order, ready for indexing.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &ReviewRow)> {
        self.rows.iter().map(|stored| (stored.row, &stored.review))
    }
}
